//! Server-rendered HTML pages.
//!
//! All interpolated values go through `escape_html`.

use crate::api::handlers::auth::{Challenge, Principal, SectionRecord, escape_html};

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n</head>\n<body>\n{body}\n</body>\n</html>\n",
        escape_html(title)
    )
}

fn error_block(error: Option<&str>) -> String {
    error.map_or_else(String::new, |message| {
        format!("<p class=\"error\" role=\"alert\">{}</p>\n", escape_html(message))
    })
}

pub(crate) struct LoginView<'a> {
    pub site_title: &'a str,
    pub email: &'a str,
    pub error: Option<&'a str>,
    pub challenge: Option<&'a Challenge>,
}

pub(crate) fn login_page(view: &LoginView<'_>) -> String {
    let mut body = format!("<h1>{}</h1>\n", escape_html(view.site_title));
    body.push_str(&error_block(view.error));
    body.push_str("<form method=\"post\" action=\"/login\">\n");
    body.push_str(&format!(
        "<label>Email <input type=\"email\" name=\"email\" value=\"{}\" required></label>\n",
        escape_html(view.email)
    ));
    body.push_str(
        "<label>Password <input type=\"password\" name=\"password\" required></label>\n",
    );
    if let Some(challenge) = view.challenge {
        body.push_str(&format!(
            "<fieldset class=\"challenge\">\n<legend>Security check</legend>\n\
             <label>What is {}? <input type=\"text\" name=\"challenge_answer\" \
             inputmode=\"numeric\" autocomplete=\"off\" required></label>\n\
             <input type=\"hidden\" name=\"challenge_token\" value=\"{}\">\n</fieldset>\n",
            escape_html(&challenge.question),
            escape_html(&challenge.token)
        ));
    }
    body.push_str("<button type=\"submit\">Sign in</button>\n</form>");
    layout(&format!("Sign in - {}", view.site_title), &body)
}

pub(crate) fn reset_password_page(
    site_title: &str,
    token: Option<&str>,
    error: Option<&str>,
) -> String {
    let mut body = String::from("<h1>Reset your password</h1>\n");
    body.push_str(&error_block(error));
    if let Some(token) = token {
        body.push_str(&format!(
            "<form method=\"post\" action=\"/reset-password\">\n\
             <input type=\"hidden\" name=\"token\" value=\"{}\">\n\
             <label>New password <input type=\"password\" name=\"password\" minlength=\"8\" required></label>\n\
             <label>Confirm password <input type=\"password\" name=\"confirm_password\" minlength=\"8\" required></label>\n\
             <button type=\"submit\">Set password</button>\n</form>\n",
            escape_html(token)
        ));
    }
    layout(&format!("Reset password - {site_title}"), &body)
}

pub(crate) fn notice_page(site_title: &str, heading: &str, message: &str) -> String {
    let body = format!(
        "<h1>{}</h1>\n<p>{}</p>\n<p><a href=\"/\">Back</a></p>",
        escape_html(heading),
        escape_html(message)
    );
    layout(&format!("{heading} - {site_title}"), &body)
}

pub(crate) fn error_page(heading: &str, message: &str) -> String {
    let body = format!(
        "<h1>{}</h1>\n<p>{}</p>\n<p><a href=\"/\">Home</a></p>",
        escape_html(heading),
        escape_html(message)
    );
    layout(heading, &body)
}

fn preview_banner(principal: &Principal) -> String {
    if principal.is_preview() {
        let roles = principal.roles.roles().join(", ");
        let roles = if roles.is_empty() {
            "(no custom roles)".to_string()
        } else {
            roles
        };
        format!(
            "<div class=\"preview-banner\">Previewing as: {}\n\
             <form method=\"post\" action=\"/preview/stop\"><button type=\"submit\">Exit preview</button></form>\n</div>\n",
            escape_html(&roles)
        )
    } else if principal.roles.is_editor() {
        String::from(
            "<form class=\"preview-start\" method=\"post\" action=\"/preview/start\">\n\
             <label>Preview as roles <input type=\"text\" name=\"roles\"></label>\n\
             <button type=\"submit\">Preview</button>\n</form>\n",
        )
    } else {
        String::new()
    }
}

fn header(site_title: &str, principal: &Principal) -> String {
    format!(
        "<header><a href=\"/\">{}</a> <span class=\"user\">{}</span>\n\
         <form method=\"post\" action=\"/logout\"><button type=\"submit\">Sign out</button></form>\n\
         </header>\n{}",
        escape_html(site_title),
        escape_html(&principal.user.firstname),
        preview_banner(principal)
    )
}

/// Home page listing each section with its access decision.
pub(crate) fn home_page(
    site_title: &str,
    principal: &Principal,
    sections: &[(SectionRecord, bool)],
) -> String {
    let mut body = header(site_title, principal);
    body.push_str("<main>\n<ul class=\"sections\">\n");
    for (section, accessible) in sections {
        if *accessible {
            body.push_str(&format!(
                "<li><a href=\"/sections/{}\">{}</a></li>\n",
                escape_html(&section.name),
                escape_html(&section.title)
            ));
        } else {
            body.push_str(&format!(
                "<li class=\"disabled\" aria-disabled=\"true\">{}</li>\n",
                escape_html(&section.title)
            ));
        }
    }
    body.push_str("</ul>\n</main>");
    layout(site_title, &body)
}

pub(crate) fn section_page(
    site_title: &str,
    principal: &Principal,
    section: &SectionRecord,
) -> String {
    let mut body = header(site_title, principal);
    body.push_str(&format!(
        "<main>\n<h1>{}</h1>\n</main>",
        escape_html(&section.title)
    ));
    layout(&format!("{} - {site_title}", section.title), &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_page_escapes_and_embeds_challenge() {
        let challenge = Challenge {
            question: "3 × four + 2".to_string(),
            token: "abc".to_string(),
        };
        let html = login_page(&LoginView {
            site_title: "Docs",
            email: "\"><script>",
            error: Some("Invalid email or password"),
            challenge: Some(&challenge),
        });
        assert!(html.contains("&quot;&gt;&lt;script&gt;"));
        assert!(html.contains("What is 3 × four + 2?"));
        assert!(html.contains("name=\"challenge_token\" value=\"abc\""));
        assert!(html.contains("Invalid email or password"));
    }

    #[test]
    fn login_page_without_challenge_has_no_challenge_fields() {
        let html = login_page(&LoginView {
            site_title: "Docs",
            email: "",
            error: None,
            challenge: None,
        });
        assert!(!html.contains("challenge_answer"));
        assert!(!html.contains("role=\"alert\""));
    }

    #[test]
    fn reset_page_omits_form_without_token() {
        let html = reset_password_page("Docs", None, Some("expired"));
        assert!(!html.contains("<form"));
        assert!(html.contains("expired"));
    }
}
