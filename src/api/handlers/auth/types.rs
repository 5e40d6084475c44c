use serde::Deserialize;

/// `POST /login`. Challenge fields are only present once the throttle trips.
#[derive(Deserialize, Default)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub challenge_answer: String,
    #[serde(default)]
    pub challenge_token: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct ResetPasswordQuery {
    #[serde(default)]
    pub token: String,
}

#[derive(Deserialize, Default)]
pub struct ResetPasswordForm {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// `POST /preview/start`, decoded by hand because `roles` may repeat.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StartPreviewForm {
    pub user_id: Option<String>,
    pub roles: Vec<String>,
}

impl StartPreviewForm {
    /// Accepts repeated `roles` keys as well as comma-separated values.
    #[must_use]
    pub fn parse(body: &[u8]) -> Self {
        let mut form = Self::default();
        for (key, value) in url::form_urlencoded::parse(body) {
            match key.as_ref() {
                "user_id" => {
                    let value = value.trim();
                    if !value.is_empty() {
                        form.user_id = Some(value.to_string());
                    }
                }
                "roles" | "roles[]" => {
                    form.roles.extend(
                        value
                            .split(',')
                            .map(str::trim)
                            .filter(|role| !role.is_empty())
                            .map(ToString::to_string),
                    );
                }
                _ => {}
            }
        }
        form.roles.sort();
        form.roles.dedup();
        form
    }
}
