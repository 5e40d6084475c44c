//! Authentication, brute-force throttling and role-based authorization.
//!
//! Request path: `principal::require_auth` resolves the session cookie through
//! the `SessionManager`, asks the `AuthorizationPolicy` for the effective role
//! set, and attaches a typed `Principal` before the route handler runs.
//!
//! Login path: the `LoginThrottle` counts failures per client address. From
//! the third failure inside a 15-minute window the login form carries an
//! arithmetic challenge from the `ChallengeIssuer`, which must be answered
//! before credentials are even checked. Success clears the counter.
//!
//! ## Preview mode
//!
//! An editor can attach a preview role set to their session to see the site as
//! that role would. While a preview is active the editor and admin gates always
//! fail and the admin section bypass is off, so a previewing session grants
//! strictly less than the real user holds.
//!
//! ## Scaling
//!
//! The failure counter and the challenge secret are process-local. Running more
//! than one instance needs sticky client routing or a shared `FailureTracker`,
//! and a restart invalidates every challenge in flight.

pub(crate) mod admin;
mod challenge;
mod clock;
mod error;
pub(crate) mod login;
#[cfg(test)]
mod memory;
mod password;
mod policy;
pub(crate) mod preview;
pub(crate) mod principal;
pub(crate) mod reset;
mod session;
mod state;
mod storage;
mod throttle;
pub(crate) mod types;
mod utils;

pub use challenge::{Challenge, ChallengeIssuer, Puzzle};
pub use clock::{Clock, SystemClock};
pub use error::{AuthError, ResetError};
pub use policy::{ADMIN_ROLE, AuthorizationPolicy, EDITOR_ROLE, EffectiveRoles};
pub use principal::{ClientKey, Principal, require_auth};
pub use reset::PasswordResetFlow;
pub use session::{Session, SessionManager, spawn_sweeper};
pub use state::{AuthConfig, AuthState};
pub use storage::{
    Datastore, PgStore, ResetTokenRecord, ResetTokenStore, SectionCatalog, SectionRecord,
    SessionRecord, SessionStore, User, UserDirectory,
};
pub use throttle::{FailureTracker, LoginThrottle};
pub(crate) use utils::escape_html;

#[cfg(test)]
pub(crate) use clock::ManualClock;
#[cfg(test)]
pub(crate) use memory::MemoryStore;
#[cfg(test)]
pub(crate) use password::hash_password_fast;
