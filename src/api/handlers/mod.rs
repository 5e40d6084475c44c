pub mod auth;

pub mod health;
pub use self::health::health;

pub mod home;
pub use self::home::{home, section};

pub(crate) mod pages;
