pub mod auth;
pub mod confirm;
