pub mod auth;
pub mod correspondence;
pub mod upload;
