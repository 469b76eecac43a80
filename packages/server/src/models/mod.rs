pub mod auth;
pub mod correspondence;
pub mod shared;
pub mod upload;
