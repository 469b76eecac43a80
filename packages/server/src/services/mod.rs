//! The application flows, independent of HTTP.

pub mod auth;
pub mod detail;
pub mod intake;
pub mod search;
