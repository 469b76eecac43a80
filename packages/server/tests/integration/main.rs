mod auth;
mod common;
mod correspondence;
mod upload;
