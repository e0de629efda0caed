// Library entry point for the tool directory
// Exposes modules for the server binary and integration tests

pub mod admin;
pub mod api;
pub mod auth;
pub mod config;
pub mod directory;
pub mod error;
pub mod import;
pub mod models;
pub mod moderation;
pub mod query;
pub mod sanitize;
pub mod store;
pub mod visibility;
