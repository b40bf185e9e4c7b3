// Library exports for the forum backend.
// Integration tests drive the router through these modules.

pub mod auth;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
pub mod votes;
