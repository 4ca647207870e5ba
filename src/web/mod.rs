//! Web UI and JSON API for the supervised Hugo server.

mod helpers;
mod routes;
mod server;
mod static_files;

pub use server::{AppState, router, serve};
