#[macro_use]
extern crate log;

pub mod cli;
pub mod config;
pub mod env;
pub mod error;
pub mod hugo_status;
pub mod log_buffer;
pub mod logger;
pub mod project;
pub mod supervisor;
pub mod web;

pub use miette::Result;
