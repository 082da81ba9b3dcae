//! Command-line front end and HTTP service for `config-validator`.

pub mod cli;
pub mod config;
pub mod logging;
pub mod server;
