#![forbid(unsafe_code)]

pub mod backend;
pub mod cli;
pub mod commands;
pub mod config;
pub mod executor;
pub mod formats;
pub mod logging;
pub mod persistence;
pub mod projects;
pub mod store;
