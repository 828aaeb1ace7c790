// Library surface for the binary, headless tests and reuse.
pub mod app;
pub mod app_dirs;
pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod logging;
pub mod metrics;
pub mod passages;
pub mod runtime;
pub mod session;
pub mod store;
pub mod timer;
pub mod ui;

pub use error::{Error, Result};
