// Library surface for the binary, headless sessions and integration tests.
pub mod app_dirs;
pub mod config;
pub mod dispatcher;
pub mod log_files;
pub mod record;
pub mod runtime;
pub mod session;
pub mod transport;
