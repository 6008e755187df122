//! Configuration loading and resolution logic for the tether proxy.

mod config;
mod constants;
mod errors;
mod file;
mod overrides;
mod resolver;
mod secret;

pub use config::{Config, TlsFiles};
pub use constants::{DEFAULT_CONFIG_PATH, DEFAULT_HOST, DEFAULT_PORT, SECRET_HEADER};
pub use errors::ConfigError;
pub use file::{FileConfig, load_file};
pub use overrides::Overrides;
pub use resolver::{parse_target, resolve_config, without_userinfo};
pub use secret::Secret;
