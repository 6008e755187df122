//! Constants used by the configuration.

/// Default listen host. Empty means every interface.
pub const DEFAULT_HOST: &str = "";

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default on-disk configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = ".tether.toml";

/// Header carrying the shared secret when one is configured.
pub const SECRET_HEADER: &str = "X-SECRET";
