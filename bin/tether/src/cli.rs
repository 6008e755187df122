//! CLI entry point that resolves configuration and launches the proxy runtime.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use tether_config::{Config, DEFAULT_CONFIG_PATH, FileConfig, Overrides, load_file, resolve_config};
use tracing::{debug, info, warn};

/// Parse CLI arguments, resolve a [`Config`], and run the proxy.
pub(crate) async fn run() -> Result<()> {
    let cli = Cli::parse();
    debug!(config_path = %cli.config.display(), "parsed CLI arguments");
    let config = cli.resolve_configuration()?;

    log_configuration(&config);

    tether_core::run(config).await?;
    Ok(())
}

fn log_configuration(config: &Config) {
    info!(
        "starting {} {} on {} proxying {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        config.bind_address(),
        config.target()
    );

    if let Some(secret) = config.secret() {
        info!("requests must carry the {} header", secret.label());
    }
    if let Some(base_path) = config.base_path() {
        info!("stripping base path {base_path:?} from request paths");
    }
    let tls = config.tls();
    if let Some(ca_cert) = &tls.ca_cert {
        info!("trusting upstream certificates from {}", ca_cert.display());
    }
    if tls.client_cert.is_some() || tls.client_key.is_some() {
        info!("presenting a client certificate to the upstream");
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about = "Single-target HTTP reverse proxy.")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH, env = "TETHER_CONFIG")]
    config: PathBuf,

    /// Upstream every request is forwarded to (e.g. http://127.0.0.1:9000).
    #[arg(long, value_name = "URL", env = "TETHER_TARGET")]
    target: Option<String>,

    /// Host to listen on; empty listens on every interface.
    #[arg(long, value_name = "HOST", env = "TETHER_HOST")]
    host: Option<String>,

    /// Port to listen on.
    #[arg(long, value_name = "PORT", env = "TETHER_PORT")]
    port: Option<u16>,

    /// Log every request and rejected authorization attempts.
    #[arg(long, env = "TETHER_DEBUG")]
    debug: bool,

    /// Value required in the X-SECRET header.
    #[arg(long, value_name = "SECRET", env = "TETHER_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Path segment removed from request paths before forwarding.
    #[arg(long = "base-path", value_name = "PATH", env = "TETHER_BASE_PATH")]
    base_path: Option<String>,

    /// PEM bundle of certificate authorities trusted for the upstream.
    #[arg(long = "ca-cert", value_name = "FILE", env = "TETHER_CA_CERT")]
    ca_cert: Option<PathBuf>,

    /// PEM client certificate presented to the upstream.
    #[arg(long = "client-cert", value_name = "FILE", env = "TETHER_CLIENT_CERT")]
    client_cert: Option<PathBuf>,

    /// PEM private key for the client certificate.
    #[arg(long = "client-key", value_name = "FILE", env = "TETHER_CLIENT_KEY")]
    client_key: Option<PathBuf>,
}

impl Cli {
    /// Merge `.tether.toml` (if present) with CLI overrides into a [`Config`].
    fn resolve_configuration(&self) -> Result<Config> {
        let file_config = self.load_file_configuration()?;
        let overrides = self.overrides();

        if overrides.is_empty() {
            debug!("no CLI overrides supplied");
        } else {
            debug!(
                target_override = ?self.target,
                host_override = ?self.host,
                port_override = ?self.port,
                debug_override = self.debug,
                "applying CLI overrides"
            );
        }

        let config = resolve_config(file_config, overrides)?;
        debug!(
            bind_address = %config.bind_address(),
            target_url = %config.target(),
            debug = config.debug(),
            "resolved effective configuration"
        );

        Ok(config)
    }

    fn overrides(&self) -> Overrides {
        Overrides::new()
            .target(self.target.clone())
            .listen(self.host.clone(), self.port)
            .debug(self.debug)
            .secret(self.secret.clone())
            .base_path(self.base_path.clone())
            .tls(
                self.ca_cert.clone(),
                self.client_cert.clone(),
                self.client_key.clone(),
            )
    }

    /// Attempt to load a [`FileConfig`] from disk.
    fn load_file_configuration(&self) -> Result<Option<FileConfig>> {
        let file_config = load_file(self.config.as_path())?;

        if file_config.is_some() {
            debug!(path = %self.config.display(), "loaded configuration file");
        }

        if file_config.is_none() && self.config.as_path() != Path::new(DEFAULT_CONFIG_PATH) {
            warn!(
                "configuration file {:?} not found; continuing with defaults and CLI overrides",
                self.config
            );
        }

        Ok(file_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;
    use std::net::SocketAddr;

    #[rstest]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[rstest]
    fn flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "tether",
            "--config",
            "/nonexistent/tether.toml",
            "--target",
            "http://127.0.0.1:9000/v1",
            "--host",
            "127.0.0.1",
            "--port",
            "9090",
            "--debug",
            "--secret",
            "s3cr3t",
            "--base-path",
            "/api",
        ])
        .expect("arguments parse");

        let config = resolve_config(None, cli.overrides()).expect("config resolves");
        assert_eq!(
            config.bind_address(),
            "127.0.0.1:9090".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(config.target().to_string(), "http://127.0.0.1:9000/v1");
        assert!(config.debug());
        assert_eq!(config.secret().map(|secret| secret.value()), Some("s3cr3t"));
        assert_eq!(config.base_path(), Some("/api"));
    }

    #[rstest]
    fn invalid_port_is_rejected() {
        let result = Cli::try_parse_from(["tether", "--port", "not-a-port"]);
        assert!(result.is_err());
    }
}
