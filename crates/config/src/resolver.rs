use crate::{
    Config, ConfigError, DEFAULT_HOST, DEFAULT_PORT, FileConfig, Overrides, SECRET_HEADER, Secret,
    TlsFiles,
};
use http::Uri;
use http::uri::{Authority, Scheme};
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::str::FromStr;

/// Resolve the final configuration by merging file values with CLI overrides.
pub fn resolve_config(
    file: Option<FileConfig>,
    overrides: Overrides,
) -> Result<Config, ConfigError> {
    let file = file.unwrap_or_default();
    let cli = overrides.into_file_config();

    let target = cli
        .target
        .or(file.target)
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::MissingTarget)?;
    let target = parse_target(&target)?;

    let host = cli.host.or(file.host).unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = cli.port.or(file.port).unwrap_or(DEFAULT_PORT);
    let bind_address = resolve_bind_address(&host, port)?;

    let secret = cli
        .secret
        .or(file.secret)
        .filter(|value| !value.is_empty())
        .map(|value| Secret::new(SECRET_HEADER, value))
        .transpose()?;

    let tls = TlsFiles {
        ca_cert: cli.ca_cert.or(file.ca_cert),
        client_cert: cli.client_cert.or(file.client_cert),
        client_key: cli.client_key.or(file.client_key),
    };

    Ok(Config::new(bind_address, target)
        .with_debug(cli.debug.or(file.debug).unwrap_or(false))
        .with_secret(secret)
        .with_base_path(cli.base_path.or(file.base_path))
        .with_tls(tls))
}

/// Parse an upstream target, requiring an `http`/`https` scheme and an authority.
///
/// Userinfo is dropped: it is never sent upstream and must not reach logs.
pub fn parse_target(value: &str) -> Result<Uri, ConfigError> {
    let uri = Uri::from_str(value).map_err(|source| ConfigError::TargetUrl {
        value: value.to_string(),
        source,
    })?;

    let scheme_ok = uri
        .scheme()
        .is_some_and(|scheme| *scheme == Scheme::HTTP || *scheme == Scheme::HTTPS);
    if !scheme_ok || uri.authority().is_none() {
        return Err(ConfigError::TargetNotAbsolute {
            value: value.to_string(),
        });
    }
    Ok(without_userinfo(uri))
}

/// Remove any `user:password@` part from the authority of `uri`.
pub fn without_userinfo(uri: Uri) -> Uri {
    let Some(host_port) = uri
        .authority()
        .and_then(|authority| authority.as_str().rsplit_once('@'))
        .map(|(_, host_port)| host_port.to_string())
    else {
        return uri;
    };
    let Ok(authority) = host_port.parse::<Authority>() else {
        return uri;
    };

    let mut parts = uri.clone().into_parts();
    parts.authority = Some(authority);
    Uri::from_parts(parts).unwrap_or(uri)
}

fn resolve_bind_address(host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    if host.is_empty() {
        return Ok(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)));
    }

    let value = format!("{host}:{port}");
    let mut candidates = (host, port)
        .to_socket_addrs()
        .map_err(|source| ConfigError::BindAddress {
            value: value.clone(),
            source,
        })?;
    candidates.next().ok_or_else(|| ConfigError::BindAddress {
        value,
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "host resolved to no address"),
    })
}
