//! Listener binding.
//!
//! # Responsibilities
//! - Normalize and resolve configured addresses
//! - Bind TCP listeners
//! - Bind unix socket listeners with a file mode

use std::net::SocketAddr;

use tokio::net::TcpListener;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// The address could not be parsed or resolved.
    #[error("Invalid address {addr:?}: {reason}")]
    InvalidAddress { addr: String, reason: String },

    /// Failed to bind to address.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Expand a leading `:` to all interfaces (":80" → "0.0.0.0:80").
pub fn normalize_addr(addr: &str) -> String {
    match addr.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => addr.to_string(),
    }
}

/// Resolve a configured address to the first matching socket address.
pub async fn resolve_addr(addr: &str) -> Result<SocketAddr, ListenerError> {
    let normalized = normalize_addr(addr);
    if let Ok(sock) = normalized.parse::<SocketAddr>() {
        return Ok(sock);
    }

    let mut addrs = tokio::net::lookup_host(normalized.as_str())
        .await
        .map_err(|e| ListenerError::InvalidAddress {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
    addrs.next().ok_or_else(|| ListenerError::InvalidAddress {
        addr: addr.to_string(),
        reason: "no addresses resolved".to_string(),
    })
}

/// Bind a TCP listener on `addr`.
pub async fn bind_tcp(addr: &str) -> Result<TcpListener, ListenerError> {
    let sock = resolve_addr(addr).await?;
    let listener = TcpListener::bind(sock).await.map_err(|e| ListenerError::Bind {
        addr: addr.to_string(),
        source: e,
    })?;

    let local_addr = listener.local_addr().map_err(|e| ListenerError::Bind {
        addr: addr.to_string(),
        source: e,
    })?;
    tracing::info!(address = %local_addr, "Listener bound");

    Ok(listener)
}

/// Bind a unix socket at `path` and apply `mode` to the socket file.
///
/// A stale socket file left by a previous run is removed first.
#[cfg(unix)]
pub fn bind_unix(path: &std::path::Path, mode: u32) -> Result<tokio::net::UnixListener, ListenerError> {
    use std::os::unix::fs::PermissionsExt;

    let bind_err = |source: std::io::Error| ListenerError::Bind {
        addr: path.display().to_string(),
        source,
    };

    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed stale socket file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(bind_err(e)),
    }

    let listener = tokio::net::UnixListener::bind(path).map_err(bind_err)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(bind_err)?;

    tracing::info!(path = %path.display(), mode = %format!("{mode:o}"), "Unix listener bound");
    Ok(listener)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_addr() {
        assert_eq!(normalize_addr(":80"), "0.0.0.0:80");
        assert_eq!(normalize_addr("127.0.0.1:8080"), "127.0.0.1:8080");
        assert_eq!(normalize_addr("localhost:1"), "localhost:1");
    }

    #[tokio::test]
    async fn test_resolve_addr() {
        let sock = resolve_addr(":8080").await.unwrap();
        assert_eq!(sock, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());

        let err = resolve_addr("not an address").await.unwrap_err();
        assert!(matches!(err, ListenerError::InvalidAddress { .. }));
    }

    #[tokio::test]
    async fn test_bind_conflict_is_an_error() {
        let first = bind_tcp("127.0.0.1:0").await.unwrap();
        let taken = first.local_addr().unwrap().to_string();
        let err = bind_tcp(&taken).await.unwrap_err();
        assert!(matches!(err, ListenerError::Bind { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bind_unix_sets_mode_and_replaces_stale_file() {
        use std::os::unix::fs::PermissionsExt;

        let path = std::env::temp_dir().join(format!("jsonapi-listener-{}.sock", std::process::id()));
        std::fs::write(&path, b"stale").unwrap();

        let listener = bind_unix(&path, 0o600).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        drop(listener);
        let _ = std::fs::remove_file(&path);
    }
}
