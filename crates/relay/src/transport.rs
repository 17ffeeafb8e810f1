use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Directory holding IPC socket files.
const IPC_DIR: &str = "/tmp/stupid-relay";

/// Transport address for a ZeroMQ endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "type", content = "address")]
pub enum Transport {
    /// Unix domain socket named `<name>.sock` under `/tmp/stupid-relay/`.
    Ipc(String),

    /// TCP host and port.
    Tcp { host: String, port: u16 },
}

impl Transport {
    pub fn ipc(name: &str) -> Self {
        Self::Ipc(name.to_string())
    }

    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Parse an endpoint string such as `tcp://127.0.0.1:6000` or
    /// `ipc:///tmp/stupid-relay/data-ingress.sock`.
    ///
    /// IPC endpoints keep only the socket file stem; the directory is always
    /// [`IPC_DIR`].
    pub fn parse(endpoint: &str) -> Result<Self, RelayError> {
        if let Some(path) = endpoint.strip_prefix("ipc://") {
            let name = Path::new(path)
                .file_stem()
                .and_then(|s| s.to_str())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    RelayError::Config(format!("ipc endpoint '{endpoint}' has no socket name"))
                })?;
            Ok(Self::ipc(name))
        } else if let Some(addr) = endpoint.strip_prefix("tcp://") {
            let (host, port) = addr.rsplit_once(':').ok_or_else(|| {
                RelayError::Config(format!("tcp endpoint '{endpoint}' is missing a port"))
            })?;
            if host.is_empty() {
                return Err(RelayError::Config(format!(
                    "tcp endpoint '{endpoint}' is missing a host"
                )));
            }
            let port = port.parse::<u16>().map_err(|_| {
                RelayError::Config(format!("tcp endpoint '{endpoint}' has invalid port '{port}'"))
            })?;
            Ok(Self::tcp(host, port))
        } else {
            Err(RelayError::Config(format!(
                "endpoint '{endpoint}' must start with 'ipc://' or 'tcp://'"
            )))
        }
    }

    /// The ZeroMQ endpoint address string.
    pub fn endpoint(&self) -> String {
        match self {
            Self::Ipc(name) => format!("ipc://{IPC_DIR}/{name}.sock"),
            Self::Tcp { host, port } => format!("tcp://{host}:{port}"),
        }
    }

    /// Same endpoint reached through `host` instead. IPC transports are
    /// returned unchanged.
    pub fn with_host(&self, host: &str) -> Self {
        match self {
            Self::Ipc(_) => self.clone(),
            Self::Tcp { port, .. } => Self::tcp(host, *port),
        }
    }

    /// For IPC transports, ensure the socket directory exists.
    pub fn ensure_ipc_dir(&self) -> std::io::Result<()> {
        if let Self::Ipc(_) = self {
            std::fs::create_dir_all(IPC_DIR)?;
        }
        Ok(())
    }

    /// Remove an IPC socket file left behind by a previous run, which would
    /// otherwise make the next bind fail with `EADDRINUSE`.
    ///
    /// A socket something still accepts connections on is live, not stale:
    /// it is left in place and reported as `AddrInUse`.
    pub fn remove_stale_socket(&self) -> std::io::Result<()> {
        if let Self::Ipc(name) = self {
            let path = format!("{IPC_DIR}/{name}.sock");
            if accepts_connections(&path) {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::AddrInUse,
                    format!("{path} is in use by another process"),
                ));
            }
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!(path, "removed stale IPC socket");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Prepare the filesystem for binding this endpoint.
    pub(crate) fn prepare_bind(&self) -> Result<(), RelayError> {
        self.ensure_ipc_dir()
            .and_then(|()| self.remove_stale_socket())
            .map_err(|e| RelayError::Transport(format!("{self}: {e}")))
    }
}

#[cfg(unix)]
fn accepts_connections(path: &str) -> bool {
    std::os::unix::net::UnixStream::connect(path).is_ok()
}

#[cfg(not(unix))]
fn accepts_connections(_path: &str) -> bool {
    false
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.endpoint())
    }
}
