//! Client for the namesync daemon socket.
//!
//! One connection per request: write a JSON line, read a JSON line.

use chrono::Utc;
use namesync_protocol::{ErrorInfo, Method, Request, Response, MAX_REQUEST_BYTES, PROTOCOL_VERSION};
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::env;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

const SOCKET_ENV: &str = "NAMESYNC_SOCKET";
const HOME_ENV: &str = "NAMESYNC_HOME";
const SOCKET_NAME: &str = "daemon.sock";
const READ_TIMEOUT_MS: u64 = 5000;
const WRITE_TIMEOUT_MS: u64 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Home directory not found")]
    HomeNotFound,

    #[error("Failed to connect to daemon at {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Transport(String),

    #[error("daemon rejected request: {0}")]
    Daemon(ErrorInfo),
}

pub struct DaemonClient {
    socket: PathBuf,
}

impl DaemonClient {
    pub fn from_env() -> Result<Self, ClientError> {
        Ok(Self {
            socket: socket_path()?,
        })
    }

    #[cfg(test)]
    pub fn at(socket: PathBuf) -> Self {
        Self { socket }
    }

    /// Send `method` and decode the response data as `T`.
    pub fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        params: Option<Value>,
    ) -> Result<T, ClientError> {
        let request = Request {
            protocol_version: PROTOCOL_VERSION,
            method,
            id: Some(make_request_id()),
            params,
        };
        tracing::debug!(method = ?method, id = ?request.id, "Sending daemon request");

        let response = self.send_request(&request)?;
        if !response.ok {
            let error = response
                .error
                .unwrap_or_else(|| ErrorInfo::new("unknown", "Unknown daemon error"));
            tracing::warn!(code = %error.code, message = %error.message, "Daemon returned error");
            return Err(ClientError::Daemon(error));
        }

        let data = response.data.unwrap_or(Value::Null);
        serde_json::from_value(data)
            .map_err(|err| ClientError::Transport(format!("Unexpected response data: {}", err)))
    }

    fn send_request(&self, request: &Request) -> Result<Response, ClientError> {
        let mut stream =
            UnixStream::connect(&self.socket).map_err(|source| ClientError::Connect {
                path: self.socket.clone(),
                source,
            })?;
        let _ = stream.set_read_timeout(Some(Duration::from_millis(READ_TIMEOUT_MS)));
        let _ = stream.set_write_timeout(Some(Duration::from_millis(WRITE_TIMEOUT_MS)));

        serde_json::to_writer(&mut stream, request)
            .map_err(|err| ClientError::Transport(format!("Failed to write request: {}", err)))?;
        stream
            .write_all(b"\n")
            .map_err(|err| ClientError::Transport(format!("Failed to flush request: {}", err)))?;
        stream.flush().ok();

        read_response(&mut stream)
    }
}

fn read_response(stream: &mut UnixStream) -> Result<Response, ClientError> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err(ClientError::Transport(
                        "Response exceeded maximum size".to_string(),
                    ));
                }
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                return Err(ClientError::Transport(
                    "Timed out waiting for daemon response".to_string(),
                ));
            }
            Err(err) => {
                return Err(ClientError::Transport(format!(
                    "Failed to read response: {}",
                    err
                )))
            }
        }
    }

    let response_bytes = match buffer.iter().position(|b| *b == b'\n') {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    if response_bytes.is_empty() {
        return Err(ClientError::Transport(
            "Daemon response was empty".to_string(),
        ));
    }

    serde_json::from_slice(response_bytes).map_err(|err| {
        ClientError::Transport(format!("Failed to parse response JSON: {}", err))
    })
}

fn socket_path() -> Result<PathBuf, ClientError> {
    if let Ok(path) = env::var(SOCKET_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    if let Ok(home) = env::var(HOME_ENV) {
        if !home.trim().is_empty() {
            return Ok(PathBuf::from(home).join(SOCKET_NAME));
        }
    }
    let home = dirs::home_dir().ok_or(ClientError::HomeNotFound)?;
    Ok(home.join(".namesync").join(SOCKET_NAME))
}

fn make_request_id() -> String {
    let mut random = rand::thread_rng();
    format!(
        "req-{}-{}-{:x}",
        Utc::now().timestamp_millis(),
        std::process::id(),
        random.next_u64()
    )
}
