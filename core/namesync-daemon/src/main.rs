//! namesync daemon entrypoint.
//!
//! A small reference host for the name reconciliation core: it owns the
//! account table, tracks connected sessions, fires the tick hook on a timer
//! and exposes everything over a JSON-lines Unix socket.

use fs_err as fs;
use std::env;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use zeroize::{Zeroize, Zeroizing};

use namesync_core::SystemClock;
use namesync_protocol::{
    parse_params, CommandParams, ErrorInfo, Method, RegisterAccountParams, Request, Response,
    SessionParams, SessionStartParams, MAX_REQUEST_BYTES, PROTOCOL_VERSION,
};
use serde::Serialize;

mod accounts;
mod config;
mod db;
mod hooks;
mod sessions;
mod state;

use config::{load_daemon_config, DaemonConfig};
use db::Db;
use state::SharedState;

const HOME_DIR_NAME: &str = ".namesync";
const SOCKET_NAME: &str = "daemon.sock";
const CONFIG_FILE: &str = "namesync.toml";
const READ_TIMEOUT_SECS: u64 = 2;
const READ_CHUNK_SIZE: usize = 4096;

fn main() {
    init_logging();

    let home = match namesync_home() {
        Ok(path) => path,
        Err(err) => {
            error!(error = %err, "Failed to resolve namesync home directory");
            std::process::exit(1);
        }
    };
    let socket_path = daemon_socket_path(&home);

    if let Err(err) = prepare_socket_dir(&socket_path) {
        error!(error = %err, "Failed to prepare daemon socket directory");
        std::process::exit(1);
    }

    if let Err(err) = remove_existing_socket(&socket_path) {
        error!(error = %err, path = %socket_path.display(), "Failed to remove existing socket");
        std::process::exit(1);
    }

    let config = match load_daemon_config(home.join(CONFIG_FILE)) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "Failed to load config; using defaults");
            DaemonConfig::default()
        }
    };

    let db = match Db::new(home.join("daemon").join("accounts.db")) {
        Ok(db) => db,
        Err(err) => {
            error!(error = %err, "Failed to initialize daemon database");
            std::process::exit(1);
        }
    };

    let tick_interval = config.daemon.tick_interval();
    let shared_state = match SharedState::new(db, config, Arc::new(SystemClock)) {
        Ok(state) => Arc::new(state),
        Err(err) => {
            error!(error = %err, "Failed to initialize name sync");
            std::process::exit(1);
        }
    };

    let listener = match UnixListener::bind(&socket_path) {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, path = %socket_path.display(), "Failed to bind daemon socket");
            std::process::exit(1);
        }
    };

    info!(
        path = %socket_path.display(),
        tick_interval_ms = tick_interval.as_millis() as u64,
        "namesync daemon started"
    );
    spawn_ticker(Arc::clone(&shared_state), tick_interval);

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let state = Arc::clone(&shared_state);
                thread::spawn(|| handle_connection(stream, state));
            }
            Err(err) => {
                warn!(error = %err, "Failed to accept daemon connection");
            }
        }
    }
}

fn spawn_ticker(state: Arc<SharedState>, interval: Duration) {
    thread::spawn(move || loop {
        thread::sleep(interval);
        state.tick();
    });
}

fn init_logging() {
    let debug_enabled = env::var("NAMESYNC_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn namesync_home() -> Result<PathBuf, String> {
    if let Ok(path) = env::var("NAMESYNC_HOME") {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    let home = dirs::home_dir().ok_or_else(|| "Home directory not found".to_string())?;
    Ok(home.join(HOME_DIR_NAME))
}

fn daemon_socket_path(home: &Path) -> PathBuf {
    match env::var("NAMESYNC_SOCKET") {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => home.join(SOCKET_NAME),
    }
}

fn prepare_socket_dir(socket_path: &Path) -> Result<(), String> {
    let parent = socket_path
        .parent()
        .ok_or_else(|| "Socket path has no parent".to_string())?;
    fs::create_dir_all(parent).map_err(|err| format!("Failed to create socket directory: {}", err))
}

fn remove_existing_socket(socket_path: &Path) -> Result<(), String> {
    if socket_path.exists() {
        fs::remove_file(socket_path)
            .map_err(|err| format!("Failed to remove existing socket: {}", err))?;
    }
    Ok(())
}

fn handle_connection(mut stream: UnixStream, state: Arc<SharedState>) {
    let request = match read_request(&mut stream) {
        Ok(request) => request,
        Err(err) => {
            warn!(code = %err.code, message = %err.message, "Failed to read request");
            let response = Response::error_with_info(None, err);
            let _ = write_response(&mut stream, response);
            return;
        }
    };

    tracing::debug!(method = ?request.method, id = ?request.id, "Daemon request received");
    let response = handle_request(request, &state);
    let _ = write_response(&mut stream, response);
}

/// Read one request line. The raw bytes may carry a password, so every
/// buffer they pass through is wiped before it is released.
fn read_request(stream: &mut UnixStream) -> Result<Request, ErrorInfo> {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(READ_TIMEOUT_SECS)));

    // Sized up front so growing never leaves an unwiped copy behind.
    let mut buffer = Zeroizing::new(Vec::with_capacity(MAX_REQUEST_BYTES));
    let mut chunk = Zeroizing::new([0u8; READ_CHUNK_SIZE]);

    loop {
        match stream.read(&mut chunk[..]) {
            Ok(0) => break,
            Ok(n) => {
                if buffer.len() + n > MAX_REQUEST_BYTES {
                    return Err(ErrorInfo::new(
                        "request_too_large",
                        "request exceeded maximum size",
                    ));
                }
                buffer.extend_from_slice(&chunk[..n]);
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
                return Err(ErrorInfo::new("read_timeout", "request timed out"));
            }
            Err(err) => {
                return Err(ErrorInfo::new(
                    "read_error",
                    format!("failed to read request: {}", err),
                ));
            }
        }
    }

    decode_request(&mut buffer[..])
}

/// Parse the first line of `bytes`, then zero all of `bytes`.
fn decode_request(bytes: &mut [u8]) -> Result<Request, ErrorInfo> {
    let line_end = bytes
        .iter()
        .position(|b| *b == b'\n')
        .unwrap_or(bytes.len());
    let line = &bytes[..line_end];

    let result = if line.iter().all(|b| b.is_ascii_whitespace()) {
        Err(ErrorInfo::new("empty_request", "request body was empty"))
    } else {
        serde_json::from_slice(line).map_err(|err| {
            ErrorInfo::new(
                "invalid_json",
                format!("request was not valid JSON: {}", err),
            )
        })
    };
    bytes.zeroize();
    result
}

fn handle_request(request: Request, state: &SharedState) -> Response {
    if request.protocol_version != PROTOCOL_VERSION {
        return Response::error(
            request.id,
            "protocol_mismatch",
            "unsupported protocol version",
        );
    }

    let id = request.id;
    let params = request.params;
    let result = match request.method {
        Method::GetHealth => {
            let mut data = serde_json::json!({
                "status": "ok",
                "pid": std::process::id(),
                "version": env!("CARGO_PKG_VERSION"),
                "protocol_version": PROTOCOL_VERSION,
            });
            if let Ok(value) = serde_json::to_value(state.health()) {
                data["namesync"] = value;
            }
            return Response::ok(id, data);
        }
        Method::RegisterAccount => parse_params::<RegisterAccountParams>(params)
            .and_then(|params| state.register_account(params))
            .and_then(to_data),
        Method::SessionStart => parse_params::<SessionStartParams>(params)
            .and_then(|params| state.session_start(params))
            .and_then(to_data),
        Method::SessionEnd => parse_params::<SessionParams>(params)
            .and_then(|params| state.session_end(params))
            .and_then(to_data),
        Method::Command => parse_params::<CommandParams>(params)
            .and_then(|params| state.command(params))
            .and_then(to_data),
        Method::DrainMessages => parse_params::<SessionParams>(params)
            .and_then(|params| state.drain_messages(params))
            .and_then(to_data),
        Method::GetPending => {
            let pending = state.pending();
            tracing::debug!(pending = pending.len(), "Pending snapshot");
            to_data(pending)
        }
    };

    match result {
        Ok(data) => Response::ok(id, data),
        Err(err) => Response::error_with_info(id, err),
    }
}

fn to_data<T: Serialize>(value: T) -> Result<serde_json::Value, ErrorInfo> {
    serde_json::to_value(value).map_err(|err| {
        ErrorInfo::new(
            "serialization_error",
            format!("Failed to serialize response: {}", err),
        )
    })
}

fn write_response(stream: &mut UnixStream, response: Response) -> std::io::Result<()> {
    serde_json::to_writer(&mut *stream, &response)?;
    stream.write_all(b"\n")?;
    stream.flush()?;
    Ok(())
}
