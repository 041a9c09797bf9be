//! Spawns the daemon binary against a temporary home and drives it over the
//! socket.

use serde_json::{json, Value};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

struct Daemon {
    child: Child,
    socket: PathBuf,
    _home: tempfile::TempDir,
}

impl Daemon {
    fn spawn() -> Self {
        let home = tempfile::tempdir().expect("temp home");
        let socket = home.path().join("daemon.sock");
        let child = Command::new(env!("CARGO_BIN_EXE_namesync-daemon"))
            .env("NAMESYNC_HOME", home.path())
            .env_remove("NAMESYNC_SOCKET")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn daemon");
        wait_for_socket(&socket);
        Self {
            child,
            socket,
            _home: home,
        }
    }

    fn call(&self, method: &str, params: Value) -> Value {
        let mut stream = UnixStream::connect(&self.socket).expect("connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("timeout");
        let request = json!({
            "protocol_version": 1,
            "method": method,
            "id": "smoke",
            "params": params,
        });
        serde_json::to_writer(&mut stream, &request).expect("write");
        stream.write_all(b"\n").expect("newline");

        let mut buffer = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).expect("read");
            buffer.extend_from_slice(&chunk[..n]);
            if n == 0 || buffer.contains(&b'\n') {
                break;
            }
        }
        let end = buffer
            .iter()
            .position(|b| *b == b'\n')
            .unwrap_or(buffer.len());
        serde_json::from_slice(&buffer[..end]).expect("response json")
    }

    fn ok(&self, method: &str, params: Value) -> Value {
        let response = self.call(method, params);
        assert_eq!(response["ok"], json!(true), "{} failed: {}", method, response);
        response["data"].clone()
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn wait_for_socket(socket: &Path) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if UnixStream::connect(socket).is_ok() {
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
    panic!("daemon socket never came up at {}", socket.display());
}

fn texts(reply: &Value) -> Vec<String> {
    reply["messages"]
        .as_array()
        .expect("messages")
        .iter()
        .map(|message| message["text"].as_str().expect("text").to_string())
        .collect()
}

#[test]
fn alice_confirms_new_name_over_socket() {
    let daemon = Daemon::spawn();

    let health = daemon.ok("get_health", Value::Null);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["namesync"]["commands"], json!(["confirmname"]));

    daemon.ok(
        "register_account",
        json!({"name": "Alice", "password": "hunter2"}),
    );

    let reply = daemon.ok(
        "session_start",
        json!({"session_id": "s-1", "display_name": "Alice99", "account_name": "Alice"}),
    );
    let notices = texts(&reply);
    assert_eq!(notices.len(), 2);
    assert!(notices[0].contains("Alice99"));

    let pending = daemon.ok("get_pending", Value::Null);
    assert_eq!(pending[0]["key"], "Alice99");

    let reply = daemon.ok(
        "command",
        json!({"session_id": "s-1", "name": "/confirmname", "args": ["wrong"]}),
    );
    assert_eq!(reply["messages"][0]["tone"], "error");

    let reply = daemon.ok(
        "command",
        json!({"session_id": "s-1", "name": "/confirmname", "args": ["hunter2"]}),
    );
    assert_eq!(reply["messages"][0]["tone"], "success");

    let pending = daemon.ok("get_pending", Value::Null);
    assert_eq!(pending, json!([]));

    daemon.ok("session_end", json!({"session_id": "s-1"}));
    let reply = daemon.ok(
        "session_start",
        json!({"session_id": "s-2", "display_name": "Alice99", "account_name": "Alice99"}),
    );
    assert!(texts(&reply).is_empty());
}

#[test]
fn rejects_bad_requests() {
    let daemon = Daemon::spawn();

    let response = daemon.call("session_end", json!({"session_id": "ghost"}));
    assert_eq!(response["ok"], json!(false));
    assert_eq!(response["error"]["code"], "unknown_session");

    let response = daemon.call("register_account", json!({"name": "", "password": "pw"}));
    assert_eq!(response["error"]["code"], "missing_field");
}
