//! Common test utilities for the integration suite.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use assert_cmd::Command;
use tempfile::TempDir;

/// Isolated environment for one test: a temp dir doubling as plugin root
/// and as the lock/state temp directory (via TMPDIR).
pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        std::fs::create_dir_all(temp_dir.path().join("config")).unwrap();
        Self { temp_dir }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `config/config.json` under the plugin root.
    pub fn write_config(&self, body: &str) {
        std::fs::write(self.root().join("config").join("config.json"), body).unwrap();
    }

    /// Config with only the webhook channel, pointed at `url`.
    pub fn configure_webhook(&self, url: &str) {
        self.write_config(&format!(
            r#"{{
  "notifications": {{
    "desktop": {{"enabled": false}},
    "webhook": {{
      "enabled": true,
      "preset": "custom",
      "format": "json",
      "url": "{url}",
      "retry": {{"enabled": false}}
    }}
  }}
}}"#
        ));
    }

    /// A command wired to this environment's plugin root and temp dir.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("claude-notifications")
            .expect("failed to find claude-notifications binary");
        cmd.env("CLAUDE_PLUGIN_ROOT", self.root())
            .env("TMPDIR", self.root());
        cmd
    }

    pub fn state_file(&self, session_id: &str) -> PathBuf {
        self.root().join(format!("claude-session-state-{session_id}.json"))
    }

    pub fn lock_file(&self, event: &str, session_id: &str) -> PathBuf {
        self.root()
            .join(format!("claude-notification-{event}-{session_id}.lock"))
    }

    /// Writes a transcript file and returns its path.
    pub fn write_transcript(&self, name: &str, lines: &[String]) -> PathBuf {
        let path = self.root().join(name);
        std::fs::write(&path, lines.join("\n") + "\n").unwrap();
        path
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

/// Blocking HTTP stub that accepts every request with 200 and records the
/// bodies. Runs on a background thread for the life of the test.
pub struct CaptureServer {
    addr: SocketAddr,
    bodies: Arc<Mutex<Vec<String>>>,
}

impl CaptureServer {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind stub server");
        let addr = listener.local_addr().unwrap();
        let bodies: Arc<Mutex<Vec<String>>> = Arc::default();

        let seen = bodies.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                if let Some(body) = read_request_body(&mut stream) {
                    seen.lock().unwrap().push(body);
                }
                let _ = stream.write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                );
            }
        });

        Self { addr, bodies }
    }

    pub fn url(&self) -> String {
        format!("http://{}/hook", self.addr)
    }

    pub fn request_count(&self) -> usize {
        self.bodies.lock().unwrap().len()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.bodies.lock().unwrap().clone()
    }
}

fn read_request_body(stream: &mut TcpStream) -> Option<String> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let headers = String::from_utf8_lossy(&data[..header_end]).to_string();
    let content_length = headers
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())?
        })
        .unwrap_or(0);

    let body_start = header_end + 4;
    while data.len() < body_start + content_length {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }

    Some(String::from_utf8_lossy(&data[body_start..]).to_string())
}

/// Transcript line builders shared across tests.
pub mod transcript {
    pub fn user_text(ts: &str, text: &str) -> String {
        format!(
            r#"{{"type":"user","timestamp":"{ts}","message":{{"role":"user","content":"{text}"}}}}"#
        )
    }

    pub fn assistant_text(ts: &str, text: &str) -> String {
        format!(
            r#"{{"type":"assistant","timestamp":"{ts}","message":{{"role":"assistant","content":[{{"type":"text","text":"{text}"}}]}}}}"#
        )
    }

    pub fn assistant_tool(ts: &str, name: &str, input: &str) -> String {
        format!(
            r#"{{"type":"assistant","timestamp":"{ts}","message":{{"role":"assistant","content":[{{"type":"tool_use","name":"{name}","input":{input}}}]}}}}"#
        )
    }
}
