//! Shared test infrastructure for integration tests.
//!
//! `FakeOllama` is a minimal HTTP/1.1 server speaking just enough of
//! `/api/chat` to drive the compiled binary end to end.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};
use std::thread;

/// Scripted chat backend; replies are served in order, one per request.
pub struct FakeOllama {
    base_url: String,
    requests: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl FakeOllama {
    pub fn start(replies: &[&str]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake backend");
        let addr = listener.local_addr().expect("fake backend address");
        let replies: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(
            replies.iter().map(|reply| reply.to_string()).collect(),
        ));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let served = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else {
                    continue;
                };
                let reply = replies
                    .lock()
                    .expect("lock replies")
                    .pop_front()
                    .unwrap_or_default();
                if let Some(body) = handle(stream, &reply) {
                    served.lock().expect("lock requests").push(body);
                }
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Decoded JSON request bodies, in arrival order.
    pub fn requests(&self) -> Vec<serde_json::Value> {
        self.requests.lock().expect("lock requests").clone()
    }
}

fn handle(stream: TcpStream, reply: &str) -> Option<serde_json::Value> {
    let mut reader = BufReader::new(stream.try_clone().ok()?);
    let mut content_length = None;
    let mut chunked = false;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).ok()? == 0 {
            return None;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();
            if name == "content-length" {
                content_length = value.parse::<usize>().ok();
            } else if name == "transfer-encoding" && value.eq_ignore_ascii_case("chunked") {
                chunked = true;
            }
        }
    }

    let body = if chunked {
        read_chunked(&mut reader)?
    } else {
        let mut body = vec![0u8; content_length.unwrap_or(0)];
        reader.read_exact(&mut body).ok()?;
        body
    };

    let envelope = serde_json::json!({
        "model": "fake",
        "message": { "role": "assistant", "content": reply },
        "done": true,
    })
    .to_string();
    let mut stream = stream;
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        envelope.len(),
        envelope
    );
    stream.write_all(response.as_bytes()).ok()?;
    stream.flush().ok()?;
    serde_json::from_slice(&body).ok()
}

fn read_chunked(reader: &mut BufReader<TcpStream>) -> Option<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let mut size_line = String::new();
        reader.read_line(&mut size_line).ok()?;
        let size_hex = size_line.trim().split(';').next()?;
        let size = usize::from_str_radix(size_hex, 16).ok()?;
        let mut chunk = vec![0u8; size + 2];
        reader.read_exact(&mut chunk).ok()?;
        if size == 0 {
            return Some(body);
        }
        body.extend_from_slice(&chunk[..size]);
    }
}

/// An address nothing listens on.
pub fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind unused port");
    let addr = listener.local_addr().expect("unused port address");
    drop(listener);
    format!("http://{addr}")
}

/// Build a `proptech` invocation isolated to `session`.
pub fn proptech(session: &Path, backend_url: &str) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_proptech"));
    cmd.arg("--session")
        .arg(session)
        .current_dir(session)
        .env("PROPTECH_BACKEND_URL", backend_url)
        .env_remove("PROPTECH_MODEL")
        .env_remove("PROPTECH_GEOCODER_URL")
        .env_remove("PROPTECH_SESSION_DIR")
        .env_remove("RUST_LOG");
    cmd
}

pub fn run_ok(cmd: &mut Command) -> Output {
    let output = cmd.output().expect("spawn proptech");
    assert!(
        output.status.success(),
        "proptech failed\nstdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    output
}
