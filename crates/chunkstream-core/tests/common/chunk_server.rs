//! Minimal HTTP/1.1 chunk server for integration tests.
//!
//! Serves a fixed map of path -> body with GET. Unknown paths get 404.
//! Paths registered as slow send their headers, then trickle the body one
//! byte every 100 ms so a client has time to cancel mid-transfer.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Default, Clone)]
pub struct ChunkServer {
    chunks: HashMap<String, Vec<u8>>,
    slow: HashSet<String>,
}

impl ChunkServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` at `/path`.
    pub fn chunk(mut self, path: &str, body: Vec<u8>) -> Self {
        self.chunks.insert(normalize(path), body);
        self
    }

    /// Serve `body` at `/path`, trickling it out slowly.
    pub fn slow_chunk(mut self, path: &str, body: Vec<u8>) -> Self {
        let path = normalize(path);
        self.slow.insert(path.clone());
        self.chunks.insert(path, body);
        self
    }

    /// Starts the server in a background thread. Returns the base URL
    /// (e.g. "http://127.0.0.1:12345"). The server runs until the process exits.
    pub fn start(self) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let server = Arc::new(self);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let server = Arc::clone(&server);
                thread::spawn(move || server.handle(stream));
            }
        });
        format!("http://127.0.0.1:{}", port)
    }

    fn handle(&self, mut stream: TcpStream) {
        let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
        let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
        let mut buf = [0u8; 8192];
        let n = match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        let request = match std::str::from_utf8(&buf[..n]) {
            Ok(s) => s,
            Err(_) => return,
        };
        let mut parts = request.lines().next().unwrap_or("").split_whitespace();
        let method = parts.next().unwrap_or("");
        let path = parts.next().unwrap_or("/");
        if !method.eq_ignore_ascii_case("GET") {
            let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
            return;
        }
        let Some(body) = self.chunks.get(path) else {
            let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
            return;
        };
        let header = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\n\r\n",
            body.len()
        );
        if stream.write_all(header.as_bytes()).is_err() {
            return;
        }
        if self.slow.contains(path) {
            for byte in body {
                thread::sleep(Duration::from_millis(100));
                if stream.write_all(std::slice::from_ref(byte)).is_err() {
                    return;
                }
            }
        } else {
            let _ = stream.write_all(body);
        }
    }
}

fn normalize(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}
