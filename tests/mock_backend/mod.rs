//! Scripted raw HTTP backend
//!
//! Serves one scripted reply per connection. Used for connection-level
//! behavior wiremock cannot produce, such as a body cut off before its
//! declared length.

// Not every test file uses every reply kind
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Reply to one request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// 200 declaring the whole payload but sending only `sent` bytes
    Truncated { payload: Vec<u8>, sent: usize },
    /// Honors `Range: bytes=N-` with a 206, or sends the whole payload with a
    /// 200 when `honor_range` is false or no range was asked for
    Resume { payload: Vec<u8>, honor_range: bool },
    /// Fixed status and body
    Status { status: u16, body: Vec<u8> },
}

/// Running backend; requests are recorded as raw header blocks.
pub struct ScriptedBackend {
    pub url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl ScriptedBackend {
    pub async fn start(script: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind scripted backend");
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = requests.clone();
        tokio::spawn(async move {
            for reply in script {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                serve(socket, reply, &recorded).await;
            }
        });

        Self {
            url: format!("http://{addr}"),
            requests,
        }
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// `Range` header of every request, in order.
    pub fn range_headers(&self) -> Vec<Option<String>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|head| header_value(head, "range"))
            .collect()
    }
}

/// Deterministic payload of `len` bytes.
pub fn test_payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn header_value(head: &str, name: &str) -> Option<String> {
    head.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim().to_string())
    })
}

fn range_start(head: &str) -> Option<usize> {
    let value = header_value(head, "range")?;
    let rest = value.strip_prefix("bytes=")?;
    rest.trim_end_matches('-').parse().ok()
}

async fn serve(mut socket: TcpStream, reply: Reply, recorded: &Mutex<Vec<String>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    let head = String::from_utf8_lossy(&buf).to_string();
    recorded.lock().unwrap().push(head.clone());

    let (status_line, extra_headers, declared, body) = match reply {
        Reply::Truncated { payload, sent } => (
            "200 OK".to_string(),
            String::new(),
            payload.len(),
            payload[..sent].to_vec(),
        ),
        Reply::Resume {
            payload,
            honor_range,
        } => match range_start(&head).filter(|_| honor_range) {
            Some(start) => {
                let total = payload.len();
                let rest = payload[start..].to_vec();
                (
                    "206 Partial Content".to_string(),
                    format!("Content-Range: bytes {start}-{}/{total}\r\n", total - 1),
                    rest.len(),
                    rest,
                )
            }
            None => ("200 OK".to_string(), String::new(), payload.len(), payload),
        },
        Reply::Status { status, body } => (
            format!("{status} Scripted"),
            String::new(),
            body.len(),
            body,
        ),
    };

    let response_head = format!(
        "HTTP/1.1 {status_line}\r\nContent-Type: audio/pcm\r\nContent-Length: {declared}\r\n{extra_headers}Connection: close\r\n\r\n"
    );
    let _ = socket.write_all(response_head.as_bytes()).await;
    let _ = socket.write_all(&body).await;
    let _ = socket.flush().await;
    let _ = socket.shutdown().await;
}
