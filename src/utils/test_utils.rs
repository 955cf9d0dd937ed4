//! A tiny scripted HTTP/1.1 server standing in for an Ollama host in tests.
//!
//! Each accepted connection consumes the next [`FakeResponse`] from the
//! script; connections are closed after one exchange.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::core::config::Host;

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct FakeResponse {
    status: u16,
    content_type: &'static str,
    chunks: Vec<Vec<u8>>,
    chunk_delay: Duration,
    /// Drop the socket before the terminating zero-length chunk.
    abort_after_chunks: bool,
}

impl FakeResponse {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            chunks: vec![body.as_bytes().to_vec()],
            chunk_delay: Duration::ZERO,
            abort_after_chunks: false,
        }
    }

    /// Newline-delimited records, each written as its own HTTP chunk.
    pub fn ndjson(records: &[&str]) -> Self {
        Self {
            status: 200,
            content_type: "application/x-ndjson",
            chunks: records
                .iter()
                .map(|record| format!("{record}\n").into_bytes())
                .collect(),
            chunk_delay: Duration::from_millis(5),
            abort_after_chunks: false,
        }
    }

    /// Raw body bytes split at arbitrary points.
    pub fn raw_chunks(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: "application/x-ndjson",
            chunks,
            chunk_delay: Duration::from_millis(5),
            abort_after_chunks: false,
        }
    }

    pub fn aborted(mut self) -> Self {
        self.abort_after_chunks = true;
        self
    }
}

pub struct FakeHost {
    pub base_url: String,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
    _server: tokio::task::JoinHandle<()>,
}

impl FakeHost {
    pub async fn requests(&self) -> Vec<CapturedRequest> {
        self.captured.lock().await.clone()
    }

    pub fn host(&self, name: &str, models: &[&str]) -> Host {
        Host {
            name: name.to_string(),
            url: self.base_url.clone(),
            models: models.iter().map(|m| m.to_string()).collect(),
        }
    }
}

pub async fn spawn_fake_host(script: Vec<FakeResponse>) -> FakeHost {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("local addr should resolve");
    let captured = Arc::new(Mutex::new(Vec::new()));
    let captured_for_server = Arc::clone(&captured);
    let mut script: VecDeque<FakeResponse> = script.into();

    let server = tokio::spawn(async move {
        while let Some(response) = script.pop_front() {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            match read_http_request(&mut stream).await {
                Ok(request) => captured_for_server.lock().await.push(request),
                Err(_) => return,
            }
            let _ = write_response(&mut stream, &response).await;
        }
    });

    FakeHost {
        base_url: format!("http://{addr}"),
        captured,
        _server: server,
    }
}

/// A base URL on which nothing is listening.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("local addr should resolve");
    drop(listener);
    format!("http://{addr}")
}

async fn write_response(stream: &mut TcpStream, response: &FakeResponse) -> std::io::Result<()> {
    let reason = match response.status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    };
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
        response.status, reason, response.content_type
    );
    stream.write_all(head.as_bytes()).await?;
    stream.flush().await?;

    for chunk in &response.chunks {
        if !response.chunk_delay.is_zero() {
            tokio::time::sleep(response.chunk_delay).await;
        }
        stream
            .write_all(format!("{:x}\r\n", chunk.len()).as_bytes())
            .await?;
        stream.write_all(chunk).await?;
        stream.write_all(b"\r\n").await?;
        stream.flush().await?;
    }

    if response.abort_after_chunks {
        return stream.shutdown().await;
    }
    stream.write_all(b"0\r\n\r\n").await?;
    stream.flush().await
}

async fn read_http_request(stream: &mut TcpStream) -> Result<CapturedRequest, String> {
    let mut buffer = Vec::new();
    let mut header_end = None;
    while header_end.is_none() {
        let mut chunk = [0_u8; 1024];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP headers".to_string());
        }
        buffer.extend_from_slice(&chunk[..read]);
        header_end = buffer
            .windows(4)
            .position(|window| window == b"\r\n\r\n")
            .map(|index| index + 4);
    }

    let header_end = header_end.ok_or("header end should exist")?;
    let header_text = std::str::from_utf8(&buffer[..header_end]).map_err(|err| err.to_string())?;
    let mut lines = header_text.split("\r\n").filter(|line| !line.is_empty());
    let request_line = lines
        .next()
        .ok_or_else(|| "Missing HTTP request line".to_string())?
        .to_string();

    let mut headers = Vec::new();
    let mut content_length = 0_usize;
    for line in lines {
        let mut parts = line.splitn(2, ':');
        let Some(name) = parts.next() else {
            continue;
        };
        let value = parts.next().unwrap_or_default().trim().to_string();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<usize>().map_err(|err| err.to_string())?;
        }
        headers.push((name.to_string(), value));
    }

    let mut body = buffer[header_end..].to_vec();
    while body.len() < content_length {
        let mut chunk = vec![0_u8; content_length - body.len()];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP body".to_string());
        }
        body.extend_from_slice(&chunk[..read]);
    }
    body.truncate(content_length);

    Ok(CapturedRequest {
        request_line,
        headers,
        body,
    })
}
