//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use exchange_pipeline::config::PipelineConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// What the mock backend does with each connection.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Respond with the given status line and body.
    Fixed { status: &'static str, body: String },
    /// Echo the request body back.
    Echo,
    /// Hold the connection open without answering.
    Stall(Duration),
}

/// Start a mock backend on an ephemeral port and return its address.
pub async fn start_mock_backend(reply: Reply) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let reply = reply.clone();
            tokio::spawn(async move {
                let _ = serve(socket, reply).await;
            });
        }
    });

    addr
}

async fn serve(mut socket: TcpStream, reply: Reply) -> std::io::Result<()> {
    let request_body = read_request(&mut socket).await?;
    let (status, body) = match reply {
        Reply::Fixed { status, body } => (status, body.into_bytes()),
        Reply::Echo => ("200 OK", request_body),
        Reply::Stall(delay) => {
            tokio::time::sleep(delay).await;
            return Ok(());
        }
    };

    let head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        body.len()
    );
    socket.write_all(head.as_bytes()).await?;
    socket.write_all(&body).await?;
    socket.shutdown().await
}

/// Read one request and return its body (Content-Length framing only).
async fn read_request(socket: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            return Ok(Vec::new());
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&data[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while data.len() < header_end + content_length {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }
    Ok(data[header_end..].to_vec())
}

/// Configuration tuned for fast tests.
#[allow(dead_code)]
pub fn test_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.transport.connect_timeout_secs = 2;
    config.transport.request_timeout_secs = 5;
    config.transport.upload_chunk_bytes = 4;
    config
}
