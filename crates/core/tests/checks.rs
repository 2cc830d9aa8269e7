//! Reachability checks against local listeners and commands.

use std::net::SocketAddr;
use std::time::Duration;

use hostwatch_core::check::{
    HttpStatus, LocalCommand, ReachabilityCheck, RemoteTarget, SshClient, TcpConnect,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const TIMEOUT: Option<Duration> = Some(Duration::from_secs(2));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Minimal HTTP/1.1 responder.
///
/// `/ok` answers 200, `/moved` redirects to `/ok`, `/broken` answers 500 and
/// everything else 404.
async fn spawn_http_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(respond(stream));
        }
    });

    addr
}

async fn respond(mut stream: TcpStream) {
    let mut buf = vec![0u8; 4096];
    let mut len = 0;
    while !buf[..len].windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf[len..]).await {
            Ok(0) | Err(_) => return,
            Ok(n) => len += n,
        }
        if len == buf.len() {
            return;
        }
    }

    let request = String::from_utf8_lossy(&buf[..len]);
    let path = request.split_whitespace().nth(1).unwrap_or("/");

    let (status, extra) = match path {
        "/ok" => ("200 OK", ""),
        "/moved" => ("301 Moved Permanently", "Location: /ok\r\n"),
        "/broken" => ("500 Internal Server Error", ""),
        _ => ("404 Not Found", ""),
    };
    let response =
        format!("HTTP/1.1 {status}\r\n{extra}Content-Length: 0\r\nConnection: close\r\n\r\n");
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// A port with nothing listening on it.
async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

#[tokio::test]
async fn http_status_codes() {
    let addr = spawn_http_server().await;
    let check =
        |path: &str| HttpStatus::new(format!("http://{addr}{path}"), TIMEOUT, REQUEST_TIMEOUT);

    assert!(check("/ok").is_available().await);
    assert!(check("/moved").is_available().await);
    assert!(!check("/missing").is_available().await);
    assert!(!check("/broken").is_available().await);
}

#[tokio::test]
async fn http_unreachable_is_unavailable() {
    let port = closed_port().await;
    let check = HttpStatus::new(
        format!("http://127.0.0.1:{port}/"),
        TIMEOUT,
        REQUEST_TIMEOUT,
    );
    assert!(!check.is_available().await);

    let check = HttpStatus::new("not a url", TIMEOUT, REQUEST_TIMEOUT);
    assert!(!check.is_available().await);
}

/// Accepts connections and never writes a response.
async fn spawn_silent_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    addr
}

#[tokio::test]
async fn http_silent_server_times_out_without_connect_timeout() {
    let addr = spawn_silent_server().await;
    let check = HttpStatus::new(format!("http://{addr}/"), None, Duration::from_millis(500));

    let result = tokio::time::timeout(Duration::from_secs(10), check.is_available()).await;
    assert_eq!(result, Ok(false));
}

#[tokio::test]
async fn http_silent_server_times_out_with_connect_timeout() {
    let addr = spawn_silent_server().await;
    let check = HttpStatus::new(
        format!("http://{addr}/"),
        Some(Duration::from_millis(500)),
        Duration::from_secs(60),
    );

    let result = tokio::time::timeout(Duration::from_secs(10), check.is_available()).await;
    assert_eq!(result, Ok(false));
}

#[tokio::test]
async fn tcp_open_port() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let check = TcpConnect::new("127.0.0.1", port, TIMEOUT);
    assert!(check.is_available().await);
}

#[tokio::test]
async fn tcp_closed_port() {
    let port = closed_port().await;
    let check = TcpConnect::new("127.0.0.1", port, TIMEOUT);
    assert!(!check.is_available().await);
}

#[tokio::test]
async fn tcp_unresolvable_host() {
    let check = TcpConnect::new("host.invalid", 80, TIMEOUT);
    assert!(!check.is_available().await);
}

#[tokio::test]
async fn tcp_without_timeout_uses_os_default() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let check = TcpConnect::new("127.0.0.1", port, None);
    assert!(check.is_available().await);
}

#[cfg(unix)]
#[tokio::test]
async fn local_command_exit_status() {
    let timeout = Duration::from_secs(5);

    assert!(LocalCommand::new(Some("true".to_string()), timeout).is_available().await);
    assert!(!LocalCommand::new(Some("false".to_string()), timeout).is_available().await);
    assert!(
        !LocalCommand::new(Some("sh -c 'exit 3'".to_string()), timeout)
            .is_available()
            .await
    );
    assert!(!LocalCommand::new(None, timeout).is_available().await);
}

#[cfg(unix)]
#[tokio::test]
async fn local_command_timeout_is_unavailable() {
    let check = LocalCommand::new(Some("sleep 5".to_string()), Duration::from_millis(200));
    assert!(!check.is_available().await);
}

#[tokio::test]
async fn local_command_missing_binary() {
    let check = LocalCommand::new(
        Some("/nonexistent/hostwatch-status".to_string()),
        Duration::from_secs(5),
    );
    assert!(!check.is_available().await);
}

#[tokio::test]
async fn ssh_without_status_command_checks_port() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let target = RemoteTarget {
        address: "127.0.0.1".to_string(),
        port,
        username: None,
    };
    let client = SshClient::new(target, TIMEOUT, Duration::from_secs(5));
    assert!(client.is_available().await);

    drop(listener);
    let target = RemoteTarget {
        address: "127.0.0.1".to_string(),
        port: closed_port().await,
        username: None,
    };
    let client = SshClient::new(target, TIMEOUT, Duration::from_secs(5));
    assert!(!client.is_available().await);
}
