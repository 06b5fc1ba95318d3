use crate::model::Song;
use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";
pub const CATALOG_PATH: &str = "/api/music";
const BANNER: &str = "stopify catalog server\nGET /api/music for the song list\n";
const READ_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_HEADER_LINES: usize = 64;

/// Background catalog server. Dropping the handle stops it.
pub struct CatalogServer {
    addr: SocketAddr,
    shutdown_tx: Sender<()>,
    worker: Option<JoinHandle<()>>,
}

impl CatalogServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for CatalogServer {
    fn drop(&mut self) {
        self.stop();
    }
}

pub fn start_catalog_server(bind_addr: &str, songs: Vec<Song>) -> Result<CatalogServer> {
    let (listener, body) = bind(bind_addr, &songs)?;
    listener
        .set_nonblocking(true)
        .context("failed to set nonblocking listener")?;
    let addr = listener
        .local_addr()
        .context("failed to read catalog server address")?;

    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    let worker = thread::Builder::new()
        .name(String::from("catalog-server"))
        .spawn(move || accept_loop(listener, body, shutdown_rx))
        .context("failed to spawn catalog server thread")?;
    log::info!("catalog server listening on http://{addr}{CATALOG_PATH}");

    Ok(CatalogServer {
        addr,
        shutdown_tx,
        worker: Some(worker),
    })
}

pub fn run_catalog_server_forever(bind_addr: &str, songs: Vec<Song>) -> Result<()> {
    let (listener, body) = bind(bind_addr, &songs)?;
    log::info!(
        "catalog server listening on http://{}{CATALOG_PATH}",
        listener.local_addr()?
    );

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => spawn_connection(stream, body.clone()),
            Err(err) => log::warn!("catalog accept failed: {err}"),
        }
    }
    Ok(())
}

fn bind(bind_addr: &str, songs: &[Song]) -> Result<(TcpListener, Arc<String>)> {
    let body = serde_json::to_string(songs).context("failed to serialize catalog")?;
    let listener = TcpListener::bind(bind_addr)
        .with_context(|| format!("failed to bind catalog server at {bind_addr}"))?;
    Ok((listener, Arc::new(body)))
}

fn accept_loop(listener: TcpListener, body: Arc<String>, shutdown_rx: Receiver<()>) {
    loop {
        match listener.accept() {
            Ok((stream, _)) => spawn_connection(stream, body.clone()),
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(err) => log::warn!("catalog accept failed: {err}"),
        }

        match shutdown_rx.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => {
                log::info!("catalog server stopped");
                return;
            }
            Err(TryRecvError::Empty) => {}
        }

        thread::sleep(Duration::from_millis(12));
    }
}

fn spawn_connection(stream: TcpStream, body: Arc<String>) {
    thread::spawn(move || {
        let peer = stream
            .peer_addr()
            .map_or_else(|_| String::from("unknown"), |addr| addr.to_string());
        if let Err(err) = handle_connection(stream, &body) {
            log::warn!("catalog request from {peer} failed: {err:#}");
        }
    });
}

fn handle_connection(stream: TcpStream, body: &str) -> Result<()> {
    stream
        .set_nonblocking(false)
        .context("failed to switch stream to blocking")?;
    stream
        .set_read_timeout(Some(READ_TIMEOUT))
        .context("failed to set read timeout")?;

    let mut reader = BufReader::new(stream.try_clone().context("failed to clone stream")?);
    let mut request_line = String::new();
    reader
        .read_line(&mut request_line)
        .context("failed to read request line")?;

    for _ in 0..MAX_HEADER_LINES {
        let mut header = String::new();
        let read = reader.read_line(&mut header).context("failed to read header")?;
        if read == 0 || header.trim().is_empty() {
            break;
        }
    }

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();
    let response = route(method, target, body);
    log::debug!("{method} {target} -> {}", response.status);

    let mut stream = stream;
    write_response(&mut stream, &response)
}

struct Response<'a> {
    status: u16,
    reason: &'static str,
    content_type: &'static str,
    body: &'a str,
}

fn route<'a>(method: &str, target: &str, catalog: &'a str) -> Response<'a> {
    let path = target.split('?').next().unwrap_or_default();
    let known = path == CATALOG_PATH || path == "/";
    match (method, path) {
        ("GET", CATALOG_PATH) => Response {
            status: 200,
            reason: "OK",
            content_type: "application/json",
            body: catalog,
        },
        ("GET", "/") => Response {
            status: 200,
            reason: "OK",
            content_type: "text/plain; charset=utf-8",
            body: BANNER,
        },
        (_, _) if known => Response {
            status: 405,
            reason: "Method Not Allowed",
            content_type: "text/plain; charset=utf-8",
            body: "method not allowed\n",
        },
        _ => Response {
            status: 404,
            reason: "Not Found",
            content_type: "text/plain; charset=utf-8",
            body: "not found\n",
        },
    }
}

fn write_response(stream: &mut TcpStream, response: &Response<'_>) -> Result<()> {
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        response.reason,
        response.content_type,
        response.body.len()
    );
    stream
        .write_all(head.as_bytes())
        .and_then(|_| stream.write_all(response.body.as_bytes()))
        .and_then(|_| stream.flush())
        .context("failed to write response")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_catalog_banner_and_errors() {
        let catalog = r#"[{"id":1}]"#;
        let ok = route("GET", "/api/music", catalog);
        assert_eq!(ok.status, 200);
        assert_eq!(ok.content_type, "application/json");
        assert_eq!(ok.body, catalog);

        assert_eq!(route("GET", "/api/music?page=2", catalog).body, catalog);
        assert_eq!(route("GET", "/", catalog).status, 200);
        assert_eq!(route("POST", "/api/music", catalog).status, 405);
        assert_eq!(route("GET", "/api/other", catalog).status, 404);
        assert_eq!(route("", "", catalog).status, 404);
    }
}
