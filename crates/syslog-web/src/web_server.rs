// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::convert::Infallible;
use std::io;
use std::mem;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use chrono::Local;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::service::service_fn;
use hyper::{header, http, Method, Request, Response, StatusCode};
use regex::bytes::Regex;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::http_utils::{full_body, log_and_create_http_response, parse_query, query_value, Body};
use crate::search::{grep_files, list_hosts, GrepRequest, MatchSink, ScanOutcome};

const INDEX_PATH: &str = "/";
const GREP_PATH_PREFIX: &str = "/grep/";

// Matches are sent to the client in chunks of about this many bytes.
const CHUNK_SIZE: usize = 32 * 1024;
const STREAM_BUFFER_CHUNKS: usize = 4;

/// HTTP front end over a log tree. All configured addresses are bound up front so a bad address
/// fails startup instead of a single listener.
pub struct SyslogWeb {
    root: Arc<PathBuf>,
    listeners: Vec<TcpListener>,
}

impl SyslogWeb {
    pub async fn bind(config: &Config) -> io::Result<SyslogWeb> {
        let mut listeners = Vec::with_capacity(config.listen_addrs.len());
        for addr in &config.listen_addrs {
            let listener = TcpListener::bind(addr.as_str()).await.map_err(|e| {
                io::Error::new(e.kind(), format!("listening on {addr}: {e}"))
            })?;
            listeners.push(listener);
        }
        Ok(SyslogWeb {
            root: Arc::new(config.dir.clone()),
            listeners,
        })
    }

    pub fn local_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        self.listeners.iter().map(TcpListener::local_addr).collect()
    }

    /// Serves every listener until cancelled. The first listener that fails stops the others.
    pub async fn serve(self, cancel_token: CancellationToken) -> io::Result<()> {
        let mut servers = JoinSet::new();
        for listener in self.listeners {
            if let Ok(addr) = listener.local_addr() {
                info!("Serving logs from {} on http://{}", self.root.display(), addr);
            }
            servers.spawn(serve_tcp(
                listener,
                Arc::clone(&self.root),
                cancel_token.clone(),
            ));
        }

        while let Some(finished) = servers.join_next().await {
            let result = match finished {
                Ok(result) => result,
                Err(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
            };
            if let Err(e) = result {
                cancel_token.cancel();
                return Err(e);
            }
        }
        Ok(())
    }
}

async fn serve_tcp(
    listener: TcpListener,
    root: Arc<PathBuf>,
    cancel_token: CancellationToken,
) -> io::Result<()> {
    let server = hyper::server::conn::http1::Builder::new();
    let mut joinset = JoinSet::new();

    let service = service_fn(move |req: Request<Incoming>| {
        let root = Arc::clone(&root);
        async move { handle_request(&root, req).await }
    });

    loop {
        let conn = tokio::select! {
            con_res = listener.accept() => match con_res {
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::ConnectionAborted
                            | io::ErrorKind::ConnectionReset
                            | io::ErrorKind::ConnectionRefused
                    ) =>
                {
                    continue;
                }
                Err(e) => {
                    error!("Server error: {e}");
                    return Err(e);
                }
                Ok((conn, _)) => conn,
            },
            finished = async {
                match joinset.join_next().await {
                    Some(finished) => finished,
                    None => std::future::pending().await,
                }
            } => match finished {
                Err(e) if e.is_panic() => {
                    error!("Connection handler panicked: {:?}", e);
                    continue;
                },
                Ok(()) | Err(_) => continue,
            },
            _ = cancel_token.cancelled() => {
                debug!("HTTP listener stopped");
                return Ok(());
            }
        };
        let conn = hyper_util::rt::TokioIo::new(conn);
        let server = server.clone();
        let service = service.clone();
        joinset.spawn(async move {
            if let Err(e) = server.serve_connection(conn, service).await {
                debug!("Connection error: {e}");
            }
        });
    }
}

/// Routes one request. Only the method and URI are looked at, so the request body type is free.
pub async fn handle_request<B>(root: &Path, req: Request<B>) -> http::Result<Response<Body>> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, INDEX_PATH) => index_handler(root),
        (&Method::GET, path) if path.starts_with(GREP_PATH_PREFIX) => {
            grep_handler(root, path, req.uri().query().unwrap_or_default())
        }
        _ => {
            let mut not_found = Response::new(full_body(Bytes::new()));
            *not_found.status_mut() = StatusCode::NOT_FOUND;
            Ok(not_found)
        }
    }
}

/// Host index as JSON, `{"hosts": [...]}`, rather than an HTML page.
fn index_handler(root: &Path) -> http::Result<Response<Body>> {
    let hosts = match list_hosts(root) {
        Ok(hosts) => hosts,
        Err(e) => {
            return log_and_create_http_response(
                &format!("Error listing hosts in {}: {e}", root.display()),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        }
    };
    let body = json!({ "hosts": hosts }).to_string();
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .body(full_body(body))
}

fn grep_handler(root: &Path, path: &str, query: &str) -> http::Result<Response<Body>> {
    let raw_host = path.strip_prefix(GREP_PATH_PREFIX).unwrap_or_default();
    let Ok(host) = urlencoding::decode(raw_host) else {
        return log_and_create_http_response(
            &format!("{path}: host {raw_host:?} not found"),
            StatusCode::NOT_FOUND,
        );
    };

    let pairs = parse_query(query);
    let request = match GrepRequest::new(
        &host,
        query_value(&pairs, "q"),
        query_value(&pairs, "range"),
    ) {
        Ok(request) => request,
        Err(e) => return log_and_create_http_response(&format!("{path}: {e}"), e.status()),
    };
    let files = match request.files(root, &Local::now()) {
        Ok(files) => files,
        Err(e) => return log_and_create_http_response(&format!("{path}: {e}"), e.status()),
    };
    debug!(
        "Grepping {} files of {} for {:?}",
        files.len(),
        request.host,
        request.pattern.as_str()
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(stream_matches(files, request.pattern))
}

/// Scans on the blocking pool and streams the matches. Dropping the body (the client went away)
/// closes the channel, which stops the scan.
fn stream_matches(files: Vec<PathBuf>, pattern: Regex) -> Body {
    spawn_match_stream(files, pattern).0
}

/// Starts scanning on a blocking thread and streams matches into the returned body. Dropping the
/// body stops the scan; the handle resolves once the scanning thread is done.
fn spawn_match_stream(
    files: Vec<PathBuf>,
    pattern: Regex,
) -> (Body, JoinHandle<io::Result<ScanOutcome>>) {
    let (tx, rx) = mpsc::channel::<Bytes>(STREAM_BUFFER_CHUNKS);

    let scan = tokio::task::spawn_blocking(move || {
        let mut sink = ChannelSink::new(tx);
        let outcome = grep_files(&files, &pattern, &mut sink);
        match &outcome {
            Ok(ScanOutcome::Completed) => {
                sink.flush();
            }
            Ok(ScanOutcome::Aborted) => debug!("Client went away, grep aborted"),
            Err(e) => {
                sink.flush();
                error!("Error while grepping: {e}");
            }
        }
        outcome
    });

    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        let chunk = rx.recv().await?;
        Some((Ok::<_, Infallible>(Frame::data(chunk)), rx))
    });
    (StreamBody::new(stream).boxed_unsync(), scan)
}

struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
    buf: Vec<u8>,
}

impl ChannelSink {
    fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self {
            tx,
            buf: Vec::with_capacity(CHUNK_SIZE),
        }
    }

    /// Sends buffered matches; `false` once the receiving side is gone.
    fn flush(&mut self) -> bool {
        if self.buf.is_empty() {
            return true;
        }
        let chunk = Bytes::from(mem::replace(&mut self.buf, Vec::with_capacity(CHUNK_SIZE)));
        self.tx.blocking_send(chunk).is_ok()
    }
}

impl MatchSink for ChannelSink {
    fn matched(&mut self, line: &[u8]) -> bool {
        self.buf.extend_from_slice(line);
        if self.buf.len() >= CHUNK_SIZE {
            return self.flush();
        }
        true
    }

    fn cancelled(&self) -> bool {
        self.tx.is_closed()
    }
}
