//! Development server: static files from the output tree plus live reload.

mod livereload;
mod watch;

use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tracing::{debug, info, instrument, warn};

use sitekiln_shared::{Result, SiteKilnError};

pub use livereload::{LIVERELOAD_PATH, Reloader, inject_client};
pub use watch::{ChangeFilter, ChangeKind, DEBOUNCE, SourceWatcher, classify};

/// Where and how to serve.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Directory served at `/`.
    pub root: PathBuf,
    pub port: u16,
    /// Delay between a reload request and the signal reaching browsers.
    pub reload_delay: Duration,
}

#[derive(Clone)]
pub(crate) struct AppState {
    root: PathBuf,
    reloader: Reloader,
}

/// Static file server with an SSE live-reload endpoint.
pub struct DevServer {
    opts: ServerOptions,
    reloader: Reloader,
}

impl DevServer {
    pub fn new(opts: ServerOptions) -> Self {
        let reloader = Reloader::new(opts.reload_delay);
        Self { opts, reloader }
    }

    /// Handle used to trigger browser reloads while the server runs.
    pub fn reloader(&self) -> Reloader {
        self.reloader.clone()
    }

    pub fn router(&self) -> Router {
        let state = AppState {
            root: self.opts.root.clone(),
            reloader: self.reloader.clone(),
        };
        Router::new()
            .route(LIVERELOAD_PATH, get(livereload::events))
            .fallback(serve_file)
            .with_state(state)
    }

    /// Bind and serve until `shutdown` resolves. Open live-reload streams are
    /// closed before waiting for connections to drain.
    #[instrument(skip_all, fields(port = self.opts.port))]
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = SocketAddr::from(([127, 0, 0, 1], self.opts.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| SiteKilnError::Server(format!("bind {addr}: {e}")))?;
        let local = listener
            .local_addr()
            .map_err(|e| SiteKilnError::Server(e.to_string()))?;

        info!(url = %format!("http://localhost:{}", local.port()), root = %self.opts.root.display(), "serving");

        let router = self.router();
        let reloader = self.reloader.clone();
        let shutdown = async move {
            shutdown.await;
            info!("shutting down");
            reloader.close();
        };

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| SiteKilnError::Server(e.to_string()))
    }
}

/// Resolves on Ctrl-C.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

async fn serve_file(State(state): State<AppState>, uri: Uri) -> Response {
    let Some(path) = resolve(&state.root, uri.path()).await else {
        debug!(path = uri.path(), "not found");
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "read failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Read error").into_response();
        }
    };

    let content_type = content_type(&path);
    let body = if content_type.starts_with("text/html") {
        inject_client(&String::from_utf8_lossy(&bytes)).into_bytes()
    } else {
        bytes
    };

    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
        .into_response()
}

/// Map a request path to a file inside `root`. Directories resolve to their
/// `index.html`; anything escaping `root` resolves to nothing.
async fn resolve(root: &Path, request_path: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for segment in request_path.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            s if s.contains('\\') => return None,
            s => path.push(s),
        }
    }

    if tokio::fs::metadata(&path).await.ok()?.is_dir() {
        path.push("index.html");
    }

    let file = tokio::fs::canonicalize(&path).await.ok()?;
    let root = tokio::fs::canonicalize(root).await.ok()?;
    let meta = tokio::fs::metadata(&file).await.ok()?;
    (file.starts_with(&root) && meta.is_file()).then_some(file)
}

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}
