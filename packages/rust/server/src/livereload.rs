//! Live reload over Server-Sent Events.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio::sync::broadcast;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

use crate::AppState;

/// Endpoint the injected client subscribes to.
pub const LIVERELOAD_PATH: &str = "/__livereload";

const CLIENT_SCRIPT: &str = r#"<script>(function(){var s=new EventSource("/__livereload");s.addEventListener("reload",function(){s.close();location.reload()})})()</script>"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Reload,
    Close,
}

/// Handle for telling connected browsers to reload.
#[derive(Debug, Clone)]
pub struct Reloader {
    tx: broadcast::Sender<Signal>,
    delay: Duration,
}

impl Reloader {
    pub fn new(delay: Duration) -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx, delay }
    }

    /// Wait for the reload delay, then signal every client. Returns the
    /// number of clients notified.
    pub async fn reload(&self) -> usize {
        tokio::time::sleep(self.delay).await;
        self.reload_now()
    }

    /// Signal every client immediately.
    pub fn reload_now(&self) -> usize {
        let clients = self.tx.send(Signal::Reload).unwrap_or(0);
        debug!(clients, "reload sent");
        clients
    }

    /// End every open event stream so the server can shut down.
    pub(crate) fn close(&self) {
        let _ = self.tx.send(Signal::Close);
    }

    fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.tx.subscribe()
    }
}

/// `GET /__livereload`: one `reload` event per signal.
pub(crate) async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.reloader.subscribe())
        .take_while(|signal| !matches!(signal, Ok(Signal::Close)))
        .filter_map(|signal| match signal {
            Ok(Signal::Reload) => Some(Ok(Event::default().event("reload").data("reload"))),
            // Lagged receivers just miss intermediate reloads.
            _ => None,
        });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Insert the live-reload client before `</body>`, or append it when the
/// closing tag was omitted.
pub fn inject_client(html: &str) -> String {
    let lowered = html.to_ascii_lowercase();
    match lowered.rfind("</body>") {
        Some(at) => {
            let mut out = String::with_capacity(html.len() + CLIENT_SCRIPT.len());
            out.push_str(&html[..at]);
            out.push_str(CLIENT_SCRIPT);
            out.push_str(&html[at..]);
            out
        }
        None => format!("{html}{CLIENT_SCRIPT}"),
    }
}
