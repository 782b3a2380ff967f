//! Source tree watching for the dev server.
//!
//! Raw filesystem events are debounced, filtered by content hash, and reduced
//! to the set of [`ChangeKind`]s that need a rebuild or reload.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use sitekiln_shared::{CSS_DIR, Result, SiteKilnError, fs};

/// Quiet period after the last event before a batch is emitted.
pub const DEBOUNCE: Duration = Duration::from_millis(100);

/// What a source change requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeKind {
    /// A stylesheet under `src/css` changed: rebuild styles and HTML, then reload.
    Styles,
    /// A top-level `src/*.html` page changed: reload.
    Html,
}

/// Map a changed path to the work it needs, if any.
pub fn classify(source: &Path, path: &Path) -> Option<ChangeKind> {
    let rel = path.strip_prefix(source).ok()?;
    if rel.starts_with(CSS_DIR) && fs::has_extension(rel, &["scss", "css"]) {
        return Some(ChangeKind::Styles);
    }
    if rel.components().count() == 1 && fs::has_extension(rel, &["html"]) {
        return Some(ChangeKind::Html);
    }
    None
}

fn content_hash(path: &Path) -> Option<[u8; 32]> {
    let bytes = std::fs::read(path).ok()?;
    Some(Sha256::digest(&bytes).into())
}

/// Drops events whose file content did not change.
#[derive(Debug)]
pub struct ChangeFilter {
    source: PathBuf,
    hashes: HashMap<PathBuf, [u8; 32]>,
}

impl ChangeFilter {
    /// Record the current content of every watched file.
    pub fn primed(source: &Path) -> Result<Self> {
        let mut hashes = HashMap::new();
        for path in fs::collect_files(source, &["scss", "css", "html"])? {
            if classify(source, &path).is_none() {
                continue;
            }
            if let Some(hash) = content_hash(&path) {
                hashes.insert(path, hash);
            }
        }
        Ok(Self {
            source: source.to_path_buf(),
            hashes,
        })
    }

    /// Reduce a batch of changed paths to the kinds of work they need.
    pub fn observe(&mut self, paths: impl IntoIterator<Item = PathBuf>) -> BTreeSet<ChangeKind> {
        let mut kinds = BTreeSet::new();
        for path in paths {
            let Some(kind) = classify(&self.source, &path) else {
                trace!(path = %path.display(), "ignored");
                continue;
            };

            match content_hash(&path) {
                Some(hash) if self.hashes.get(&path) == Some(&hash) => {
                    trace!(path = %path.display(), "content unchanged");
                    continue;
                }
                Some(hash) => {
                    self.hashes.insert(path.clone(), hash);
                }
                None => {
                    self.hashes.remove(&path);
                }
            }

            debug!(path = %path.display(), ?kind, "source changed");
            kinds.insert(kind);
        }
        kinds
    }
}

/// Recursive watcher over the source tree.
pub struct SourceWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<PathBuf>,
    filter: ChangeFilter,
}

impl SourceWatcher {
    /// Start watching `source`. Must be called inside a Tokio runtime.
    pub fn start(source: &Path) -> Result<Self> {
        let source = source
            .canonicalize()
            .map_err(|e| SiteKilnError::io(source, e))?;
        let filter = ChangeFilter::primed(&source)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                if let Ok(event) = res {
                    for path in event.paths {
                        let _ = tx.send(path);
                    }
                }
            },
            Config::default(),
        )
        .map_err(|e| SiteKilnError::Watch(e.to_string()))?;

        watcher
            .watch(&source, RecursiveMode::Recursive)
            .map_err(|e| SiteKilnError::Watch(format!("{}: {e}", source.display())))?;
        debug!(source = %source.display(), "watching");

        Ok(Self {
            _watcher: watcher,
            rx,
            filter,
        })
    }

    /// Wait for the next debounced batch of real changes.
    ///
    /// Returns `None` once the watcher has stopped.
    pub async fn next_batch(&mut self) -> Option<BTreeSet<ChangeKind>> {
        loop {
            let first = self.rx.recv().await?;
            let mut paths = vec![first];

            let deadline = tokio::time::sleep(DEBOUNCE);
            tokio::pin!(deadline);
            loop {
                tokio::select! {
                    _ = &mut deadline => break,
                    next = self.rx.recv() => match next {
                        Some(path) => {
                            paths.push(path);
                            deadline.as_mut().reset(tokio::time::Instant::now() + DEBOUNCE);
                        }
                        None => break,
                    },
                }
            }

            paths.sort();
            paths.dedup();
            let kinds = self.filter.observe(paths);
            if !kinds.is_empty() {
                return Some(kinds);
            }
        }
    }
}
