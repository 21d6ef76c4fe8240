//! Live feed reader: newline-delimited JSON items from a file, FIFO, or stdin.
//!
//! Acts as the item-arrival notifier. The first `subscribe` spawns a single
//! reader task that lives as long as the `FeedReader`; a path is followed
//! like `tail -f`. `unsubscribe` only detaches: items keep flowing to the
//! driver, which shows them unwithheld while the manager is inactive, and
//! a later `subscribe` resumes from the current position instead of
//! replaying the feed.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use livedelay_core::{FeedItem, FeedNotifier, NotifierError};

/// How often a followed file is checked for new lines after EOF.
const FOLLOW_POLL: Duration = Duration::from_millis(100);

/// Sink-side key of one feed item. Items without an id are keyed by feed
/// position, in a separate namespace from native ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PostKey {
    Id(String),
    Line(u64),
}

impl fmt::Display for PostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostKey::Id(id) => f.write_str(id),
            PostKey::Line(position) => write!(f, "line {position}"),
        }
    }
}

/// Presentable unit of one feed item, owned by the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct PostHandle {
    pub id: Option<String>,
    /// Zero-based position of the item in the feed.
    pub position: u64,
    pub payload: serde_json::Value,
}

impl PostHandle {
    pub fn key(&self) -> PostKey {
        match &self.id {
            Some(id) => PostKey::Id(id.clone()),
            None => PostKey::Line(self.position),
        }
    }
}

pub type FeedArrival = FeedItem<PostHandle>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    Stdin,
    Path(PathBuf),
}

impl FeedSource {
    pub fn from_arg(arg: Option<PathBuf>) -> Self {
        match arg {
            Some(path) if path.as_os_str() != "-" => FeedSource::Path(path),
            _ => FeedSource::Stdin,
        }
    }
}

/// Parse one feed line. The `id` field (string or number) becomes the
/// item's identifier; the whole object is kept as payload.
pub fn parse_line(line: &str, position: u64) -> Result<FeedArrival, serde_json::Error> {
    let payload: serde_json::Value = serde_json::from_str(line)?;
    let id = match payload.get("id") {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    Ok(FeedItem {
        id: id.clone(),
        handle: PostHandle {
            id,
            position,
            payload,
        },
    })
}

// ─── FeedReader ─────────────────────────────────────────────────────

pub struct FeedReader {
    source: FeedSource,
    tx: mpsc::Sender<FeedArrival>,
    task: Option<JoinHandle<()>>,
    attached: bool,
}

impl FeedReader {
    pub fn new(source: FeedSource, tx: mpsc::Sender<FeedArrival>) -> Self {
        Self {
            source,
            tx,
            task: None,
            attached: false,
        }
    }

    #[cfg(test)]
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    #[cfg(test)]
    pub fn is_reading(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl FeedNotifier for FeedReader {
    fn subscribe(&mut self) -> Result<(), NotifierError> {
        if self.task.is_none() {
            if let FeedSource::Path(path) = &self.source {
                if !path.exists() {
                    return Err(NotifierError::ContainerNotFound(path.display().to_string()));
                }
            }
            let source = self.source.clone();
            let tx = self.tx.clone();
            self.task = Some(tokio::spawn(async move {
                read_feed(source, tx).await;
            }));
        } else if !self.attached {
            tracing::debug!("reattaching to the running feed reader");
        }
        self.attached = true;
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.attached = false;
    }
}

impl Drop for FeedReader {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn read_feed(source: FeedSource, tx: mpsc::Sender<FeedArrival>) {
    match source {
        FeedSource::Stdin => pump(BufReader::new(tokio::io::stdin()), tx, false).await,
        FeedSource::Path(path) => match tokio::fs::File::open(&path).await {
            Ok(file) => pump(BufReader::new(file), tx, true).await,
            Err(e) => tracing::warn!("cannot open feed {}: {e}", path.display()),
        },
    }
}

/// Forward complete lines. With `follow`, EOF means "wait for more" and a
/// trailing partial line is held until its newline arrives.
async fn pump<R: AsyncBufRead + Unpin>(mut reader: R, tx: mpsc::Sender<FeedArrival>, follow: bool) {
    let mut line = String::new();
    let mut position = 0u64;
    loop {
        let complete = match reader.read_line(&mut line).await {
            Ok(0) if follow => {
                tokio::time::sleep(FOLLOW_POLL).await;
                continue;
            }
            Ok(0) => {
                if line.trim().is_empty() {
                    break;
                }
                true
            }
            Ok(_) => line.ends_with('\n') || !follow,
            Err(e) => {
                tracing::warn!("feed read error: {e}");
                break;
            }
        };
        if !complete {
            continue;
        }

        let text = std::mem::take(&mut line);
        if text.trim().is_empty() {
            continue;
        }
        match parse_line(text.trim_end(), position) {
            Ok(item) => {
                position += 1;
                if tx.send(item).await.is_err() {
                    break;
                }
            }
            Err(e) => tracing::warn!("skipping malformed feed line: {e}"),
        }
    }
    tracing::debug!("feed reader finished after {position} items");
}
