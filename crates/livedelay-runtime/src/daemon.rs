//! `livedelay run`: wires feed, sink, driver and control server together
//! and waits for a shutdown signal.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};

use livedelay_core::{
    DelayChoice, DelayManager, DelayManagerConfig, PreferenceStore, QueueLevel, StartOutcome,
    load_preferred_delay,
};

use crate::cli::RunOpts;
use crate::config::RuntimeConfig;
use crate::driver;
use crate::feed::{FeedReader, FeedSource};
use crate::preference::FilePreferenceStore;
use crate::scheduler::DelayQueueScheduler;
use crate::server::{self, ServerContext};
use crate::sink::JsonLinesSink;

const ARRIVAL_BUFFER: usize = 256;

/// Run the daemon until ctrl-c or SIGTERM, then reveal everything pending.
pub async fn run_daemon(opts: RunOpts, config: RuntimeConfig) -> anyhow::Result<()> {
    let preferences: Box<dyn PreferenceStore + Send> =
        match FilePreferenceStore::open(&config.preference_path) {
            Ok(store) => Box::new(store),
            Err(e) => {
                tracing::warn!(
                    "ignoring unreadable preferences at {}: {e}",
                    config.preference_path.display()
                );
                Box::new(livedelay_core::InMemoryPreferenceStore::new())
            }
        };

    let initial = initial_delay(opts.delay, &*preferences);

    let (arrivals_tx, arrivals_rx) = mpsc::channel(ARRIVAL_BUFFER);
    let feed = FeedReader::new(FeedSource::from_arg(opts.feed), arrivals_tx);
    let manager = DelayManager::with_config(
        JsonLinesSink::new(std::io::stdout()),
        DelayQueueScheduler::new(),
        feed,
        DelayManagerConfig {
            capacity: config.capacity,
        },
    );
    let (handle, driver_task) = driver::spawn(manager, arrivals_rx);

    match handle.start(initial.ms()).await? {
        StartOutcome::Started => tracing::info!("withholding feed items for {}", initial.label()),
        StartOutcome::FeedUnavailable => {
            tracing::warn!("feed unavailable, items pass through until `livedelay start`");
        }
        StartOutcome::AlreadyActive => {}
    }

    let watcher = tokio::spawn(watch_queue_level(
        handle.subscribe_queue_size(),
        config.capacity.max(1),
    ));

    let ctx = ServerContext {
        handle: handle.clone(),
        preferences: Arc::new(Mutex::new(preferences)),
    };
    let server_socket = config.socket_path.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server::run_server(&server_socket, ctx).await {
            tracing::error!("control server error: {e}");
        }
    });

    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => tokio::select! {
                    _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                },
                Err(e) => {
                    tracing::warn!("cannot register SIGTERM handler: {e}");
                    ctrl_c.await.ok();
                    tracing::info!("received ctrl-c, shutting down");
                }
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            tracing::info!("received ctrl-c, shutting down");
        }
    };

    tokio::select! {
        () = shutdown => {}
        _ = server_handle => {
            tracing::warn!("control server exited unexpectedly");
        }
    }

    tracing::info!("{} items pending at shutdown", handle.queue_size());
    handle.shutdown().await.ok();
    watcher.abort();
    let stats = driver_task.await?;
    tracing::info!(
        "hidden {} items: {} expired, {} stopped, {} evicted, {} reveal failures",
        stats.hidden,
        stats.revealed_on_expiry,
        stats.revealed_on_stop,
        stats.evicted,
        stats.reveal_failures
    );

    let _ = std::fs::remove_file(&config.socket_path);
    tracing::info!("livedelay stopped");
    Ok(())
}

/// Log whenever the pending queue crosses into a different fill level.
async fn watch_queue_level(mut sizes: watch::Receiver<usize>, capacity: usize) {
    let mut last = QueueLevel::Empty;
    while sizes.changed().await.is_ok() {
        let size = *sizes.borrow_and_update();
        let level = QueueLevel::classify(size, capacity);
        if level == last {
            continue;
        }
        match level {
            QueueLevel::AtCapacity => {
                tracing::warn!("{size} items withheld, at capacity: oldest are revealed early");
            }
            QueueLevel::NearCapacity => tracing::warn!("{size}/{capacity} items withheld"),
            QueueLevel::Pending | QueueLevel::Empty => {
                tracing::debug!("{size}/{capacity} items withheld");
            }
        }
        last = level;
    }
}

/// `--delay` wins when it names an offered choice; otherwise the stored
/// preference is used.
fn initial_delay<S: PreferenceStore + ?Sized>(flag: Option<u64>, store: &S) -> DelayChoice {
    match flag {
        Some(ms) => DelayChoice::from_ms(ms).unwrap_or_else(|| {
            let snapped = livedelay_core::snap_to_choice(ms);
            tracing::warn!(
                "--delay {ms} is not an offered delay, using {}",
                snapped.label()
            );
            snapped
        }),
        None => load_preferred_delay(store),
    }
}
