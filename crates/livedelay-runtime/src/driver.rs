//! Delay driver: one task owns the manager and serializes every mutation.
//!
//! Control commands, feed arrivals and due reveal timers are multiplexed
//! with `tokio::select!`. Callers talk to the task through [`DelayHandle`].

use std::io::Write;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use livedelay_core::{
    ArrivalOutcome, DelayManager, DelayStats, DelayStatus, FeedNotifier, StartOutcome,
    TimerScheduler,
};

use crate::feed::FeedArrival;
use crate::scheduler::DelayQueueScheduler;
use crate::sink::JsonLinesSink;

const COMMAND_BUFFER: usize = 32;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("delay driver has shut down")]
    Gone,
}

#[derive(Debug)]
enum Command {
    Start {
        delay_ms: u64,
        reply: oneshot::Sender<StartOutcome>,
    },
    SetDelay {
        delay_ms: u64,
        reply: oneshot::Sender<()>,
    },
    Stop {
        reply: oneshot::Sender<usize>,
    },
    Status {
        reply: oneshot::Sender<DelayStatus>,
    },
    Stats {
        reply: oneshot::Sender<DelayStats>,
    },
    Shutdown,
}

// ─── DelayHandle ────────────────────────────────────────────────────

/// Cloneable async handle to a running driver.
#[derive(Debug, Clone)]
pub struct DelayHandle {
    commands: mpsc::Sender<Command>,
    queue_size: watch::Receiver<usize>,
}

impl DelayHandle {
    pub async fn start(&self, delay_ms: u64) -> Result<StartOutcome, DriverError> {
        self.request(|reply| Command::Start { delay_ms, reply })
            .await
    }

    pub async fn set_delay(&self, delay_ms: u64) -> Result<(), DriverError> {
        self.request(|reply| Command::SetDelay { delay_ms, reply })
            .await
    }

    /// Reveal everything pending and stop withholding. Returns the number
    /// of items revealed.
    pub async fn stop(&self) -> Result<usize, DriverError> {
        self.request(|reply| Command::Stop { reply }).await
    }

    pub async fn status(&self) -> Result<DelayStatus, DriverError> {
        self.request(|reply| Command::Status { reply }).await
    }

    pub async fn stats(&self) -> Result<DelayStats, DriverError> {
        self.request(|reply| Command::Stats { reply }).await
    }

    /// Ask the driver to drain and exit. Pending items are revealed.
    pub async fn shutdown(&self) -> Result<(), DriverError> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| DriverError::Gone)
    }

    /// Last published queue size.
    pub fn queue_size(&self) -> usize {
        *self.queue_size.borrow()
    }

    pub fn subscribe_queue_size(&self) -> watch::Receiver<usize> {
        self.queue_size.clone()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, DriverError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| DriverError::Gone)?;
        rx.await.map_err(|_| DriverError::Gone)
    }
}

// ─── Driver task ────────────────────────────────────────────────────

pub type RuntimeManager<W, N> = DelayManager<JsonLinesSink<W>, DelayQueueScheduler, N>;

/// Spawn the driver task. The task resolves to the final counters after
/// shutdown (or after every handle is dropped).
pub fn spawn<W, N>(
    mut manager: RuntimeManager<W, N>,
    arrivals: mpsc::Receiver<FeedArrival>,
) -> (DelayHandle, JoinHandle<DelayStats>)
where
    W: Write + Send + 'static,
    N: FeedNotifier + Send + 'static,
{
    let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
    let (size_tx, size_rx) = watch::channel(manager.queue_size());
    manager.on_queue_size_change(move |size| {
        size_tx.send_replace(size);
    });

    let driver = Driver {
        manager,
        commands,
        arrivals,
        arrivals_open: true,
        epoch: Instant::now(),
    };
    let task = tokio::spawn(driver.run());
    let handle = DelayHandle {
        commands: commands_tx,
        queue_size: size_rx,
    };
    (handle, task)
}

struct Driver<W: Write, N> {
    manager: RuntimeManager<W, N>,
    commands: mpsc::Receiver<Command>,
    arrivals: mpsc::Receiver<FeedArrival>,
    arrivals_open: bool,
    epoch: Instant,
}

impl<W, N> Driver<W, N>
where
    W: Write + Send + 'static,
    N: FeedNotifier + Send + 'static,
{
    async fn run(mut self) -> DelayStats {
        tracing::debug!("delay driver running");
        loop {
            let timers_armed = !self.manager.scheduler().is_empty();
            tokio::select! {
                biased;

                fired = self.manager.scheduler_mut().next_fired(), if timers_armed => {
                    if let Some((key, identity)) = fired {
                        self.manager.on_timer_fired(key, &identity);
                    }
                }
                item = self.arrivals.recv(), if self.arrivals_open => match item {
                    Some(item) => self.handle_arrival(item),
                    None => {
                        tracing::debug!("feed channel closed");
                        self.arrivals_open = false;
                    }
                },
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd),
                },
            }
        }

        let revealed = self.manager.stop();
        tracing::info!("delay driver stopped, {revealed} items revealed on shutdown");
        self.manager.stats().clone()
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn handle_arrival(&mut self, item: FeedArrival) {
        let now_ms = self.now_ms();
        let handle = item.handle.clone();
        self.manager.sink_mut().note_arrival(handle.position);

        match self.manager.handle_arrival(item, now_ms) {
            ArrivalOutcome::Inactive | ArrivalOutcome::PassThrough => {
                if let Err(e) = self.manager.sink_mut().show(&handle) {
                    tracing::warn!("failed to show item {}: {e}", handle.key());
                }
            }
            ArrivalOutcome::HideFailed(identity) => {
                if let Err(e) = self.manager.sink_mut().show(&handle) {
                    tracing::warn!("failed to show unhidden item {identity}: {e}");
                }
            }
            ArrivalOutcome::Duplicate(_) => {}
            ArrivalOutcome::Hidden {
                identity,
                reveal_at_ms,
                evicted,
            } => {
                tracing::trace!(
                    "withholding {identity} until {reveal_at_ms} ms (evicted: {evicted:?})"
                );
            }
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        // A dropped reply receiver only means the caller went away.
        match cmd {
            Command::Start { delay_ms, reply } => {
                let _ = reply.send(self.manager.start(delay_ms));
            }
            Command::SetDelay { delay_ms, reply } => {
                self.manager.set_delay(delay_ms);
                let _ = reply.send(());
            }
            Command::Stop { reply } => {
                let _ = reply.send(self.manager.stop());
            }
            Command::Status { reply } => {
                let _ = reply.send(self.manager.status());
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.manager.stats().clone());
            }
            Command::Shutdown => {}
        }
    }
}
