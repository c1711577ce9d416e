//! Periodic driver for the collector.
//!
//! A single task owns the `Collector`; cycles never overlap. Each finished
//! cycle is published through a `watch` channel so readers always see one
//! whole snapshot, and user actions arrive over an `mpsc` command queue.

use crate::collector::{CollectError, Collection, Collector};
use crate::ranking::SortKey;
use anyhow::{Context, Result, anyhow};
use log::{debug, error, info, warn};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const COMMAND_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Change the process ordering and re-collect immediately.
    SetSortKey(SortKey),
    /// Collect now, outside the regular tick.
    Refresh,
}

pub struct MonitorService;

impl MonitorService {
    /// Run a first cycle in place, so a hard failure reaches the caller, then
    /// keep collecting every `interval` in a background task.
    pub async fn spawn(collector: Collector, interval: Duration) -> Result<MonitorHandle> {
        let (collector, first) = collect_blocking(collector).await?;
        let first = first.context("initial collection failed")?;

        let (updates_tx, updates_rx) = watch::channel(first);
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_DEPTH);

        info!("[service] collecting every {}ms", interval.as_millis());
        let task = tokio::spawn(run(collector, interval, updates_tx, commands_rx));

        Ok(MonitorHandle {
            updates: updates_rx,
            commands: commands_tx,
            task,
        })
    }
}

pub struct MonitorHandle {
    updates: watch::Receiver<Collection>,
    commands: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn latest(&self) -> Collection {
        self.updates.borrow().clone()
    }

    /// Wait for the next published cycle.
    pub async fn changed(&mut self) -> Result<Collection> {
        self.updates
            .changed()
            .await
            .map_err(|_| anyhow!("monitor task stopped"))?;
        Ok(self.updates.borrow_and_update().clone())
    }

    pub fn subscribe(&self) -> watch::Receiver<Collection> {
        self.updates.clone()
    }

    pub async fn set_sort_key(&self, key: SortKey) -> Result<()> {
        self.send(Command::SetSortKey(key)).await
    }

    pub async fn trigger_refresh(&self) -> Result<()> {
        self.send(Command::Refresh).await
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow!("monitor task stopped"))
    }

    /// Stop the background task and wait for it to exit.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.commands);
        self.task.await.context("monitor task panicked")
    }
}

async fn run(
    mut collector: Collector,
    interval: Duration,
    updates: watch::Sender<Collection>,
    mut commands: mpsc::Receiver<Command>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick fires immediately and the initial cycle already ran
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            command = commands.recv() => match command {
                Some(Command::SetSortKey(key)) => {
                    debug!("[service] sort key -> {key}");
                    collector.set_sort_key(key);
                }
                Some(Command::Refresh) => debug!("[service] refresh requested"),
                None => break,
            },
        }

        let result = match collect_blocking(collector).await {
            Ok((c, result)) => {
                collector = c;
                result
            }
            Err(e) => {
                error!("[service] {e:#}");
                return;
            }
        };

        match result {
            Ok(collection) => {
                if updates.send(collection).is_err() {
                    debug!("[service] no subscribers left");
                    break;
                }
            }
            Err(e) => warn!("[service] collection failed: {e}"),
        }
    }

    info!("[service] stopped after {} cycles", collector.cycles());
}

/// Run one cycle on the blocking pool, since `sysinfo` refreshes block.
/// The collector is handed back along with the cycle's result.
pub async fn collect_blocking(
    mut collector: Collector,
) -> Result<(Collector, Result<Collection, CollectError>)> {
    tokio::task::spawn_blocking(move || {
        let result = collector.collect();
        (collector, result)
    })
    .await
    .context("collection task panicked")
}
