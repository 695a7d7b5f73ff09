//! Panel synchronization: directory refresh, ledger flush, and the periodic
//! task that runs both.

use std::{sync::Arc, time::Duration};

use {
    tokio::{
        sync::Notify,
        task::JoinHandle,
        time::{Instant, MissedTickBehavior},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use warden_metrics::{counter, gauge, histogram, labels, sync as sync_metrics};

use {
    warden_config::SyncConfig,
    warden_panel::{SharedPanelClient, TrafficReport},
};

use crate::{
    directory::{Directory, Snapshot},
    error::{Error, Result},
    hash::SharedHasher,
    ledger::Ledger,
};

/// Sync loop settings.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Time between refresh + flush cycles.
    pub interval: Duration,
    /// Flush pending usage before installing a snapshot that would drop an
    /// account with unreported traffic.
    pub flush_before_revoke: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            interval: config.interval(),
            flush_before_revoke: config.flush_before_revoke,
        }
    }
}

/// What a successful flush did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    /// Accounts included in the pushed report.
    pub reported: usize,
    /// Credentials dropped because they are no longer in the directory.
    pub dropped: usize,
}

/// Owns the directory and ledger and performs the panel round trips.
pub struct Synchronizer {
    client: SharedPanelClient,
    hasher: SharedHasher,
    directory: Directory,
    ledger: Ledger,
    flush_before_revoke: bool,
}

impl Synchronizer {
    pub fn new(client: SharedPanelClient, hasher: SharedHasher, flush_before_revoke: bool) -> Self {
        Self {
            client,
            hasher,
            directory: Directory::new(),
            ledger: Ledger::new(),
            flush_before_revoke,
        }
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn hasher(&self) -> &SharedHasher {
        &self.hasher
    }

    /// Fetch the user list and install it as the new directory.
    ///
    /// On any failure the installed snapshot is left untouched. Returns the
    /// number of accounts installed.
    pub async fn refresh(&self) -> Result<usize> {
        let users = match self.client.fetch_users().await {
            Ok(users) => users,
            Err(e) => {
                #[cfg(feature = "metrics")]
                counter!(sync_metrics::FETCH_FAILURES_TOTAL).increment(1);
                return Err(Error::fetch(e));
            },
        };

        let next = Snapshot::build(users, self.hasher.as_ref());

        if self.flush_before_revoke && self.ledger.has_pending_outside(&next) {
            debug!("new user list drops accounts with pending usage, flushing first");
            if let Err(e) = self.flush().await {
                warn!(error = %e, "pre-revoke flush failed, usage for removed accounts will be dropped");
            }
        }

        let count = next.len();
        self.directory.replace(next);

        #[cfg(feature = "metrics")]
        gauge!(sync_metrics::DIRECTORY_USERS).set(count as f64);

        info!(users = count, "installed panel user list");
        Ok(count)
    }

    /// Report pending usage to the panel.
    ///
    /// The ledger is detached before any network I/O so `record` never waits
    /// on the panel. If the push fails the entire detached map is merged back.
    pub async fn flush(&self) -> Result<FlushOutcome> {
        let detached = self.ledger.detach();
        if detached.is_empty() {
            debug!("no pending traffic to report");
            return Ok(FlushOutcome::default());
        }

        let snapshot = self.directory.snapshot();
        let mut report = TrafficReport::new();
        let mut dropped = 0;
        for (credential, traffic) in &detached {
            match snapshot.account_id(credential) {
                Some(id) => report.add(id, *traffic),
                None => dropped += 1,
            }
        }
        drop(snapshot);

        if dropped > 0 {
            debug!(dropped, "skipping usage for accounts no longer listed");
        }

        if report.is_empty() {
            return Ok(FlushOutcome {
                reported: 0,
                dropped,
            });
        }

        match self.client.push_traffic(&report).await {
            Ok(()) => {
                let total = report.total();
                #[cfg(feature = "metrics")]
                {
                    counter!(sync_metrics::TRAFFIC_REPORTED_BYTES_TOTAL, labels::DIRECTION => "download")
                        .increment(total.download);
                    counter!(sync_metrics::TRAFFIC_REPORTED_BYTES_TOTAL, labels::DIRECTION => "upload")
                        .increment(total.upload);
                }
                info!(
                    accounts = report.len(),
                    download = total.download,
                    upload = total.upload,
                    "pushed traffic to panel"
                );
                Ok(FlushOutcome {
                    reported: report.len(),
                    dropped,
                })
            },
            Err(e) => {
                #[cfg(feature = "metrics")]
                counter!(sync_metrics::PUSH_FAILURES_TOTAL).increment(1);
                self.ledger.restore(detached);
                Err(Error::push(e))
            },
        }
    }

    /// One sync cycle: refresh first so the flush resolves against the
    /// freshest account set.
    pub async fn cycle(&self) {
        #[cfg(feature = "metrics")]
        let started = std::time::Instant::now();

        if let Err(e) = self.refresh().await {
            warn!(error = %e, "keeping previous user list");
        }
        if let Err(e) = self.flush().await {
            warn!(error = %e, "traffic kept for next cycle");
        }

        #[cfg(feature = "metrics")]
        histogram!(sync_metrics::CYCLE_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
    }
}

/// Background task running [`Synchronizer::cycle`] every interval.
///
/// Stopping (or dropping) the loop cancels it; the task then performs one
/// final flush and exits.
pub struct SyncLoop {
    cancel: CancellationToken,
    wake: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl SyncLoop {
    /// Spawn the loop on the current tokio runtime. The first cycle runs one
    /// interval from now.
    pub fn spawn(sync: Arc<Synchronizer>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let wake = Arc::new(Notify::new());
        let handle = tokio::spawn(run(sync, interval, cancel.clone(), Arc::clone(&wake)));
        Self {
            cancel,
            wake,
            handle: Some(handle),
        }
    }

    /// Run a cycle now instead of waiting for the next tick.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel the loop and wait for its final flush to finish.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            warn!(error = %e, "panel sync task ended abnormally");
        }
    }
}

impl Drop for SyncLoop {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    sync: Arc<Synchronizer>,
    interval: Duration,
    cancel: CancellationToken,
    wake: Arc<Notify>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_secs = interval.as_secs(), "panel sync loop started");

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {},
            () = wake.notified() => {
                debug!("sync loop woken on demand");
                ticker.reset();
            },
        }
        sync.cycle().await;
    }

    match sync.flush().await {
        Ok(outcome) => debug!(reported = outcome.reported, "final traffic flush done"),
        Err(e) => warn!(error = %e, "final traffic flush failed, usage lost"),
    }
    info!("panel sync loop stopped");
}
