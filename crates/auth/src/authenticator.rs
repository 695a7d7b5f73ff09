//! The `auth`/`record` facade handed to connection handlers.

use std::sync::Arc;

use tracing::{info, trace};

#[cfg(feature = "metrics")]
use warden_metrics::{auth as auth_metrics, counter, labels};

use {
    warden_config::{PanelConfig, SyncConfig},
    warden_panel::{HttpPanelClient, SharedPanelClient, Traffic},
};

use crate::{
    error::{Error, Result},
    hash::{SharedHasher, Sha224Hasher},
    sync::{SyncLoop, SyncOptions, Synchronizer},
};

/// Point-in-time counts for operators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthStats {
    /// Accounts in the installed directory.
    pub users: usize,
    /// Credentials with unreported usage.
    pub pending_entries: usize,
}

/// Credential checks and usage accounting against the panel.
///
/// `Disabled` accepts every credential and records nothing. `Active` answers
/// from the last successfully fetched user list and reports usage from a
/// background [`SyncLoop`].
pub enum Authenticator {
    Disabled,
    Active(Active),
}

/// State of an enabled authenticator.
pub struct Active {
    sync: Arc<Synchronizer>,
    sync_loop: SyncLoop,
}

impl Authenticator {
    /// Build from configuration, using the HTTP panel client.
    ///
    /// When the panel is enabled this performs the seed fetch and fails with
    /// [`Error::Initialization`] if it does not succeed.
    pub async fn from_config(panel: &PanelConfig, sync: &SyncConfig) -> Result<Self> {
        if !panel.enabled {
            info!("panel authentication disabled, accepting all credentials");
            return Ok(Self::Disabled);
        }
        let client = HttpPanelClient::from_config(panel, sync).map_err(Error::initialization)?;
        info!(
            host = panel.base_url(),
            node_id = panel.node_id,
            node_type = %panel.node_type,
            "starting panel authentication"
        );
        Self::start(Arc::new(client), Arc::new(Sha224Hasher), SyncOptions::from(sync)).await
    }

    /// Seed the directory from `client` and spawn the sync loop.
    pub async fn start(
        client: SharedPanelClient,
        hasher: SharedHasher,
        options: SyncOptions,
    ) -> Result<Self> {
        let sync = Arc::new(Synchronizer::new(
            client,
            hasher,
            options.flush_before_revoke,
        ));

        sync.refresh().await.map_err(|e| match e {
            Error::Fetch { source } => Error::initialization(source),
            other => other,
        })?;

        let sync_loop = SyncLoop::spawn(Arc::clone(&sync), options.interval);
        Ok(Self::Active(Active { sync, sync_loop }))
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    /// Whether `credential` belongs to an account in the current directory.
    pub fn auth(&self, credential: &str) -> bool {
        match self {
            Self::Disabled => true,
            Self::Active(active) => {
                let digest = active.sync.hasher().digest(credential);
                active.auth_digest(&digest)
            },
        }
    }

    /// Like [`auth`](Self::auth) for clients that present the credential's
    /// digest instead of the credential (the trojan handshake does).
    pub fn auth_digest(&self, digest: &str) -> bool {
        match self {
            Self::Disabled => true,
            Self::Active(active) => active.auth_digest(digest),
        }
    }

    /// Add usage for `credential`.
    ///
    /// Returns false, recording nothing, if the credential is not in the
    /// current directory. Always true when disabled.
    pub fn record(&self, credential: &str, download: u64, upload: u64) -> bool {
        match self {
            Self::Disabled => true,
            Self::Active(active) => {
                let known = active.sync.directory().snapshot().contains(credential);
                active.record_known(known.then_some(credential), download, upload)
            },
        }
    }

    /// Like [`record`](Self::record), resolving the credential from its digest.
    pub fn record_digest(&self, digest: &str, download: u64, upload: u64) -> bool {
        match self {
            Self::Disabled => true,
            Self::Active(active) => {
                let snapshot = active.sync.directory().snapshot();
                let credential = snapshot.account_for_digest(digest).map(|(c, _)| c);
                active.record_known(credential, download, upload)
            },
        }
    }

    pub fn stats(&self) -> AuthStats {
        match self {
            Self::Disabled => AuthStats::default(),
            Self::Active(active) => AuthStats {
                users: active.sync.directory().len(),
                pending_entries: active.sync.ledger().len(),
            },
        }
    }

    /// Ask the sync loop to refresh and flush now. No-op when disabled.
    pub fn request_sync(&self) {
        if let Self::Active(active) = self {
            active.sync_loop.wake();
        }
    }

    /// Stop the sync loop after one final flush attempt.
    pub async fn shutdown(self) {
        if let Self::Active(active) = self {
            active.sync_loop.stop().await;
        }
    }
}

impl Active {
    fn auth_digest(&self, digest: &str) -> bool {
        let accepted = self
            .sync
            .directory()
            .snapshot()
            .account_for_digest(digest)
            .is_some();

        #[cfg(feature = "metrics")]
        counter!(
            auth_metrics::ATTEMPTS_TOTAL,
            labels::RESULT => if accepted { "accepted" } else { "rejected" }
        )
        .increment(1);

        trace!(accepted, "credential check");
        accepted
    }

    fn record_known(&self, credential: Option<&str>, download: u64, upload: u64) -> bool {
        let Some(credential) = credential else {
            #[cfg(feature = "metrics")]
            counter!(auth_metrics::RECORD_REJECTED_TOTAL).increment(1);
            trace!("usage for unknown credential ignored");
            return false;
        };
        self.sync
            .ledger()
            .add(credential, Traffic::new(download, upload));
        true
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{hash::CredentialHasher, sync::tests::FakePanel},
        std::time::Duration,
    };

    async fn active(panel: &Arc<FakePanel>) -> Authenticator {
        Authenticator::start(
            Arc::clone(panel) as SharedPanelClient,
            Arc::new(Sha224Hasher),
            SyncOptions {
                interval: Duration::from_secs(180),
                flush_before_revoke: false,
            },
        )
        .await
        .unwrap()
    }

    fn sync_of(auth: &Authenticator) -> &Arc<Synchronizer> {
        match auth {
            Authenticator::Active(active) => &active.sync,
            Authenticator::Disabled => panic!("expected active authenticator"),
        }
    }

    #[tokio::test]
    async fn disabled_accepts_everything() {
        let auth = Authenticator::from_config(&PanelConfig::default(), &SyncConfig::default())
            .await
            .unwrap();
        assert!(!auth.is_enabled());
        assert!(auth.auth("anything"));
        assert!(auth.auth_digest("anything"));
        assert!(auth.record("anything", 1, 1));
        assert_eq!(auth.stats(), AuthStats::default());
        auth.shutdown().await;
    }

    #[tokio::test]
    async fn seed_failure_is_initialization_error() {
        let panel = FakePanel::with_users(&[]);
        panel.fail_next_fetch();
        let result = Authenticator::start(
            Arc::clone(&panel) as SharedPanelClient,
            Arc::new(Sha224Hasher),
            SyncOptions::default(),
        )
        .await;
        assert!(matches!(result, Err(Error::Initialization { .. })));
    }

    #[tokio::test]
    async fn auth_requires_listed_credential() {
        let panel = FakePanel::with_users(&[("abc", 7)]);
        let auth = active(&panel).await;

        assert!(auth.is_enabled());
        assert!(auth.auth("abc"));
        assert!(!auth.auth("abd"));
        assert!(!auth.auth(""));
        assert!(auth.auth_digest(&Sha224Hasher.digest("abc")));
        // The raw credential is not a valid digest.
        assert!(!auth.auth_digest("abc"));
        auth.shutdown().await;
    }

    #[tokio::test]
    async fn revocation_applies_on_next_call_after_refresh() {
        let panel = FakePanel::with_users(&[("abc", 7)]);
        let auth = active(&panel).await;
        assert!(auth.auth("abc"));

        panel.set_users(&[("def", 8)]);
        sync_of(&auth).refresh().await.unwrap();

        assert!(!auth.auth("abc"));
        assert!(auth.auth("def"));
        assert!(!auth.record("abc", 1, 1));
        auth.shutdown().await;
    }

    #[tokio::test]
    async fn record_ignores_unknown_credentials() {
        let panel = FakePanel::with_users(&[("abc", 7)]);
        let auth = active(&panel).await;

        assert!(!auth.record("stranger", 100, 100));
        assert!(!auth.record_digest("not-a-digest", 100, 100));
        assert_eq!(auth.stats().pending_entries, 0);

        assert!(auth.record("abc", 100, 50));
        assert!(auth.record_digest(&Sha224Hasher.digest("abc"), 1, 1));
        assert_eq!(auth.stats(), AuthStats {
            users: 1,
            pending_entries: 1
        });
        assert_eq!(
            sync_of(&auth).ledger().get("abc"),
            Some(Traffic::new(101, 51))
        );
        auth.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_records_sum_exactly() {
        let panel = FakePanel::with_users(&[("abc", 7)]);
        let auth = Arc::new(active(&panel).await);

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let auth = Arc::clone(&auth);
                tokio::spawn(async move {
                    for _ in 0..100 {
                        assert!(auth.record("abc", 10, 3));
                    }
                })
            })
            .collect();
        for t in tasks {
            t.await.unwrap();
        }

        assert_eq!(
            sync_of(&auth).ledger().get("abc"),
            Some(Traffic::new(64 * 100 * 10, 64 * 100 * 3))
        );
    }

    #[tokio::test]
    async fn shutdown_flushes_pending_usage() {
        let panel = FakePanel::with_users(&[("abc", 7)]);
        let auth = active(&panel).await;
        auth.record("abc", 100, 50);

        auth.shutdown().await;

        let pushed = panel.pushed();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].get(7), Some(Traffic::new(100, 50)));
    }

    #[tokio::test(start_paused = true)]
    async fn request_sync_refreshes_and_flushes_before_the_interval() {
        let panel = FakePanel::with_users(&[("abc", 7)]);
        let auth = active(&panel).await;
        assert_eq!(panel.fetch_count(), 1);

        panel.set_users(&[("abc", 7), ("def", 8)]);
        auth.record("abc", 30, 20);
        auth.request_sync();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(panel.fetch_count(), 2);
        assert!(auth.auth("def"));
        assert_eq!(panel.pushed().len(), 1);
        assert_eq!(panel.pushed()[0].get(7), Some(Traffic::new(30, 20)));
        assert_eq!(auth.stats(), AuthStats {
            users: 2,
            pending_entries: 0
        });
        auth.shutdown().await;
    }

    #[tokio::test]
    async fn request_sync_is_a_no_op_when_disabled() {
        let auth = Authenticator::Disabled;
        auth.request_sync();
        assert_eq!(auth.stats(), AuthStats::default());
    }

    #[tokio::test]
    async fn custom_hasher_drives_digest_lookup() {
        struct Reverse;
        impl CredentialHasher for Reverse {
            fn digest(&self, credential: &str) -> String {
                credential.chars().rev().collect()
            }
        }

        let panel = FakePanel::with_users(&[("abc", 7)]);
        let auth = Authenticator::start(
            Arc::clone(&panel) as SharedPanelClient,
            Arc::new(Reverse),
            SyncOptions::default(),
        )
        .await
        .unwrap();

        assert!(auth.auth("abc"));
        assert!(auth.auth_digest("cba"));
        assert!(!auth.auth_digest(&Sha224Hasher.digest("abc")));
        auth.shutdown().await;
    }
}
