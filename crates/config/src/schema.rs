/// Config schema types (panel connection, sync cadence, metrics).
use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub panel: PanelConfig,
    pub sync: SyncConfig,
    pub metrics: MetricsConfig,
}

/// Connection to the account panel.
///
/// When `enabled` is false the authenticator runs in passthrough mode and
/// every credential is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub enabled: bool,
    /// Base URL of the panel, e.g. `https://panel.example.com`.
    pub api_host: String,
    /// Node token issued by the panel, sent as the `token` query parameter.
    #[serde(serialize_with = "serialize_secret")]
    pub api_key: Secret<String>,
    /// Node identifier assigned by the panel.
    pub node_id: u32,
    /// Node protocol reported to the panel. Defaults to "trojan".
    pub node_type: String,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_host: String::new(),
            api_key: Secret::new(String::new()),
            node_id: 0,
            node_type: "trojan".into(),
        }
    }
}

impl PanelConfig {
    /// Panel URL with any trailing slash removed.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.api_host.trim_end_matches('/')
    }
}

/// Background synchronization with the panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between refresh + flush cycles. Defaults to 180.
    pub interval_secs: u64,
    /// TCP connect timeout for panel requests. Defaults to 10.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout for panel requests. Defaults to 10.
    pub request_timeout_secs: u64,
    /// Flush pending usage before installing a user list that drops accounts
    /// with unreported traffic.
    pub flush_before_revoke: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: 180,
            connect_timeout_secs: 10,
            request_timeout_secs: 10,
            flush_before_revoke: false,
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_panel_contract() {
        let cfg = WardenConfig::default();
        assert!(!cfg.panel.enabled);
        assert_eq!(cfg.panel.node_type, "trojan");
        assert_eq!(cfg.sync.interval_secs, 180);
        assert_eq!(cfg.sync.connect_timeout_secs, 10);
        assert_eq!(cfg.sync.request_timeout_secs, 10);
        assert!(!cfg.sync.flush_before_revoke);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: WardenConfig = toml::from_str(
            r#"
            [panel]
            enabled = true
            api_host = "https://panel.example/"
            api_key = "node-token"
            node_id = 3
            "#,
        )
        .unwrap();
        assert!(cfg.panel.enabled);
        assert_eq!(cfg.panel.base_url(), "https://panel.example");
        assert_eq!(cfg.panel.api_key.expose_secret(), "node-token");
        assert_eq!(cfg.panel.node_id, 3);
        assert_eq!(cfg.panel.node_type, "trojan");
        assert_eq!(cfg.sync.interval_secs, 180);
    }

    #[test]
    fn debug_redacts_api_key() {
        let cfg = PanelConfig {
            api_key: Secret::new("very-secret-token".into()),
            ..Default::default()
        };
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("very-secret-token"));
    }

    #[test]
    fn serializes_api_key_for_round_trip() {
        let cfg = PanelConfig {
            api_key: Secret::new("k".into()),
            ..Default::default()
        };
        let value = serde_json::to_value(&cfg).unwrap();
        assert_eq!(value["api_key"], "k");
    }
}
