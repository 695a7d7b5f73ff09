//! Configuration validation.
//!
//! Checks a parsed [`WardenConfig`] for values that would make the panel
//! unreachable or the sync loop misbehave, and flags insecure settings.

use crate::schema::WardenConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "missing", "invalid", "security", "timing"
    pub category: &'static str,
    /// Dotted path, e.g. "panel.api_host"
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.severity, self.category, self.path, self.message
        )
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(
        &mut self,
        severity: Severity,
        category: &'static str,
        path: &str,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(Diagnostic {
            severity,
            category,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Validate a parsed configuration.
#[must_use]
pub fn validate(config: &WardenConfig) -> ValidationResult {
    let mut result = ValidationResult::default();
    check_panel(config, &mut result);
    check_sync(config, &mut result);
    result
}

fn check_panel(config: &WardenConfig, result: &mut ValidationResult) {
    use secrecy::ExposeSecret;

    let panel = &config.panel;
    if !panel.enabled {
        result.push(
            Severity::Info,
            "security",
            "panel.enabled",
            "panel authentication is disabled; every credential will be accepted",
        );
        return;
    }

    if panel.api_host.trim().is_empty() {
        result.push(
            Severity::Error,
            "missing",
            "panel.api_host",
            "api_host is required when the panel is enabled",
        );
    } else {
        match url::Url::parse(panel.base_url()) {
            Ok(url) if url.scheme() == "http" => result.push(
                Severity::Warning,
                "security",
                "panel.api_host",
                "api_host uses plain http; the node token is sent in clear text",
            ),
            Ok(url) if url.scheme() != "https" => result.push(
                Severity::Error,
                "invalid",
                "panel.api_host",
                format!("unsupported scheme '{}'", url.scheme()),
            ),
            Ok(_) => {},
            Err(e) => result.push(
                Severity::Error,
                "invalid",
                "panel.api_host",
                format!("not a valid URL: {e}"),
            ),
        }
    }

    if panel.api_key.expose_secret().trim().is_empty() {
        result.push(
            Severity::Error,
            "missing",
            "panel.api_key",
            "api_key is required when the panel is enabled",
        );
    }

    if panel.node_type.trim().is_empty() {
        result.push(
            Severity::Error,
            "missing",
            "panel.node_type",
            "node_type must not be empty",
        );
    }
}

fn check_sync(config: &WardenConfig, result: &mut ValidationResult) {
    let sync = &config.sync;
    for (path, value) in [
        ("sync.interval_secs", sync.interval_secs),
        ("sync.connect_timeout_secs", sync.connect_timeout_secs),
        ("sync.request_timeout_secs", sync.request_timeout_secs),
    ] {
        if value == 0 {
            result.push(Severity::Error, "invalid", path, "must be greater than zero");
        }
    }

    if sync.interval_secs > 0 && sync.request_timeout_secs >= sync.interval_secs {
        result.push(
            Severity::Warning,
            "timing",
            "sync.request_timeout_secs",
            "request timeout is not shorter than the sync interval; cycles may overlap",
        );
    }
}
