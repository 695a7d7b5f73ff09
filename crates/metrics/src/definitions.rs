//! Metric name and label definitions.
//!
//! Every metric emitted by warden is named here so dashboards have one place
//! to look.

/// Credential checks and usage recording
pub mod auth {
    /// Authentication attempts, labelled by `result` (accepted/rejected)
    pub const ATTEMPTS_TOTAL: &str = "warden_auth_attempts_total";
    /// `record` calls rejected because the credential is unknown
    pub const RECORD_REJECTED_TOTAL: &str = "warden_record_rejected_total";
}

/// Panel synchronization
pub mod sync {
    /// Number of accounts in the installed directory snapshot
    pub const DIRECTORY_USERS: &str = "warden_directory_users";
    /// Failed user list fetches
    pub const FETCH_FAILURES_TOTAL: &str = "warden_sync_fetch_failures_total";
    /// Failed traffic pushes
    pub const PUSH_FAILURES_TOTAL: &str = "warden_sync_push_failures_total";
    /// Bytes acknowledged by the panel, labelled by `direction` (download/upload)
    pub const TRAFFIC_REPORTED_BYTES_TOTAL: &str = "warden_traffic_reported_bytes_total";
    /// Wall time of one refresh + flush cycle
    pub const CYCLE_DURATION_SECONDS: &str = "warden_sync_cycle_duration_seconds";
}

/// Common label keys
pub mod labels {
    pub const RESULT: &str = "result";
    pub const DIRECTION: &str = "direction";
}
