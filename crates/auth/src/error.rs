#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The panel is enabled but the seed fetch failed.
    #[error("failed to initialize panel authentication: {source}")]
    Initialization {
        #[source]
        source: warden_panel::Error,
    },
    /// A directory refresh failed. The previous snapshot stays installed.
    #[error("failed to fetch panel users: {source}")]
    Fetch {
        #[source]
        source: warden_panel::Error,
    },
    /// A traffic push failed. The detached usage was merged back.
    #[error("failed to push traffic to panel: {source}")]
    Push {
        #[source]
        source: warden_panel::Error,
    },
}

impl Error {
    #[must_use]
    pub fn initialization(source: warden_panel::Error) -> Self {
        Self::Initialization { source }
    }

    #[must_use]
    pub fn fetch(source: warden_panel::Error) -> Self {
        Self::Fetch { source }
    }

    #[must_use]
    pub fn push(source: warden_panel::Error) -> Self {
        Self::Push { source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
