use warden_common::FromMessage;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure or timeout. Built only through [`Error::transport`],
    /// which strips the request URL because it carries the node token.
    #[error(transparent)]
    Reqwest(reqwest::Error),
    #[error("malformed panel response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("panel returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    /// Wrap a reqwest error without the URL it was raised for.
    #[must_use]
    pub fn transport(err: reqwest::Error) -> Self {
        Self::Reqwest(err.without_url())
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Reqwest(e) if e.is_timeout())
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

warden_common::impl_context!();
