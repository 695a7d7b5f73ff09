//! Fetch/push transport for the panel's UniProxy node API.

use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    reqwest::Client,
    secrecy::{ExposeSecret, Secret},
    tracing::debug,
};

use warden_config::{PanelConfig, SyncConfig};

use crate::{
    error::{Context, Error, Result},
    types::{PanelUser, TrafficReport, UserList},
};

const USER_PATH: &str = "/api/v1/server/UniProxy/user";
const PUSH_PATH: &str = "/api/v1/server/UniProxy/push";

/// Longest slice of an error body kept in [`Error::Status`].
const MAX_ERROR_BODY: usize = 256;

/// Request/response access to the panel.
///
/// `HttpPanelClient` implements this over HTTP. Tests substitute scripted
/// in-memory clients.
#[async_trait]
pub trait PanelClient: Send + Sync {
    /// Fetch the complete list of accounts allowed on this node.
    ///
    /// Fails as a whole if any entry is malformed.
    async fn fetch_users(&self) -> Result<Vec<PanelUser>>;

    /// Report accumulated usage. Success means the panel accepted the report.
    async fn push_traffic(&self, report: &TrafficReport) -> Result<()>;
}

pub type SharedPanelClient = Arc<dyn PanelClient>;

/// reqwest-backed [`PanelClient`].
pub struct HttpPanelClient {
    client: Client,
    base_url: String,
    token: Secret<String>,
    node_id: u32,
    node_type: String,
}

impl HttpPanelClient {
    /// Build a client with the timeouts from `sync`.
    pub fn from_config(panel: &PanelConfig, sync: &SyncConfig) -> Result<Self> {
        Self::new(
            panel.base_url(),
            panel.api_key.clone(),
            panel.node_id,
            &panel.node_type,
            sync.connect_timeout(),
            sync.request_timeout(),
        )
    }

    pub fn new(
        base_url: &str,
        token: Secret<String>,
        node_id: u32,
        node_type: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .context("failed to build HTTP client for panel")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            node_id,
            node_type: node_type.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn node_query(&self) -> [(&'static str, String); 3] {
        [
            ("token", self.token.expose_secret().clone()),
            ("node_id", self.node_id.to_string()),
            ("node_type", self.node_type.clone()),
        ]
    }
}

#[async_trait]
impl PanelClient for HttpPanelClient {
    async fn fetch_users(&self) -> Result<Vec<PanelUser>> {
        let resp = self
            .client
            .get(self.url(USER_PATH))
            .query(&self.node_query())
            .send()
            .await
            .map_err(Error::transport)?;

        let body = read_success_body(resp).await?;
        let list: UserList = serde_json::from_str(&body)?;
        debug!(users = list.users.len(), "parsed panel user list");
        Ok(list.users)
    }

    async fn push_traffic(&self, report: &TrafficReport) -> Result<()> {
        let body = serde_json::to_vec(report)?;
        let resp = self
            .client
            .post(self.url(PUSH_PATH))
            .query(&self.node_query())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(Error::transport)?;

        read_success_body(resp).await?;
        debug!(accounts = report.len(), "panel accepted traffic report");
        Ok(())
    }
}

async fn read_success_body(resp: reqwest::Response) -> Result<String> {
    let status = resp.status();
    let body = resp.text().await.map_err(Error::transport)?;
    if !status.is_success() {
        let mut body = body;
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        return Err(Error::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}
