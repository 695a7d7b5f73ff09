use std::sync::Arc;

use {
    anyhow::{Context, Result, bail},
    warden_auth::{Authenticator, Sha224Hasher, SyncOptions},
    warden_config::WardenConfig,
    warden_panel::{HttpPanelClient, PanelClient},
};

fn client(config: &WardenConfig) -> Result<HttpPanelClient> {
    if config.panel.api_host.trim().is_empty() {
        bail!("panel.api_host is not configured");
    }
    HttpPanelClient::from_config(&config.panel, &config.sync).context("building panel client")
}

/// Fetch the user list once and print a summary.
pub async fn fetch(config: &WardenConfig, list: bool) -> Result<()> {
    let users = client(config)?
        .fetch_users()
        .await
        .context("fetching panel users")?;

    println!(
        "{} user(s) for node {} ({})",
        users.len(),
        config.panel.node_id,
        config.panel.node_type
    );
    if list {
        for user in &users {
            println!("  {:>10}  {}", user.id, user.uuid);
        }
    }
    Ok(())
}

/// Seed from the panel and report whether `credential` would authenticate.
///
/// Nothing is recorded, so the final flush on shutdown sends nothing.
pub async fn probe(config: &WardenConfig, credential: &str) -> Result<()> {
    let client = client(config)?;
    let auth = Authenticator::start(
        Arc::new(client),
        Arc::new(Sha224Hasher),
        SyncOptions::from(&config.sync),
    )
    .await?;

    let accepted = auth.auth(credential);
    let users = auth.stats().users;
    auth.shutdown().await;

    if accepted {
        println!("accepted ({users} user(s) loaded)");
        Ok(())
    } else {
        println!("rejected ({users} user(s) loaded)");
        std::process::exit(2);
    }
}
