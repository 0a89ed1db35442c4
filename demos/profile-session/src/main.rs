//! Profile Session Demo
//!
//! Walks the full client flow against the in-memory accessor: discover
//! wallets, log in with the dev wallet, let the automatic profile load run,
//! create the profile, update it, read it back, and log out.
//!
//! Run with `RUST_LOG=debug` for the full status-push narration.

use anyhow::{Context, Result};
use aspen_access::{
    AccessConfig, DevWallet, InMemoryAccessor, SignerSlot, StaticDiscovery, WalletDiscovery,
};
use aspen_orchestrator::ProfileOrchestrator;
use aspen_session::IdentitySession;
use aspen_store::ProfileStore;
use aspen_types::ProfileDraft;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let config = AccessConfig::default();
    info!(network = %config.network, app = %config.app_title, "starting profile session demo");

    let signer = SignerSlot::default();
    let wallet = DevWallet::new(signer.clone());
    let accessor = InMemoryAccessor::new(signer);
    let discovery = StaticDiscovery::new(vec![DevWallet::service()]);

    let session = Arc::new(IdentitySession::attach(Arc::new(wallet)).await);
    let store = Arc::new(ProfileStore::new(Arc::new(accessor.clone())));
    let orchestrator = ProfileOrchestrator::start(
        session,
        store,
        Arc::new(accessor.clone()),
        Arc::new(accessor),
        &config,
    )
    .await;

    let services = discovery.subscribe().borrow().clone();
    let service = services.first().context("no wallet services discovered")?;
    info!(service = %service.display_name, "logging in");
    orchestrator.log_in(service).await?;

    tokio::time::sleep(Duration::from_millis(50)).await;
    let user = orchestrator
        .current_user()
        .context("wallet never produced an identity")?;
    info!(
        account = %user.address,
        profile_exists = *orchestrator.profile_exists().borrow(),
        "session established"
    );

    info!("creating profile");
    orchestrator.create_profile().await?;
    let mut status = orchestrator.transaction_status();
    status.wait_for(|s| s.is_terminal()).await?;
    info!(status = %*status.borrow(), "creation settled");

    let mut exists = orchestrator.profile_exists();
    exists.wait_for(|e| *e).await?;

    info!("updating profile");
    orchestrator
        .update_profile(ProfileDraft {
            name: "Aspen Dev".to_string(),
            color: "#00ef8b".to_string(),
            info: "hello from the demo".to_string(),
        })
        .await?;
    let mut status = orchestrator.transaction_status();
    status.wait_for(|s| s.is_terminal()).await?;
    info!(status = %*status.borrow(), "update settled");

    let mut profile_rx = orchestrator.user_profile();
    profile_rx
        .wait_for(|p| p.as_ref().map(|p| p.name == "Aspen Dev").unwrap_or(false))
        .await?;
    let profile = profile_rx
        .borrow()
        .clone()
        .context("profile missing after update sealed")?;
    info!(
        name = %profile.name,
        color = %profile.color,
        info = %profile.info,
        "profile on ledger"
    );

    orchestrator.log_out().await?;
    info!("logged out, profile scope cleared");
    Ok(())
}
