//! Two devices, one account.
//!
//! A laptop signs in, then a phone signs in as the same user. The laptop's
//! monitor notices on its next check and reports `session-replaced`.
//!
//! ```text
//! RUST_LOG=debug cargo run -p session-takeover [config.json]
//! ```

use std::time::Duration;

use fleetdesk::prelude::*;
use tracing_subscriber::EnvFilter;

const EMAIL: &str = "dispatch@fleet.io";
const PASSWORD: &str = "pallet-jack";

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

/// The shared "backend": one user table and one credential service.
fn backend() -> (MemoryRecordStore, MemoryCredentialVerifier) {
    let store = MemoryRecordStore::new();
    let verifier = MemoryCredentialVerifier::new();
    let user = UserId::random();
    store.insert_user(UserRecord::new(user, EMAIL, "Dana Okafor", Role::Dispatcher));
    verifier.add_account(EMAIL, PASSWORD, user);
    (store, verifier)
}

fn load_config() -> Result<FleetdeskConfig, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => Ok(FleetdeskConfig::from_json(&std::fs::read_to_string(path)?)?),
        // Short interval so the takeover shows up quickly.
        None => Ok(FleetdeskConfig {
            monitor: MonitorConfig {
                interval_secs: 2,
                ..MonitorConfig::default()
            },
            ..FleetdeskConfig::default()
        }),
    }
}

// ---------------------------------------------------------------------------
// Walkthrough
// ---------------------------------------------------------------------------

/// Runs the takeover and returns the event the laptop received.
async fn walkthrough(config: FleetdeskConfig) -> Result<SessionEvent, Box<dyn std::error::Error>> {
    let (store, verifier) = backend();
    let interval = Duration::from_secs(config.monitor.interval_secs);

    let laptop = SessionClient::builder(store.clone(), verifier.clone())
        .config(config.clone())
        .build();
    let phone = SessionClient::builder(store, verifier).config(config).build();
    let mut laptop_events = laptop.subscribe();

    let profile = laptop.sign_in(EMAIL, PASSWORD).await?;
    tracing::info!(device = "laptop", user = %profile.full_name, "signed in");

    tokio::time::sleep(interval / 2).await;

    phone.sign_in(EMAIL, PASSWORD).await?;
    tracing::info!(device = "phone", "signed in, laptop session is now stale");

    let event = tokio::time::timeout(interval * 2, laptop_events.recv()).await??;
    tracing::info!(device = "laptop", %event, "received session event");

    match laptop.get_session().await {
        Ok(None) => tracing::info!(device = "laptop", "no local session left"),
        Ok(Some(_)) => tracing::warn!(device = "laptop", "laptop still thinks it is signed in"),
        Err(e) => tracing::info!(device = "laptop", error = %e, "session check"),
    }
    if let Some(profile) = phone.get_session().await? {
        tracing::info!(device = "phone", user = %profile.full_name, "still signed in");
    }

    match phone.sign_out().await {
        SignOutOutcome::Complete => tracing::info!(device = "phone", "signed out"),
        other => tracing::warn!(device = "phone", outcome = ?other, "sign-out incomplete"),
    }

    Ok(event)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    let event = walkthrough(config).await?;
    println!("laptop: {event}");
    Ok(())
}
