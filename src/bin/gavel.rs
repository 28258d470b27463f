//! Demo binary — runs a scripted auction session against the in-memory
//! ledger so operators can smoke-test the engine and watch its event
//! stream. Timer seconds are shortened so a full round plays out quickly.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gavel::config::EngineConfig;
use gavel::domain::{Player, Role};
use gavel::engine::AuctionEngine;
use gavel::ledger::{Directory, InMemoryLedger, LedgerGateway};

fn init_logging(config: &EngineConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},gavel=debug", config.logging.level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = EngineConfig::load("gavel.toml")?;
    init_logging(&config);
    config.timer.bid_window_secs = config.timer.bid_window_secs.min(3);

    let members = ["alice", "bob", "carol"];
    let ledger = InMemoryLedger::new();
    for member in members {
        ledger
            .add_member(
                member,
                Decimal::from(500),
                HashMap::from([
                    (Role::Goalkeeper, 3),
                    (Role::Defender, 8),
                    (Role::Midfielder, 8),
                    (Role::Forward, 6),
                ]),
            )
            .await;
    }

    let gateway: Arc<dyn LedgerGateway> = Arc::new(ledger.clone());
    let directory: Arc<dyn Directory> = Arc::new(ledger);
    let engine = AuctionEngine::new(
        config,
        "demo-league",
        members.iter().map(|m| m.to_string()).collect(),
        gateway,
        directory,
    );
    let handle = engine.handle();
    let mut events = engine.subscribe();

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let engine_task = tokio::spawn(engine.run(shutdown_rx));

    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!(?event, "engine event");
        }
    });

    // Scripted round: alice nominates, bob and carol trade raises, the
    // countdown settles the auction, everyone acknowledges.
    handle.start().await?;
    for member in members {
        handle.heartbeat(member);
    }

    handle
        .nominate("alice", Player::new("pl-9", "Osimhen", Role::Forward))
        .await?;
    handle.confirm_nomination("alice").await?;
    handle.mark_ready("bob").await?;
    handle.mark_ready("carol").await?;

    handle.place_bid("bob", Decimal::from(5)).await?;
    if let Err(e) = handle.place_bid("carol", Decimal::from(4)).await {
        warn!(error = %e, "carol lost the race as expected");
    }
    handle.simulate_bot_bid("carol").await?;

    // Let the countdown expire and settle.
    let snapshot = handle.snapshot().await?;
    let wait = snapshot.timer_remaining_secs.unwrap_or(3) + 1;
    tokio::time::sleep(tokio::time::Duration::from_secs(wait)).await;

    for member in members {
        if let Err(e) = handle.acknowledge(member).await {
            warn!(member, error = %e, "acknowledge skipped");
        }
    }

    let snapshot = handle.snapshot().await?;
    info!(
        state = %snapshot.session.state,
        turn = ?snapshot.session.current_member(),
        "round complete"
    );
    println!("{}", serde_json::to_string_pretty(&snapshot.session)?);

    let _ = shutdown_tx.send(());
    let _ = engine_task.await;
    printer.abort();
    Ok(())
}
