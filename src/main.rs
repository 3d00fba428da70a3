use actix::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use user_registry::actors::{CoordinatorActor, GetDlqStats, GetUserRegistry, RegistryStores, Shutdown};
use user_registry::config::SagaConfig;
use user_registry::domain::unique_email::Email;
use user_registry::domain::user::UserId;
use user_registry::metrics;
use user_registry::saga::UserRegistryService;

#[actix::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,user_registry=debug"))
        )
        .init();

    tracing::info!("🚀 Starting User Registry - Unique Email Saga");

    // === 1. Load configuration ===
    let config = SagaConfig::from_env()?;
    tracing::info!(?config, "Configuration loaded");

    // === 2. Initialize Prometheus metrics ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    // Start metrics HTTP server in its own thread and actix system
    let server_metrics = metrics.clone();
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let system = actix_web::rt::System::new();
        if let Err(e) = system.block_on(metrics::start_metrics_server(server_metrics, metrics_port)) {
            tracing::error!("Metrics server error: {}", e);
        }
    });

    // === 3. Start Coordinator Actor ===
    let stores = RegistryStores::in_memory();
    let coordinator = CoordinatorActor::new(config.clone(), stores, metrics.clone()).start();
    let registry = coordinator.send(GetUserRegistry).await??;

    // === 4. Walk through the saga ===
    run_demo(&registry, &config).await?;

    tracing::info!("⏳ Running. Press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    let dlq = coordinator.send(GetDlqStats).await?;
    tracing::info!(
        total = dlq.total_messages,
        by_event_type = ?dlq.by_event_type,
        "Dead letter queue at shutdown"
    );

    coordinator.send(Shutdown).await?;
    tracing::info!("🎉 Shutdown complete");

    Ok(())
}

async fn run_demo(registry: &UserRegistryService, config: &SagaConfig) -> anyhow::Result<()> {
    let settle = config.poll_interval() + Duration::from_millis(200);

    // Happy path: reserve, create, router confirms
    let john = UserId::generate();
    let doe = Email::new("doe@acme.com");
    registry.create_user(&john, "John", "US", &doe).await?;
    actix::clock::sleep(settle).await;
    let info = registry.get_email_info(&doe).await?;
    tracing::info!(address = %doe, status = ?info.status(), owner_id = ?info.owner_id(), "✅ User created");

    // Someone else wants the same address
    let jane = UserId::generate();
    match registry.create_user(&jane, "Jane", "FR", &doe).await {
        Err(e) if e.email_rejection().is_some() => {
            tracing::info!(user_id = %jane, error = %e, "Address already taken, as expected");
        }
        other => tracing::warn!(result = ?other.map_err(|e| e.to_string()), "Unexpected outcome"),
    }

    // Failed creation: the reservation stays until the compensation timer fires
    let ghost = UserId::generate();
    let invalid = Email::new("invalid@acme.com");
    if let Err(e) = registry.create_user(&ghost, "", "US", &invalid).await {
        let info = registry.get_email_info(&invalid).await?;
        tracing::info!(
            error = %e,
            status = ?info.status(),
            release_in_ms = config.compensation_delay_ms,
            "User creation failed, reservation awaits compensation"
        );
    }

    // Email change: new address confirmed, old one released
    let new_address = Email::new("john@acme.com");
    registry.change_email(&john, &new_address).await?;
    actix::clock::sleep(settle).await;
    let user = registry.get_user(&john).await?;
    let old = registry.get_email_info(&doe).await?;
    let new = registry.get_email_info(&new_address).await?;
    tracing::info!(
        user_email = %user.email,
        old_status = ?old.status(),
        new_status = ?new.status(),
        "✅ Email changed"
    );

    Ok(())
}
