use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use hausbus_adapter_http_axum::router;
use hausbus_adapter_http_axum::state::AppState;
use hausbus_adapter_i2c_virtual::VirtualI2cBus;
use hausbus_app::clock::Clock;
use hausbus_app::event_bus::InProcessEventBus;
use hausbus_app::ports::EventPublisher;
use hausbus_app::registry::ComponentRegistry;
use hausbus_app::scheduler::{Scheduler, WorkerPool};
use hausbus_domain::event::{Event, EventKind};
use hausbusd::config::Config;
use hausbusd::home::Home;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Engine
    let clock = Clock::starting_now(config.utc_offset());
    let event_bus = InProcessEventBus::new(256);
    let publisher: Arc<dyn EventPublisher> = Arc::new(event_bus.clone());
    let workers = WorkerPool::spawn(config.scheduler.workers);
    let scheduler = Scheduler::new(clock.clone(), Arc::new(workers), Some(Arc::clone(&publisher)));
    let registry = ComponentRegistry::new(clock.clone(), Some(publisher));

    // Hardware
    let bus = Arc::new(VirtualI2cBus::new());
    let home = Home::install(&config, &scheduler, &registry, &bus).context("installing home")?;

    tokio::spawn(log_events(event_bus.subscribe()));
    let ticker = {
        let clock = clock.clone();
        let period = config.tick_interval();
        tokio::spawn(async move { clock.run(period).await })
    };

    // HTTP
    let app = router::build(AppState::new(registry, scheduler, event_bus));
    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "hausbusd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    ticker.abort();
    drop(home);
    tracing::info!("hausbusd stopped");
    Ok(())
}

async fn log_events(mut events: broadcast::Receiver<Event>) {
    loop {
        match events.recv().await {
            Ok(Event {
                kind: EventKind::ScheduleFaulted { name, error },
                ..
            }) => tracing::warn!(schedule = %name, %error, "schedule faulted"),
            Ok(event) => tracing::debug!(?event, "event"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event logger lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "listening for shutdown signal failed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
