use dotenvy::dotenv;
use fintrack::{
    config::{database, settings},
    core::{
        clock::{SharedClock, SystemClock},
        jobs::JobWorker,
        sweep,
    },
    errors::Result,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = settings::load_app_configuration()
        .inspect_err(|e| error!("Failed to load configuration: {e}"))?;
    info!("Configuration loaded.");

    // 4. Connect to the database and make sure the schema exists
    let db = database::create_connection(&app_config.database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {e}"))?;

    // 5. Start the daily sweep scheduler and the job worker
    let db = Arc::new(db);
    let clock: SharedClock = Arc::new(SystemClock);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = tokio::spawn(sweep::run_scheduler(
        Arc::clone(&db),
        Arc::clone(&clock),
        app_config.scheduler.clone(),
        shutdown_rx.clone(),
    ));
    let worker = tokio::spawn(
        JobWorker::new(db, Arc::clone(&clock), app_config.worker.clone()).run(shutdown_rx),
    );

    // 6. Run until Ctrl-C, then let both loops finish their current tick
    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested.");
    if shutdown_tx.send(true).is_err() {
        error!("Background tasks already stopped.");
    }

    for (name, handle) in [("scheduler", scheduler), ("worker", worker)] {
        if let Err(e) = handle.await {
            error!("{name} task ended abnormally: {e}");
        }
    }

    info!("Goodbye.");
    Ok(())
}
