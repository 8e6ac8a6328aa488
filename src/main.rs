use dotenvy::dotenv;
use habit_buddy::{
    config::{database, settings},
    core::service::HabitService,
    errors::Result,
    reminders::{
        notify::{LogNotifier, NotificationSink},
        protocol::ReminderLink,
        watcher,
        worker::BackgroundWorker,
    },
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
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
    info!("Attempted to load .env file.");

    // 3. Load settings
    let settings = settings::load_default_settings()
        .inspect(|_| info!("Settings loaded."))
        .inspect_err(|e| error!("Failed to load settings: {}", e))?;

    // 4. Initialize database
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Start the background worker with its own view of the store
    let sink: Arc<dyn NotificationSink> = Arc::new(LogNotifier);
    let (link, rx) = ReminderLink::channel(settings.reminders.channel_capacity);
    let worker = BackgroundWorker::new(db.clone(), settings.reminders, Arc::clone(&sink));
    let worker_handle = worker.spawn(rx);

    // 6. Load state and publish the current reminder configuration
    let reminder_settings = settings.reminders;
    let service = HabitService::load(db, settings).await?.with_link(link);
    service.publish_reminders();
    let service = Arc::new(Mutex::new(service));

    // 7. Run the foreground watcher until Ctrl-C
    watcher::run(Arc::clone(&service), sink, reminder_settings, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await;

    // Dropping the service closes the worker channel
    drop(service);
    if let Err(e) = worker_handle.await {
        error!("Background worker ended abnormally: {}", e);
    }
    info!("Shut down cleanly.");
    Ok(())
}
