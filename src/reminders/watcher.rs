//! Foreground reminder watcher.
//!
//! Polls the service's due-check on a fixed interval and performs day rollover on a
//! second, slower interval. Checks match the current minute exactly; a minute the
//! process sleeps through is not caught up.

use crate::{
    config::settings::ReminderSettings,
    core::{date_key, service::HabitService},
    reminders::notify::NotificationSink,
};
use std::{future::Future, sync::Arc};
use tokio::{sync::Mutex, time::MissedTickBehavior};
use tracing::{info, warn};

/// One foreground due-check pass. Errors are logged and never stop the loop.
pub async fn check_once(service: &Mutex<HabitService>, sink: &dyn NotificationSink) {
    let mut service = service.lock().await;
    match service.check_due_reminders(date_key::local_now(), sink).await {
        Ok(delivered) if !delivered.is_empty() => {
            info!(count = delivered.len(), "Foreground reminders delivered");
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Foreground reminder check failed"),
    }
}

/// One rollover pass for the current local day.
pub async fn rollover_once(service: &Mutex<HabitService>) {
    let mut service = service.lock().await;
    if let Err(e) = service.rollover(date_key::today_date()).await {
        warn!(error = %e, "Day rollover not persisted");
    }
}

/// Runs the watcher until `shutdown` resolves.
pub async fn run(
    service: Arc<Mutex<HabitService>>,
    sink: Arc<dyn NotificationSink>,
    settings: ReminderSettings,
    shutdown: impl Future<Output = ()>,
) {
    let mut poll = tokio::time::interval(settings.poll_interval());
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut rollover = tokio::time::interval(settings.rollover_interval());
    rollover.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    info!(
        poll_secs = settings.poll_interval_secs,
        rollover_secs = settings.rollover_interval_secs,
        "Foreground reminder watcher started"
    );
    loop {
        tokio::select! {
            _ = poll.tick() => check_once(&service, sink.as_ref()).await,
            _ = rollover.tick() => rollover_once(&service).await,
            () = &mut shutdown => break,
        }
    }
    info!("Foreground reminder watcher stopped");
}
