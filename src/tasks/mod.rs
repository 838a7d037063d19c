//! Background jobs. Call `spawn_all` once during startup.

use crate::services::NotificationService;

/// Spawns the outbox dispatcher on the tokio runtime; does not block.
///
/// Each tick drains due batches until a batch comes back empty, then sleeps
/// `notifier.poll_interval_secs`. Errors are logged and retried on the next tick.
pub fn spawn_all(notification_service: NotificationService) {
    let svc = notification_service.clone();
    tokio::spawn(async move {
        let interval = std::time::Duration::from_secs(svc.settings().poll_interval_secs.max(1));
        log::info!(
            "Outbox dispatcher started (every {}s, batch {})",
            interval.as_secs(),
            svc.settings().batch_size
        );
        loop {
            loop {
                match svc.dispatch_pending().await {
                    Ok(stats) if stats.delivered + stats.retried + stats.failed > 0 => {}
                    Ok(_) => break,
                    Err(e) => {
                        log::error!("Outbox dispatch failed: {e:?}");
                        break;
                    }
                }
            }
            tokio::time::sleep(interval).await;
        }
    });
}
