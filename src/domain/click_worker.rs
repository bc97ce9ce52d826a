//! Background consumer that turns click events into counter increments.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_retry::Retry;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::{debug, info, warn};

use crate::domain::click_event::ClickEvent;
use crate::domain::repositories::LinkRepository;

const MAX_ATTEMPTS: usize = 3;

/// Drains `rx` until every sender is dropped.
///
/// Each increment is retried with exponential backoff. A click that still
/// fails is logged and discarded; nothing is reported back to the redirect.
pub async fn run_click_worker<L>(mut rx: mpsc::Receiver<ClickEvent>, repository: Arc<L>)
where
    L: LinkRepository + ?Sized,
{
    while let Some(event) = rx.recv().await {
        let strategy = ExponentialBackoff::from_millis(10)
            .max_delay(Duration::from_millis(500))
            .take(MAX_ATTEMPTS - 1);

        let result = Retry::spawn(strategy, || repository.increment_click_count(event.link_id)).await;

        match result {
            Ok(()) => debug!(link_id = event.link_id, code = %event.short_code, "Click recorded"),
            Err(e) => warn!(
                link_id = event.link_id,
                code = %event.short_code,
                error = %e,
                "Dropping click after {} attempts",
                MAX_ATTEMPTS
            ),
        }
    }

    info!("Click worker stopped");
}
