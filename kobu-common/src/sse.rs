//! Server-Sent Events (SSE) utilities

use crate::events::{EventBus, KobuEvent};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Stream bus events to one dashboard client
///
/// `keep` decides which events this client sees (collectors only get their
/// own). The stream opens with a `ConnectionStatus` event and sends a
/// heartbeat comment every 15 seconds.
pub fn create_event_sse_stream<F>(
    bus: Arc<EventBus>,
    keep: F,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    F: Fn(&KobuEvent) -> bool + Send + 'static,
{
    info!("New SSE client connected ({} listening)", bus.subscriber_count() + 1);
    let mut rx = bus.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    if !keep(&event) {
                        continue;
                    }
                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            debug!("SSE: sending {}", event.event_type());
                            yield Ok(Event::default().event(event.event_type()).data(json));
                        }
                        Err(e) => warn!("SSE: failed to serialize {}: {}", event.event_type(), e),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("SSE: client lagged, skipped {} events", skipped);
                    yield Ok(Event::default().event("Resync").data(skipped.to_string()));
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
