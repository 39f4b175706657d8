//! SSE stream of ingestion notifications.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;

use crate::services::notifier::Notifier;

/// GET /api/events - every ingestion notification as one SSE event.
pub async fn event_stream(
    State(notifier): State<Notifier>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = notifier.subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let json = serde_json::to_string(&event).unwrap_or_default();
                    yield Ok(Event::default().event("newEmail").data(json));
                }
                // A slow consumer that missed events can keep listening.
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "event stream lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
