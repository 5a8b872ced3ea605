use std::convert::Infallible;

use axum::extract::State;
use axum::response::Sse;
use axum::response::sse::{Event, KeepAlive};
use serde::Serialize;
use tokio::sync::broadcast::Sender;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::models::Snapshot;

#[derive(Clone, Debug, Serialize)]
pub enum ServiceEvent {
    SnapshotCreate(Snapshot),
}

#[derive(Clone)]
pub struct SseState {
    pub sender: Sender<ServiceEvent>,
}

/// Pushes freshly generated snapshots to dashboard clients as they commit.
pub async fn sse_handler(
    State(state): State<SseState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.sender.subscribe()).filter_map(|event| match event {
        Ok(ServiceEvent::SnapshotCreate(snapshot)) => {
            let data = serde_json::to_string(&snapshot).unwrap_or_default();
            Some(Ok(Event::default().event("snapshot").data(data)))
        }
        // Lagged receivers just miss events; the timeline endpoint backfills.
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
