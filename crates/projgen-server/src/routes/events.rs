use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use serde::Deserialize;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    /// Only forward transitions of this owner's jobs.
    pub owner: Option<String>,
}

/// GET /api/v1/events — SSE stream that emits a `status` event for every job
/// status transition. Lagged subscribers silently skip the missed events.
pub async fn sse_events(
    State(app): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> impl axum::response::IntoResponse {
    let rx = app.orchestrator.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| {
        let ev = msg.ok()?;
        if query.owner.as_deref().is_some_and(|o| o != ev.owner) {
            return None;
        }
        let data = serde_json::to_string(&ev).ok()?;
        Some(Ok::<Event, Infallible>(Event::default().event("status").data(data)))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
