//! Server-Sent Events stream of engine events

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

/// GET /events
///
/// Streams `ElementCreated`, `ElementDeleted`, `ResponseRecorded` and
/// `ProgressUpdated` as they are committed.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    civic_common::sse::event_bus_sse_stream("civic-ie", &state.event_bus)
}
