//! Live dashboard updates over Server-Sent Events

use axum::{
    extract::State,
    response::{sse::Event, Sse},
    Extension,
};
use futures::stream::Stream;
use kobu_common::sse::create_event_sse_stream;
use std::convert::Infallible;

use super::role::Caller;
use crate::AppState;

/// GET /api/events
///
/// Admins and management receive every event; collectors only events about
/// their own work.
pub async fn event_stream(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let own_only = caller.is_collector().then_some(caller.user_id);
    create_event_sse_stream(state.events.clone(), move |event| match own_only {
        Some(me) => event.collector_id() == Some(me),
        None => true,
    })
}
