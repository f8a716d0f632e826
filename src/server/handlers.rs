//! HTTP handlers for the generation API.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_core::Stream;
use futures_util::future;
use futures_util::stream::{self, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use super::api::{CommandResponse, GenerateQuery, GenerateResponse};
use super::error::ApiError;
use crate::generation::{GenerationRecord, GenerationStore, Generator};
use crate::parser::DirectiveEvent;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Runs generations.
    pub generator: Arc<Generator>,
    /// Generations available for polling.
    pub store: Arc<GenerationStore>,
}

impl AppState {
    #[must_use]
    pub fn new(generator: Arc<Generator>, store: Arc<GenerationStore>) -> Self {
        Self { generator, store }
    }
}

/// GET /api/generate - Start a generation.
pub async fn get_generate(
    State(state): State<AppState>,
    Query(query): Query<GenerateQuery>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let prompt = query.prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::BadRequest("prompt is required".to_string()));
    }

    let generation_id = state.generator.spawn(&state.store, prompt.to_string());
    tracing::info!(id = %generation_id, "Generation started");
    Ok(Json(GenerateResponse { generation_id }))
}

/// GET /api/generations/:id - Poll a generation's status, events and result.
pub async fn get_generation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GenerationRecord>, ApiError> {
    state.store.get(id).map(Json).ok_or(ApiError::NotFound(id))
}

/// One item of a generation's event stream.
#[derive(Debug)]
enum Outbound {
    Event(DirectiveEvent),
    /// The subscriber fell behind and missed this many events.
    Lagged(u64),
}

/// Follow live events, ending with `Outbound::Lagged` if the receiver
/// falls behind the channel.
fn live_events(rx: broadcast::Receiver<DirectiveEvent>) -> impl Stream<Item = Outbound> + Send {
    BroadcastStream::new(rx).scan(false, |lagged, item| {
        if *lagged {
            return future::ready(None);
        }
        let outbound = match item {
            Ok(event) => Outbound::Event(event),
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                *lagged = true;
                Outbound::Lagged(missed)
            }
        };
        future::ready(Some(outbound))
    })
}

fn sse_event(id: Uuid, outbound: Outbound) -> Option<Event> {
    match outbound {
        Outbound::Event(event) => {
            let data = serde_json::to_string(&event).ok()?;
            Some(Event::default().event(event.event_type()).data(data))
        }
        Outbound::Lagged(missed) => {
            tracing::warn!(%id, missed, "SSE subscriber lagged, asking it to resync");
            let data = serde_json::json!({
                "missed": missed,
                "poll": format!("/api/generations/{id}"),
            });
            Some(Event::default().event("resync").data(data.to_string()))
        }
    }
}

/// GET /api/generations/:id/events - SSE stream of a generation's events.
///
/// Replays events recorded so far, then follows live events until the
/// generation finishes. A subscriber that falls behind gets a final
/// `resync` event naming the poll endpoint instead of a gap.
pub async fn get_generation_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let (record, rx) = state.store.subscribe(id).ok_or(ApiError::NotFound(id))?;

    let live: Pin<Box<dyn Stream<Item = Outbound> + Send>> = match rx {
        Some(rx) => Box::pin(live_events(rx)),
        None => Box::pin(stream::empty()),
    };

    let events = stream::iter(record.events.into_iter().map(Outbound::Event))
        .chain(live)
        .filter_map(move |outbound| future::ready(sse_event(id, outbound).map(Ok)));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// POST /api/generations/:id/cancel - Abort a running generation.
pub async fn post_cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CommandResponse>, ApiError> {
    let Some(record) = state.store.get(id) else {
        return Err(ApiError::NotFound(id));
    };

    if state.store.cancel(id) {
        Ok(Json(CommandResponse::success("Generation cancelled")))
    } else {
        Ok(Json(CommandResponse::error(
            "Failed to cancel generation",
            format!("generation is {:?}", record.status).to_lowercase(),
        )))
    }
}
