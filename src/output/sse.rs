//! Server-Sent Events for real-time avatar frames

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::avatar::PuppetFrame;
use crate::AppState;

/// Create an SSE stream of published avatar frames
pub fn create_frame_stream(
    app_state: Arc<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = app_state.subscribe_frames();

    // Convert broadcast receiver to a stream
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(frame) => Some(Ok(frame_to_event(&frame))),
        Err(_) => None, // Skip lagged messages
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Convert an avatar frame to an SSE event
fn frame_to_event(frame: &PuppetFrame) -> Event {
    let data = serde_json::json!(frame);

    Event::default().event("frame").data(data.to_string())
}
