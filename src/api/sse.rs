//! Server-Sent Events carrying device frames

use crate::sink::OutboundMessage;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

/// One SSE event per frame. The stream ends when the relay drops its sink.
pub fn frame_stream(
    rx: UnboundedReceiver<OutboundMessage>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let frames = UnboundedReceiverStream::new(rx).map(|message| Ok(frame_event(&message)));

    Sse::new(frames).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn frame_event(message: &OutboundMessage) -> Event {
    Event::default()
        .event(message.key())
        .data(message.to_frame().to_string())
}
