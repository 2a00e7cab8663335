//! Pure state transition function
//!
//! Every path into `Done` or `Failed` emits exactly one `End`, and nothing is
//! emitted once a terminal state is reached.

use super::event::{RelayInput, StreamEvent};
use super::sse::UpstreamEvent;
use super::state::{BodyProgress, DeliveryMode, RelayContext, RelayState};
use crate::llm::{assemble_text, describe_http_error, RelayError, NO_RESPONSE_PLACEHOLDER};

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: RelayState,
    pub events: Vec<StreamEvent>,
}

impl TransitionResult {
    pub fn new(state: RelayState) -> Self {
        Self {
            new_state: state,
            events: vec![],
        }
    }

    pub fn with_event(mut self, event: StreamEvent) -> Self {
        self.events.push(event);
        self
    }

    pub fn with_events(mut self, events: impl IntoIterator<Item = StreamEvent>) -> Self {
        self.events.extend(events);
        self
    }
}

/// Pure transition function.
///
/// Takes the state by value so the response buffer moves between states
/// without copying.
pub fn transition(
    state: RelayState,
    context: &RelayContext,
    input: RelayInput,
) -> TransitionResult {
    match (state, input) {
        // Terminal states absorb everything
        (state @ (RelayState::Done | RelayState::Failed), _) => TransitionResult::new(state),

        (RelayState::Idle, RelayInput::CredentialMissing) => fail(
            context,
            &RelayError::missing_credential("no API key configured"),
        ),

        (RelayState::Idle, RelayInput::Dispatched) => {
            TransitionResult::new(RelayState::AwaitingHeaders)
        }

        (RelayState::AwaitingHeaders, RelayInput::HeadersReceived { status }) => {
            let progress = BodyProgress::with_status(Some(status));
            if context.mode == DeliveryMode::Streaming && !progress.is_success() {
                // Nothing useful can follow; the error body is not an event stream
                return fail(context, &describe_http_error(status, &[]));
            }
            TransitionResult::new(RelayState::StreamingBody(progress))
        }

        (RelayState::AwaitingHeaders, RelayInput::BodyReceived { bytes }) => {
            receive_body(BodyProgress::default(), context, &bytes)
        }
        (RelayState::StreamingBody(progress), RelayInput::BodyReceived { bytes }) => {
            receive_body(progress, context, &bytes)
        }

        (RelayState::AwaitingHeaders, RelayInput::LoadComplete) => {
            complete(BodyProgress::default(), context)
        }
        (RelayState::StreamingBody(progress), RelayInput::LoadComplete) => {
            complete(progress, context)
        }

        (_, RelayInput::NetworkError { message }) => fail(context, &RelayError::transport(message)),
        (_, RelayInput::TimedOut) => fail(context, &RelayError::transport("request timed out")),

        (state, input) => {
            tracing::debug!(state = state.name(), ?input, "Ignoring relay input");
            TransitionResult::new(state)
        }
    }
}

/// Transition to `Failed`. Buffered mode surfaces the error as text.
fn fail(context: &RelayContext, error: &RelayError) -> TransitionResult {
    debug_assert!(error.kind.is_terminal(), "{:?} cannot end a relay", error.kind);
    tracing::warn!(kind = ?error.kind, error = %error, "Relay failed");
    let result = TransitionResult::new(RelayState::Failed);
    let result = match context.mode {
        DeliveryMode::Streaming => result,
        DeliveryMode::Buffered => result.with_event(StreamEvent::Chunk(error.display_text())),
    };
    result.with_event(StreamEvent::End)
}

fn receive_body(mut progress: BodyProgress, context: &RelayContext, bytes: &[u8]) -> TransitionResult {
    progress.body.extend_from_slice(bytes);

    if context.mode == DeliveryMode::Buffered || !progress.is_success() {
        return TransitionResult::new(RelayState::StreamingBody(progress));
    }

    let upstream = progress.decoder.feed(&progress.body);
    progress.decoder.compact(&mut progress.body);
    apply_upstream(progress, upstream)
}

/// Turn decoded provider events into stream events, stopping at `message_stop`.
fn apply_upstream(progress: BodyProgress, upstream: Vec<UpstreamEvent>) -> TransitionResult {
    let mut events = Vec::new();
    for event in upstream {
        match event {
            UpstreamEvent::TextDelta(text) => events.push(StreamEvent::Chunk(text)),
            UpstreamEvent::MessageStop => {
                tracing::info!(bytes = progress.decoder.processed(), "Stream complete");
                events.push(StreamEvent::End);
                return TransitionResult::new(RelayState::Done).with_events(events);
            }
        }
    }
    TransitionResult::new(RelayState::StreamingBody(progress)).with_events(events)
}

fn complete(mut progress: BodyProgress, context: &RelayContext) -> TransitionResult {
    if !progress.is_success() {
        let status = progress.status.unwrap_or_default();
        tracing::error!(
            status,
            body = %String::from_utf8_lossy(&progress.body),
            "Upstream returned an error"
        );
        return fail(context, &describe_http_error(status, &progress.body));
    }

    match context.mode {
        DeliveryMode::Streaming => {
            let upstream = progress.decoder.finish(&progress.body);
            let result = apply_upstream(progress, upstream);
            if result.new_state.is_terminal() {
                return result;
            }
            // Body ended without message_stop
            tracing::info!("Stream closed without message_stop");
            TransitionResult {
                new_state: RelayState::Done,
                events: result.events,
            }
            .with_event(StreamEvent::End)
        }
        DeliveryMode::Buffered => {
            let text = match assemble_text(&progress.body) {
                Ok(Some(text)) => text,
                Ok(None) => NO_RESPONSE_PLACEHOLDER.to_string(),
                Err(e) => {
                    tracing::warn!(error = %e, "Recovering from malformed response body");
                    NO_RESPONSE_PLACEHOLDER.to_string()
                }
            };
            tracing::info!(chars = text.chars().count(), "Response complete");
            TransitionResult::new(RelayState::Done)
                .with_event(StreamEvent::Chunk(text))
                .with_event(StreamEvent::End)
        }
    }
}
