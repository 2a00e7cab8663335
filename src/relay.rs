//! Streaming relay state machine
//!
//! `Idle → AwaitingHeaders → StreamingBody → Done`, with `Failed` reachable
//! from every non-terminal state. Transport code feeds [`RelayInput`]s in and
//! forwards the resulting [`StreamEvent`]s to the device.

pub mod event;
pub mod sse;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use event::{RelayInput, StreamEvent};
#[allow(unused_imports)] // Public API re-exports
pub use state::{DeliveryMode, RelayContext, RelayState};
pub use transition::transition;

/// One in-flight relay: current state plus the fixed context
#[derive(Debug)]
pub struct Relay {
    state: RelayState,
    context: RelayContext,
}

impl Relay {
    pub fn new(mode: DeliveryMode) -> Self {
        Self {
            state: RelayState::Idle,
            context: RelayContext::new(mode),
        }
    }

    #[allow(dead_code)] // Used in tests
    pub fn state(&self) -> &RelayState {
        &self.state
    }

    pub fn mode(&self) -> DeliveryMode {
        self.context.mode
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Advance the machine, returning the events to deliver
    pub fn handle(&mut self, input: RelayInput) -> Vec<StreamEvent> {
        let state = std::mem::take(&mut self.state);
        let result = transition(state, &self.context, input);
        self.state = result.new_state;
        result.events
    }

    /// Force a terminal state if the transport stopped without one
    pub fn ensure_ended(&mut self) -> Vec<StreamEvent> {
        if self.is_terminal() {
            return Vec::new();
        }
        tracing::warn!(state = self.state.name(), "Relay stopped before completion");
        self.handle(RelayInput::NetworkError {
            message: "relay stopped before completion".to_string(),
        })
    }
}
