//! Property-based tests for the relay
//!
//! - Exactly one `End`, always last, whatever the transport does
//! - Splitting the body differently never changes the emitted events

use super::*;
use proptest::prelude::*;

fn arb_mode() -> impl Strategy<Value = DeliveryMode> {
    prop_oneof![Just(DeliveryMode::Streaming), Just(DeliveryMode::Buffered)]
}

/// One line of an event stream: deltas, noise, malformed data and stops
fn arb_sse_line() -> impl Strategy<Value = String> {
    prop_oneof![
        6 => "[a-zA-Z0-9 .,!?é🌍]{0,16}".prop_map(|text| format!(
            "data: {}",
            serde_json::json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": text}})
        )),
        1 => Just("event: content_block_delta".to_string()),
        1 => Just(String::new()),
        1 => Just("data: [DONE]".to_string()),
        1 => Just(r#"data: {"type":"ping"}"#.to_string()),
        1 => "[a-z{}\" ]{0,12}".prop_map(|junk| format!("data: {{{junk}")),
        1 => Just(r#"data: {"type":"message_stop"}"#.to_string()),
    ]
}

fn arb_stream_body() -> impl Strategy<Value = Vec<u8>> {
    (proptest::collection::vec(arb_sse_line(), 0..24), any::<bool>()).prop_map(
        |(lines, trailing_newline)| {
            let mut body = lines.join("\n");
            if trailing_newline {
                body.push('\n');
            }
            body.into_bytes()
        },
    )
}

/// Body plus sorted cut points inside it
fn arb_split_body() -> impl Strategy<Value = (Vec<u8>, Vec<usize>)> {
    arb_stream_body().prop_flat_map(|body| {
        let len = body.len();
        (
            Just(body),
            proptest::collection::vec(0..=len, 0..8).prop_map(|mut cuts| {
                cuts.sort_unstable();
                cuts
            }),
        )
    })
}

fn arb_input() -> impl Strategy<Value = RelayInput> {
    prop_oneof![
        Just(RelayInput::CredentialMissing),
        Just(RelayInput::Dispatched),
        prop_oneof![Just(200u16), Just(201), Just(400), Just(401), Just(429), Just(500), Just(529)]
            .prop_map(|status| RelayInput::HeadersReceived { status }),
        arb_sse_line().prop_map(|line| RelayInput::BodyReceived {
            bytes: format!("{line}\n").into_bytes()
        }),
        Just(RelayInput::LoadComplete),
        "[a-z ]{1,10}".prop_map(|message| RelayInput::NetworkError { message }),
        Just(RelayInput::TimedOut),
    ]
}

fn feed(mode: DeliveryMode, chunks: &[&[u8]]) -> Vec<StreamEvent> {
    let mut relay = Relay::new(mode);
    let mut events = relay.handle(RelayInput::Dispatched);
    events.extend(relay.handle(RelayInput::HeadersReceived { status: 200 }));
    for chunk in chunks {
        events.extend(relay.handle(RelayInput::BodyReceived {
            bytes: chunk.to_vec(),
        }));
    }
    events.extend(relay.handle(RelayInput::LoadComplete));
    events
}

fn split_at_cuts<'a>(body: &'a [u8], cuts: &[usize]) -> Vec<&'a [u8]> {
    let mut chunks = Vec::new();
    let mut start = 0;
    for &cut in cuts {
        chunks.push(&body[start..cut]);
        start = cut;
    }
    chunks.push(&body[start..]);
    chunks
}

fn count_ends(events: &[StreamEvent]) -> usize {
    events.iter().filter(|e| **e == StreamEvent::End).count()
}

proptest! {
    #[test]
    fn at_most_one_end_and_it_is_last(
        mode in arb_mode(),
        inputs in proptest::collection::vec(arb_input(), 0..20),
    ) {
        let mut relay = Relay::new(mode);
        let mut events = Vec::new();
        for input in inputs {
            let emitted = relay.handle(input);
            // Nothing may follow an End
            prop_assert!(count_ends(&events) == 0 || emitted.is_empty());
            events.extend(emitted);
        }
        prop_assert!(count_ends(&events) <= 1);
        prop_assert_eq!(count_ends(&events) == 1, relay.is_terminal());

        events.extend(relay.ensure_ended());
        prop_assert_eq!(count_ends(&events), 1);
        prop_assert_eq!(events.last(), Some(&StreamEvent::End));
        prop_assert!(events.iter().all(|e| !matches!(e, StreamEvent::Ready(_))));
    }

    #[test]
    fn split_body_emits_same_events(
        mode in arb_mode(),
        (body, cuts) in arb_split_body(),
    ) {
        let whole = feed(mode, &[&body]);
        let split = feed(mode, &split_at_cuts(&body, &cuts));
        prop_assert_eq!(&whole, &split);
        prop_assert_eq!(count_ends(&whole), 1);
        prop_assert_eq!(whole.last(), Some(&StreamEvent::End));
    }

    #[test]
    fn streaming_chunks_are_never_empty((body, cuts) in arb_split_body()) {
        let events = feed(DeliveryMode::Streaming, &split_at_cuts(&body, &cuts));
        for event in &events {
            if let StreamEvent::Chunk(text) = event {
                prop_assert!(!text.is_empty());
            }
        }
    }
}
