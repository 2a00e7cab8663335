//! Property-based tests for the conversation codec

use super::*;
use proptest::prelude::*;

/// Strings built from markers, near-miss markers and free text
fn arb_encoded() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            Just("[U]".to_string()),
            Just("[A]".to_string()),
            Just("[".to_string()),
            Just("]".to_string()),
            Just("[u]".to_string()),
            "[a-zA-Z0-9 .,!?é🌍\n]{0,12}",
        ],
        0..16,
    )
    .prop_map(|parts| parts.concat())
}

/// Content that cannot be mistaken for a marker
fn arb_content() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,!?é🌍]{1,20}"
}

fn arb_turn() -> impl Strategy<Value = Turn> {
    (any::<bool>(), arb_content()).prop_map(|(is_user, content)| {
        if is_user {
            Turn::user(content)
        } else {
            Turn::assistant(content)
        }
    })
}

proptest! {
    #[test]
    fn decode_is_total_and_well_formed(encoded in arb_encoded()) {
        let turns = decode(&encoded);
        for turn in &turns {
            prop_assert!(!turn.content.is_empty());
            prop_assert!(!turn.content.contains(USER_MARKER));
            prop_assert!(!turn.content.contains(ASSISTANT_MARKER));
        }
    }

    #[test]
    fn decode_never_yields_more_turns_than_markers(encoded in arb_encoded()) {
        let markers = encoded.matches(USER_MARKER).count() + encoded.matches(ASSISTANT_MARKER).count();
        prop_assert!(decode(&encoded).len() <= markers);
    }

    #[test]
    fn decode_inverts_encode_within_budget(turns in proptest::collection::vec(arb_turn(), 0..8)) {
        let encoded = encode(&turns, usize::MAX);
        prop_assert_eq!(decode(&encoded), turns);
    }

    #[test]
    fn encode_respects_budget(
        turns in proptest::collection::vec(arb_turn(), 0..8),
        budget in 0usize..64,
    ) {
        let encoded = encode(&turns, budget);
        prop_assert!(encoded.len() <= budget);
        // Whatever survives truncation still decodes to a prefix of the input roles
        let decoded = decode(&encoded);
        prop_assert!(decoded.len() <= turns.len());
        for (got, want) in decoded.iter().zip(&turns) {
            prop_assert_eq!(got.role, want.role);
            prop_assert!(want.content.starts_with(&got.content));
        }
    }
}
