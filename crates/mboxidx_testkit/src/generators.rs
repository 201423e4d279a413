//! Property-based test generators.
//!
//! Strategies for message bodies that are valid mbox content: printable
//! lines, none of which starts a new envelope. Feeding these through
//! [`crate::ArchiveBuilder`] yields archives whose expected index shape is
//! known by construction.

use proptest::prelude::*;

/// Strategy for one body line: printable ASCII that cannot open an
/// envelope line.
pub fn body_line() -> impl Strategy<Value = String> {
    prop::string::string_regex("[ -~]{0,60}")
        .expect("valid regex")
        .prop_filter("body line must not start an envelope", |line| {
            !line.starts_with("From ")
        })
}

/// Strategy for one message body: zero or more lines joined by `\n`.
pub fn body() -> impl Strategy<Value = String> {
    prop::collection::vec(body_line(), 0..8).prop_map(|lines| lines.join("\n"))
}

/// Strategy for a non-empty batch of message bodies.
pub fn bodies() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(body(), 1..6)
}

/// Strategy for an envelope line remainder with a parseable date.
pub fn envelope() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,8}@[a-z]{1,8}\\.[a-z]{2,3}")
        .expect("valid regex")
        .prop_map(|sender| format!("{sender} Thu Nov 29 22:33:52 2001"))
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn body_lines_never_open_an_envelope(line in body_line()) {
            prop_assert!(!line.starts_with("From "));
            prop_assert!(!line.contains('\n'));
        }

        #[test]
        fn bodies_only_contain_printables_and_newlines(body in body()) {
            prop_assert!(body.bytes().all(|b| b == b'\n' || (b' '..=b'~').contains(&b)));
        }

        #[test]
        fn envelopes_carry_a_sender_and_date(envelope in envelope()) {
            prop_assert!(envelope.contains('@'));
            prop_assert!(envelope.ends_with("2001"));
        }
    }
}
