// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw event text parser.
//!
//! Wire format: `q:location:payload`. One queue-type byte, a location
//! delimited by the next unescaped `:` (`|:` escapes a literal colon),
//! and a free-form payload. Produces `/queue` (the byte value),
//! `/origin` and `/message`; a payload that parses as a JSON object is
//! additionally merged at the document root.

use sift_core::Event;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("event is too short to carry a queue and location")]
    TooShort,
    #[error("queue byte is not followed by ':'")]
    MissingQueueDelimiter,
    #[error("location has no terminating ':'")]
    UnterminatedLocation,
}

/// Parse a raw text event into a structured document.
pub fn parse_event(text: &str) -> Result<Event, ParseError> {
    let bytes = text.as_bytes();
    // Shortest well-formed event: `q:l:`
    if bytes.len() < 4 {
        return Err(ParseError::TooShort);
    }
    if bytes[1] != b':' {
        return Err(ParseError::MissingQueueDelimiter);
    }
    let queue = i64::from(bytes[0]);

    let mut origin = String::new();
    let mut message_start = None;
    let rest = &text[2..];
    let mut chars = rest.char_indices().peekable();
    while let Some((i, ch)) = chars.next() {
        match ch {
            '|' if matches!(chars.peek(), Some((_, ':'))) => {
                origin.push(':');
                chars.next();
            }
            ':' => {
                message_start = Some(2 + i + 1);
                break;
            }
            other => origin.push(other),
        }
    }
    let Some(message_start) = message_start else {
        return Err(ParseError::UnterminatedLocation);
    };
    let message = &text[message_start..];

    let mut event = Event::new();
    // Writes into a fresh object document cannot fail.
    let _ = event.set_int("/queue", queue);
    let _ = event.set_string("/origin", origin);
    let _ = event.set_string("/message", message);

    // Structured passthrough: a JSON object payload is grafted at the
    // root, its fields taking precedence on collision.
    if message.trim_start().starts_with('{') {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(message) {
            if value.is_object() {
                let _ = event.merge(value);
            }
        }
    }

    Ok(event)
}

#[cfg(test)]
#[path = "parse_tests.rs"]
mod tests;
