//! Paced plain-text streaming
//!
//! Replies go out one character at a time with a fixed pause between
//! characters. The stream is lazy: nothing is produced until the body is
//! polled, and dropping it (client disconnect) stops emission.

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;

pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Split `text` into single-character chunks, pausing `delay` between them.
///
/// Chunks are Unicode scalar values; concatenating them yields `text`
/// exactly. A zero delay disables pacing.
pub fn paced_chars(text: String, delay: Duration) -> impl Stream<Item = Result<String, Infallible>> + Send {
    let chars: Vec<char> = text.chars().collect();
    stream::iter(chars.into_iter().enumerate()).then(move |(index, ch)| async move {
        if index > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(ch.to_string())
    })
}

/// Build a streaming `text/plain` response
pub fn text_stream_response(status: StatusCode, text: String, delay: Duration) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, TEXT_PLAIN)],
        Body::from_stream(paced_chars(text, delay)),
    )
        .into_response()
}
