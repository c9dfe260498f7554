//! Server-push streaming.
//!
//! SSE-style requests skip the status and business checks. The response's
//! byte stream is passed through a streaming UTF-8 decoder and re-encoded, so
//! consumers always see whole code points. Message framing is left to the
//! consumer.

use bridge_traits::{ByteStream, RequestConfig, Transport};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use tracing::debug;

use crate::error::Result;
use crate::postprocess::normalize_bridge_error;

/// Incremental UTF-8 decoder that carries partial code points across chunk
/// boundaries. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Reencoder {
    pending: Vec<u8>,
}

impl Utf8Reencoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk`, returning every complete character seen so far.
    pub fn push(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::with_capacity(self.pending.len());
        let mut rest: &[u8] = &self.pending;

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    // valid_up_to guarantees this prefix is UTF-8
                    out.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        // Truncated sequence at the end: wait for more bytes.
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        self.pending = rest.to_vec();
        out
    }

    /// Flush at end of stream; a dangling partial sequence becomes U+FFFD.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        self.pending.clear();
        Some(char::REPLACEMENT_CHARACTER.to_string())
    }
}

struct ReencodeState {
    inner: ByteStream,
    decoder: Utf8Reencoder,
    done: bool,
}

/// Wrap a raw byte stream with the streaming decode/re-encode pass.
pub fn reencode(inner: ByteStream) -> ByteStream {
    let state = ReencodeState {
        inner,
        decoder: Utf8Reencoder::new(),
        done: false,
    };

    let reencoded = stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }
        loop {
            match state.inner.next().await {
                Some(Ok(chunk)) => {
                    let text = state.decoder.push(&chunk);
                    if !text.is_empty() {
                        return Some((Ok(Bytes::from(text)), state));
                    }
                }
                Some(Err(err)) => {
                    state.done = true;
                    return Some((Err(err), state));
                }
                None => {
                    state.done = true;
                    return state
                        .decoder
                        .finish()
                        .map(|tail| (Ok(Bytes::from(tail)), state));
                }
            }
        }
    });
    Box::pin(reencoded)
}

/// Open a streaming request and expose its re-encoded body.
pub async fn open(transport: &dyn Transport, config: RequestConfig) -> Result<ByteStream> {
    let url = config.url.clone();
    debug!(transport = transport.name(), url = %url, "Opening response stream");
    let raw = transport
        .open_stream(config)
        .await
        .map_err(|err| normalize_bridge_error(err, &url))?;
    Ok(reencode(raw))
}
