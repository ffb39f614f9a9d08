//! Composite reader over per-part download streams.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

use linkbox_common::ByteReader;

/// Concatenates part readers in ascending range order.
///
/// Each underlying reader is consumed to exhaustion and then dropped before
/// the next one is touched, releasing its connection as soon as its bytes
/// are through. Dropping the composite drops every remaining reader.
pub struct MultiReader {
    parts: VecDeque<ByteReader>,
}

impl MultiReader {
    /// Build a composite over `parts`, ordered first-to-last.
    pub fn new(parts: Vec<ByteReader>) -> Self {
        Self {
            parts: parts.into(),
        }
    }

    /// Number of part readers not yet exhausted.
    pub fn remaining_parts(&self) -> usize {
        self.parts.len()
    }
}

impl AsyncRead for MultiReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        loop {
            let Some(front) = self.parts.front_mut() else {
                return Poll::Ready(Ok(()));
            };

            let filled_before: usize = buf.filled().len();
            match Pin::new(front).poll_read(cx, buf) {
                Poll::Ready(Ok(())) => {
                    if buf.filled().len() == filled_before {
                        // Current part exhausted; release it and move on.
                        self.parts.pop_front();
                        continue;
                    }
                    return Poll::Ready(Ok(()));
                }
                other => return other,
            }
        }
    }
}
