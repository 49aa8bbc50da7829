//! Assembles streamed text fragments into a live "typing" view and a final message.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::oneshot;

use crate::error::Error;
use crate::observability::{STREAM_BYTES, STREAM_ERRORS, STREAM_FRAGMENTS};

/// Glyph appended to every live view while a response is still arriving.
pub const CURSOR: char = '▌';

/// Ordered literal replacements applied once to every finished response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branding {
    replacements: Vec<(String, String)>,
}

impl Branding {
    /// Creates a branding policy from `(from, to)` pairs applied in order.
    pub fn new(replacements: Vec<(String, String)>) -> Self {
        Self { replacements }
    }

    /// A policy that leaves text untouched.
    pub fn none() -> Self {
        Self::new(Vec::new())
    }

    /// Returns the configured replacements.
    pub fn replacements(&self) -> &[(String, String)] {
        &self.replacements
    }

    /// Replaces every occurrence of each pattern, case-sensitively, leftmost first.
    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (from, to) in &self.replacements {
            if !from.is_empty() {
                out = out.replace(from.as_str(), to);
            }
        }
        out
    }
}

impl Default for Branding {
    fn default() -> Self {
        Self::new(vec![
            ("Gemini".to_string(), "Talkie".to_string()),
            ("Google".to_string(), "Team Brackets".to_string()),
        ])
    }
}

/// A stream of live views over a stream of text fragments.
///
/// Each fragment is appended to the running text followed by a single space, and the running
/// text plus [`CURSOR`] is yielded.  When the inner stream ends, or fails, the running text is
/// branded, trimmed, and sent through the receiver returned by [`StreamAccumulator::new`].  A
/// failure is yielded once and terminates the stream; the partial text still becomes final.
pub struct StreamAccumulator {
    inner: Pin<Box<dyn Stream<Item = Result<String, Error>> + Send>>,
    branding: Branding,
    text: String,
    final_tx: Option<oneshot::Sender<String>>,
    done: bool,
}

impl StreamAccumulator {
    /// Wraps a fragment stream.
    ///
    /// Returns the live-view stream and a receiver that resolves to the final text once the
    /// live-view stream has been drained.
    pub fn new<S>(stream: S, branding: Branding) -> (Self, oneshot::Receiver<String>)
    where
        S: Stream<Item = Result<String, Error>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let this = Self {
            inner: Box::pin(stream),
            branding,
            text: String::new(),
            final_tx: Some(tx),
            done: false,
        };
        (this, rx)
    }

    /// The unbranded text accumulated so far.
    pub fn running_text(&self) -> &str {
        &self.text
    }

    fn finalize(&self) -> String {
        self.branding.apply(&self.text).trim().to_string()
    }

    fn finish(&mut self) {
        if let Some(tx) = self.final_tx.take() {
            let _ = tx.send(self.finalize());
        }
        self.done = true;
    }
}

impl Stream for StreamAccumulator {
    type Item = Result<String, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(fragment))) => {
                STREAM_FRAGMENTS.click();
                STREAM_BYTES.count(fragment.len() as u64);
                self.text.push_str(&fragment);
                self.text.push(' ');
                Poll::Ready(Some(Ok(format!("{}{CURSOR}", self.text))))
            }
            Poll::Ready(Some(Err(e))) => {
                STREAM_ERRORS.click();
                self.finish();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.finish();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
