//! Logging hooks for chat exchanges.
//!
//! This module provides the [`ExchangeLogger`] trait that lets a caller record every exchange
//! the [`ChatOrchestrator`](crate::chat::ChatOrchestrator) runs, plus [`JsonLinesLogger`], which
//! appends one JSON object per event to a file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::types::{ChatSessionId, Message};
use crate::utils::time::now_rfc3339;

/// A trait for logging chat exchanges.
///
/// Implementations must not fail the exchange: every method returns nothing and is expected to
/// swallow its own I/O errors.
pub trait ExchangeLogger: Send + Sync {
    /// Called once a prompt has been accepted, before the model is invoked.
    fn log_exchange_start(&self, session: &ChatSessionId, prompt: &str);

    /// Called for each live view produced while the reply streams in.
    fn log_live_view(&self, session: &ChatSessionId, view: &str);

    /// Called after the reply has been appended and the transcript persisted.
    fn log_exchange_complete(&self, session: &ChatSessionId, reply: &Message);

    /// Called when the exchange fails; `partial` is whatever reply text had arrived.
    fn log_exchange_failed(&self, session: &ChatSessionId, error: &Error, partial: &str);

    /// Called when a stored transcript could not be read and the session started empty.
    fn log_masked_load_failure(&self, session: &ChatSessionId, error: &Error);
}

/// Appends exchange events as JSON lines.
pub struct JsonLinesLogger {
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesLogger {
    /// Opens `path` for appending, creating it if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| Error::io(format!("failed to open log {}", path.display()), err))?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    fn write_event(&self, event: &str, session: &ChatSessionId, fields: Value) {
        let mut line = json!({
            "ts": now_rfc3339(),
            "event": event,
            "session": session.as_str(),
        });
        if let (Some(line), Value::Object(fields)) = (line.as_object_mut(), fields) {
            line.extend(fields);
        }
        if let Ok(mut writer) = self.writer.lock() {
            let _ = serde_json::to_writer(&mut *writer, &line);
            let _ = writer.write_all(b"\n");
            let _ = writer.flush();
        }
    }
}

impl ExchangeLogger for JsonLinesLogger {
    fn log_exchange_start(&self, session: &ChatSessionId, prompt: &str) {
        self.write_event("exchange_start", session, json!({ "prompt": prompt }));
    }

    fn log_live_view(&self, session: &ChatSessionId, view: &str) {
        self.write_event(
            "live_view",
            session,
            json!({ "chars": view.chars().count() }),
        );
    }

    fn log_exchange_complete(&self, session: &ChatSessionId, reply: &Message) {
        self.write_event(
            "exchange_complete",
            session,
            json!({ "reply": reply.content }),
        );
    }

    fn log_exchange_failed(&self, session: &ChatSessionId, error: &Error, partial: &str) {
        self.write_event(
            "exchange_failed",
            session,
            json!({ "error": error.to_string(), "partial": partial }),
        );
    }

    fn log_masked_load_failure(&self, session: &ChatSessionId, error: &Error) {
        self.write_event(
            "masked_load_failure",
            session,
            json!({ "error": error.to_string() }),
        );
    }
}
