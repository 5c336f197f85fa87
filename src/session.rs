//! Reads a capture and reports the frames that pass a filter
use std::{
    io::{self, Write},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use log::{debug, info};
use thiserror::Error;

use crate::{
    capture::{CaptureError, FrameRecord},
    filter::{FilterExpression, MatchBudget, select},
    report,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("failed to write report: {0}")]
    Output(#[source] io::Error),
}

/// Stops a running session before the next record is read
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);
impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionSummary {
    /// Records read from the capture
    pub scanned: u64,
    /// Frames that matched and were written
    pub rendered: u64,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    filter: FilterExpression,
    limit: u64,
    cancel: CancelToken,
}
impl Session {
    /// `limit` caps the number of reported frames, `0` reports all of them
    pub fn new(filter: FilterExpression, limit: u64) -> Self {
        Self {
            filter,
            limit,
            cancel: CancelToken::default(),
        }
    }
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
    pub fn filter(&self) -> &FilterExpression {
        &self.filter
    }

    /// Writes the report of every selected frame in `frames` to `sink`
    ///
    /// `frames` is any of the capture readers. Each frame is decoded from its
    /// own link type. Output already written stays in `sink` when a later
    /// record turns out to be broken.
    pub fn run<I, W>(&self, frames: I, sink: &mut W) -> Result<SessionSummary, SessionError>
    where
        I: IntoIterator<Item = Result<FrameRecord, CaptureError>>,
        W: Write,
    {
        let mut frames = frames.into_iter();
        let cancel = &self.cancel;
        let records = std::iter::from_fn(|| {
            if cancel.is_cancelled() {
                return None;
            }
            frames.next()
        });
        let mut selected = select(records, &self.filter, MatchBudget::new(self.limit));

        let mut rendered = 0;
        let mut text = String::new();
        for result in selected.by_ref() {
            let (index, frame) = result?;
            text.clear();
            // Writing into a String does not fail
            let _ = report::write_frame(&mut text, &frame, index);
            sink.write_all(text.as_bytes()).map_err(SessionError::Output)?;
            rendered += 1;
        }
        sink.flush().map_err(SessionError::Output)?;

        let summary = SessionSummary {
            scanned: selected.scanned(),
            rendered,
            cancelled: self.cancel.is_cancelled(),
        };
        if summary.cancelled {
            debug!("Session cancelled");
        }
        info!(
            "Scanned {} frames, reported {}",
            summary.scanned, summary.rendered
        );
        Ok(summary)
    }
}
