use log::trace;

use super::FilterExpression;
use crate::{
    capture::FrameRecord,
    layers::{DecodedFrame, Decoder},
};

/// How many more frames may be reported
///
/// A limit of `0` means no limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchBudget {
    limit: u64,
    used: u64,
}
impl MatchBudget {
    pub fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }
    pub fn unlimited() -> Self {
        Self::default()
    }
    pub fn limit(&self) -> Option<u64> {
        (self.limit != 0).then_some(self.limit)
    }
    pub fn used(&self) -> u64 {
        self.used
    }
    pub fn remaining(&self) -> Option<u64> {
        self.limit().map(|limit| limit.saturating_sub(self.used))
    }
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == Some(0)
    }
    /// Uses up one unit
    ///
    /// Returns false without changing anything once the budget is exhausted
    pub fn consume(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.used += 1;
        true
    }
}

/// Iterator returned by [select]
#[derive(Debug)]
pub struct Selected<'f, I> {
    frames: I,
    filter: &'f FilterExpression,
    /// Overrides the link type of the records when set
    decoder: Option<Decoder>,
    budget: MatchBudget,
    scanned: u64,
    yielded: usize,
    finished: bool,
}

/// Decodes and filters `frames`, yielding `(index, frame)` for each match
///
/// Indices start at 1 and count the yielded frames. Once `budget` is used
/// up nothing more is pulled from `frames`. An error from `frames` is passed
/// through and ends the iteration.
pub fn select<I, E>(frames: I, filter: &FilterExpression, budget: MatchBudget) -> Selected<'_, I::IntoIter>
where
    I: IntoIterator<Item = Result<FrameRecord, E>>,
{
    Selected {
        frames: frames.into_iter(),
        filter,
        decoder: None,
        budget,
        scanned: 0,
        yielded: 0,
        finished: false,
    }
}

impl<I> Selected<'_, I> {
    /// Decodes every frame with `decoder` instead of the link type the
    /// record was captured with
    pub fn with_decoder(mut self, decoder: Decoder) -> Self {
        self.decoder = Some(decoder);
        self
    }
    /// Records pulled from the source so far
    pub fn scanned(&self) -> u64 {
        self.scanned
    }
    pub fn budget(&self) -> &MatchBudget {
        &self.budget
    }
}

impl<I, E> Iterator for Selected<'_, I>
where
    I: Iterator<Item = Result<FrameRecord, E>>,
{
    type Item = Result<(usize, DecodedFrame), E>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished && !self.budget.is_exhausted() {
            let record = match self.frames.next()? {
                Ok(record) => record,
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            };
            self.scanned += 1;
            let decoder = self
                .decoder
                .unwrap_or_else(|| Decoder::new(record.link_type));
            let frame = decoder.decode(&record);
            if !self.filter.matches(&frame) {
                trace!("Frame {} does not match the filter", self.scanned);
                continue;
            }
            self.budget.consume();
            self.yielded += 1;
            return Some(Ok((self.yielded, frame)));
        }
        None
    }
}
