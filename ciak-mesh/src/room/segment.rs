use ciak_core::Director;
use std::time::Duration;
use tokio::time::Instant;

/// One uninterrupted director interval. A recorder captures local video for
/// `Director::Local` segments and the director's incoming track otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub index: usize,
    pub source: Director,
    /// Offset from room start.
    pub start: Duration,
    /// `None` while the segment is still running.
    pub length: Option<Duration>,
}

impl Segment {
    pub fn is_local(&self) -> bool {
        self.source.is_local()
    }
}

pub(crate) struct SegmentLog {
    started_at: Instant,
    segments: Vec<Segment>,
}

impl SegmentLog {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            segments: Vec::new(),
        }
    }

    /// Close the running segment and open one for `source`.
    pub fn roll(&mut self, source: Director) -> Segment {
        let now = self.started_at.elapsed();
        self.finish_at(now);

        let segment = Segment {
            index: self.segments.len(),
            source,
            start: now,
            length: None,
        };
        self.segments.push(segment.clone());
        segment
    }

    /// Close the running segment and hand over the whole list.
    pub fn finish(&mut self) -> Vec<Segment> {
        let now = self.started_at.elapsed();
        self.finish_at(now);
        std::mem::take(&mut self.segments)
    }

    fn finish_at(&mut self, now: Duration) {
        if let Some(last) = self.segments.last_mut() {
            if last.length.is_none() {
                last.length = Some(now.saturating_sub(last.start));
            }
        }
    }
}
