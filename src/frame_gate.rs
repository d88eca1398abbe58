//! Deduplication of repeated depth frames.

use crate::frame::DepthFrame;

/// Rejects a depth frame identical to the last accepted one
#[derive(Debug, Clone, Default)]
pub struct FrameGate {
    last: Option<DepthFrame>,
}

impl FrameGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` and remembers `frame` unless it matches the last
    /// accepted frame sample-for-sample
    pub fn accept(&mut self, frame: &DepthFrame) -> bool {
        if self.is_repeat(frame) {
            return false;
        }
        self.commit(frame);
        true
    }

    /// Whether `frame` matches the last accepted frame. Does not store it.
    pub fn is_repeat(&self, frame: &DepthFrame) -> bool {
        self.last.as_ref() == Some(frame)
    }

    /// Remember `frame` as the last accepted one
    pub fn commit(&mut self, frame: &DepthFrame) {
        self.last = Some(frame.clone());
    }

    /// Forget the last accepted frame
    pub fn reset(&mut self) {
        self.last = None;
    }
}
