//! The immutable, parse-time-fixed movie-clip definition: an ordered frame
//! list plus a frame-label index, shared by every instance of the
//! character.

use std::collections::HashMap;

use super::command::Command;
use crate::types::FrameNumber;

/// One frame's worth of parse-time content: placement commands, executed
/// before the frame's actions (§5 ordering guarantee).
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub commands: Vec<Command>,
    /// Raw DoAction byte slices, run in declaration order after commands.
    pub actions: Vec<Vec<u8>>,
}

/// The sprite/movie-clip character definition: a fixed-at-parse-time frame
/// sequence and the label → frame-index map used by `goto_frame(label, ..)`
/// and `Call`.
#[derive(Debug, Clone, Default)]
pub struct MovieClipDefinition {
    pub frames: Vec<Frame>,
    /// 1-based frame index for each named frame (including scene labels,
    /// which share the same namespace in this implementation).
    pub frame_labels: HashMap<String, FrameNumber>,
}

impl MovieClipDefinition {
    pub fn frame_count(&self) -> u16 {
        self.frames.len() as u16
    }

    pub fn resolve_label(&self, label: &str) -> Option<FrameNumber> {
        self.frame_labels.get(label).copied()
    }
}
