//! Decoded sequence and frame navigation state.

use image::GrayImage;
use std::path::PathBuf;
use std::sync::Arc;

use super::decoder::HmVersion;

/// One displayable frame.
#[derive(Debug)]
pub struct Picture {
    pub poc: i32,
    pub image: GrayImage,
}

impl Picture {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Output of a decoder run: pictures in display (POC) order.
#[derive(Debug)]
pub struct DecodedSequence {
    pub source: PathBuf,
    pub version: HmVersion,
    pub frames: Vec<Arc<Picture>>,
}

impl DecodedSequence {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn display_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NavError {
    NoSequence,
    AtFirstFrame,
    AtLastFrame,
    PercentOutOfRange(i64),
    UnknownPoc(i64),
}

impl std::fmt::Display for NavError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NavError::NoSequence => write!(f, "No bitstream loaded"),
            NavError::AtFirstFrame => write!(f, "Already at first frame"),
            NavError::AtLastFrame => write!(f, "Already at last frame"),
            NavError::PercentOutOfRange(p) => write!(f, "Percent {} outside 0..=100", p),
            NavError::UnknownPoc(poc) => write!(f, "No frame with POC {}", poc),
        }
    }
}

impl std::error::Error for NavError {}

/// Frame index for a slider percentage: nearest of `total` evenly spaced frames.
///
/// Inverse of the progress bar mapping `pos = idx * 100 / (total - 1)`.
pub fn index_for_percent(percent: i64, total: usize) -> usize {
    if total <= 1 {
        return 0;
    }
    let span = (total - 1) as i64;
    let idx = (percent.clamp(0, 100) * span + 50) / 100;
    idx as usize
}

/// Currently loaded sequence plus playhead.
#[derive(Debug, Default)]
pub struct SequenceState {
    sequence: Option<Arc<DecodedSequence>>,
    current: usize,
}

impl SequenceState {
    /// Replace the sequence; the playhead goes back to the first frame.
    pub fn install(&mut self, sequence: Arc<DecodedSequence>) {
        self.sequence = Some(sequence);
        self.current = 0;
    }

    pub fn clear(&mut self) {
        self.sequence = None;
        self.current = 0;
    }

    pub fn sequence(&self) -> Option<&Arc<DecodedSequence>> {
        self.sequence.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.sequence.as_ref().is_some_and(|s| !s.is_empty())
    }

    pub fn total(&self) -> usize {
        self.sequence.as_ref().map(|s| s.len()).unwrap_or(0)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_picture(&self) -> Option<Arc<Picture>> {
        self.sequence
            .as_ref()
            .and_then(|s| s.frames.get(self.current))
            .cloned()
    }

    pub fn current_poc(&self) -> Option<i32> {
        self.current_picture().map(|p| p.poc)
    }

    /// Move by `delta` frames. Does not wrap.
    pub fn step(&mut self, delta: i64) -> Result<usize, NavError> {
        let total = self.loaded_total()?;
        let target = self.current as i64 + delta;
        if target < 0 {
            return Err(NavError::AtFirstFrame);
        }
        if target >= total as i64 {
            return Err(NavError::AtLastFrame);
        }
        self.current = target as usize;
        Ok(self.current)
    }

    pub fn jump_to_percent(&mut self, percent: i64) -> Result<usize, NavError> {
        let total = self.loaded_total()?;
        if !(0..=100).contains(&percent) {
            return Err(NavError::PercentOutOfRange(percent));
        }
        self.current = index_for_percent(percent, total);
        Ok(self.current)
    }

    pub fn jump_to_poc(&mut self, poc: i64) -> Result<usize, NavError> {
        self.loaded_total()?;
        let idx = self
            .sequence
            .as_ref()
            .and_then(|s| s.frames.iter().position(|p| p.poc as i64 == poc))
            .ok_or(NavError::UnknownPoc(poc))?;
        self.current = idx;
        Ok(idx)
    }

    fn loaded_total(&self) -> Result<usize, NavError> {
        match self.total() {
            0 => Err(NavError::NoSequence),
            n => Ok(n),
        }
    }
}
