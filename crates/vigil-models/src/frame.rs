//! Decoded video frames.

use chrono::{DateTime, Utc};

/// One decoded frame in packed BGR24 layout.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, captured_at: DateTime<Utc>) -> Self {
        Self {
            data,
            width,
            height,
            captured_at,
        }
    }

    /// Byte length of a BGR24 frame with the given dimensions.
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }

    pub fn is_complete(&self) -> bool {
        self.data.len() == Self::byte_len(self.width, self.height)
    }
}
