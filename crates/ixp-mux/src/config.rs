use ixp_frame::{FrameConfig, DEFAULT_MAX_FRAME_SIZE, HEADER_SIZE};

use crate::error::{MuxError, Result};

/// Default number of tags available for tagged requests.
pub const DEFAULT_MAX_TAGS: u16 = 1024;

/// Upper bound on the tag pool size.
pub const MAX_TAGS: u16 = u16::MAX;

/// Multiplexer configuration.
#[derive(Debug, Clone)]
pub struct MuxConfig {
    /// Maximum number of tagged requests in flight at once. Must be at least 1.
    ///
    /// Tags are issued from `1..=max_tags`, never the reserved sequential tag,
    /// so at most 65534 tags are usable.
    pub max_tags: u16,
    /// Maximum frame size in bytes, header included, for both directions.
    pub max_frame_size: usize,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            max_tags: DEFAULT_MAX_TAGS,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl MuxConfig {
    pub fn with_max_tags(mut self, max_tags: u16) -> Self {
        self.max_tags = max_tags;
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Reject configurations the multiplexer cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_tags == 0 {
            return Err(MuxError::Config("max_tags must be at least 1".into()));
        }
        if self.max_frame_size < HEADER_SIZE {
            return Err(MuxError::Config(format!(
                "max_frame_size must be at least {HEADER_SIZE} bytes, got {}",
                self.max_frame_size
            )));
        }
        Ok(())
    }

    pub(crate) fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_frame_size: self.max_frame_size,
        }
    }
}
