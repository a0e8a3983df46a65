//! Transport trait for the link to the display device

use eidolon_protocol::{Frame, FrameError};

/// Errors that can occur while sending to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// The link is down
    Disconnected,
    /// The transport refused the write
    Rejected,
    /// A message did not fit in a frame
    Frame(FrameError),
}

impl From<FrameError> for TransportError {
    fn from(e: FrameError) -> Self {
        TransportError::Frame(e)
    }
}

/// Trait for the byte link to a display
///
/// The physical link and its connection lifecycle live behind this trait.
/// `send_frame` returns once the transport has accepted the frame; any
/// waiting for acknowledgement happens inside it.
pub trait Transport {
    /// Write one frame to the link
    fn send_frame(&mut self, frame: &Frame) -> Result<(), TransportError>;

    /// Check if the device is connected
    fn is_connected(&self) -> bool {
        true
    }
}
