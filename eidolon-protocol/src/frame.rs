//! Link framing between host and display
//!
//! ```text
//! 0xAA | len | type | payload[len] | check
//! ```
//!
//! `check` is the XOR of `len`, `type` and every payload byte. Payloads are
//! capped at [`MAX_PAYLOAD_SIZE`] so a command batch or a sprite sheet chunk
//! always fits the device's receive buffer.
//!
//! A bad length or check byte drops the frame being read and the parser goes
//! back to hunting for `0xAA`, so line noise costs frames, never the link.

use alloc::vec::Vec as AllocVec;
use heapless::Vec;

/// First byte of every frame
pub const FRAME_START: u8 = 0xAA;

/// Largest payload one frame carries
pub const MAX_PAYLOAD_SIZE: usize = 250;

/// Start, length, type and check bytes
pub const FRAME_OVERHEAD: usize = 4;

/// Largest encoded frame
pub const MAX_FRAME_SIZE: usize = FRAME_OVERHEAD + MAX_PAYLOAD_SIZE;

/// Payload storage of a single frame
pub type Payload = Vec<u8, MAX_PAYLOAD_SIZE>;

/// Framing failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Payload longer than [`MAX_PAYLOAD_SIZE`]
    PayloadTooLarge,
    /// Check byte does not match the frame
    InvalidChecksum,
    /// Payload does not fit the message type
    InvalidFrame,
    /// Output slice shorter than the encoded frame
    BufferTooSmall,
}

/// One message on the link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub msg_type: u8,
    pub payload: Payload,
}

impl Frame {
    pub fn new(msg_type: u8, payload: &[u8]) -> Result<Self, FrameError> {
        let payload = Payload::from_slice(payload).map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(Self { msg_type, payload })
    }

    /// Frame with no payload, used by requests and `Ready`
    pub fn empty(msg_type: u8) -> Self {
        Self {
            msg_type,
            payload: Payload::new(),
        }
    }

    pub fn encoded_len(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }

    fn check(&self) -> u8 {
        check_byte(self.payload.len() as u8, self.msg_type, &self.payload)
    }

    /// Write the frame to the front of `out`, returning the bytes used
    pub fn encode(&self, out: &mut [u8]) -> Result<usize, FrameError> {
        let len = self.encoded_len();
        let out = out.get_mut(..len).ok_or(FrameError::BufferTooSmall)?;
        let (header, rest) = out.split_at_mut(3);
        let (body, tail) = rest.split_at_mut(self.payload.len());
        header.copy_from_slice(&[FRAME_START, self.payload.len() as u8, self.msg_type]);
        body.copy_from_slice(&self.payload);
        tail[0] = self.check();
        Ok(len)
    }

    /// Encoded frame as an owned buffer
    pub fn to_bytes(&self) -> AllocVec<u8> {
        let mut bytes = AllocVec::with_capacity(self.encoded_len());
        bytes.extend_from_slice(&[FRAME_START, self.payload.len() as u8, self.msg_type]);
        bytes.extend_from_slice(&self.payload);
        bytes.push(self.check());
        bytes
    }
}

fn check_byte(len: u8, msg_type: u8, payload: &[u8]) -> u8 {
    payload.iter().fold(len ^ msg_type, |check, byte| check ^ byte)
}

/// Where the parser is inside the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Sync,
    Length,
    Type { len: u8 },
    Payload { len: u8, msg_type: u8 },
    Check { msg_type: u8 },
}

/// Incremental frame reader for bytes arriving from the link
#[derive(Debug, Clone)]
pub struct FrameParser {
    stage: Stage,
    payload: Payload,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            stage: Stage::Sync,
            payload: Payload::new(),
        }
    }

    /// Drop any partly read frame
    pub fn reset(&mut self) {
        self.stage = Stage::Sync;
        self.payload.clear();
    }

    /// Check if a frame has been started but not finished
    pub fn in_frame(&self) -> bool {
        self.stage != Stage::Sync
    }

    /// Take one byte
    ///
    /// Returns the frame it completes, if any. Bytes outside a frame are
    /// skipped without error.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Frame>, FrameError> {
        self.stage = match self.stage {
            Stage::Sync if byte == FRAME_START => Stage::Length,
            Stage::Sync => Stage::Sync,
            Stage::Length if byte as usize > MAX_PAYLOAD_SIZE => {
                self.reset();
                return Err(FrameError::PayloadTooLarge);
            }
            Stage::Length => Stage::Type { len: byte },
            Stage::Type { len: 0 } => Stage::Check { msg_type: byte },
            Stage::Type { len } => {
                self.payload.clear();
                Stage::Payload { len, msg_type: byte }
            }
            Stage::Payload { len, msg_type } => {
                // `len` was bounded at the length byte, so this cannot overflow
                let _ = self.payload.push(byte);
                if self.payload.len() == len as usize {
                    Stage::Check { msg_type }
                } else {
                    Stage::Payload { len, msg_type }
                }
            }
            Stage::Check { msg_type } => {
                let payload = core::mem::take(&mut self.payload);
                self.reset();
                if byte != check_byte(payload.len() as u8, msg_type, &payload) {
                    return Err(FrameError::InvalidChecksum);
                }
                return Ok(Some(Frame { msg_type, payload }));
            }
        };
        Ok(None)
    }

    /// Read every complete frame in `bytes`
    ///
    /// Returns the frames plus the number of frames rejected on the way.
    /// A frame split across calls completes on a later call.
    pub fn feed_all(&mut self, bytes: &[u8]) -> (AllocVec<Frame>, usize) {
        let mut frames = AllocVec::new();
        let mut rejected = 0;
        for &byte in bytes {
            match self.feed(byte) {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => {}
                Err(_) => rejected += 1,
            }
        }
        (frames, rejected)
    }
}
