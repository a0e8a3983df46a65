//! Command batching for the device link
//!
//! Encoded commands accumulate until the next one would not fit, then the
//! batch goes out as one `ContextCommands` frame. Commands are never split
//! across frames and never reordered.

use log::{debug, trace, warn};

use eidolon_protocol::HostMessage;

use crate::error::EngineError;
use crate::traits::{Transport, TransportError};

/// Accumulates encoded commands for one link frame
#[derive(Debug, Clone)]
pub struct CommandBatcher {
    buffer: Vec<u8>,
    max_len: usize,
}

impl CommandBatcher {
    pub fn new(max_len: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(max_len),
            max_len,
        }
    }

    /// Bytes waiting to be flushed
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Check that one encoded command fits in a batch
    pub fn check_fits(&self, bytes: &[u8]) -> Result<(), EngineError> {
        if bytes.len() > self.max_len {
            warn!(
                "Command of {} bytes exceeds the {} byte batch",
                bytes.len(),
                self.max_len
            );
            return Err(EngineError::CommandTooLarge);
        }
        Ok(())
    }

    /// Append one encoded command, flushing first if it would overflow
    pub fn push<T: Transport>(&mut self, transport: &mut T, bytes: &[u8]) -> Result<(), EngineError> {
        self.check_fits(bytes)?;
        if self.buffer.len() + bytes.len() > self.max_len {
            self.flush(transport)?;
        }
        self.buffer.extend_from_slice(bytes);
        trace!("Batched {} bytes ({} pending)", bytes.len(), self.buffer.len());
        Ok(())
    }

    /// Send the batch as one frame
    ///
    /// Returns true if a frame was sent. An empty batch sends nothing.
    pub fn flush<T: Transport>(&mut self, transport: &mut T) -> Result<bool, EngineError> {
        if self.buffer.is_empty() {
            return Ok(false);
        }
        let frame = HostMessage::ContextCommands(&self.buffer)
            .to_frame()
            .map_err(TransportError::from)?;
        // Dropped even when the write fails
        let result = transport.send_frame(&frame);
        debug!("Flushed {} command bytes", self.buffer.len());
        self.buffer.clear();
        if let Err(e) = result {
            warn!("Failed to send command batch: {:?}", e);
            return Err(e.into());
        }
        Ok(true)
    }

    /// Drop pending bytes without sending them
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eidolon_protocol::Frame;

    #[derive(Default)]
    struct Sink {
        frames: Vec<Frame>,
        fail: bool,
    }

    impl Transport for Sink {
        fn send_frame(&mut self, frame: &Frame) -> Result<(), TransportError> {
            if self.fail {
                return Err(TransportError::Disconnected);
            }
            self.frames.push(frame.clone());
            Ok(())
        }
    }

    #[test]
    fn test_flush_before_overflow() {
        let mut sink = Sink::default();
        let mut batcher = CommandBatcher::new(8);
        batcher.push(&mut sink, &[1, 2, 3, 4, 5]).unwrap();
        assert!(sink.frames.is_empty());

        batcher.push(&mut sink, &[6, 7, 8, 9]).unwrap();
        assert_eq!(sink.frames.len(), 1);
        assert_eq!(sink.frames[0].payload.as_slice(), &[1, 2, 3, 4, 5]);
        assert_eq!(batcher.pending(), &[6, 7, 8, 9]);
    }

    #[test]
    fn test_exact_fit_stays_batched() {
        let mut sink = Sink::default();
        let mut batcher = CommandBatcher::new(8);
        batcher.push(&mut sink, &[0; 4]).unwrap();
        batcher.push(&mut sink, &[0; 4]).unwrap();
        assert!(sink.frames.is_empty());
        assert_eq!(batcher.pending().len(), 8);
    }

    #[test]
    fn test_oversize_command_rejected() {
        let mut sink = Sink::default();
        let mut batcher = CommandBatcher::new(4);
        batcher.push(&mut sink, &[1]).unwrap();
        assert_eq!(
            batcher.push(&mut sink, &[0; 5]),
            Err(EngineError::CommandTooLarge)
        );
        assert_eq!(batcher.pending(), &[1]);
        assert!(sink.frames.is_empty());
    }

    #[test]
    fn test_empty_flush_sends_nothing() {
        let mut sink = Sink::default();
        let mut batcher = CommandBatcher::new(8);
        assert_eq!(batcher.flush(&mut sink), Ok(false));
        assert!(sink.frames.is_empty());
    }

    #[test]
    fn test_failed_write_drops_batch() {
        let mut sink = Sink {
            fail: true,
            ..Sink::default()
        };
        let mut batcher = CommandBatcher::new(8);
        batcher.push(&mut sink, &[1, 2]).unwrap();
        assert_eq!(
            batcher.flush(&mut sink),
            Err(EngineError::Transport(TransportError::Disconnected))
        );
        assert!(batcher.is_empty());
    }
}
