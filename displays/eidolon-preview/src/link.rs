//! In-memory transport
//!
//! Keeps every frame the engine writes and can build the byte replies a
//! device would send back, so a whole host/device exchange runs without a
//! physical link.

use log::{debug, warn};

use eidolon_core::traits::{Transport, TransportError};
use eidolon_protocol::messages::{MSG_CONTEXT_COMMANDS, MSG_SPRITE_SHEET_CHUNK};
use eidolon_protocol::{
    CodecError, Command, CommandDecoder, DeviceMessage, Frame, FrameError, HostMessage,
    SpriteIndex,
};

/// Transport that records frames instead of writing them
#[derive(Debug, Clone)]
pub struct RecordingTransport {
    frames: Vec<Frame>,
    connected: bool,
    /// Refuse writes while connected
    reject: bool,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTransport {
    /// A connected transport with an empty log
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            connected: true,
            reject: false,
        }
    }

    /// A transport whose device is not attached
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            ..Self::new()
        }
    }

    pub fn set_connected(&mut self, connected: bool) {
        debug!("Link {}", if connected { "up" } else { "down" });
        self.connected = connected;
    }

    /// Make every later write fail with `Rejected`
    pub fn set_reject(&mut self, reject: bool) {
        self.reject = reject;
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Payloads of every context command batch, oldest first
    pub fn batches(&self) -> Vec<&[u8]> {
        self.payloads(MSG_CONTEXT_COMMANDS)
    }

    /// Context command bytes with batch boundaries removed
    pub fn command_bytes(&self) -> Vec<u8> {
        self.batches().concat()
    }

    /// Sprite sheet chunks as `(sheet_index, offset, data)`
    pub fn sprite_sheet_chunks(&self) -> Vec<(u8, u32, &[u8])> {
        self.frames
            .iter()
            .filter(|frame| frame.msg_type == MSG_SPRITE_SHEET_CHUNK)
            .filter_map(|frame| match HostMessage::from_frame(frame) {
                Ok(HostMessage::SpriteSheetChunk {
                    sheet_index,
                    offset,
                    data,
                }) => Some((sheet_index, offset, data)),
                _ => None,
            })
            .collect()
    }

    /// Decode every batch back into commands
    ///
    /// Sprite sheet selection carries across batches the way it does on the
    /// device.
    pub fn commands<N: SpriteIndex + ?Sized>(&self, names: &N) -> Result<Vec<Command>, CodecError> {
        let mut decoder = CommandDecoder::new(names);
        let mut commands = Vec::new();
        for batch in self.batches() {
            commands.extend(decoder.decode_all(batch)?);
        }
        Ok(commands)
    }

    fn payloads(&self, msg_type: u8) -> Vec<&[u8]> {
        self.frames
            .iter()
            .filter(|frame| frame.msg_type == msg_type)
            .map(|frame| frame.payload.as_slice())
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn send_frame(&mut self, frame: &Frame) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::Disconnected);
        }
        if self.reject {
            warn!("Rejecting frame 0x{:02x}", frame.msg_type);
            return Err(TransportError::Rejected);
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Wire bytes of one device message, ready for `Engine::receive`
pub fn device_reply(message: &DeviceMessage) -> Result<Vec<u8>, FrameError> {
    Ok(message.to_frame()?.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eidolon_protocol::{CommandEncoder, FrameParser, NoSprites};

    #[test]
    fn test_disconnected_refuses_frames() {
        let mut link = RecordingTransport::disconnected();
        let frame = Frame::empty(MSG_CONTEXT_COMMANDS);
        assert_eq!(link.send_frame(&frame), Err(TransportError::Disconnected));
        link.set_connected(true);
        assert!(link.send_frame(&frame).is_ok());
        assert_eq!(link.frames().len(), 1);
    }

    #[test]
    fn test_commands_decode_across_batches() {
        let mut encoder = CommandEncoder::new(&NoSprites);
        let first = encoder
            .encode_all(&[Command::SelectFillColor { color_index: 3 }])
            .unwrap();
        let second = encoder.encode_all(&[Command::Show]).unwrap();

        let mut link = RecordingTransport::new();
        link.send_frame(&Frame::new(MSG_CONTEXT_COMMANDS, &first).unwrap())
            .unwrap();
        link.send_frame(&Frame::new(MSG_CONTEXT_COMMANDS, &second).unwrap())
            .unwrap();

        assert_eq!(link.batches().len(), 2);
        assert_eq!(link.command_bytes(), vec![8, 3, 0]);
        assert_eq!(
            link.commands(&NoSprites).unwrap(),
            vec![Command::SelectFillColor { color_index: 3 }, Command::Show]
        );
    }

    #[test]
    fn test_device_reply_parses() {
        let bytes = device_reply(&DeviceMessage::Ready).unwrap();
        let mut parser = FrameParser::new();
        let (frames, dropped) = parser.feed_all(&bytes);
        assert_eq!(dropped, 0);
        assert_eq!(
            DeviceMessage::from_frame(&frames[0]).unwrap(),
            DeviceMessage::Ready
        );
    }
}
