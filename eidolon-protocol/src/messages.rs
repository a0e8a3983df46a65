//! Message types carried inside link frames
//!
//! Message types are divided into two categories:
//! - Device → Host: display information, brightness, readiness, upload progress
//! - Host → Device: context command batches, brightness, sprite sheet uploads

use crate::display::{Brightness, DisplayInformation};
use crate::frame::{Frame, FrameError, MAX_PAYLOAD_SIZE};
use heapless::Vec;

// Message type IDs: Device → Host
pub const MSG_DISPLAY_INFORMATION: u8 = 0x02;
pub const MSG_BRIGHTNESS: u8 = 0x04;
pub const MSG_READY: u8 = 0x07;
pub const MSG_SPRITE_SHEET_PROGRESS: u8 = 0x08;

// Message type IDs: Host → Device
pub const MSG_GET_DISPLAY_INFORMATION: u8 = 0x02;
pub const MSG_GET_BRIGHTNESS: u8 = 0x04;
pub const MSG_SET_BRIGHTNESS: u8 = 0x05;
pub const MSG_CONTEXT_COMMANDS: u8 = 0x06;
pub const MSG_SPRITE_SHEET_CHUNK: u8 = 0x09;

/// Header of a sprite sheet chunk: sheet index and u32 offset
const SPRITE_SHEET_CHUNK_HEADER: usize = 5;

/// Largest blob slice one sprite sheet chunk can carry
pub const MAX_SPRITE_SHEET_CHUNK: usize = MAX_PAYLOAD_SIZE - SPRITE_SHEET_CHUNK_HEADER;

/// Messages from the host to the display
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostMessage<'a> {
    /// A batch of encoded context commands
    ContextCommands(&'a [u8]),
    /// Ask the device to report its display information
    GetDisplayInformation,
    /// Ask the device to report its brightness
    GetBrightness,
    /// Set the global brightness
    SetBrightness(Brightness),
    /// Part of a serialized sprite sheet
    SpriteSheetChunk {
        sheet_index: u8,
        offset: u32,
        data: &'a [u8],
    },
}

impl<'a> HostMessage<'a> {
    /// Encode this message into a frame
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        match self {
            HostMessage::ContextCommands(bytes) => Frame::new(MSG_CONTEXT_COMMANDS, bytes),
            HostMessage::GetDisplayInformation => Ok(Frame::empty(MSG_GET_DISPLAY_INFORMATION)),
            HostMessage::GetBrightness => Ok(Frame::empty(MSG_GET_BRIGHTNESS)),
            HostMessage::SetBrightness(level) => Frame::new(MSG_SET_BRIGHTNESS, &[level.to_byte()]),
            HostMessage::SpriteSheetChunk {
                sheet_index,
                offset,
                data,
            } => {
                // Payload: [sheet][offset u32][data...]
                let mut payload = Vec::<u8, MAX_PAYLOAD_SIZE>::new();
                payload
                    .push(*sheet_index)
                    .map_err(|_| FrameError::PayloadTooLarge)?;
                payload
                    .extend_from_slice(&offset.to_le_bytes())
                    .map_err(|_| FrameError::PayloadTooLarge)?;
                payload
                    .extend_from_slice(data)
                    .map_err(|_| FrameError::PayloadTooLarge)?;

                Frame::new(MSG_SPRITE_SHEET_CHUNK, &payload)
            }
        }
    }

    /// Parse a host message from a frame (device side)
    pub fn from_frame(frame: &'a Frame) -> Result<Self, FrameError> {
        match frame.msg_type {
            MSG_CONTEXT_COMMANDS => Ok(HostMessage::ContextCommands(&frame.payload)),
            MSG_GET_DISPLAY_INFORMATION => Ok(HostMessage::GetDisplayInformation),
            MSG_GET_BRIGHTNESS => Ok(HostMessage::GetBrightness),
            MSG_SET_BRIGHTNESS => {
                let byte = *frame.payload.first().ok_or(FrameError::InvalidFrame)?;
                let level = Brightness::from_byte(byte).ok_or(FrameError::InvalidFrame)?;
                Ok(HostMessage::SetBrightness(level))
            }
            MSG_SPRITE_SHEET_CHUNK => {
                if frame.payload.len() < SPRITE_SHEET_CHUNK_HEADER {
                    return Err(FrameError::InvalidFrame);
                }
                let p = &frame.payload;
                Ok(HostMessage::SpriteSheetChunk {
                    sheet_index: p[0],
                    offset: u32::from_le_bytes([p[1], p[2], p[3], p[4]]),
                    data: &p[SPRITE_SHEET_CHUNK_HEADER..],
                })
            }
            _ => Err(FrameError::InvalidFrame),
        }
    }
}

/// Messages parsed from device-originated frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceMessage {
    /// Display dimensions and pixel depth
    DisplayInformation(DisplayInformation),
    /// Current brightness
    Brightness(Brightness),
    /// The device finished the last command batch
    Ready,
    /// Sprite sheet upload progress in percent
    SpriteSheetUploadProgress { sheet_index: u8, progress: u8 },
}

impl DeviceMessage {
    /// Parse a message from a frame
    pub fn from_frame(frame: &Frame) -> Result<Self, FrameError> {
        match frame.msg_type {
            MSG_DISPLAY_INFORMATION => {
                let info = DisplayInformation::from_bytes(&frame.payload)
                    .ok_or(FrameError::InvalidFrame)?;
                Ok(DeviceMessage::DisplayInformation(info))
            }
            MSG_BRIGHTNESS => {
                let byte = *frame.payload.first().ok_or(FrameError::InvalidFrame)?;
                let level = Brightness::from_byte(byte).ok_or(FrameError::InvalidFrame)?;
                Ok(DeviceMessage::Brightness(level))
            }
            MSG_READY => Ok(DeviceMessage::Ready),
            MSG_SPRITE_SHEET_PROGRESS => {
                if frame.payload.len() < 2 {
                    return Err(FrameError::InvalidFrame);
                }
                Ok(DeviceMessage::SpriteSheetUploadProgress {
                    sheet_index: frame.payload[0],
                    progress: frame.payload[1].min(100),
                })
            }
            _ => Err(FrameError::InvalidFrame),
        }
    }

    /// Encode this message into a frame (for testing or simulation)
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        match self {
            DeviceMessage::DisplayInformation(info) => {
                Frame::new(MSG_DISPLAY_INFORMATION, &info.to_bytes())
            }
            DeviceMessage::Brightness(level) => Frame::new(MSG_BRIGHTNESS, &[level.to_byte()]),
            DeviceMessage::Ready => Ok(Frame::empty(MSG_READY)),
            DeviceMessage::SpriteSheetUploadProgress {
                sheet_index,
                progress,
            } => Frame::new(MSG_SPRITE_SHEET_PROGRESS, &[*sheet_index, *progress]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::PixelDepth;

    #[test]
    fn test_host_message_commands() {
        let msg = HostMessage::ContextCommands(&[2, 1, 255, 0, 0, 0]);
        let frame = msg.to_frame().unwrap();
        assert_eq!(frame.msg_type, MSG_CONTEXT_COMMANDS);
        assert_eq!(&frame.payload[..], &[2, 1, 255, 0, 0, 0]);
        assert_eq!(HostMessage::from_frame(&frame).unwrap(), msg);
    }

    #[test]
    fn test_host_message_brightness() {
        let frame = HostMessage::SetBrightness(Brightness::High).to_frame().unwrap();
        assert_eq!(frame.msg_type, MSG_SET_BRIGHTNESS);
        assert_eq!(&frame.payload[..], &[3]);

        let bad = Frame::new(MSG_SET_BRIGHTNESS, &[9]).unwrap();
        assert_eq!(HostMessage::from_frame(&bad), Err(FrameError::InvalidFrame));
    }

    #[test]
    fn test_sprite_sheet_chunk() {
        let data = [7u8; 10];
        let msg = HostMessage::SpriteSheetChunk {
            sheet_index: 1,
            offset: 300,
            data: &data,
        };
        let frame = msg.to_frame().unwrap();
        assert_eq!(&frame.payload[..5], &[1, 0x2C, 0x01, 0, 0]);
        assert_eq!(HostMessage::from_frame(&frame).unwrap(), msg);
    }

    #[test]
    fn test_sprite_sheet_chunk_too_large() {
        let data = [0u8; MAX_SPRITE_SHEET_CHUNK + 1];
        let msg = HostMessage::SpriteSheetChunk {
            sheet_index: 0,
            offset: 0,
            data: &data,
        };
        assert_eq!(msg.to_frame(), Err(FrameError::PayloadTooLarge));
    }

    #[test]
    fn test_device_message_ready() {
        let frame = Frame::empty(MSG_READY);
        assert_eq!(DeviceMessage::from_frame(&frame).unwrap(), DeviceMessage::Ready);
    }

    #[test]
    fn test_device_message_display_information() {
        let original = DeviceMessage::DisplayInformation(DisplayInformation {
            width: 128,
            height: 64,
            pixel_depth: PixelDepth::Two,
        });
        let frame = original.to_frame().unwrap();
        assert_eq!(DeviceMessage::from_frame(&frame).unwrap(), original);

        let short = Frame::new(MSG_DISPLAY_INFORMATION, &[128, 0]).unwrap();
        assert_eq!(DeviceMessage::from_frame(&short), Err(FrameError::InvalidFrame));
    }

    #[test]
    fn test_device_message_progress_clamped() {
        let frame = Frame::new(MSG_SPRITE_SHEET_PROGRESS, &[2, 150]).unwrap();
        assert_eq!(
            DeviceMessage::from_frame(&frame).unwrap(),
            DeviceMessage::SpriteSheetUploadProgress {
                sheet_index: 2,
                progress: 100
            }
        );
    }

    #[test]
    fn test_unknown_device_message() {
        let frame = Frame::empty(0x7F);
        assert_eq!(DeviceMessage::from_frame(&frame), Err(FrameError::InvalidFrame));
    }
}
