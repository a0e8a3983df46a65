//! Events produced by the engine and the ready state machine

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::{Channel, Sender};

use eidolon_protocol::{Brightness, DisplayInformation, Rgb};

use super::helper::StateKey;

/// Channel capacity for engine events
pub const EVENT_CAPACITY: usize = 32;

/// Host-owned channel the engine reports to
pub type EventChannel = Channel<NoopRawMutex, EngineEvent, EVENT_CAPACITY>;

/// Engine's end of an [`EventChannel`]
pub type EventSender<'ch> = Sender<'ch, NoopRawMutex, EngineEvent, EVENT_CAPACITY>;

/// Inputs to the [`ReadyState`](super::ReadyState) machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadyEvent {
    /// A `show` or `clear` went out on the link
    FrameSent,
    /// Device finished the previous frame
    DeviceReady,
    /// Link dropped
    Disconnected,
    /// Engine shut down
    TearDown,
}

/// Notifications for the host
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Context state keys changed by one call
    ContextState { changed: Vec<StateKey> },
    /// Color table entry replaced
    Color { color_index: u8, color: Rgb },
    /// Per-color opacity replaced
    ColorOpacity { color_index: u8, opacity: f32 },
    /// Every per-color opacity replaced
    Opacity { opacity: f32 },
    Brightness(Brightness),
    /// Device can take the next frame
    Ready,
    /// Device reported its geometry and pixel depth
    DisplayInformation(DisplayInformation),
    /// Progress of a sprite sheet upload, 0 to 100
    SpriteSheetUploadProgress { sheet_name: String, progress: u8 },
}

impl EngineEvent {
    /// Check if this event changes what a committed frame looks like
    pub fn is_recolor(&self) -> bool {
        matches!(
            self,
            EngineEvent::Color { .. }
                | EngineEvent::ColorOpacity { .. }
                | EngineEvent::Opacity { .. }
                | EngineEvent::Brightness(_)
        )
    }

    /// Check if this event came from the device
    pub fn is_device_event(&self) -> bool {
        matches!(
            self,
            EngineEvent::Ready
                | EngineEvent::DisplayInformation(_)
                | EngineEvent::SpriteSheetUploadProgress { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recolor_events() {
        assert!(EngineEvent::Opacity { opacity: 0.5 }.is_recolor());
        assert!(EngineEvent::Brightness(Brightness::Low).is_recolor());
        assert!(!EngineEvent::Ready.is_recolor());
        assert!(!EngineEvent::ContextState { changed: Vec::new() }.is_recolor());
    }

    #[test]
    fn test_device_events() {
        assert!(EngineEvent::Ready.is_device_event());
        let progress = EngineEvent::SpriteSheetUploadProgress {
            sheet_name: "ui".into(),
            progress: 50,
        };
        assert!(progress.is_device_event());
        assert!(!EngineEvent::Opacity { opacity: 1.0 }.is_device_event());
    }

    #[test]
    fn test_channel_roundtrip() {
        let channel = EventChannel::new();
        let sender: EventSender<'_> = channel.sender();
        sender.try_send(EngineEvent::Ready).unwrap();
        assert_eq!(channel.try_receive().unwrap(), EngineEvent::Ready);
        assert!(channel.try_receive().is_err());
    }
}
