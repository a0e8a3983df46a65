//! The display context engine
//!
//! One [`Engine`] owns the context state, the color table, the draw queue
//! and the sprite sheets for one display. Every call validates first, then
//! encodes its command, then mutates, then hands the bytes to the batcher,
//! so a rejected call never reaches the device or the preview.
//!
//! The engine is single-threaded; hosts calling it from several threads
//! must serialize the calls themselves.

mod context;
mod draw;
mod sprites;
#[cfg(test)]
mod testing;

use log::{debug, info, trace, warn};

use eidolon_protocol::{
    Command, CommandEncoder, CommandTag, DeviceMessage, DisplayInformation, Frame, FrameParser,
    HostMessage, SpriteIndex,
};

use crate::batch::CommandBatcher;
use crate::color::ColorModel;
use crate::config::{ConfigError, EngineConfig};
use crate::error::EngineError;
use crate::geometry::BoundingBox;
use crate::queue::DrawQueue;
use crate::sprite::{SpriteSheetRegistry, SpriteStack};
use crate::state::{
    ContextState, EngineEvent, EventSender, FrameRequest, Held, ReadyState, ReadyTracker,
    RequestOutcome, StateHelper,
};
use crate::traits::{RasterizationBackend, Transport, TransportError};

/// Host-side engine for one display
pub struct Engine<'ch, B: RasterizationBackend, T: Transport> {
    config: EngineConfig,
    width: u16,
    height: u16,
    helper: StateHelper,
    colors: ColorModel,
    queue: DrawQueue,
    sheets: SpriteSheetRegistry,
    sprites: SpriteStack,
    saved: Vec<ContextState>,
    batcher: CommandBatcher,
    ready: ReadyTracker,
    parser: FrameParser,
    backend: B,
    transport: Option<T>,
    events: Option<EventSender<'ch>>,
}

impl<'ch, B: RasterizationBackend, T: Transport> Engine<'ch, B, T> {
    /// Create an engine drawing onto `backend` with no transport attached
    pub fn new(config: EngineConfig, backend: B) -> Result<Self, ConfigError> {
        config.validate().map_err(|e| {
            warn!("Rejected engine config: {}", e);
            e
        })?;
        info!(
            "Engine: {}x{}, {} colors, {} byte batches",
            config.width, config.height, config.number_of_colors, config.max_command_data_length
        );
        Ok(Self {
            width: config.width,
            height: config.height,
            helper: StateHelper::new(config.number_of_colors),
            colors: ColorModel::new(config.number_of_colors, config.brightness),
            queue: DrawQueue::new(),
            sheets: SpriteSheetRegistry::new(),
            sprites: SpriteStack::new(),
            saved: Vec::new(),
            batcher: CommandBatcher::new(config.max_command_data_length),
            ready: ReadyTracker::new(),
            parser: FrameParser::new(),
            backend,
            transport: None,
            events: None,
            config,
        })
    }

    /// Attach the link to the device
    pub fn with_transport(mut self, transport: T) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Report events to a host-owned channel
    pub fn with_events(mut self, events: EventSender<'ch>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &ContextState {
        self.helper.state()
    }

    pub fn colors(&self) -> &ColorModel {
        &self.colors
    }

    pub fn queue(&self) -> &DrawQueue {
        &self.queue
    }

    pub fn sprite_sheets(&self) -> &SpriteSheetRegistry {
        &self.sheets
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    pub fn transport_mut(&mut self) -> Option<&mut T> {
        self.transport.as_mut()
    }

    /// Encoded commands not yet flushed
    pub fn batched(&self) -> &[u8] {
        self.batcher.pending()
    }

    /// Always `Idle` while no transport is connected
    pub fn ready_state(&self) -> ReadyState {
        if self.is_connected() {
            self.ready.state()
        } else if self.ready.state().is_terminal() {
            ReadyState::TornDown
        } else {
            ReadyState::Idle
        }
    }

    /// Full display area
    pub fn canvas(&self) -> BoundingBox {
        BoundingBox::new(0.0, 0.0, self.width as f32, self.height as f32)
    }

    /// Commit the pending frame and present it
    ///
    /// The preview updates immediately. On the link the `show` goes out now
    /// when the device is idle, or once it reports ready otherwise; commands
    /// issued after a held `show` wait behind it.
    pub fn show(&mut self) -> Result<(), EngineError> {
        self.check_top_level()?;
        let bytes = self.encode(&Command::Show)?;
        self.queue.commit();
        self.replay();
        self.request_frame(FrameRequest::Show, bytes)
    }

    /// Drop both frames and clear the device
    ///
    /// The preview is redrawn with only the background.
    pub fn clear(&mut self) -> Result<(), EngineError> {
        self.check_top_level()?;
        let bytes = self.encode(&Command::Clear)?;
        self.queue.clear();
        self.replay();
        self.request_frame(FrameRequest::Clear, bytes)
    }

    /// Send any batched commands now
    pub fn flush(&mut self) -> Result<(), EngineError> {
        match self.transport.as_mut() {
            Some(transport) if transport.is_connected() => {
                self.batcher.flush(transport)?;
            }
            _ => self.batcher.clear(),
        }
        Ok(())
    }

    /// Ask the device for its display information
    pub fn request_display_information(&mut self) -> Result<(), EngineError> {
        self.check_live()?;
        let frame = HostMessage::GetDisplayInformation
            .to_frame()
            .map_err(TransportError::from)?;
        self.send_frame(&frame)
    }

    /// Ask the device for its brightness
    pub fn request_brightness(&mut self) -> Result<(), EngineError> {
        self.check_live()?;
        let frame = HostMessage::GetBrightness
            .to_frame()
            .map_err(TransportError::from)?;
        self.send_frame(&frame)
    }

    /// Feed bytes received from the device
    ///
    /// Malformed frames and unknown messages are logged and skipped.
    pub fn receive(&mut self, bytes: &[u8]) -> Result<(), EngineError> {
        let (frames, rejected) = self.parser.feed_all(bytes);
        if rejected > 0 {
            warn!("Dropped {} malformed frames from the device", rejected);
        }
        for frame in frames {
            match DeviceMessage::from_frame(&frame) {
                Ok(message) => self.handle_message(message)?,
                Err(e) => warn!("Ignoring device frame 0x{:02x}: {:?}", frame.msg_type, e),
            }
        }
        Ok(())
    }

    /// Handle a lost link
    ///
    /// Clears both queues, the batch, saved contexts and the context state.
    pub fn disconnect(&mut self) {
        info!("Device disconnected, resetting context");
        self.queue.clear();
        self.batcher.clear();
        self.parser.reset();
        self.saved.clear();
        self.sprites.unwind();
        self.ready.disconnected();
        let changed = self.helper.reset();
        if !changed.is_empty() {
            self.emit_event(EngineEvent::ContextState { changed });
        }
    }

    /// Shut the engine down; every later call fails with `TornDown`
    pub fn tear_down(&mut self) {
        info!("Engine torn down");
        self.batcher.clear();
        self.ready.tear_down();
    }

    fn handle_message(&mut self, message: DeviceMessage) -> Result<(), EngineError> {
        match message {
            DeviceMessage::Ready => {
                debug!("Device ready");
                self.emit_event(EngineEvent::Ready);
                self.ready.device_ready();
                self.release_held()?;
            }
            DeviceMessage::DisplayInformation(info) => self.apply_display_information(info),
            DeviceMessage::Brightness(brightness) => {
                if self.colors.set_brightness(brightness) {
                    self.emit_event(EngineEvent::Brightness(brightness));
                    self.replay();
                }
            }
            DeviceMessage::SpriteSheetUploadProgress {
                sheet_index,
                progress,
            } => match self.sheets.sheet_name(sheet_index) {
                Some(name) => {
                    let sheet_name = name.to_string();
                    self.emit_event(EngineEvent::SpriteSheetUploadProgress {
                        sheet_name,
                        progress,
                    });
                }
                None => warn!("Upload progress for unknown sprite sheet {}", sheet_index),
            },
        }
        Ok(())
    }

    fn apply_display_information(&mut self, info: DisplayInformation) {
        let number_of_colors = info.number_of_colors();
        info!(
            "Display: {}x{}, {} colors",
            info.width, info.height, number_of_colors
        );
        self.width = info.width;
        self.height = info.height;
        self.colors.resize(number_of_colors);
        self.saved.clear();
        let changed = self.helper.resize(number_of_colors);
        self.emit_event(EngineEvent::DisplayInformation(info));
        if !changed.is_empty() {
            self.emit_event(EngineEvent::ContextState { changed });
        }
        self.replay();
    }

    fn request_frame(
        &mut self,
        request: FrameRequest,
        bytes: Option<Vec<u8>>,
    ) -> Result<(), EngineError> {
        if !self.is_connected() {
            self.batcher.clear();
            return Ok(());
        }
        match self.ready.request(request) {
            RequestOutcome::Send => {
                self.transmit(bytes, true)?;
                self.ready.frame_sent();
            }
            RequestOutcome::Queued => {
                debug!("{:?} queued until the device is ready", request);
                self.release_held()?;
            }
            RequestOutcome::Dropped => warn!("{:?} dropped after teardown", request),
        }
        Ok(())
    }

    /// Send whatever held traffic the device can take now
    fn release_held(&mut self) -> Result<(), EngineError> {
        let mut released = false;
        while let Some(held) = self.ready.next_released() {
            released = true;
            match held {
                Held::Request(request) => {
                    debug!("Sending queued {:?}", request);
                    let bytes = self.encode(&request_command(request))?;
                    self.transmit(bytes, true)?;
                    self.ready.frame_sent();
                }
                Held::Command(bytes) => self.transmit(Some(bytes), false)?,
            }
        }
        if released {
            self.flush()?;
        }
        Ok(())
    }

    fn check_live(&self) -> Result<(), EngineError> {
        if self.ready.state().is_terminal() {
            warn!("Call on a torn down engine");
            return Err(EngineError::TornDown);
        }
        Ok(())
    }

    /// Reject calls that only make sense outside sprite programs
    fn check_top_level(&self) -> Result<(), EngineError> {
        self.check_live()?;
        if self.in_sprite() {
            warn!("Command not allowed inside a sprite");
            return Err(EngineError::InvalidCommand);
        }
        Ok(())
    }

    /// Reject commands a sprite program may not contain while inside one
    fn check_allowed(&self, tag: CommandTag) -> Result<(), EngineError> {
        self.check_live()?;
        if self.in_sprite() && !tag.is_sprite_context() {
            warn!("{:?} not allowed inside a sprite", tag);
            return Err(EngineError::InvalidCommand);
        }
        Ok(())
    }

    fn in_sprite(&self) -> bool {
        !self.sprites.is_empty()
    }

    fn is_connected(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| t.is_connected())
    }

    /// Encode a command for the link, or `None` inside sprite programs
    fn encode(&self, command: &Command) -> Result<Option<Vec<u8>>, EngineError> {
        if self.in_sprite() {
            return Ok(None);
        }
        let selected = self.helper.state().sprite_sheet_name.as_deref();
        let mut encoder = CommandEncoder::new(&self.sheets).with_sprite_sheet(selected);
        let bytes = encoder.encode(command).map_err(|e| {
            warn!("Failed to encode {:?}: {:?}", command.tag(), e);
            EngineError::from(e)
        })?;
        self.batcher.check_fits(&bytes)?;
        Ok(Some(bytes))
    }

    /// Hand encoded bytes to the batcher, or hold them behind a queued request
    fn send(&mut self, bytes: Option<Vec<u8>>, flush: bool) -> Result<(), EngineError> {
        match bytes {
            Some(bytes) if self.ready.is_holding() && self.is_connected() => {
                trace!("Holding {} command bytes until the device is ready", bytes.len());
                self.ready.hold(bytes);
                Ok(())
            }
            bytes => self.transmit(bytes, flush),
        }
    }

    fn transmit(&mut self, bytes: Option<Vec<u8>>, flush: bool) -> Result<(), EngineError> {
        let Some(bytes) = bytes else {
            return Ok(());
        };
        let Some(transport) = self.transport.as_mut().filter(|t| t.is_connected()) else {
            trace!("No transport, {} command bytes not sent", bytes.len());
            return Ok(());
        };
        self.batcher.push(transport, &bytes)?;
        if flush {
            self.batcher.flush(transport)?;
        }
        Ok(())
    }

    /// Send a non-command frame, flushing batched commands ahead of it
    fn send_frame(&mut self, frame: &Frame) -> Result<(), EngineError> {
        let Some(transport) = self.transport.as_mut().filter(|t| t.is_connected()) else {
            return Ok(());
        };
        self.batcher.flush(transport)?;
        transport.send_frame(frame).map_err(|e| {
            warn!("Failed to send frame 0x{:02x}: {:?}", frame.msg_type, e);
            EngineError::from(e)
        })
    }

    fn emit_event(&self, event: EngineEvent) {
        if self.in_sprite() {
            return;
        }
        if let Some(events) = &self.events {
            if events.try_send(event).is_err() {
                warn!("Event channel full, event dropped");
            }
        }
    }

    /// Redraw the committed frame with the current colors
    fn replay(&mut self) {
        if self.in_sprite() {
            return;
        }
        let canvas = self.canvas();
        self.queue.replay(&mut self.backend, &self.colors, &canvas);
    }
}

fn request_command(request: FrameRequest) -> Command {
    match request {
        FrameRequest::Show => Command::Show,
        FrameRequest::Clear => Command::Clear,
    }
}

