//! Drawing context state and link readiness
//!
//! [`ContextState`] is the single record both the device and the preview
//! draw from. It only changes through [`StateHelper`], which reports exactly
//! which keys a call touched.

pub mod context;
pub mod events;
pub mod helper;
pub mod machine;

pub use context::{ContextState, Insets, DEFAULT_NUMBER_OF_COLORS};
pub use events::{EngineEvent, EventChannel, EventSender, ReadyEvent, EVENT_CAPACITY};
pub use helper::{StateChange, StateHelper, StateKey};
pub use machine::{FrameRequest, Held, ReadyState, ReadyTracker, RequestOutcome};
