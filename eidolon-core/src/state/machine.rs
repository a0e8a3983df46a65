//! Device frame readiness
//!
//! The device acknowledges every `show` and `clear` with a `Ready` message.
//! Until it does, further frame requests are held back so the device never
//! receives two frames at once. Commands issued after a held request wait
//! behind it, so the link carries everything in call order.

use std::collections::VecDeque;

use super::events::ReadyEvent;

/// Link readiness states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadyState {
    /// No frame in flight
    #[default]
    Idle,
    /// A `show` or `clear` was sent and not yet acknowledged
    Busy,
    /// Engine shut down; nothing more is sent
    TornDown,
}

impl ReadyState {
    /// Check if a frame request may go out now
    pub fn can_send(&self) -> bool {
        matches!(self, ReadyState::Idle)
    }

    /// Check if this is the terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReadyState::TornDown)
    }

    /// Process an event and return the next state
    pub fn transition(self, event: ReadyEvent) -> Self {
        use ReadyEvent::*;
        use ReadyState::*;

        match (self, event) {
            (TornDown, _) => TornDown,
            (_, TearDown) => TornDown,

            (Idle, FrameSent) => Busy,
            (Busy, DeviceReady) => Idle,

            // A dropped link loses the in-flight frame
            (Busy, Disconnected) => Idle,

            _ => self,
        }
    }
}

/// Frame-level request held while the device is busy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameRequest {
    Show,
    Clear,
}

/// What to do with a frame request right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RequestOutcome {
    /// Send it immediately
    Send,
    /// Held until the next `Ready`
    Queued,
    /// Engine is torn down
    Dropped,
}

/// Link traffic waiting for the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Held {
    Request(FrameRequest),
    /// One encoded context command
    Command(Vec<u8>),
}

/// Tracks the ready state plus everything held back in call order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadyTracker {
    state: ReadyState,
    held: VecDeque<Held>,
}

impl ReadyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ReadyState {
        self.state
    }

    /// Check if any request is waiting for `Ready`
    pub fn has_queued(&self) -> bool {
        self.held.iter().any(|held| matches!(held, Held::Request(_)))
    }

    /// Check if new commands must wait behind a held request
    pub fn is_holding(&self) -> bool {
        !self.held.is_empty()
    }

    /// Ask to send a frame request
    ///
    /// A request identical to the one held last, with nothing in between,
    /// collapses into it.
    pub fn request(&mut self, request: FrameRequest) -> RequestOutcome {
        match self.state {
            ReadyState::TornDown => RequestOutcome::Dropped,
            ReadyState::Idle if self.held.is_empty() => RequestOutcome::Send,
            _ => {
                if self.held.back() != Some(&Held::Request(request)) {
                    self.held.push_back(Held::Request(request));
                }
                RequestOutcome::Queued
            }
        }
    }

    /// Hold an encoded command behind the queued requests
    pub fn hold(&mut self, command: Vec<u8>) {
        self.held.push_back(Held::Command(command));
    }

    /// Take the next held item that may go out now
    ///
    /// Commands are released up to the next request; a request is released
    /// only while the device is idle.
    pub fn next_released(&mut self) -> Option<Held> {
        match self.held.front()? {
            Held::Request(_) if !self.state.can_send() => None,
            _ => self.held.pop_front(),
        }
    }

    /// Record that a request went out on the link
    pub fn frame_sent(&mut self) {
        self.state = self.state.transition(ReadyEvent::FrameSent);
    }

    /// Handle the device's `Ready`
    pub fn device_ready(&mut self) {
        self.state = self.state.transition(ReadyEvent::DeviceReady);
    }

    /// Drop any in-flight frame and everything held
    pub fn disconnected(&mut self) {
        self.state = self.state.transition(ReadyEvent::Disconnected);
        self.held.clear();
    }

    pub fn tear_down(&mut self) {
        self.state = self.state.transition(ReadyEvent::TearDown);
        self.held.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_to_busy_and_back() {
        let state = ReadyState::Idle;
        let busy = state.transition(ReadyEvent::FrameSent);
        assert_eq!(busy, ReadyState::Busy);
        assert_eq!(busy.transition(ReadyEvent::DeviceReady), ReadyState::Idle);
    }

    #[test]
    fn test_teardown_is_terminal() {
        for state in [ReadyState::Idle, ReadyState::Busy] {
            let down = state.transition(ReadyEvent::TearDown);
            assert_eq!(down, ReadyState::TornDown);
        }
        let events = [
            ReadyEvent::FrameSent,
            ReadyEvent::DeviceReady,
            ReadyEvent::Disconnected,
        ];
        for event in events {
            assert_eq!(ReadyState::TornDown.transition(event), ReadyState::TornDown);
        }
    }

    #[test]
    fn test_ready_while_idle_is_ignored() {
        assert_eq!(
            ReadyState::Idle.transition(ReadyEvent::DeviceReady),
            ReadyState::Idle
        );
    }

    fn release_all(tracker: &mut ReadyTracker) -> Vec<Held> {
        core::iter::from_fn(|| tracker.next_released()).collect()
    }

    #[test]
    fn test_busy_requests_are_queued() {
        let mut tracker = ReadyTracker::new();
        assert_eq!(tracker.request(FrameRequest::Show), RequestOutcome::Send);
        tracker.frame_sent();

        assert_eq!(tracker.request(FrameRequest::Show), RequestOutcome::Queued);
        assert_eq!(tracker.request(FrameRequest::Show), RequestOutcome::Queued);
        assert!(tracker.has_queued());
        assert!(release_all(&mut tracker).is_empty());

        // Collapsed: one show comes back, then nothing
        tracker.device_ready();
        assert_eq!(tracker.next_released(), Some(Held::Request(FrameRequest::Show)));
        tracker.frame_sent();
        tracker.device_ready();
        assert_eq!(tracker.next_released(), None);
        assert_eq!(tracker.state(), ReadyState::Idle);
    }

    #[test]
    fn test_requests_keep_call_order() {
        let mut tracker = ReadyTracker::new();
        tracker.frame_sent();
        tracker.request(FrameRequest::Show);
        tracker.request(FrameRequest::Clear);

        tracker.device_ready();
        assert_eq!(tracker.next_released(), Some(Held::Request(FrameRequest::Show)));
        tracker.frame_sent();
        assert_eq!(tracker.next_released(), None);
        tracker.device_ready();
        assert_eq!(tracker.next_released(), Some(Held::Request(FrameRequest::Clear)));
    }

    #[test]
    fn test_commands_wait_behind_held_request() {
        let mut tracker = ReadyTracker::new();
        tracker.frame_sent();
        assert!(!tracker.is_holding());

        tracker.request(FrameRequest::Show);
        assert!(tracker.is_holding());
        tracker.hold(vec![56]);
        // Not adjacent to the first show, so kept
        tracker.request(FrameRequest::Show);
        tracker.hold(vec![58]);

        tracker.device_ready();
        assert_eq!(tracker.next_released(), Some(Held::Request(FrameRequest::Show)));
        tracker.frame_sent();
        assert_eq!(release_all(&mut tracker), vec![Held::Command(vec![56])]);

        tracker.device_ready();
        assert_eq!(tracker.next_released(), Some(Held::Request(FrameRequest::Show)));
        tracker.frame_sent();
        assert_eq!(release_all(&mut tracker), vec![Held::Command(vec![58])]);
        assert!(!tracker.is_holding());
    }

    #[test]
    fn test_disconnect_drops_queue() {
        let mut tracker = ReadyTracker::new();
        tracker.frame_sent();
        tracker.request(FrameRequest::Clear);
        tracker.hold(vec![1]);
        tracker.disconnected();
        assert_eq!(tracker.state(), ReadyState::Idle);
        assert!(!tracker.has_queued());
        assert!(!tracker.is_holding());
    }

    #[test]
    fn test_torn_down_drops_requests() {
        let mut tracker = ReadyTracker::new();
        tracker.tear_down();
        assert_eq!(tracker.request(FrameRequest::Show), RequestOutcome::Dropped);
        assert!(tracker.state().is_terminal());
    }
}
