//! Click-classifying buttons
//!
//! A button is fed its pressed/released level once per poll and reports the
//! events that level change produced. Sources are either a receiver channel
//! pushed out of its dead zone or a digital input.
//!
//! ```text
//!   Idle ──press (≥50ms after release)──▶ Pressed ──release──▶ Idle
//!                                           │
//!                                  every 1500ms: ExtraLongHold(n)
//! ```

use heapless::Vec;

use crate::channel::ChannelState;

/// Minimum time between a release and the next press (ms)
pub const DEBOUNCE_MS: u32 = 50;

/// Holds at least this long are long clicks (ms)
pub const CLICK_LENGTH_MS: u32 = 500;

/// A press starting this soon after a release counts as a multi-click (ms)
pub const MULTI_CLICK_GAP_MS: u32 = 500;

/// Interval between extra-long hold events (ms)
pub const EXTRA_LONG_HOLD_MS: u32 = 1500;

/// Events reported by a button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonEvent {
    /// Button went down
    Press,
    /// Button came up
    Release,
    /// Released after less than [`CLICK_LENGTH_MS`]
    ShortClick,
    /// Released after at least [`CLICK_LENGTH_MS`]
    LongClick,
    /// Still held; count of [`EXTRA_LONG_HOLD_MS`] intervals so far
    ExtraLongHold(u16),
    /// Released after one or more extra-long holds
    ExtraLongClick(u16),
}

/// Events produced by one update, in delivery order
pub type ButtonEvents = Vec<ButtonEvent, 3>;

/// Check whether a channel reading means "pressed"
///
/// Reversed buttons are pressed by pushing the channel below its zero.
pub fn channel_pressed(state: ChannelState, reversed: bool) -> bool {
    match state {
        ChannelState::Forward => !reversed,
        ChannelState::Reverse => reversed,
        ChannelState::Neutral => false,
    }
}

/// Button state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Button {
    pressed_at: Option<u32>,
    released_at: Option<u32>,
    holds: u16,
    multi_click: u8,
}

impl Button {
    pub const fn new() -> Self {
        Self {
            pressed_at: None,
            released_at: None,
            holds: 0,
            multi_click: 0,
        }
    }

    /// Check if the button is currently held
    pub fn is_pressed(&self) -> bool {
        self.pressed_at.is_some()
    }

    /// Presses that followed the previous release within
    /// [`MULTI_CLICK_GAP_MS`]; 0 for an isolated press
    pub fn multi_click(&self) -> u8 {
        self.multi_click
    }

    /// Extra-long holds reported during the current press
    pub fn holds(&self) -> u16 {
        self.holds
    }

    /// Feed the current level
    pub fn update(&mut self, pressed: bool, now: u32) -> ButtonEvents {
        let mut events = ButtonEvents::new();

        match (pressed, self.pressed_at) {
            (true, None) => {
                let debounced = self
                    .released_at
                    .map_or(true, |r| now.wrapping_sub(r) >= DEBOUNCE_MS);
                if debounced {
                    let quick = self
                        .released_at
                        .is_some_and(|r| now.wrapping_sub(r) < MULTI_CLICK_GAP_MS);
                    self.multi_click = if quick {
                        self.multi_click.saturating_add(1)
                    } else {
                        0
                    };
                    self.pressed_at = Some(now);
                    self.holds = 0;
                    let _ = events.push(ButtonEvent::Press);
                }
            }
            (true, Some(start)) => {
                let due = now.wrapping_sub(start) / EXTRA_LONG_HOLD_MS;
                if due > self.holds as u32 && self.holds < u16::MAX {
                    self.holds += 1;
                    let _ = events.push(ButtonEvent::ExtraLongHold(self.holds));
                }
            }
            (false, Some(start)) => {
                self.released_at = Some(now);
                self.pressed_at = None;
                let _ = events.push(ButtonEvent::Release);
                let click = if self.holds > 0 {
                    ButtonEvent::ExtraLongClick(self.holds)
                } else if now.wrapping_sub(start) >= CLICK_LENGTH_MS {
                    ButtonEvent::LongClick
                } else {
                    ButtonEvent::ShortClick
                };
                let _ = events.push(click);
                self.holds = 0;
            }
            (false, None) => {}
        }

        events
    }
}
