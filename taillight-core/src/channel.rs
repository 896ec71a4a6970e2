//! Logical channels
//!
//! A logical channel turns raw samples from one receiver channel into a
//! tri-state reading around a calibrated zero. Samples inside the dead zone
//! (`|sample - zero| <= threshold`) read as neutral.

/// Tri-state channel reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelState {
    /// Above the dead zone
    Forward,
    /// Inside the dead zone
    #[default]
    Neutral,
    /// Below the dead zone
    Reverse,
}

impl ChannelState {
    /// Classify a sample against a zero reference
    pub fn classify(sample: u16, zero: u16, threshold: u16) -> Self {
        let offset = sample as i32 - zero as i32;
        let threshold = threshold as i32;
        if offset > threshold {
            ChannelState::Forward
        } else if offset < -threshold {
            ChannelState::Reverse
        } else {
            ChannelState::Neutral
        }
    }
}

/// One receiver channel with its zero reference and dead zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LogicalChannel {
    id: u8,
    threshold: u16,
    zero: u16,
    state: ChannelState,
    offset: i32,
}

impl LogicalChannel {
    /// Create a channel bound to receiver channel `id` (0 = unbound)
    pub const fn new(id: u8, threshold: u16) -> Self {
        Self {
            id,
            threshold,
            zero: 1500,
            state: ChannelState::Neutral,
            offset: 0,
        }
    }

    /// Receiver channel this reads from
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Check if the channel is bound to a receiver channel
    pub fn is_bound(&self) -> bool {
        self.id != 0
    }

    /// Set the calibrated zero reference
    pub fn set_zero(&mut self, zero: u16) {
        self.zero = zero;
    }

    /// Calibrated zero reference
    pub fn zero(&self) -> u16 {
        self.zero
    }

    /// Change the dead zone half-width
    pub fn set_threshold(&mut self, threshold: u16) {
        self.threshold = threshold;
    }

    /// Rebind to another receiver channel; the reading returns to neutral
    pub fn rebind(&mut self, id: u8) {
        if self.id != id {
            self.id = id;
            self.state = ChannelState::Neutral;
            self.offset = 0;
        }
    }

    /// Apply a new sample
    pub fn update(&mut self, sample: u16) -> ChannelState {
        self.offset = sample as i32 - self.zero as i32;
        self.state = ChannelState::classify(sample, self.zero, self.threshold);
        self.state
    }

    /// Force a reading without a sample (digital sources)
    pub fn set_state(&mut self, state: ChannelState) {
        self.state = state;
    }

    /// Current reading
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Signed distance of the last sample from zero
    pub fn offset(&self) -> i32 {
        self.offset
    }

    pub fn forward(&self) -> bool {
        self.state == ChannelState::Forward
    }

    pub fn neutral(&self) -> bool {
        self.state == ChannelState::Neutral
    }

    pub fn reverse(&self) -> bool {
        self.state == ChannelState::Reverse
    }
}
