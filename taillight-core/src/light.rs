//! Animated lights
//!
//! A light shows either its steady level or the highest-priority animation
//! in its priority stack. A minimum-priority gate hides every animation
//! below it, which is how the menu blanks normal lighting while it is open.
//! Writes to the output are skipped when the level has not changed.

use heapless::Vec;

use crate::animation::{Animation, Completion, Curve, OnComplete, Priority};
use crate::config::LightConfig;
use crate::traits::LightOutput;

/// Distinct priorities a light can hold at once
pub const MAX_SLOTS: usize = 8;

/// Selected light mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LightMode {
    #[default]
    Off,
    /// Low beam
    Low,
    /// High beam
    High,
}

/// What the vehicle wants a light to show when no animation is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LightIntent {
    pub mode: LightMode,
    pub brake: bool,
    pub flash: bool,
}

impl LightIntent {
    /// Steady level for a light with `config`
    pub fn level(&self, config: &LightConfig) -> u8 {
        if self.brake && config.brake > 0 {
            config.brake
        } else if self.flash && config.flash > 0 {
            config.flash
        } else {
            match self.mode {
                LightMode::High => config.mode2,
                LightMode::Low => config.mode1,
                LightMode::Off => 0,
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    priority: Priority,
    animation: Animation,
}

/// One light: an output, its configuration, and its animation stack
#[derive(Debug)]
pub struct Light<O> {
    output: O,
    config: LightConfig,
    level: u8,
    written: Option<u8>,
    /// Sorted by ascending priority
    slots: Vec<Slot, MAX_SLOTS>,
    min_priority: Option<Priority>,
}

impl<O: LightOutput> Light<O> {
    pub fn new(output: O, config: LightConfig) -> Self {
        Self {
            output,
            config,
            level: 0,
            written: None,
            slots: Vec::new(),
            min_priority: None,
        }
    }

    pub fn config(&self) -> &LightConfig {
        &self.config
    }

    /// Replace the configuration; takes effect on the next update
    pub fn set_config(&mut self, config: LightConfig) {
        self.config = config;
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    /// Steady level (shown when no animation is effective)
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Level last written to the output
    pub fn shown(&self) -> Option<u8> {
        self.written
    }

    /// Hide animations below `priority` (`None` shows all)
    pub fn set_min_priority(&mut self, priority: Option<Priority>) {
        self.min_priority = priority;
    }

    pub fn min_priority(&self) -> Option<Priority> {
        self.min_priority
    }

    /// Check if an animation is installed at `priority`
    pub fn has_animation(&self, priority: Priority) -> bool {
        self.slots.iter().any(|s| s.priority == priority)
    }

    /// Priority of the animation currently shown, if any
    pub fn effective_priority(&self) -> Option<Priority> {
        let top = self.slots.last()?;
        match self.min_priority {
            Some(min) if top.priority < min => None,
            _ => Some(top.priority),
        }
    }

    /// Set the steady level
    ///
    /// With `preview`, the level is scaled by the light's menu percentage.
    pub fn set_level(&mut self, level: u8, preview: bool) {
        self.level = self.scale(level, preview);
        if self.effective_priority().is_none() {
            self.show(self.level);
        }
    }

    /// Install `animation` at `priority`, replacing whatever was there
    ///
    /// The level at elapsed time zero is shown immediately.
    pub fn animate(&mut self, animation: Animation, priority: Priority) {
        let start = animation.start;
        let slot = Slot {
            priority,
            animation,
        };
        match self.slots.iter().position(|s| s.priority >= priority) {
            Some(i) if self.slots[i].priority == priority => self.slots[i] = slot,
            Some(i) => {
                if self.slots.insert(i, slot).is_err() {
                    return;
                }
            }
            None => {
                if self.slots.push(slot).is_err() {
                    return;
                }
            }
        }
        self.paint(start);
    }

    /// Remove the animation at `priority` and show what is underneath
    pub fn clear(&mut self, priority: Priority, now: u32) {
        if let Some(i) = self.slots.iter().position(|s| s.priority == priority) {
            self.slots.remove(i);
            self.paint(now);
        }
    }

    /// Remove every animation
    pub fn clear_all(&mut self, now: u32) {
        self.slots.clear();
        self.paint(now);
    }

    /// Advance the effective animation to `now`
    ///
    /// A finished animation is removed and its completion hook runs;
    /// reported completions are returned to the caller.
    pub fn tick(&mut self, now: u32) -> Option<Completion> {
        let mut completion = None;
        for _ in 0..MAX_SLOTS {
            if self.effective_priority().is_none() {
                break;
            }
            let Some(top) = self.slots.last() else {
                break;
            };
            if let Some(level) = top.animation.level_at(now) {
                let level = self.scale(level, top.animation.preview);
                self.show(level);
                return completion;
            }

            let Some(done) = self.slots.pop() else {
                break;
            };
            match done.animation.on_complete {
                OnComplete::Discard => {}
                OnComplete::Restart => {
                    let mut fresh = done.animation;
                    fresh.start = now;
                    // Room is guaranteed: the slot was just popped
                    let _ = self.slots.push(Slot {
                        priority: done.priority,
                        animation: fresh,
                    });
                }
                OnComplete::Report(c) => completion = Some(c),
            }
        }
        self.show(self.level);
        completion
    }

    /// Show the vehicle's intent: fade to the new steady level when it
    /// changes, or keep running the effective animation
    pub fn update(&mut self, now: u32, intent: &LightIntent, fade_time: u32) -> Option<Completion> {
        if self.effective_priority().is_some() {
            return self.tick(now);
        }
        let target = intent.level(&self.config);
        if target != self.level {
            let fade = Curve::Fade {
                from: self.level,
                to: target,
                duration: fade_time,
            };
            self.animate(Animation::new(fade, now), Priority::TRANSITION);
        }
        self.set_level(target, false);
        None
    }

    /// Show the effective animation at `now`, or the steady level
    ///
    /// A finished animation is left in place for [`Light::tick`] to retire.
    fn paint(&mut self, now: u32) {
        let animated = match self.slots.last() {
            Some(top) if self.effective_priority().is_some() => top
                .animation
                .level_at(now)
                .map(|level| self.scale(level, top.animation.preview)),
            _ => None,
        };
        self.show(animated.unwrap_or(self.level));
    }

    fn scale(&self, level: u8, preview: bool) -> u8 {
        if preview {
            (level as u16 * self.config.menu as u16 / 100) as u8
        } else {
            level
        }
    }

    fn show(&mut self, level: u8) {
        if self.written != Some(level) {
            self.output.set_level(level);
            self.written = Some(level);
        }
    }
}
