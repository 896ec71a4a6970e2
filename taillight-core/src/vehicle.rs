//! Vehicle control state machine
//!
//! The vehicle turns channel readings, button events and ESC telemetry into
//! light states. It is ticked periodically; every tick re-evaluates brake,
//! sleep, turn signals, the emergency flasher and temperature alarms, then
//! drives each light either towards its steady level or through its
//! animation stack.
//!
//! ```text
//!             ExtraLongClick(1)              ExtraLongClick(≥2)
//!   Readout ◀──────────────── Driving ──────────────────▶ Menu
//!      │      last page / moving  ▲   moving / throttle /   │
//!      └──────────────────────────┴──────── close ──────────┘
//! ```
//!
//! Animation priorities (low to high): breathe, level transitions, turn
//! signals, emergency flasher, menu/readout, ESC alarm, external alarm,
//! bench commands. Sleeping suspends the emergency flasher.

use heapless::Vec;
use taillight_protocol::{ChannelMap, EscTelemetry};

use crate::animation::{Animation, Completion, Curve, OnComplete, Priority, Sequence};
use crate::button::{channel_pressed, Button, ButtonEvent, ButtonEvents};
use crate::channel::{ChannelState, LogicalChannel};
use crate::config::{
    Bindings, BrakeMode, Config, EmergencyMode, LightConfig, SecondaryButtonMode, MAX_LIGHTS,
};
use crate::input::{Calibration, RcMode};
use crate::light::{Light, LightIntent, LightMode};
use crate::menu::{MenuEvent, MenuLink};
use crate::readout::{cell_count, number_sequence, ReadoutPage};
use crate::traits::LightOutput;

/// Brake pulse when reverse is applied while driving forward (ms)
pub const QUICK_BRAKE_MS: u32 = 250;

/// Brake window after the throttle returns to neutral (ms)
pub const LIFT_OFF_BRAKE_MS: u32 = 1000;

/// Turn signal period (ms)
pub const TURN_PERIOD_MS: u32 = 1000;

/// How long a bench "on" command holds its level (ms)
pub const BENCH_ON_MS: u32 = 5000;

/// Brightness of feedback and alarm flashes
const FEEDBACK_LEVEL: u8 = 75;

/// Where the primary button's clicks go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Focus {
    /// Normal lighting
    #[default]
    Driving,
    /// Forwarded to the menu collaborator
    Menu,
    /// Stepping through the telemetry readout
    Readout(ReadoutPage),
}

/// Active turn signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Turn {
    #[default]
    None,
    Left,
    Right,
}

impl Turn {
    /// Steering above zero turns right
    pub fn from_steering(state: ChannelState) -> Self {
        match state {
            ChannelState::Forward => Turn::Right,
            ChannelState::Reverse => Turn::Left,
            ChannelState::Neutral => Turn::None,
        }
    }
}

/// Snapshot of the vehicle's decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VehicleState {
    /// Receiver format, once detected
    pub rc_mode: Option<RcMode>,
    /// Lights stay inert until calibration has completed
    pub startup: bool,
    pub mode: LightMode,
    pub focus: Focus,
    pub brake: bool,
    /// Primary button flash while moving
    pub flash: bool,
    pub turn: Turn,
    /// Emergency flasher running
    pub emergency: bool,
    /// Emergency flasher switched on by the secondary button
    pub emergency_toggle: bool,
    pub sleeping: bool,
    /// ESC reports the motor turning
    pub moving: bool,
    /// Motion started with the throttle in reverse
    pub reversing: bool,
    /// ESC reports active braking
    pub esc_braking: bool,
    pub esc_over_temp: bool,
    pub ext_over_temp: bool,
    /// Time of the last input activity (ms)
    pub last_activity: u32,
}

impl Default for VehicleState {
    fn default() -> Self {
        Self {
            rc_mode: None,
            startup: true,
            mode: LightMode::Off,
            focus: Focus::Driving,
            brake: false,
            flash: false,
            turn: Turn::None,
            emergency: false,
            emergency_toggle: false,
            sleeping: false,
            moving: false,
            reversing: false,
            esc_braking: false,
            esc_over_temp: false,
            ext_over_temp: false,
            last_activity: 0,
        }
    }
}

/// Telemetry values kept for decisions and the readout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryReadings {
    /// At least one ESC record has arrived
    pub seen: bool,
    /// Pack voltage (centivolts)
    pub voltage: Option<u16>,
    /// Lowest pack voltage seen (centivolts)
    pub low_voltage: Option<u16>,
    /// Cell count guessed from the first voltage reading
    pub cells: Option<u8>,
    /// ESC temperature (°C)
    pub esc_temperature: Option<i16>,
    /// External sensor temperature (°C)
    pub ext_temperature: Option<i16>,
}

impl TelemetryReadings {
    fn per_cell(&self, centivolts: Option<u16>) -> Option<i32> {
        match (centivolts, self.cells) {
            (Some(v), Some(cells)) => Some(v as i32 / cells as i32),
            _ => None,
        }
    }
}

/// Bench command failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BenchError {
    NoSuchLight,
    InvalidLevel,
}

#[derive(Debug, Default)]
struct BrakeTimers {
    /// Start of the current quick brake pulse
    quick: Option<u32>,
    /// Start of the current lift-off window
    lift_off: Option<u32>,
    /// Throttle has left neutral since the last lift-off window
    lift_off_armed: bool,
    /// First reverse application already braked
    braked_once: bool,
}

/// The vehicle: inputs, decisions and lights
pub struct Vehicle<O> {
    config: Config,
    bindings: Bindings,
    lights: Vec<Light<O>, MAX_LIGHTS>,
    status: Light<O>,
    state: VehicleState,
    throttle: LogicalChannel,
    steering: LogicalChannel,
    primary_channel: LogicalChannel,
    secondary_channel: LogicalChannel,
    primary: Button,
    secondary: Button,
    /// On-board button; a second primary button
    hardware: Button,
    telemetry: TelemetryReadings,
    brake: BrakeTimers,
    menu: MenuLink,
}

impl<O: LightOutput> Vehicle<O> {
    /// Build a vehicle driving `outputs` in configuration order
    ///
    /// Outputs without a configuration entry stay dark.
    pub fn new(config: Config, outputs: impl IntoIterator<Item = O>, status: O) -> Self {
        let mut lights = Vec::new();
        for (i, output) in outputs.into_iter().take(MAX_LIGHTS).enumerate() {
            let light_config = config.lights.get(i).copied().unwrap_or_default();
            let _ = lights.push(Light::new(output, light_config));
        }

        Self {
            throttle: LogicalChannel::new(0, config.throttle_threshold),
            steering: LogicalChannel::new(0, config.steering_threshold),
            primary_channel: LogicalChannel::new(0, config.button_threshold),
            secondary_channel: LogicalChannel::new(0, config.button_threshold),
            config,
            bindings: Bindings::default(),
            lights,
            status: Light::new(status, LightConfig::beams(0, 0)),
            state: VehicleState::default(),
            primary: Button::new(),
            secondary: Button::new(),
            hardware: Button::new(),
            telemetry: TelemetryReadings::default(),
            brake: BrakeTimers::default(),
            menu: MenuLink::new(),
        }
    }

    /// Get current vehicle state
    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    /// Get latest telemetry readings
    pub fn telemetry(&self) -> &TelemetryReadings {
        &self.telemetry
    }

    /// Get active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Mutable configuration; call [`Vehicle::reconfigure`] afterwards
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Replace the configuration and apply it
    pub fn set_config(&mut self, config: Config, now: u32) {
        self.config = config;
        self.reconfigure(now);
    }

    /// Get lights in configuration order
    pub fn lights(&self) -> &[Light<O>] {
        &self.lights
    }

    /// Lights for the menu collaborator (levels, previews, animations)
    pub fn lights_mut(&mut self) -> &mut [Light<O>] {
        &mut self.lights
    }

    /// Get on-board status light
    pub fn status(&self) -> &Light<O> {
        &self.status
    }

    /// Status light, driven by the controller's startup blinks
    pub fn status_mut(&mut self) -> &mut Light<O> {
        &mut self.status
    }

    /// Get throttle channel state
    pub fn throttle(&self) -> &LogicalChannel {
        &self.throttle
    }

    /// Get steering channel state
    pub fn steering(&self) -> &LogicalChannel {
        &self.steering
    }

    /// Select the receiver format and bind channels for it
    pub fn set_rc_mode(&mut self, mode: RcMode) {
        self.state.rc_mode = Some(mode);
        self.bind();
    }

    /// Take zero references from a finished calibration
    pub fn set_zeros(&mut self, calibration: &Calibration) {
        for ch in [
            &mut self.throttle,
            &mut self.steering,
            &mut self.primary_channel,
            &mut self.secondary_channel,
        ] {
            if ch.is_bound() {
                ch.set_zero(calibration.zero(ch.id()));
            }
        }
    }

    /// Leave startup: inputs start driving the lights
    pub fn startup_complete(&mut self, now: u32) {
        self.state.startup = false;
        self.state.last_activity = now;
        let done = Sequence::multi_flash(3, 150, 150, 150, false, FEEDBACK_LEVEL);
        for light in self.lights.iter_mut() {
            light.animate(Animation::new(Curve::Sequence(done.clone()), now), Priority::MENU);
        }
    }

    /// Apply one frame of channel samples
    ///
    /// Unbound channels and channels missing from `frame` keep their last
    /// state. Button channels report their events immediately.
    pub fn apply_channels(&mut self, frame: &ChannelMap, now: u32) {
        if let Some(v) = sample(frame, &self.throttle) {
            self.throttle.update(v);
        }
        if let Some(v) = sample(frame, &self.steering) {
            self.steering.update(v);
        }

        if let Some(v) = sample(frame, &self.primary_channel) {
            let state = self.primary_channel.update(v);
            let pressed = channel_pressed(state, self.bindings.primary_button_reverse);
            let events = self.primary.update(pressed, now);
            let clicks = self.primary.multi_click().saturating_add(1);
            for event in events {
                self.primary_event(event, clicks, now);
            }
        }
        if let Some(v) = sample(frame, &self.secondary_channel) {
            let state = self.secondary_channel.update(v);
            let pressed = channel_pressed(state, self.bindings.secondary_button_reverse);
            for event in self.secondary.update(pressed, now) {
                self.secondary_event(event, now);
            }
        }

        if self.bindings.level != 0 {
            if let Some(v) = frame.get(self.bindings.level) {
                self.level_setting(self.config.level_percent(v));
            }
        }
    }

    /// Apply one ESC telemetry record
    ///
    /// The direction of travel is latched when the vehicle starts moving.
    pub fn apply_telemetry(&mut self, esc: &EscTelemetry) {
        let moving = esc.is_moving();
        if moving && !self.state.moving {
            self.state.reversing = self.throttle.reverse();
        }
        self.state.moving = moving;
        self.state.esc_braking = esc.is_braking();
        self.telemetry.seen = true;

        let volts = esc.volts_input_x100;
        if volts > 0 {
            if self.telemetry.voltage.is_none() {
                self.telemetry.cells = cell_count(volts);
            }
            self.telemetry.voltage = Some(volts);
            self.telemetry.low_voltage =
                Some(self.telemetry.low_voltage.map_or(volts, |low| low.min(volts)));
        }
        self.telemetry.esc_temperature = Some(esc.temp_fet_c());
    }

    /// Reading of an external temperature sensor (°C)
    pub fn set_external_temperature(&mut self, celsius: Option<i16>) {
        self.telemetry.ext_temperature = celsius;
    }

    /// Level of the on-board button
    ///
    /// Its events are handled like the primary button's and are returned
    /// so the caller can act on them during startup. Holding it keeps the
    /// vehicle awake.
    pub fn hardware_button(&mut self, pressed: bool, now: u32) -> ButtonEvents {
        let events = self.hardware.update(pressed, now);
        let clicks = self.hardware.multi_click().saturating_add(1);
        for &event in &events {
            self.primary_event(event, clicks, now);
        }
        events
    }

    /// Event from the primary button (channel or hardware)
    ///
    /// `clicks` is the number of presses in the current run of quick
    /// clicks. While driving, clicks cycle the light mode and long holds
    /// open the readout or the menu; when moving, a press flashes instead.
    /// In the menu, events are queued for [`Vehicle::menu_event`]. Every
    /// event counts as activity, but nothing is acted on during startup.
    pub fn primary_event(&mut self, event: ButtonEvent, clicks: u8, now: u32) {
        self.state.last_activity = now;
        if event == ButtonEvent::Release {
            self.state.flash = false;
        }
        if self.state.startup {
            return;
        }

        match self.state.focus {
            Focus::Menu => self.menu.push(MenuEvent::Button { event, clicks }),
            Focus::Readout(page) => {
                if event == ButtonEvent::ShortClick {
                    self.next_readout_page(page, now);
                }
            }
            Focus::Driving if self.state.moving => {
                if event == ButtonEvent::Press {
                    self.state.flash = true;
                }
            }
            Focus::Driving => {
                if self.state.sleeping {
                    self.wake(now);
                }
                self.driving_click(event, now);
            }
        }
    }

    /// Event from the secondary button
    pub fn secondary_event(&mut self, event: ButtonEvent, now: u32) {
        self.state.last_activity = now;
        if self.state.startup || self.state.focus != Focus::Driving {
            return;
        }
        if self.config.secondary_button_mode == SecondaryButtonMode::EmergencyToggle
            && event == ButtonEvent::ShortClick
        {
            self.state.emergency_toggle = !self.state.emergency_toggle;
        }
    }

    /// Level channel setting (percent); only the menu consumes it
    pub fn level_setting(&mut self, level: u8) {
        if self.state.focus == Focus::Menu {
            self.menu.push(MenuEvent::Level(level));
        }
    }

    /// Next input queued for the menu
    pub fn menu_event(&mut self) -> Option<MenuEvent> {
        self.menu.next_event()
    }

    /// Hand the primary button and the lights to the menu
    pub fn open_menu(&mut self, now: u32) {
        self.close_readout(now);
        self.state.focus = Focus::Menu;
        self.menu.reset();
        for light in self.lights.iter_mut() {
            light.set_min_priority(Some(Priority::MENU));
            light.set_level(0, false);
        }
    }

    /// Return from the menu and apply whatever it changed
    pub fn close_menu(&mut self, now: u32) {
        if self.state.focus != Focus::Menu {
            return;
        }
        self.state.focus = Focus::Driving;
        self.menu.reset();
        for light in self.lights.iter_mut() {
            light.set_min_priority(None);
            light.clear(Priority::MENU, now);
        }
        self.reconfigure(now);
    }

    /// Re-read the configuration
    ///
    /// Running animations whose parameters come from the configuration
    /// (breathe, turn signals, emergency flasher) are reinstalled.
    pub fn reconfigure(&mut self, now: u32) {
        for (i, light) in self.lights.iter_mut().enumerate() {
            light.set_config(self.config.lights.get(i).copied().unwrap_or_default());
        }
        self.bind();
        if self.state.startup {
            return;
        }
        self.update_sleep(now, true);
        let turn = self.state.turn;
        self.state.turn = Turn::None;
        self.show_turn(turn, now);
        self.update_emergency(now, true);
        self.update_alarms(now);
    }

    /// One control tick
    ///
    /// Call this periodically (every few ms). Re-evaluates brake, sleep,
    /// turn signals, the emergency flasher and alarms, then advances
    /// every light. Lights only run their animations during startup,
    /// sleep and while the readout or menu has focus.
    pub fn update(&mut self, now: u32) {
        if !self.state.startup {
            if self.state.focus == Focus::Menu && (self.state.moving || !self.throttle.neutral()) {
                self.close_menu(now);
            }
            if self.state.moving {
                self.close_readout(now);
            }
            self.update_brake(now);
            self.update_sleep(now, false);
            self.show_turn(Turn::from_steering(self.steering.state()), now);
            self.update_emergency(now, false);
            self.update_alarms(now);
        }

        let held = self.secondary.is_pressed();
        let mode = self.config.secondary_button_mode;
        let intent = LightIntent {
            mode: self.state.mode,
            brake: self.state.brake || (held && mode == SecondaryButtonMode::Brake),
            flash: self.state.flash || (held && mode == SecondaryButtonMode::Flash),
        };
        let passive =
            self.state.startup || self.state.sleeping || self.state.focus != Focus::Driving;
        let fade_time = self.config.fade_time as u32;

        let mut finished = false;
        for light in self.lights.iter_mut() {
            let completion = if passive {
                light.tick(now)
            } else {
                light.update(now, &intent, fade_time)
            };
            finished |= completion == Some(Completion::ReadoutFinished);
        }
        finished |= self.status.tick(now) == Some(Completion::ReadoutFinished);

        if finished {
            self.close_readout(now);
        }
    }

    /// Flash light `index` three times; the others stay dark meanwhile
    pub fn identify(&mut self, index: usize, now: u32) -> Result<(), BenchError> {
        if index >= self.lights.len() {
            return Err(BenchError::NoSuchLight);
        }
        for (i, light) in self.lights.iter_mut().enumerate() {
            let level = if i == index { FEEDBACK_LEVEL } else { 0 };
            let seq = Sequence::multi_flash(3, 0, 750, 750, false, level);
            light.animate(Animation::new(Curve::Sequence(seq), now), Priority::BENCH);
        }
        Ok(())
    }

    /// Hold light `index` at `level` for [`BENCH_ON_MS`]
    pub fn light_on(&mut self, index: usize, level: u8, now: u32) -> Result<(), BenchError> {
        if level > 100 {
            return Err(BenchError::InvalidLevel);
        }
        let light = self.lights.get_mut(index).ok_or(BenchError::NoSuchLight)?;
        let seq = Sequence::from_steps(&[(level, 0), (0, BENCH_ON_MS)]);
        light.animate(Animation::new(Curve::Sequence(seq), now), Priority::BENCH);
        Ok(())
    }

    /// End a bench command on light `index`
    pub fn light_off(&mut self, index: usize, now: u32) -> Result<(), BenchError> {
        let light = self.lights.get_mut(index).ok_or(BenchError::NoSuchLight)?;
        light.clear(Priority::BENCH, now);
        Ok(())
    }

    fn bind(&mut self) {
        let Some(mode) = self.state.rc_mode else {
            return;
        };
        self.bindings = *self.config.bindings(mode);
        self.throttle.rebind(self.bindings.throttle);
        self.throttle.set_threshold(self.config.throttle_threshold);
        self.steering.rebind(self.bindings.steering);
        self.steering.set_threshold(self.config.steering_threshold);
        self.primary_channel.rebind(self.bindings.primary_button);
        self.primary_channel.set_threshold(self.config.button_threshold);
        self.secondary_channel.rebind(self.bindings.secondary_button);
        self.secondary_channel.set_threshold(self.config.button_threshold);
    }

    fn driving_click(&mut self, event: ButtonEvent, now: u32) {
        match event {
            ButtonEvent::ShortClick => {
                self.state.mode = match self.state.mode {
                    LightMode::Off => LightMode::Low,
                    LightMode::Low => LightMode::High,
                    LightMode::High => LightMode::Low,
                };
            }
            ButtonEvent::LongClick => self.state.mode = LightMode::Off,
            // One blip per hold interval up to the menu threshold
            ButtonEvent::ExtraLongHold(n) if n <= 2 => {
                let blip = Sequence::multi_flash(1, 150, 150, 150, false, FEEDBACK_LEVEL);
                for light in self.lights.iter_mut() {
                    light.set_level(0, false);
                    light.animate(Animation::new(Curve::Sequence(blip.clone()), now), Priority::MENU);
                }
            }
            ButtonEvent::ExtraLongClick(1) => self.open_readout(now),
            ButtonEvent::ExtraLongClick(_) => self.open_menu(now),
            _ => {}
        }
    }

    fn update_brake(&mut self, now: u32) {
        let esc_driven = self.state.rc_mode == Some(RcMode::Smart) && self.telemetry.seen;
        self.state.brake = if esc_driven {
            self.esc_brake(now)
        } else {
            self.policy_brake(now)
        };
    }

    /// Brake from ESC telemetry plus a short pulse when reverse is applied
    /// while driving forward
    fn esc_brake(&mut self, now: u32) -> bool {
        if !self.throttle.reverse() {
            self.brake.quick = None;
        } else if self.brake.quick.is_none() && self.state.moving && !self.state.reversing {
            self.brake.quick = Some(now);
        }
        let quick = self
            .brake
            .quick
            .is_some_and(|start| now.wrapping_sub(start) < QUICK_BRAKE_MS);
        self.state.esc_braking || quick
    }

    fn policy_brake(&mut self, now: u32) -> bool {
        let reverse = self.throttle.reverse();
        match self.config.brake_mode {
            BrakeMode::Simple => reverse,
            BrakeMode::Smart => {
                if self.throttle.forward() {
                    self.brake.braked_once = false;
                } else if !reverse && self.state.brake {
                    self.brake.braked_once = true;
                }
                reverse && !self.brake.braked_once
            }
            BrakeMode::LiftOffDelay => {
                if !self.throttle.neutral() {
                    self.brake.lift_off_armed = true;
                    self.brake.lift_off = None;
                    return false;
                }
                if self.brake.lift_off_armed {
                    self.brake.lift_off_armed = false;
                    self.brake.lift_off = Some(now);
                }
                self.brake
                    .lift_off
                    .is_some_and(|start| now.wrapping_sub(start) < LIFT_OFF_BRAKE_MS)
            }
        }
    }

    fn is_active(&self) -> bool {
        self.state.moving
            || self.state.brake
            || !self.throttle.neutral()
            || !self.steering.neutral()
            || self.state.focus != Focus::Driving
            || self.primary.is_pressed()
            || self.secondary.is_pressed()
            || self.hardware.is_pressed()
    }

    fn update_sleep(&mut self, now: u32, reconfig: bool) {
        if self.is_active() {
            self.state.last_activity = now;
            if self.state.sleeping {
                self.wake(now);
            }
            return;
        }

        let idle = now.wrapping_sub(self.state.last_activity) >= self.config.sleep_delay_ms();
        let allowed = self.state.mode == LightMode::Off || self.config.sleep_when_lights_on;
        if idle && allowed && (!self.state.sleeping || reconfig) {
            self.sleep(now);
        }
    }

    fn sleep(&mut self, now: u32) {
        self.state.sleeping = true;
        if self.state.emergency {
            self.stop_emergency(now);
        }
        for light in self.lights.iter_mut() {
            let peak = light.config().breathe;
            if peak > 0 {
                let breathe = Curve::Breathe {
                    duration: self.config.breathe_time as u32,
                    gap: self.config.breathe_gap as u32,
                    brightness: peak,
                    min_pct: self.config.breathe_min_brightness,
                };
                light.animate(Animation::new(breathe, now).looping(), Priority::BREATHE);
            } else {
                light.clear(Priority::BREATHE, now);
                light.set_level(0, false);
            }
        }
    }

    fn wake(&mut self, now: u32) {
        self.state.sleeping = false;
        for light in self.lights.iter_mut() {
            light.clear(Priority::BREATHE, now);
        }
    }

    /// Install or remove turn signals; only a change restarts the flash
    fn show_turn(&mut self, turn: Turn, now: u32) {
        if turn == self.state.turn {
            return;
        }
        self.state.turn = turn;
        let fade = self.config.fade_time as u32;
        for light in self.lights.iter_mut() {
            let config = *light.config();
            let level = match turn {
                Turn::Left => config.turn_left,
                Turn::Right => config.turn_right,
                Turn::None => 0,
            };
            if level > 0 {
                let flash = Curve::FadedFlash {
                    on: level,
                    off: 0,
                    period: TURN_PERIOD_MS,
                    fade,
                };
                light.animate(Animation::new(flash, now).looping(), Priority::TURN);
            } else {
                light.clear(Priority::TURN, now);
            }
        }
    }

    fn emergency_wanted(&self) -> bool {
        if self.state.sleeping {
            return false;
        }
        let automatic = match self.config.emergency_mode {
            EmergencyMode::Off => false,
            EmergencyMode::HighBeam => self.state.mode == LightMode::High,
            EmergencyMode::AnyMode => self.state.mode != LightMode::Off,
        };
        automatic || self.state.emergency_toggle
    }

    fn update_emergency(&mut self, now: u32, reconfig: bool) {
        let wanted = self.emergency_wanted();
        if wanted && (!self.state.emergency || reconfig) {
            self.start_emergency(now);
        } else if !wanted && self.state.emergency {
            self.stop_emergency(now);
        }
    }

    fn start_emergency(&mut self, now: u32) {
        self.state.emergency = true;
        let fade = if self.config.emergency_fade {
            self.config.fade_time as u32
        } else {
            0
        };
        for light in self.lights.iter_mut() {
            let config = *light.config();
            if config.emergency1 == 0 && config.emergency2 == 0 {
                light.clear(Priority::EMERGENCY, now);
                continue;
            }
            let flash = Curve::EmergencyFlash {
                level1: config.emergency1,
                level2: config.emergency2,
                period: self.config.emergency_flash_period as u32,
                flashes: self.config.emergency_flashes_per_side,
                fade,
            };
            light.animate(
                Animation::new(flash, now).on_complete(OnComplete::Restart),
                Priority::EMERGENCY,
            );
        }
    }

    fn stop_emergency(&mut self, now: u32) {
        self.state.emergency = false;
        for light in self.lights.iter_mut() {
            light.clear(Priority::EMERGENCY, now);
        }
    }

    fn update_alarms(&mut self, now: u32) {
        let esc = alarm_transition(
            self.state.esc_over_temp,
            self.telemetry.esc_temperature,
            self.config.esc_temperature_alarm,
            self.config.esc_temperature_alarm_enable,
        );
        if let Some(active) = esc {
            self.state.esc_over_temp = active;
            self.show_alarm(active, 3, Priority::ESC_ALARM, now);
        }

        let ext = alarm_transition(
            self.state.ext_over_temp,
            self.telemetry.ext_temperature,
            self.config.ext_temperature_alarm,
            self.config.ext_temperature_alarm_enable,
        );
        if let Some(active) = ext {
            self.state.ext_over_temp = active;
            self.show_alarm(active, 2, Priority::EXT_ALARM, now);
        }
    }

    fn show_alarm(&mut self, active: bool, flashes: u8, priority: Priority, now: u32) {
        let seq = Sequence::multi_flash(flashes, 500, 100, 100, false, FEEDBACK_LEVEL);
        for light in self.lights.iter_mut() {
            if active {
                light.animate(Animation::new(Curve::Sequence(seq.clone()), now).looping(), priority);
            } else {
                light.clear(priority, now);
            }
        }
    }

    fn open_readout(&mut self, now: u32) {
        let page = ReadoutPage::CellVoltage;
        self.state.focus = Focus::Readout(page);
        for light in self.lights.iter_mut().chain(core::iter::once(&mut self.status)) {
            light.set_min_priority(Some(Priority::MENU));
            light.set_level(0, false);
        }
        self.show_readout(page, now);
    }

    fn next_readout_page(&mut self, page: ReadoutPage, now: u32) {
        match page.next() {
            Some(next) => {
                self.state.focus = Focus::Readout(next);
                self.show_readout(next, now);
            }
            None => self.close_readout(now),
        }
    }

    fn show_readout(&mut self, page: ReadoutPage, now: u32) {
        let value = match page {
            ReadoutPage::CellVoltage => self.telemetry.per_cell(self.telemetry.voltage),
            ReadoutPage::LowCellVoltage => self.telemetry.per_cell(self.telemetry.low_voltage),
            ReadoutPage::EscTemperature => self.telemetry.esc_temperature.map(i32::from),
            ReadoutPage::ExtTemperature => self.telemetry.ext_temperature.map(i32::from),
        };
        let on_complete = if page.is_last() {
            OnComplete::Report(Completion::ReadoutFinished)
        } else {
            OnComplete::Discard
        };

        for light in self.lights.iter_mut().chain(core::iter::once(&mut self.status)) {
            light.clear(Priority::MENU, now);
            if let Some(value) = value {
                let seq = number_sequence(value);
                light.animate(
                    Animation::new(Curve::Sequence(seq), now).on_complete(on_complete),
                    Priority::MENU,
                );
            }
        }
    }

    fn close_readout(&mut self, now: u32) {
        if !matches!(self.state.focus, Focus::Readout(_)) {
            return;
        }
        self.state.focus = Focus::Driving;
        for light in self.lights.iter_mut().chain(core::iter::once(&mut self.status)) {
            light.set_min_priority(None);
            light.clear(Priority::MENU, now);
        }
    }
}

/// Sample for a bound channel, if the frame carries it
fn sample(frame: &ChannelMap, channel: &LogicalChannel) -> Option<u16> {
    if channel.is_bound() {
        frame.get(channel.id())
    } else {
        None
    }
}

/// Alarm state change, if any
///
/// An alarm trips more than 1 °C above its limit and clears at or below it.
fn alarm_transition(active: bool, temperature: Option<i16>, limit: i16, enabled: bool) -> Option<bool> {
    let excess = temperature.map(|t| t as i32 - limit as i32);
    match (active, excess) {
        (false, Some(e)) if enabled && e > 1 => Some(true),
        (true, Some(e)) if enabled && e > 0 => None,
        (true, _) => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Lamp {
        level: u8,
    }

    impl LightOutput for Lamp {
        fn set_level(&mut self, percent: u8) {
            self.level = percent;
        }
    }

    fn vehicle() -> Vehicle<Lamp> {
        let mut v = Vehicle::new(Config::default(), [Lamp::default(), Lamp::default(), Lamp::default()], Lamp::default());
        v.set_rc_mode(RcMode::Pwm);
        v.startup_complete(0);
        v
    }

    fn click(v: &mut Vehicle<Lamp>, event: ButtonEvent, now: u32) {
        v.primary_event(event, 1, now);
    }

    #[test]
    fn test_mode_cycle() {
        let mut v = vehicle();
        click(&mut v, ButtonEvent::ShortClick, 100);
        assert_eq!(v.state().mode, LightMode::Low);
        click(&mut v, ButtonEvent::ShortClick, 200);
        assert_eq!(v.state().mode, LightMode::High);
        click(&mut v, ButtonEvent::ShortClick, 300);
        assert_eq!(v.state().mode, LightMode::Low);
        click(&mut v, ButtonEvent::LongClick, 400);
        assert_eq!(v.state().mode, LightMode::Off);
    }

    #[test]
    fn test_clicks_ignored_during_startup() {
        let mut v = Vehicle::new(Config::default(), [Lamp::default()], Lamp::default());
        v.primary_event(ButtonEvent::ShortClick, 1, 10);
        assert_eq!(v.state().mode, LightMode::Off);
        assert!(v.state().startup);
    }

    #[test]
    fn test_lights_follow_mode() {
        let mut v = vehicle();
        v.update(1000);
        click(&mut v, ButtonEvent::ShortClick, 1000);
        // Startup flash finishes, then the new level fades in
        for t in [1010, 2000, 2100, 2200] {
            v.update(t);
        }
        assert_eq!(v.lights()[0].shown(), Some(20));
        assert_eq!(v.lights()[1].shown(), Some(30));
    }

    #[test]
    fn test_press_flashes_while_moving() {
        let mut v = vehicle();
        v.apply_telemetry(&EscTelemetry {
            rpm: 5000,
            ..Default::default()
        });
        click(&mut v, ButtonEvent::Press, 100);
        assert!(v.state().flash);
        click(&mut v, ButtonEvent::Release, 200);
        assert!(!v.state().flash);
        assert_eq!(v.state().mode, LightMode::Off);
    }

    #[test]
    fn test_emergency_toggle() {
        let mut config = Config::default();
        config.secondary_button_mode = SecondaryButtonMode::EmergencyToggle;
        let mut v = Vehicle::new(config, [Lamp::default(), Lamp::default(), Lamp::default()], Lamp::default());
        v.set_rc_mode(RcMode::Pwm);
        v.startup_complete(0);

        v.secondary_event(ButtonEvent::ShortClick, 100);
        v.update(110);
        assert!(v.state().emergency);
        assert!(v.lights()[0].has_animation(Priority::EMERGENCY));
        assert!(!v.lights()[1].has_animation(Priority::EMERGENCY));

        v.secondary_event(ButtonEvent::ShortClick, 500);
        v.update(510);
        assert!(!v.state().emergency);
        assert!(!v.lights()[0].has_animation(Priority::EMERGENCY));
    }

    #[test]
    fn test_emergency_follows_high_beam() {
        let mut v = vehicle();
        v.config_mut().emergency_mode = EmergencyMode::HighBeam;
        v.reconfigure(0);
        click(&mut v, ButtonEvent::ShortClick, 10);
        v.update(20);
        assert!(!v.state().emergency);
        click(&mut v, ButtonEvent::ShortClick, 30);
        v.update(40);
        assert!(v.state().emergency);
    }

    #[test]
    fn test_alarm_hysteresis() {
        assert_eq!(alarm_transition(false, Some(81), 80, true), None);
        assert_eq!(alarm_transition(false, Some(82), 80, true), Some(true));
        assert_eq!(alarm_transition(true, Some(81), 80, true), None);
        assert_eq!(alarm_transition(true, Some(80), 80, true), Some(false));
        assert_eq!(alarm_transition(true, Some(95), 80, false), Some(false));
        assert_eq!(alarm_transition(false, Some(95), 80, false), None);
        assert_eq!(alarm_transition(false, None, 80, true), None);
    }

    #[test]
    fn test_esc_alarm_flashes_all_lights() {
        let mut v = vehicle();
        v.apply_telemetry(&EscTelemetry {
            temp_fet_x10: 900,
            ..Default::default()
        });
        v.update(100);
        assert!(v.state().esc_over_temp);
        assert!(v.lights().iter().all(|l| l.has_animation(Priority::ESC_ALARM)));

        v.apply_telemetry(&EscTelemetry {
            temp_fet_x10: 700,
            ..Default::default()
        });
        v.update(200);
        assert!(!v.state().esc_over_temp);
        assert!(v.lights().iter().all(|l| !l.has_animation(Priority::ESC_ALARM)));
    }

    #[test]
    fn test_readout_pages_then_exit() {
        let mut v = vehicle();
        v.apply_telemetry(&EscTelemetry {
            volts_input_x100: 1260,
            temp_fet_x10: 450,
            ..Default::default()
        });
        assert_eq!(v.telemetry().cells, Some(3));

        click(&mut v, ButtonEvent::ExtraLongClick(1), 100);
        assert_eq!(v.state().focus, Focus::Readout(ReadoutPage::CellVoltage));
        assert!(v.status().has_animation(Priority::MENU));

        click(&mut v, ButtonEvent::ShortClick, 200);
        click(&mut v, ButtonEvent::ShortClick, 300);
        assert_eq!(v.state().focus, Focus::Readout(ReadoutPage::EscTemperature));
        // No external sensor: nothing shown, next click exits
        click(&mut v, ButtonEvent::ShortClick, 400);
        assert!(!v.lights()[0].has_animation(Priority::MENU));
        click(&mut v, ButtonEvent::ShortClick, 500);
        assert_eq!(v.state().focus, Focus::Driving);
        assert_eq!(v.lights()[0].min_priority(), None);
    }

    #[test]
    fn test_readout_ends_after_last_number() {
        let mut v = vehicle();
        v.set_external_temperature(Some(7));
        click(&mut v, ButtonEvent::ExtraLongClick(1), 0);
        for t in [10, 20, 30] {
            click(&mut v, ButtonEvent::ShortClick, t);
        }
        assert_eq!(v.state().focus, Focus::Readout(ReadoutPage::ExtTemperature));
        v.update(1000);
        assert_eq!(v.state().focus, Focus::Readout(ReadoutPage::ExtTemperature));
        v.update(30_000);
        assert_eq!(v.state().focus, Focus::Driving);
    }

    #[test]
    fn test_menu_receives_clicks_and_level() {
        let mut config = Config::default();
        config.pwm.level = 2;
        let mut v = Vehicle::new(config, [Lamp::default()], Lamp::default());
        v.set_rc_mode(RcMode::Pwm);
        v.startup_complete(0);

        click(&mut v, ButtonEvent::ExtraLongClick(2), 100);
        assert_eq!(v.state().focus, Focus::Menu);
        click(&mut v, ButtonEvent::ShortClick, 200);
        assert_eq!(v.state().mode, LightMode::Off);

        let mut frame = ChannelMap::new();
        frame.insert(2, 1415);
        v.apply_channels(&frame, 300);
        v.apply_channels(&frame, 310);

        assert_eq!(
            v.menu_event(),
            Some(MenuEvent::Button {
                event: ButtonEvent::ShortClick,
                clicks: 1,
            })
        );
        assert_eq!(v.menu_event(), Some(MenuEvent::Level(50)));
        assert_eq!(v.menu_event(), None);

        v.close_menu(400);
        assert_eq!(v.state().focus, Focus::Driving);
        v.level_setting(80);
        assert_eq!(v.menu_event(), None);
    }

    #[test]
    fn test_hold_blip_starts_from_dark() {
        let mut v = vehicle();
        click(&mut v, ButtonEvent::ShortClick, 100);
        // Startup flashes end at 1050, then the low beam fades in
        for t in [1100, 1200, 1400] {
            v.update(t);
        }
        assert_eq!(v.lights()[0].shown(), Some(20));

        click(&mut v, ButtonEvent::ExtraLongHold(1), 2000);
        assert_eq!(v.lights()[0].level(), 0);
        assert_eq!(v.lights()[0].shown(), Some(0));
        v.update(2200);
        assert_eq!(v.lights()[0].shown(), Some(75));

        // Blip over: the steady level fades back in from dark
        v.update(2451);
        v.update(2460);
        v.update(2505);
        assert_eq!(v.lights()[0].shown(), Some(10));
        v.update(2600);
        assert_eq!(v.lights()[0].shown(), Some(20));
    }

    #[test]
    fn test_held_hardware_button_keeps_awake() {
        let mut config = Config::default();
        config.sleep_delay = 1;
        let mut v = Vehicle::new(config, [Lamp::default()], Lamp::default());
        v.set_rc_mode(RcMode::Pwm);
        v.startup_complete(0);

        v.hardware_button(true, 100);
        for t in (200..5000).step_by(100) {
            v.update(t);
        }
        assert!(!v.state().sleeping);

        v.hardware_button(false, 5000);
        v.update(5100);
        assert!(!v.state().sleeping);
        v.update(6100);
        assert!(v.state().sleeping);
    }

    #[test]
    fn test_hardware_double_click_reaches_menu() {
        let mut v = vehicle();
        v.open_menu(0);
        for (pressed, t) in [(true, 1000), (false, 1100), (true, 1300), (false, 1400)] {
            v.hardware_button(pressed, t);
        }
        let clicks: std::vec::Vec<_> = core::iter::from_fn(|| v.menu_event())
            .filter_map(|e| match e {
                MenuEvent::Button {
                    event: ButtonEvent::ShortClick,
                    clicks,
                } => Some(clicks),
                _ => None,
            })
            .collect();
        assert_eq!(clicks, [1, 2]);
    }

    #[test]
    fn test_bench_commands() {
        let mut v = vehicle();
        assert_eq!(v.identify(3, 0), Err(BenchError::NoSuchLight));
        v.identify(1, 0).unwrap();
        assert!(v.lights().iter().all(|l| l.has_animation(Priority::BENCH)));

        assert_eq!(v.light_on(0, 101, 0), Err(BenchError::InvalidLevel));
        v.light_on(0, 40, 10).unwrap();
        assert_eq!(v.lights()[0].shown(), Some(40));
        v.light_off(0, 20).unwrap();
        assert!(!v.lights()[0].has_animation(Priority::BENCH));
        assert_eq!(v.light_off(9, 20), Err(BenchError::NoSuchLight));
    }

    #[test]
    fn test_outputs_beyond_config_stay_dark() {
        let mut config = Config::default();
        config.lights.truncate(1);
        let v = Vehicle::new(config, [Lamp::default(), Lamp::default()], Lamp::default());
        assert_eq!(v.lights().len(), 2);
        assert_eq!(*v.lights()[1].config(), LightConfig::default());
    }
}
