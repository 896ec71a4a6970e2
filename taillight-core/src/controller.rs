//! Top-level controller
//!
//! Sequences startup and routes input to the vehicle:
//!
//! ```text
//!   Detecting ──format found / abort──▶ Calibrating ──zeros found──▶ Running
//!                                          ▲      │
//!                                          └abort─┘
//! ```
//!
//! While detecting, the board reports idle-gap measurements. Once the
//! receiver format is known, frames (serial) or pulse widths (PWM) are
//! decoded into channel maps, which first calibrate the zero references
//! and then drive the vehicle. The hardware button aborts detection or
//! restarts calibration, and afterwards acts as a second primary button.
//!
//! Nothing here logs: transitions worth reporting come back as
//! [`Notice`]s for the firmware to log.

use core::fmt::Write;

use heapless::Vec;
use taillight_protocol::{ChannelMap, FrameError, FrameReceiver, Packet};

use crate::animation::{Animation, Curve, Priority, Sequence};
use crate::button::ButtonEvent;
use crate::command::{Command, CommandError};
use crate::config::Config;
use crate::input::{Calibration, CalibrationStatus, Detector, PulseInput, RcMode};
use crate::light::LightMode;
use crate::traits::LightOutput;
use crate::vehicle::{BenchError, Focus, Vehicle, VehicleState};

/// Firmware version reported on the console
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Interval between status light blinks (ms)
pub const STATUS_INTERVAL_MS: u32 = 2000;

/// Format assumed when detection is aborted
pub const FALLBACK_MODE: RcMode = RcMode::Pwm;

/// Startup phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Measuring idle gaps to find the receiver format
    Detecting,
    /// Learning channel zero references
    Calibrating,
    /// Inputs drive the lights
    Running,
}

/// Something the firmware should log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Notice {
    ModeDetected(RcMode),
    DetectionAborted(RcMode),
    CalibrationComplete,
    /// Calibration started over; lights stay inert until it completes
    CalibrationRestarted,
    /// A frame failed to decode; the buffer was dropped
    FrameDropped(FrameError),
    LightMode(LightMode),
    Sleeping,
    Awake,
    Focus(Focus),
    CommandRejected(CommandError),
}

/// Notices from one call
pub type Notices = Vec<Notice, 8>;

fn report(notices: &mut Notices, notice: Notice) {
    let _ = notices.push(notice);
}

/// Startup sequencing, input routing and the console
pub struct Controller<O> {
    vehicle: Vehicle<O>,
    phase: Phase,
    detector: Detector,
    calibration: Option<Calibration>,
    receiver: FrameReceiver,
    pulses: PulseInput,
    reported: VehicleState,
    last_status: Option<u32>,
}

impl<O: LightOutput> Controller<O> {
    /// Create a controller watching `lines` receiver input lines
    pub fn new(config: Config, outputs: impl IntoIterator<Item = O>, status: O, lines: usize) -> Self {
        let mut vehicle = Vehicle::new(config, outputs, status);
        let searching = Sequence::multi_flash(1, 0, 100, 100, false, 100);
        vehicle.status_mut().animate(
            Animation::new(Curve::Sequence(searching), 0).looping(),
            Priority::TRANSITION,
        );

        Self {
            reported: *vehicle.state(),
            vehicle,
            phase: Phase::Detecting,
            detector: Detector::new(lines),
            calibration: None,
            receiver: FrameReceiver::new(),
            pulses: PulseInput::new(),
            last_status: None,
        }
    }

    /// Get current startup phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Get detected receiver format (if known)
    pub fn rc_mode(&self) -> Option<RcMode> {
        self.vehicle.state().rc_mode
    }

    /// Input line the format was detected on
    pub fn detected_line(&self) -> Option<usize> {
        self.detector.detected_line()
    }

    /// Get controlled vehicle
    pub fn vehicle(&self) -> &Vehicle<O> {
        &self.vehicle
    }

    /// Vehicle access for the menu collaborator
    pub fn vehicle_mut(&mut self) -> &mut Vehicle<O> {
        &mut self.vehicle
    }

    /// Record one idle gap measured on `line` during detection
    pub fn observe_gap(&mut self, line: usize, gap_us: u32) -> Option<Notice> {
        if self.phase != Phase::Detecting {
            return None;
        }
        let mode = self.detector.observe(line, gap_us)?;
        self.start_calibration(mode);
        Some(Notice::ModeDetected(mode))
    }

    /// Serial bytes received at `now_us`
    pub fn receive(&mut self, bytes: &[u8], now_us: u32, now_ms: u32) -> Notices {
        let mut notices = Notices::new();
        if self.rc_mode() != Some(RcMode::Smart) {
            return notices;
        }
        self.receiver.extend(bytes, now_us);
        while let Some(result) = self.receiver.next_packet() {
            match result {
                Ok(packet) => self.handle_packet(packet, now_ms, &mut notices),
                Err(e) => report(&mut notices, Notice::FrameDropped(e)),
            }
        }
        notices
    }

    /// Pulse width measured on input `line`; applied on the next tick
    pub fn record_pulse(&mut self, line: usize, width_us: u32) -> bool {
        self.rc_mode() == Some(RcMode::Pwm) && self.pulses.record(line, width_us)
    }

    /// Level of the on-board button
    ///
    /// Once running it acts as a second primary button. Before that, a
    /// press skips detection (assuming [`FALLBACK_MODE`]) or restarts
    /// calibration.
    pub fn hardware_button(&mut self, pressed: bool, now: u32) -> Notices {
        let mut notices = Notices::new();
        let events = self.vehicle.hardware_button(pressed, now);
        if self.phase != Phase::Running && events.contains(&ButtonEvent::Press) {
            self.abort(&mut notices);
        }
        notices
    }

    /// Apply one decoded channel frame
    pub fn handle_channels(&mut self, frame: &ChannelMap, now: u32) -> Notices {
        let mut notices = Notices::new();
        self.apply_channels(frame, now, &mut notices);
        notices
    }

    /// One control tick
    ///
    /// Applies the pulse widths recorded since the last tick, updates the
    /// vehicle and blinks the status light every [`STATUS_INTERVAL_MS`]
    /// once detection is over. Returns state changes worth logging.
    pub fn tick(&mut self, now: u32) -> Notices {
        let mut notices = Notices::new();
        if let Some(frame) = self.pulses.take() {
            self.apply_channels(&frame, now, &mut notices);
        }

        self.vehicle.update(now);
        self.report_changes(&mut notices);

        if self.phase != Phase::Detecting {
            let due = self
                .last_status
                .map_or(true, |last| now.wrapping_sub(last) >= STATUS_INTERVAL_MS);
            if due {
                self.last_status = Some(now);
                self.blink_status(now);
            }
        }
        notices
    }

    /// Run a console command, writing its output and reply to `out`
    pub fn execute(&mut self, command: &Command, now: u32, out: &mut impl Write) -> Result<(), CommandError> {
        match *command {
            Command::Version => writeln!(out, "{}", VERSION)?,
            Command::DumpConfig => {
                let mut result = Ok(());
                self.vehicle.config().for_each_value(|path, value| {
                    if result.is_ok() {
                        result = writeln!(out, "{} = {}", path, value);
                    }
                });
                result?;
            }
            Command::Set { path, value } => {
                self.vehicle.config_mut().set_value(path, value)?;
                self.vehicle.reconfigure(now);
            }
            Command::Identify(light) => self.vehicle.identify(light, now).map_err(bench_error)?,
            Command::On { light, level } => self.vehicle.light_on(light, level, now).map_err(bench_error)?,
            Command::Off(light) => self.vehicle.light_off(light, now).map_err(bench_error)?,
        }
        writeln!(out, "{}", command.name())?;
        Ok(())
    }

    /// Parse and run one console line; failures are answered with `ERR`
    pub fn handle_line(&mut self, line: &str, now: u32, out: &mut impl Write) -> Option<Notice> {
        let result = Command::parse(line).and_then(|command| self.execute(&command, now, out));
        match result {
            Ok(()) => None,
            Err(e) => {
                let _ = writeln!(out, "ERR");
                Some(Notice::CommandRejected(e))
            }
        }
    }

    fn start_calibration(&mut self, mode: RcMode) {
        self.vehicle.set_rc_mode(mode);
        let config = self.vehicle.config();
        let channels = config.bindings(mode).calibrated_channels();
        self.calibration = Some(Calibration::new(mode, &channels, config.calibration_tolerance));
        self.phase = Phase::Calibrating;
        self.receiver.reset();

        let steady = if mode == RcMode::Smart { 100 } else { 0 };
        let status = self.vehicle.status_mut();
        status.clear(Priority::TRANSITION, 0);
        status.set_level(steady, false);
    }

    fn finish_calibration(&mut self, now: u32) {
        if let Some(calibration) = &self.calibration {
            self.vehicle.set_zeros(calibration);
        }
        self.phase = Phase::Running;
        self.vehicle.startup_complete(now);
        // Next tick shows the calibrated blink
        self.last_status = None;
    }

    /// Button press before running
    fn abort(&mut self, notices: &mut Notices) {
        match self.phase {
            Phase::Detecting => {
                self.start_calibration(FALLBACK_MODE);
                report(notices, Notice::DetectionAborted(FALLBACK_MODE));
            }
            Phase::Calibrating => {
                if let Some(calibration) = self.calibration.as_mut() {
                    calibration.restart();
                }
                report(notices, Notice::CalibrationRestarted);
            }
            Phase::Running => {}
        }
    }

    fn handle_packet(&mut self, packet: Packet, now: u32, notices: &mut Notices) {
        match packet {
            Packet::Control(frame) => {
                if frame.command == taillight_protocol::control::COMMAND_CHANNEL_DATA {
                    self.apply_channels(&frame.channels.to_pulse_scale(), now, notices);
                }
            }
            Packet::Telemetry(record) => {
                if let Some(esc) = record.esc() {
                    self.vehicle.apply_telemetry(esc);
                }
            }
        }
    }

    fn apply_channels(&mut self, frame: &ChannelMap, now: u32, notices: &mut Notices) {
        match self.phase {
            Phase::Detecting => {}
            Phase::Calibrating => {
                let status = self.calibration.as_mut().map(|c| c.observe(frame));
                if status == Some(CalibrationStatus::Complete) {
                    self.finish_calibration(now);
                    report(notices, Notice::CalibrationComplete);
                }
            }
            Phase::Running => self.vehicle.apply_channels(frame, now),
        }
    }

    fn report_changes(&mut self, notices: &mut Notices) {
        let state = *self.vehicle.state();
        if state.mode != self.reported.mode {
            report(notices, Notice::LightMode(state.mode));
        }
        if state.sleeping != self.reported.sleeping {
            report(notices, if state.sleeping { Notice::Sleeping } else { Notice::Awake });
        }
        if state.focus != self.reported.focus {
            report(notices, Notice::Focus(state.focus));
        }
        self.reported = state;
    }

    /// One blink when calibrated, two when not; dark blinks on a lit
    /// status light for serial receivers
    fn blink_status(&mut self, now: u32) {
        if self.vehicle.state().focus != Focus::Driving {
            return;
        }
        let blinks = if self.phase == Phase::Running { 1 } else { 2 };
        let inverted = self.rc_mode() == Some(RcMode::Smart);
        let seq = Sequence::multi_flash(blinks, 0, 100, 150, inverted, 100);
        self.vehicle
            .status_mut()
            .animate(Animation::new(Curve::Sequence(seq), now), Priority::TRANSITION);
    }
}

fn bench_error(e: BenchError) -> CommandError {
    match e {
        BenchError::NoSuchLight => CommandError::NoSuchLight,
        BenchError::InvalidLevel => CommandError::InvalidLevel,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::calibration::REQUIRED_GOOD_FRAMES;
    use crate::input::detect::REQUIRED_RUN;

    #[derive(Debug, Default)]
    struct Lamp {
        level: u8,
    }

    impl LightOutput for Lamp {
        fn set_level(&mut self, percent: u8) {
            self.level = percent;
        }
    }

    fn controller() -> Controller<Lamp> {
        Controller::new(Config::default(), [Lamp::default(), Lamp::default(), Lamp::default()], Lamp::default(), 1)
    }

    #[test]
    fn test_status_flashes_while_detecting() {
        let mut c = controller();
        c.tick(50);
        assert_eq!(c.vehicle().status().shown(), Some(100));
        c.tick(150);
        assert_eq!(c.vehicle().status().shown(), Some(0));
    }

    #[test]
    fn test_detection_then_calibration() {
        let mut c = controller();
        let mut notice = None;
        for _ in 0..=REQUIRED_RUN {
            notice = c.observe_gap(0, 20_000);
        }
        assert_eq!(notice, Some(Notice::ModeDetected(RcMode::Pwm)));
        assert_eq!(c.phase(), Phase::Calibrating);
        assert_eq!(c.vehicle().status().shown(), Some(0));
        // Later gaps are ignored
        assert_eq!(c.observe_gap(0, 20), None);
    }

    #[test]
    fn test_button_aborts_startup() {
        let mut c = controller();
        let notices = c.hardware_button(true, 10);
        assert_eq!(notices.as_slice(), &[Notice::DetectionAborted(RcMode::Pwm)]);
        assert_eq!(c.phase(), Phase::Calibrating);

        c.hardware_button(false, 100);
        let notices = c.hardware_button(true, 200);
        assert_eq!(notices.as_slice(), &[Notice::CalibrationRestarted]);
        assert_eq!(c.phase(), Phase::Calibrating);
        assert!(c.vehicle().state().startup);

        // Releasing the restarting press is not a click
        c.hardware_button(false, 300);
        c.tick(310);
        assert_eq!(c.vehicle().state().mode, LightMode::Off);
    }

    #[test]
    fn test_restart_discards_calibration_progress() {
        let mut c = controller();
        c.hardware_button(true, 0);
        c.hardware_button(false, 100);

        let mut frame = ChannelMap::new();
        frame.insert(1, 1500);
        for _ in 0..REQUIRED_GOOD_FRAMES {
            assert!(c.handle_channels(&frame, 150).is_empty());
        }
        c.hardware_button(true, 200);
        c.hardware_button(false, 300);
        for _ in 0..REQUIRED_GOOD_FRAMES {
            assert!(c.handle_channels(&frame, 350).is_empty());
        }
        assert_eq!(c.phase(), Phase::Calibrating);
        let notices = c.handle_channels(&frame, 360);
        assert_eq!(notices.as_slice(), &[Notice::CalibrationComplete]);
        assert_eq!(c.phase(), Phase::Running);
    }

    #[test]
    fn test_hardware_button_clicks_when_running() {
        let mut c = controller();
        c.hardware_button(true, 0);
        c.hardware_button(false, 100);
        let mut frame = ChannelMap::new();
        frame.insert(1, 1500);
        for _ in 0..=REQUIRED_GOOD_FRAMES {
            c.handle_channels(&frame, 200);
        }
        assert_eq!(c.phase(), Phase::Running);

        c.hardware_button(true, 700);
        c.hardware_button(false, 800);
        let notices = c.tick(810);
        assert!(notices.contains(&Notice::LightMode(LightMode::Low)));
    }

    #[test]
    fn test_pulses_ignored_until_pwm() {
        let mut c = controller();
        assert!(!c.record_pulse(0, 1500));
        c.hardware_button(true, 0);
        assert!(c.record_pulse(0, 1500));
    }

    #[test]
    fn test_commands() {
        let mut c = controller();
        let mut out: heapless::String<512> = heapless::String::new();

        assert_eq!(c.handle_line("VERSION", 0, &mut out), None);
        assert!(out.ends_with("VERSION\n"));
        assert!(out.starts_with(VERSION));

        out.clear();
        assert_eq!(c.handle_line("SET fade_time 200", 0, &mut out), None);
        assert_eq!(out.as_str(), "SET\n");
        assert_eq!(c.vehicle().config().fade_time, 200);

        out.clear();
        let notice = c.handle_line("SET fade_time -4", 0, &mut out);
        assert!(matches!(notice, Some(Notice::CommandRejected(CommandError::Config(_)))));
        assert_eq!(out.as_str(), "ERR\n");
        assert_eq!(c.vehicle().config().fade_time, 200);

        out.clear();
        assert_eq!(
            c.handle_line("IDENT 7", 0, &mut out),
            Some(Notice::CommandRejected(CommandError::NoSuchLight))
        );
        out.clear();
        assert_eq!(c.handle_line("ON 1 50", 0, &mut out), None);
        assert_eq!(c.vehicle().lights()[1].shown(), Some(50));
    }

    #[test]
    fn test_dump_config_lists_paths() {
        let mut c = controller();
        let mut out: heapless::String<4096> = heapless::String::new();
        c.handle_line("DUMPCONFIG", 0, &mut out);
        assert!(out.contains("fade_time = 90\n"));
        assert!(out.contains("lights.2.brake = 90\n"));
        assert!(out.ends_with("DUMPCONFIG\n"));
    }

    #[test]
    fn test_dump_overflow_is_error() {
        let mut c = controller();
        let mut out: heapless::String<32> = heapless::String::new();
        let notice = c.handle_line("DUMPCONFIG", 0, &mut out);
        assert_eq!(notice, Some(Notice::CommandRejected(CommandError::Output)));
    }
}
