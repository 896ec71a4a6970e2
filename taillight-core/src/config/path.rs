//! Dotted-path access to configuration values
//!
//! Paths name a single scalar: `fade_time`, `smart.throttle`,
//! `lights.2.brake`. Values are parsed from text and range-checked before
//! anything is written, so a rejected write leaves the config untouched.

use core::fmt::{self, Write};

use heapless::String;

use super::{
    Bindings, BrakeMode, Config, EmergencyMode, LightConfig, SecondaryButtonMode, MAX_LIGHTS,
};

/// Longest path produced by [`Config::for_each_value`]
pub const MAX_PATH_LEN: usize = 40;

/// Errors from reading or writing a config value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Path does not name a value
    UnknownKey,
    /// Light index beyond the configured lights
    NoSuchLight,
    /// Value could not be parsed for this key
    InvalidValue,
    /// Value parsed but is outside the allowed range
    OutOfRange,
}

/// A config value as read back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Value {
    Int(i32),
    Bool(bool),
    /// Enumerated setting, by name
    Word(&'static str),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Word(v) => f.write_str(v),
        }
    }
}

const SCALAR_KEYS: &[&str] = &[
    "throttle_threshold",
    "steering_threshold",
    "button_threshold",
    "level_min",
    "level_max",
    "calibration_tolerance",
    "fade_time",
    "breathe_time",
    "breathe_gap",
    "breathe_min_brightness",
    "sleep_delay",
    "sleep_when_lights_on",
    "brake_mode",
    "emergency_mode",
    "emergency_flash_period",
    "emergency_flashes_per_side",
    "emergency_fade",
    "secondary_button_mode",
    "esc_temperature_alarm",
    "esc_temperature_alarm_enable",
    "ext_temperature_alarm",
    "ext_temperature_alarm_enable",
];

const BINDING_KEYS: &[&str] = &[
    "throttle",
    "steering",
    "primary_button",
    "primary_button_reverse",
    "secondary_button",
    "secondary_button_reverse",
    "level",
];

const LIGHT_KEYS: &[&str] = &[
    "mode1",
    "mode2",
    "brake",
    "flash",
    "turn_left",
    "turn_right",
    "emergency1",
    "emergency2",
    "breathe",
    "menu",
];

const BRAKE_MODES: &[(&str, BrakeMode)] = &[
    ("simple", BrakeMode::Simple),
    ("smart", BrakeMode::Smart),
    ("lift_off_delay", BrakeMode::LiftOffDelay),
];

const EMERGENCY_MODES: &[(&str, EmergencyMode)] = &[
    ("off", EmergencyMode::Off),
    ("high_beam", EmergencyMode::HighBeam),
    ("any_mode", EmergencyMode::AnyMode),
];

const BUTTON_MODES: &[(&str, SecondaryButtonMode)] = &[
    ("none", SecondaryButtonMode::None),
    ("flash", SecondaryButtonMode::Flash),
    ("brake", SecondaryButtonMode::Brake),
    ("emergency_toggle", SecondaryButtonMode::EmergencyToggle),
];

fn parse_int<T: TryFrom<i32>>(value: &str, min: i32, max: i32) -> Result<T, ConfigError> {
    let v: i32 = value.trim().parse().map_err(|_| ConfigError::InvalidValue)?;
    if !(min..=max).contains(&v) {
        return Err(ConfigError::OutOfRange);
    }
    T::try_from(v).map_err(|_| ConfigError::OutOfRange)
}

fn parse_bool(value: &str) -> Result<bool, ConfigError> {
    match value.trim() {
        "true" | "1" | "on" => Ok(true),
        "false" | "0" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue),
    }
}

/// Accepts either the name or its index in the table
fn parse_word<T: Copy>(value: &str, table: &[(&'static str, T)]) -> Result<T, ConfigError> {
    let value = value.trim();
    if let Some((_, v)) = table.iter().find(|(name, _)| *name == value) {
        return Ok(*v);
    }
    let index: usize = value.parse().map_err(|_| ConfigError::InvalidValue)?;
    table
        .get(index)
        .map(|(_, v)| *v)
        .ok_or(ConfigError::OutOfRange)
}

fn word_of<T: Copy + PartialEq>(value: T, table: &[(&'static str, T)]) -> Value {
    let name = table
        .iter()
        .find(|(_, v)| *v == value)
        .map_or("?", |(name, _)| name);
    Value::Word(name)
}

fn int(v: impl Into<i32>) -> Option<Value> {
    Some(Value::Int(v.into()))
}

impl Config {
    /// Read the value at `path`
    pub fn get_value(&self, path: &str) -> Result<Value, ConfigError> {
        let value = match split_path(path)? {
            Path::Scalar(key) => self.get_scalar(key),
            Path::Binding(bindings, key) => get_binding(self.bindings_named(bindings), key),
            Path::Light(index, key) => {
                let light = self.lights.get(index).ok_or(ConfigError::NoSuchLight)?;
                get_light(light, key)
            }
        };
        value.ok_or(ConfigError::UnknownKey)
    }

    /// Parse `value` and write it at `path`
    ///
    /// On error the configuration is unchanged.
    pub fn set_value(&mut self, path: &str, value: &str) -> Result<(), ConfigError> {
        match split_path(path)? {
            Path::Scalar(key) => self.set_scalar(key, value),
            Path::Binding(bindings, key) => {
                let target = if bindings == "smart" {
                    &mut self.smart
                } else {
                    &mut self.pwm
                };
                set_binding(target, key, value)
            }
            Path::Light(index, key) => {
                let light = self.lights.get_mut(index).ok_or(ConfigError::NoSuchLight)?;
                set_light(light, key, value)
            }
        }
    }

    /// Visit every value with its path
    pub fn for_each_value(&self, mut f: impl FnMut(&str, Value)) {
        for key in SCALAR_KEYS {
            if let Some(v) = self.get_scalar(key) {
                f(key, v);
            }
        }

        let mut path: String<MAX_PATH_LEN> = String::new();
        for (name, bindings) in [("smart", &self.smart), ("pwm", &self.pwm)] {
            for key in BINDING_KEYS {
                path.clear();
                if write!(path, "{}.{}", name, key).is_ok() {
                    if let Some(v) = get_binding(bindings, key) {
                        f(&path, v);
                    }
                }
            }
        }

        for (index, light) in self.lights.iter().enumerate() {
            for key in LIGHT_KEYS {
                path.clear();
                if write!(path, "lights.{}.{}", index, key).is_ok() {
                    if let Some(v) = get_light(light, key) {
                        f(&path, v);
                    }
                }
            }
        }
    }

    fn bindings_named(&self, name: &str) -> &Bindings {
        if name == "smart" {
            &self.smart
        } else {
            &self.pwm
        }
    }

    fn get_scalar(&self, key: &str) -> Option<Value> {
        match key {
            "throttle_threshold" => int(self.throttle_threshold),
            "steering_threshold" => int(self.steering_threshold),
            "button_threshold" => int(self.button_threshold),
            "level_min" => int(self.level_min),
            "level_max" => int(self.level_max),
            "calibration_tolerance" => int(self.calibration_tolerance),
            "fade_time" => int(self.fade_time),
            "breathe_time" => int(self.breathe_time),
            "breathe_gap" => int(self.breathe_gap),
            "breathe_min_brightness" => int(self.breathe_min_brightness),
            "sleep_delay" => int(self.sleep_delay),
            "sleep_when_lights_on" => Some(Value::Bool(self.sleep_when_lights_on)),
            "brake_mode" => Some(word_of(self.brake_mode, BRAKE_MODES)),
            "emergency_mode" => Some(word_of(self.emergency_mode, EMERGENCY_MODES)),
            "emergency_flash_period" => int(self.emergency_flash_period),
            "emergency_flashes_per_side" => int(self.emergency_flashes_per_side),
            "emergency_fade" => Some(Value::Bool(self.emergency_fade)),
            "secondary_button_mode" => Some(word_of(self.secondary_button_mode, BUTTON_MODES)),
            "esc_temperature_alarm" => int(self.esc_temperature_alarm),
            "esc_temperature_alarm_enable" => Some(Value::Bool(self.esc_temperature_alarm_enable)),
            "ext_temperature_alarm" => int(self.ext_temperature_alarm),
            "ext_temperature_alarm_enable" => Some(Value::Bool(self.ext_temperature_alarm_enable)),
            _ => None,
        }
    }

    fn set_scalar(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "throttle_threshold" => self.throttle_threshold = parse_int(value, 0, 1000)?,
            "steering_threshold" => self.steering_threshold = parse_int(value, 0, 1000)?,
            "button_threshold" => self.button_threshold = parse_int(value, 0, 1000)?,
            "level_min" => self.level_min = parse_int(value, 0, u16::MAX as i32)?,
            "level_max" => self.level_max = parse_int(value, 0, u16::MAX as i32)?,
            "calibration_tolerance" => self.calibration_tolerance = parse_int(value, 0, 500)?,
            "fade_time" => self.fade_time = parse_int(value, 0, 5000)?,
            "breathe_time" => self.breathe_time = parse_int(value, 100, 30_000)?,
            "breathe_gap" => self.breathe_gap = parse_int(value, 0, 30_000)?,
            "breathe_min_brightness" => self.breathe_min_brightness = parse_int(value, 0, 100)?,
            "sleep_delay" => self.sleep_delay = parse_int(value, 1, 3600)?,
            "sleep_when_lights_on" => self.sleep_when_lights_on = parse_bool(value)?,
            "brake_mode" => self.brake_mode = parse_word(value, BRAKE_MODES)?,
            "emergency_mode" => self.emergency_mode = parse_word(value, EMERGENCY_MODES)?,
            "emergency_flash_period" => self.emergency_flash_period = parse_int(value, 50, 5000)?,
            "emergency_flashes_per_side" => {
                self.emergency_flashes_per_side = parse_int(value, 1, 10)?
            }
            "emergency_fade" => self.emergency_fade = parse_bool(value)?,
            "secondary_button_mode" => self.secondary_button_mode = parse_word(value, BUTTON_MODES)?,
            "esc_temperature_alarm" => self.esc_temperature_alarm = parse_int(value, -40, 150)?,
            "esc_temperature_alarm_enable" => self.esc_temperature_alarm_enable = parse_bool(value)?,
            "ext_temperature_alarm" => self.ext_temperature_alarm = parse_int(value, -40, 150)?,
            "ext_temperature_alarm_enable" => self.ext_temperature_alarm_enable = parse_bool(value)?,
            _ => return Err(ConfigError::UnknownKey),
        }
        Ok(())
    }
}

enum Path<'a> {
    Scalar(&'a str),
    /// Bindings table name and key
    Binding(&'a str, &'a str),
    /// Light index and key
    Light(usize, &'a str),
}

fn split_path(path: &str) -> Result<Path<'_>, ConfigError> {
    let mut parts = path.trim().split('.');
    let head = parts.next().ok_or(ConfigError::UnknownKey)?;
    let path = match head {
        "smart" | "pwm" => {
            let key = parts.next().ok_or(ConfigError::UnknownKey)?;
            Path::Binding(head, key)
        }
        "lights" => {
            let index: usize = parts
                .next()
                .and_then(|i| i.parse().ok())
                .ok_or(ConfigError::UnknownKey)?;
            if index >= MAX_LIGHTS {
                return Err(ConfigError::NoSuchLight);
            }
            let key = parts.next().ok_or(ConfigError::UnknownKey)?;
            Path::Light(index, key)
        }
        _ => Path::Scalar(head),
    };
    if parts.next().is_some() {
        return Err(ConfigError::UnknownKey);
    }
    Ok(path)
}

fn get_binding(b: &Bindings, key: &str) -> Option<Value> {
    match key {
        "throttle" => int(b.throttle),
        "steering" => int(b.steering),
        "primary_button" => int(b.primary_button),
        "primary_button_reverse" => Some(Value::Bool(b.primary_button_reverse)),
        "secondary_button" => int(b.secondary_button),
        "secondary_button_reverse" => Some(Value::Bool(b.secondary_button_reverse)),
        "level" => int(b.level),
        _ => None,
    }
}

fn set_binding(b: &mut Bindings, key: &str, value: &str) -> Result<(), ConfigError> {
    const MAX_CHANNEL: i32 = taillight_protocol::MAX_CHANNELS as i32;
    match key {
        "throttle" => b.throttle = parse_int(value, 0, MAX_CHANNEL)?,
        "steering" => b.steering = parse_int(value, 0, MAX_CHANNEL)?,
        "primary_button" => b.primary_button = parse_int(value, 0, MAX_CHANNEL)?,
        "primary_button_reverse" => b.primary_button_reverse = parse_bool(value)?,
        "secondary_button" => b.secondary_button = parse_int(value, 0, MAX_CHANNEL)?,
        "secondary_button_reverse" => b.secondary_button_reverse = parse_bool(value)?,
        "level" => b.level = parse_int(value, 0, MAX_CHANNEL)?,
        _ => return Err(ConfigError::UnknownKey),
    }
    Ok(())
}

fn light_field<'a>(light: &'a mut LightConfig, key: &str) -> Option<&'a mut u8> {
    Some(match key {
        "mode1" => &mut light.mode1,
        "mode2" => &mut light.mode2,
        "brake" => &mut light.brake,
        "flash" => &mut light.flash,
        "turn_left" => &mut light.turn_left,
        "turn_right" => &mut light.turn_right,
        "emergency1" => &mut light.emergency1,
        "emergency2" => &mut light.emergency2,
        "breathe" => &mut light.breathe,
        "menu" => &mut light.menu,
        _ => return None,
    })
}

fn get_light(light: &LightConfig, key: &str) -> Option<Value> {
    let mut copy = *light;
    light_field(&mut copy, key).map(|v| Value::Int(*v as i32))
}

fn set_light(light: &mut LightConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    let field = light_field(light, key).ok_or(ConfigError::UnknownKey)?;
    *field = parse_int(value, 0, 100)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_scalar() {
        let mut config = Config::default();
        config.set_value("fade_time", "250").unwrap();
        assert_eq!(config.fade_time, 250);
        assert_eq!(config.get_value("fade_time"), Ok(Value::Int(250)));
    }

    #[test]
    fn test_set_light_level() {
        let mut config = Config::default();
        config.set_value("lights.1.brake", "75").unwrap();
        assert_eq!(config.lights[1].brake, 75);
        assert_eq!(config.get_value("lights.1.brake"), Ok(Value::Int(75)));
    }

    #[test]
    fn test_rejected_value_keeps_prior() {
        let mut config = Config::default();
        assert_eq!(
            config.set_value("lights.0.mode1", "101"),
            Err(ConfigError::OutOfRange)
        );
        assert_eq!(
            config.set_value("lights.0.mode1", "bright"),
            Err(ConfigError::InvalidValue)
        );
        assert_eq!(config.lights[0].mode1, 20);
        assert_eq!(
            config.set_value("sleep_delay", "0"),
            Err(ConfigError::OutOfRange)
        );
        assert_eq!(config.sleep_delay, 30);
    }

    #[test]
    fn test_unknown_paths() {
        let mut config = Config::default();
        assert_eq!(config.set_value("nope", "1"), Err(ConfigError::UnknownKey));
        assert_eq!(
            config.set_value("lights.0.nope", "1"),
            Err(ConfigError::UnknownKey)
        );
        assert_eq!(
            config.set_value("lights.5.mode1", "1"),
            Err(ConfigError::NoSuchLight)
        );
        assert_eq!(
            config.set_value("lights.9.mode1", "1"),
            Err(ConfigError::NoSuchLight)
        );
        assert_eq!(
            config.set_value("fade_time.x", "1"),
            Err(ConfigError::UnknownKey)
        );
        assert_eq!(config.get_value("smart"), Err(ConfigError::UnknownKey));
    }

    #[test]
    fn test_enumerated_values_by_name_or_index() {
        let mut config = Config::default();
        config.set_value("brake_mode", "lift_off_delay").unwrap();
        assert_eq!(config.brake_mode, BrakeMode::LiftOffDelay);
        config.set_value("brake_mode", "0").unwrap();
        assert_eq!(config.brake_mode, BrakeMode::Simple);
        assert_eq!(config.get_value("brake_mode"), Ok(Value::Word("simple")));
        assert_eq!(
            config.set_value("emergency_mode", "7"),
            Err(ConfigError::OutOfRange)
        );
        config
            .set_value("secondary_button_mode", "emergency_toggle")
            .unwrap();
        assert_eq!(
            config.secondary_button_mode,
            SecondaryButtonMode::EmergencyToggle
        );
    }

    #[test]
    fn test_bindings() {
        let mut config = Config::default();
        config.set_value("smart.throttle", "3").unwrap();
        config.set_value("pwm.primary_button_reverse", "true").unwrap();
        assert_eq!(config.smart.throttle, 3);
        assert!(config.pwm.primary_button_reverse);
        assert_eq!(
            config.set_value("smart.level", "33"),
            Err(ConfigError::OutOfRange)
        );
    }

    #[test]
    fn test_for_each_value_round_trips() {
        let config = Config::default();
        let mut copy = Config::default();
        copy.fade_time = 1;
        copy.lights[2].brake = 0;
        copy.smart.throttle = 9;
        copy.brake_mode = BrakeMode::Simple;

        let mut count = 0;
        config.for_each_value(|path, value| {
            let mut text: String<16> = String::new();
            write!(text, "{}", value).unwrap();
            copy.set_value(path, &text).unwrap();
            count += 1;
        });

        assert_eq!(copy, config);
        assert_eq!(
            count,
            SCALAR_KEYS.len() + 2 * BINDING_KEYS.len() + 3 * LIGHT_KEYS.len()
        );
    }
}
