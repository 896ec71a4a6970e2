//! Text configuration documents
//!
//! A minimal line format for shipping defaults with the firmware:
//!
//! ```text
//! # comment
//! fade_time = 120
//! brake_mode = smart
//!
//! [lights.0]
//! mode1 = 20
//! flash = 100
//! ```
//!
//! `[section]` headers prefix the keys that follow. Every line is applied
//! through [`Config::set_value`]; a rejected line is reported and skipped.

use heapless::String;

use super::path::MAX_PATH_LEN;
use super::{Config, ConfigError};

/// Why a line was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineError {
    /// Not a `key = value` pair or a section header
    Syntax,
    /// Section plus key longer than any config path
    PathTooLong,
    /// The value was rejected
    Config(ConfigError),
}

/// Apply a config document to `config`
///
/// Calls `on_error` with the 1-based line number of every rejected line.
/// Returns the number of values applied.
pub fn apply(config: &mut Config, input: &str, mut on_error: impl FnMut(usize, LineError)) -> usize {
    let mut section: String<MAX_PATH_LEN> = String::new();
    let mut applied = 0;

    for (number, line) in input.lines().enumerate() {
        let number = number + 1;
        let line = match line.find('#') {
            Some(i) => &line[..i],
            None => line,
        }
        .trim();

        if line.is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section.clear();
            if section.push_str(header.trim()).is_err() {
                section.clear();
                on_error(number, LineError::PathTooLong);
            }
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            on_error(number, LineError::Syntax);
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            on_error(number, LineError::Syntax);
            continue;
        }

        let mut path: String<MAX_PATH_LEN> = String::new();
        let joined = if section.is_empty() {
            path.push_str(key).is_ok()
        } else {
            path.push_str(&section).is_ok() && path.push('.').is_ok() && path.push_str(key).is_ok()
        };
        if !joined {
            on_error(number, LineError::PathTooLong);
            continue;
        }

        match config.set_value(&path, value) {
            Ok(()) => applied += 1,
            Err(e) => on_error(number, LineError::Config(e)),
        }
    }

    applied
}
