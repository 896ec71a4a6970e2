//! Console command surface
//!
//! Commands arrive as text lines on the console UART:
//!
//! | Line                 | Action                                   |
//! |----------------------|------------------------------------------|
//! | `VERSION`            | report the firmware version              |
//! | `DUMPCONFIG`         | print every `path = value`               |
//! | `SET <path> <value>` | change one tunable                       |
//! | `IDENT <n>`          | flash light `n` so it can be located     |
//! | `ON <n> <level>`     | hold light `n` at `level` for 5 s        |
//! | `OFF <n>`            | end a bench command on light `n`         |
//!
//! A successful command is answered with its own name, a failed one with
//! `ERR`. Execution lives on the controller.

use heapless::String;

use crate::config::ConfigError;

/// Longest accepted command line
pub const MAX_LINE: usize = 96;

/// Parsed console command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command<'a> {
    Version,
    DumpConfig,
    Set { path: &'a str, value: &'a str },
    Identify(usize),
    On { light: usize, level: u8 },
    Off(usize),
}

/// Command failures; all are answered with `ERR`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// Blank line
    Empty,
    UnknownCommand,
    MissingArgument,
    /// Argument is not a number or has trailing words
    InvalidArgument,
    NoSuchLight,
    /// Level above 100 %
    InvalidLevel,
    LineTooLong,
    Config(ConfigError),
    /// The reply could not be written
    Output,
}

impl From<ConfigError> for CommandError {
    fn from(e: ConfigError) -> Self {
        CommandError::Config(e)
    }
}

impl From<core::fmt::Error> for CommandError {
    fn from(_: core::fmt::Error) -> Self {
        CommandError::Output
    }
}

impl<'a> Command<'a> {
    /// Parse one line; the command word is case-insensitive
    pub fn parse(line: &'a str) -> Result<Self, CommandError> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or(CommandError::Empty)?;

        let command = if name.eq_ignore_ascii_case("VERSION") {
            Command::Version
        } else if name.eq_ignore_ascii_case("DUMPCONFIG") {
            Command::DumpConfig
        } else if name.eq_ignore_ascii_case("SET") {
            let path = words.next().ok_or(CommandError::MissingArgument)?;
            let value = words.next().ok_or(CommandError::MissingArgument)?;
            Command::Set { path, value }
        } else if name.eq_ignore_ascii_case("IDENT") {
            Command::Identify(number(words.next())?)
        } else if name.eq_ignore_ascii_case("ON") {
            let light = number(words.next())?;
            let level = number(words.next())?;
            let level = u8::try_from(level).map_err(|_| CommandError::InvalidLevel)?;
            Command::On { light, level }
        } else if name.eq_ignore_ascii_case("OFF") {
            Command::Off(number(words.next())?)
        } else {
            return Err(CommandError::UnknownCommand);
        };

        if words.next().is_some() {
            return Err(CommandError::InvalidArgument);
        }
        Ok(command)
    }

    /// Reply token for a successful command
    pub fn name(&self) -> &'static str {
        match self {
            Command::Version => "VERSION",
            Command::DumpConfig => "DUMPCONFIG",
            Command::Set { .. } => "SET",
            Command::Identify(_) => "IDENT",
            Command::On { .. } => "ON",
            Command::Off(_) => "OFF",
        }
    }
}

fn number(word: Option<&str>) -> Result<usize, CommandError> {
    word.ok_or(CommandError::MissingArgument)?
        .parse()
        .map_err(|_| CommandError::InvalidArgument)
}

/// Assembles console bytes into lines
///
/// `\r` and `\n` both end a line; empty lines are skipped. A line that
/// overflows [`MAX_LINE`] is dropped whole and reported once at its end.
#[derive(Debug, Default)]
pub struct LineBuffer {
    line: String<MAX_LINE>,
    overflow: bool,
}

impl LineBuffer {
    pub const fn new() -> Self {
        Self {
            line: String::new(),
            overflow: false,
        }
    }

    /// Feed one byte; returns a finished line
    pub fn push(&mut self, byte: u8) -> Option<Result<String<MAX_LINE>, CommandError>> {
        match byte {
            b'\r' | b'\n' => {
                if core::mem::take(&mut self.overflow) {
                    self.line.clear();
                    return Some(Err(CommandError::LineTooLong));
                }
                if self.line.is_empty() {
                    return None;
                }
                Some(Ok(core::mem::take(&mut self.line)))
            }
            _ if self.overflow => None,
            // Non-ASCII bytes are replaced so the line stays valid text
            _ => {
                let c = if byte.is_ascii() { byte as char } else { '?' };
                if self.line.push(c).is_err() {
                    self.overflow = true;
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(buf: &mut LineBuffer, text: &str) -> std::vec::Vec<Result<std::string::String, CommandError>> {
        text.bytes()
            .filter_map(|b| buf.push(b))
            .map(|r| r.map(|s| std::string::String::from(s.as_str())))
            .collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("VERSION"), Ok(Command::Version));
        assert_eq!(Command::parse("dumpconfig"), Ok(Command::DumpConfig));
        assert_eq!(
            Command::parse("SET lights.1.brake 80"),
            Ok(Command::Set {
                path: "lights.1.brake",
                value: "80"
            })
        );
        assert_eq!(Command::parse("IDENT 2"), Ok(Command::Identify(2)));
        assert_eq!(Command::parse("  ON 0 55 "), Ok(Command::On { light: 0, level: 55 }));
        assert_eq!(Command::parse("OFF 1"), Ok(Command::Off(1)));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Command::parse("   "), Err(CommandError::Empty));
        assert_eq!(Command::parse("REBOOT"), Err(CommandError::UnknownCommand));
        assert_eq!(Command::parse("IDENT"), Err(CommandError::MissingArgument));
        assert_eq!(Command::parse("IDENT x"), Err(CommandError::InvalidArgument));
        assert_eq!(Command::parse("OFF 1 2"), Err(CommandError::InvalidArgument));
        assert_eq!(Command::parse("ON 1 300"), Err(CommandError::InvalidLevel));
        assert_eq!(Command::parse("SET fade_time"), Err(CommandError::MissingArgument));
    }

    #[test]
    fn test_reply_names() {
        assert_eq!(Command::Identify(0).name(), "IDENT");
        assert_eq!(Command::On { light: 0, level: 1 }.name(), "ON");
    }

    #[test]
    fn test_line_buffer_splits_lines() {
        let mut buf = LineBuffer::new();
        let lines = feed(&mut buf, "VERSION\r\nOFF 1\n\n");
        assert_eq!(lines, [Ok("VERSION".into()), Ok("OFF 1".into())]);
    }

    #[test]
    fn test_line_buffer_overflow() {
        let mut buf = LineBuffer::new();
        let mut text = std::string::String::new();
        text.extend(core::iter::repeat('x').take(MAX_LINE + 10));
        text.push_str("\nVERSION\n");
        let lines = feed(&mut buf, &text);
        assert_eq!(lines, [Err(CommandError::LineTooLong), Ok("VERSION".into())]);
    }
}
