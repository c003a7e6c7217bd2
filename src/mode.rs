//! Mode descriptor decoding
//!
//! A mode descriptor is a compact string such as `"sr znedi3"`,
//! `"drv2 eedi3 Bicubic"` or `"di_h_2_eedi2"`:
//!
//! ```text
//! mode      := "null" | strategy sep? direction? sep? passes? sep? algorithm
//! strategy  := "sr" | "dr" | "di"
//! direction := "b" | "h" | "v"
//! passes    := [0-9]+          (1 to 9)
//! algorithm := "SangNom" | "nnedi3cl" | "znedi3" | "eedi2" | "eedi3" (sep? guide)?
//! sep       := " " | "_" | "+" | "-"
//! ```
//!
//! Decoding is a single left-to-right scan. Each token consumes exactly the
//! characters it matches and the scan never backtracks; the first token that
//! does not fit is reported together with the whole descriptor.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::algorithm::{Guide, Interpolation, SEPARATORS};
use crate::error::ConfigError;

/// Most antialiasing passes a descriptor may request.
pub const MAX_PASSES: u32 = 9;

/// How repeated antialiasing passes are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Same-resolution passes alternating field parity (`sr`)
    SingleRate,
    /// Both parities per pass, blended with equal weight (`dr`)
    DoubleRate,
    /// Doubles the processed axis on the first pass (`di`)
    Deinterlace,
    /// No antialiasing (`null`)
    None,
}

impl Strategy {
    pub fn marker(self) -> &'static str {
        match self {
            Strategy::SingleRate => "sr",
            Strategy::DoubleRate => "dr",
            Strategy::Deinterlace => "di",
            Strategy::None => "null",
        }
    }
}

/// Axes antialiasing is applied along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Both,
    Horizontal,
    Vertical,
}

impl Direction {
    pub fn horizontal(self) -> bool {
        matches!(self, Direction::Both | Direction::Horizontal)
    }

    pub fn vertical(self) -> bool {
        matches!(self, Direction::Both | Direction::Vertical)
    }
}

/// A decoded mode descriptor.
///
/// `algorithm` is `None` exactly when the strategy is [`Strategy::None`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModeDirective {
    pub strategy: Strategy,
    pub direction: Direction,
    pub passes: u32,
    pub algorithm: Option<Interpolation>,
    pub guide: Option<Guide>,
}

impl ModeDirective {
    /// The `null` directive: no antialiasing at all.
    pub fn null() -> Self {
        Self {
            strategy: Strategy::None,
            direction: Direction::Both,
            passes: 1,
            algorithm: None,
            guide: None,
        }
    }

    pub fn is_null(&self) -> bool {
        self.strategy == Strategy::None
    }

    /// Whether the primary algorithm or its guide separates fields first.
    pub fn separates_fields(&self) -> bool {
        match self.algorithm {
            Some(Interpolation::Eedi2) => true,
            Some(Interpolation::Eedi3) => self.guide.is_some_and(Guide::works_on_fields),
            _ => false,
        }
    }
}

impl fmt::Display for ModeDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(algorithm) = self.algorithm else {
            return f.write_str("null");
        };
        f.write_str(self.strategy.marker())?;
        match self.direction {
            Direction::Both => {}
            Direction::Horizontal => f.write_str("h")?,
            Direction::Vertical => f.write_str("v")?,
        }
        if self.passes != 1 {
            write!(f, "{}", self.passes)?;
        }
        write!(f, " {}", algorithm)?;
        if let Some(guide) = self.guide {
            write!(f, " {}", guide)?;
        }
        Ok(())
    }
}

impl FromStr for ModeDirective {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}

/// Remaining input plus the original descriptor, for error reporting.
struct Cursor<'a> {
    descriptor: &'a str,
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(descriptor: &'a str) -> Self {
        Self { descriptor, rest: descriptor }
    }

    fn skip_separator(&mut self) {
        if let Some(rest) = self.rest.strip_prefix(SEPARATORS) {
            self.rest = rest;
        }
    }

    fn eat(&mut self, prefix: &str) -> bool {
        match self.rest.strip_prefix(prefix) {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }

    fn eat_digits(&mut self) -> Option<&'a str> {
        let len = self.rest.bytes().take_while(u8::is_ascii_digit).count();
        if len == 0 {
            return None;
        }
        let (digits, rest) = self.rest.split_at(len);
        self.rest = rest;
        Some(digits)
    }

    /// The token at the cursor: everything up to the next separator.
    fn token(&self) -> &'a str {
        self.rest.split(SEPARATORS).next().unwrap_or_default()
    }

    fn error(&self, token: &str, reason: &str) -> ConfigError {
        ConfigError::invalid_mode(self.descriptor, token, reason)
    }
}

/// Decode a mode descriptor.
pub fn decode(descriptor: &str) -> Result<ModeDirective, ConfigError> {
    if descriptor == "null" {
        return Ok(ModeDirective::null());
    }

    let mut cursor = Cursor::new(descriptor);

    let strategy = if cursor.eat("sr") {
        Strategy::SingleRate
    } else if cursor.eat("dr") {
        Strategy::DoubleRate
    } else if cursor.eat("di") {
        Strategy::Deinterlace
    } else {
        return Err(cursor.error(cursor.token(), "the antialiasing mode must be 'sr', 'dr', or 'di'"));
    };
    cursor.skip_separator();

    let direction = if cursor.eat("b") {
        Direction::Both
    } else if cursor.eat("h") {
        Direction::Horizontal
    } else if cursor.eat("v") {
        Direction::Vertical
    } else {
        Direction::Both
    };
    cursor.skip_separator();

    let passes = match cursor.eat_digits() {
        Some(digits) => {
            match digits.parse::<u32>() {
                Ok(0) => return Err(cursor.error(digits, "the number of passes must be greater than 0")),
                Ok(passes) if passes <= MAX_PASSES => passes,
                _ => {
                    let reason = format!("the number of passes must be at most {}", MAX_PASSES);
                    return Err(cursor.error(digits, &reason));
                }
            }
        }
        None => 1,
    };
    cursor.skip_separator();

    if cursor.rest.is_empty() {
        return Err(cursor.error("", "missing antialiasing type"));
    }
    let algorithm = Interpolation::match_prefix(cursor.rest).ok_or_else(|| {
        cursor.error(
            cursor.token(),
            "the antialiasing type must be 'SangNom', 'nnedi3cl', 'znedi3', 'eedi3', or 'eedi2'",
        )
    })?;
    cursor.eat(algorithm.name());

    let mut guide = None;
    if !cursor.rest.is_empty() {
        let trailing = cursor.rest;
        cursor.skip_separator();
        if !algorithm.accepts_guide() {
            let token = if cursor.rest.is_empty() { trailing } else { cursor.rest };
            return Err(cursor.error(token, "unexpected characters after the antialiasing type"));
        }
        let parsed = Guide::parse_for_antialias(cursor.rest).map_err(|_| {
            cursor.error(
                cursor.rest,
                "the eedi3 guide must be a kernel name, 'SangNom', 'znedi3', 'nnedi3cl', or 'eedi2'",
            )
        })?;
        guide = Some(parsed);
    }

    Ok(ModeDirective { strategy, direction, passes, algorithm: Some(algorithm), guide })
}
