//! Colors handed to the processing engine.
//!
//! Callers may spell a color several ways; everything is normalised to an
//! RGB triple at the boundary and forwarded as `#rrggbb`. The core never
//! interprets colors beyond validating them.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Color`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ColorError {
    #[error("color cannot be empty")]
    Empty,
    #[error("invalid hex color '{0}'")]
    InvalidHex(String),
    #[error("invalid rgb color '{0}', expected three components between 0 and 255")]
    InvalidRgb(String),
    #[error("unknown color '{0}'")]
    Unknown(String),
}

/// An opaque RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

const NAMED: &[(&str, Color)] = &[
    ("black", Color::rgb(0, 0, 0)),
    ("white", Color::rgb(255, 255, 255)),
    ("red", Color::rgb(255, 0, 0)),
    ("green", Color::rgb(0, 128, 0)),
    ("blue", Color::rgb(0, 0, 255)),
    ("yellow", Color::rgb(255, 255, 0)),
    ("cyan", Color::rgb(0, 255, 255)),
    ("magenta", Color::rgb(255, 0, 255)),
    ("gray", Color::rgb(128, 128, 128)),
    ("grey", Color::rgb(128, 128, 128)),
    ("orange", Color::rgb(255, 165, 0)),
    ("purple", Color::rgb(128, 0, 128)),
    ("pink", Color::rgb(255, 192, 203)),
    ("brown", Color::rgb(165, 42, 42)),
];

impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse any accepted spelling: `#rgb`, `#rrggbb` (hash optional),
    /// `rgb(r, g, b)`, `r,g,b` or a color name.
    ///
    /// # Errors
    ///
    /// Returns a [`ColorError`] when the input matches none of the formats.
    pub fn parse(input: &str) -> Result<Self, ColorError> {
        let s = input.trim().to_ascii_lowercase();
        if s.is_empty() {
            return Err(ColorError::Empty);
        }

        if let Some(inner) = s.strip_prefix("rgb(").and_then(|rest| rest.strip_suffix(')')) {
            return parse_components(inner).ok_or_else(|| ColorError::InvalidRgb(input.to_owned()));
        }

        if s.contains(',') {
            return parse_components(&s).ok_or_else(|| ColorError::InvalidRgb(input.to_owned()));
        }

        if let Some((_, color)) = NAMED.iter().find(|(name, _)| *name == s) {
            return Ok(*color);
        }

        let hex = s.strip_prefix('#').unwrap_or(&s);
        if hex.chars().all(|c| c.is_ascii_hexdigit()) && matches!(hex.len(), 3 | 6) {
            return parse_hex(hex).ok_or_else(|| ColorError::InvalidHex(input.to_owned()));
        }

        if s.starts_with('#') {
            return Err(ColorError::InvalidHex(input.to_owned()));
        }

        Err(ColorError::Unknown(input.to_owned()))
    }

    /// `#rrggbb` form, as passed to the engine.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

fn parse_components(s: &str) -> Option<Color> {
    let mut parts = s.split(',').map(|part| part.trim().parse::<u8>());
    let r = parts.next()?.ok()?;
    let g = parts.next()?.ok()?;
    let b = parts.next()?.ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(Color::rgb(r, g, b))
}

fn parse_hex(hex: &str) -> Option<Color> {
    let channel = |digits: &str| u8::from_str_radix(digits, 16).ok();
    if hex.len() == 3 {
        let mut expanded = String::with_capacity(6);
        for c in hex.chars() {
            expanded.push(c);
            expanded.push(c);
        }
        return parse_hex(&expanded);
    }
    Some(Color::rgb(
        channel(hex.get(0..2)?)?,
        channel(hex.get(2..4)?)?,
        channel(hex.get(4..6)?)?,
    ))
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Color {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Color {
    type Error = ColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

/// Background and border colors for one picture.
///
/// The engine paints a radial background from `center` to `outer` and, when
/// `border` is set, a ring around the cropped face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorSpec {
    pub center: Color,
    pub outer: Color,
    pub border: Option<Color>,
}

impl ColorSpec {
    /// Build a spec from optional caller input, applying the defaults
    /// (black center, white outer, no border) for missing values.
    ///
    /// # Errors
    ///
    /// Returns the first [`ColorError`] among the supplied values.
    pub fn from_parts(
        center: Option<&str>,
        outer: Option<&str>,
        border: Option<&str>,
    ) -> Result<Self, ColorError> {
        let center = center.map(Color::parse).transpose()?.unwrap_or(Color::BLACK);
        let outer = outer.map(Color::parse).transpose()?.unwrap_or(Color::WHITE);
        let border = match border.map(str::trim) {
            None | Some("" | "none") => None,
            Some(value) => Some(Color::parse(value)?),
        };
        Ok(Self {
            center,
            outer,
            border,
        })
    }
}

impl Default for ColorSpec {
    fn default() -> Self {
        Self {
            center: Color::BLACK,
            outer: Color::WHITE,
            border: None,
        }
    }
}
