// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Celestial coordinate helpers.
//!
//! Conversion between decimal degrees and sexagesimal tokens, parsing of
//! free-form user coordinates, and great-circle separation. All angles are
//! in degrees unless stated otherwise.

mod parse;

pub use parse::{parse_dec, parse_position, parse_ra};

use std::fmt;

/// Sign of a declination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Plus,
    Minus,
}

impl Sign {
    /// The character used when displaying this sign.
    #[must_use]
    pub fn as_char(self) -> char {
        match self {
            Self::Plus => '+',
            Self::Minus => '-',
        }
    }

    /// Multiplier to restore a signed value.
    #[must_use]
    pub fn factor(self) -> f64 {
        match self {
            Self::Plus => 1.0,
            Self::Minus => -1.0,
        }
    }
}

/// Right ascension split into hours, minutes, and seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaTokens {
    pub hours: u32,
    pub minutes: u32,
    /// Rounded to 0.01 seconds.
    pub seconds: f64,
}

impl RaTokens {
    /// Reassemble the tokens into decimal degrees.
    #[must_use]
    pub fn to_degrees(&self) -> f64 {
        15.0 * (f64::from(self.hours)
            + (f64::from(self.minutes) + self.seconds / 60.0) / 60.0)
    }
}

impl fmt::Display for RaTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h {}m {}s", self.hours, self.minutes, self.seconds)
    }
}

/// Declination split into sign, degrees, arc-minutes, and arc-seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecTokens {
    pub sign: Sign,
    pub degrees: u32,
    pub minutes: u32,
    /// Rounded to 0.1 arc-seconds.
    pub seconds: f64,
}

impl DecTokens {
    /// Reassemble the tokens into decimal degrees.
    #[must_use]
    pub fn to_degrees(&self) -> f64 {
        self.sign.factor()
            * (f64::from(self.degrees) + (f64::from(self.minutes) + self.seconds / 60.0) / 60.0)
    }
}

impl fmt::Display for DecTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}\u{b0} {}' {}\"",
            self.sign.as_char(),
            self.degrees,
            self.minutes,
            self.seconds
        )
    }
}

/// Round half-up to the given number of decimal places.
fn round_half_up(value: f64, scale: f64) -> f64 {
    (value * scale + 0.5).floor() / scale
}

/// Convert a right ascension in degrees into hours, minutes, and seconds.
///
/// The caller guarantees the input lies in [0, 360).
#[must_use]
pub fn degrees_to_hms(ra: f64) -> RaTokens {
    let hours = ra / 15.0;
    let rah = hours.floor();
    let delta = 60.0 * (hours - rah);
    let ram = delta.floor();
    let ras = round_half_up(60.0 * (delta - ram), 100.0);

    RaTokens {
        hours: rah as u32,
        minutes: ram as u32,
        seconds: ras,
    }
}

/// Convert a declination in degrees into sign, degrees, minutes, and seconds.
#[must_use]
pub fn degrees_to_dms(dec: f64) -> DecTokens {
    let sign = if dec < 0.0 { Sign::Minus } else { Sign::Plus };

    let adec = dec.abs();
    let decd = adec.floor();
    let delta = 60.0 * (adec - decd);
    let decm = delta.floor();
    let decs = round_half_up(60.0 * (delta - decm), 10.0);

    DecTokens {
        sign,
        degrees: decd as u32,
        minutes: decm as u32,
        seconds: decs,
    }
}

/// Great-circle separation between two positions, in degrees.
///
/// Uses the spherical law of cosines. The cosine term is clamped to
/// [-1, 1] so that rounding cannot push it outside the domain of `acos`.
#[must_use]
#[allow(clippy::float_cmp, reason = "identical inputs must give exactly zero")]
pub fn separation(ra1: f64, dec1: f64, ra2: f64, dec2: f64) -> f64 {
    if ra1 == ra2 && dec1 == dec2 {
        return 0.0;
    }

    let lat1 = dec1.to_radians();
    let lat2 = dec2.to_radians();
    let dlon = (ra1 - ra2).abs().to_radians();

    let term = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * dlon.cos();
    term.clamp(-1.0, 1.0).acos().to_degrees()
}

/// Format a small separation (under about 20 arc-minutes) for display.
///
/// Values of at least one arc-minute are shown in arc-minutes, anything
/// smaller in arc-seconds.
#[must_use]
pub fn format_separation(sep: f64) -> String {
    let arcmin = sep * 60.0;
    if arcmin >= 1.0 {
        format!("{arcmin:.1}'")
    } else {
        format!("{:.1}\"", arcmin * 60.0)
    }
}

/// Format a position as `ra dec` in sexagesimal notation.
#[must_use]
pub fn format_position(ra: f64, dec: f64) -> String {
    format!("{} {}", degrees_to_hms(ra), degrees_to_dms(dec))
}
