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

//! Free-form coordinate parsing.
//!
//! Accepted forms for right ascension:
//!
//! - decimal degrees: `84.67665`
//! - `hours [:hH] minutes [:mM] seconds [sS]`, e.g. `5:38:42.4` or `5h 38m 42.4s`
//!
//! and for declination:
//!
//! - signed decimal degrees: `-69.1009`
//! - `[+-] degrees [:dD°] minutes [:mM'] seconds [sS"]`, e.g. `-69 06 03.2`
//!
//! Whitespace may appear between any tokens, trailing components may be
//! left off, and the labels do not have to agree (`23h 45:23` is fine).

use log::debug;

/// Separator characters and leading-component limit for one coordinate axis.
struct Units {
    lead: &'static [char],
    minute: &'static [char],
    second: &'static [char],
    lead_max: f64,
}

const RA_UNITS: Units = Units {
    lead: &[':', 'h', 'H'],
    minute: &[':', 'm', 'M'],
    second: &['s', 'S'],
    lead_max: 24.0,
};

const DEC_UNITS: Units = Units {
    lead: &[':', 'd', 'D', '\u{b0}'],
    minute: &[':', 'm', 'M', '\''],
    second: &['s', 'S', '"'],
    lead_max: 90.0,
};

/// Is this a plain decimal number (no exponent)?
///
/// An optional sign, optional integer digits, then an optional `.` followed
/// by at least one digit. At least one digit must be present somewhere.
fn is_float(s: &str, allow_minus: bool) -> bool {
    let body = match s.as_bytes().first() {
        Some(b'+') => &s[1..],
        Some(b'-') if allow_minus => &s[1..],
        _ => s,
    };

    let int_len = body.bytes().take_while(u8::is_ascii_digit).count();
    let frac = &body[int_len..];

    if frac.is_empty() {
        return int_len > 0;
    }

    match frac.strip_prefix('.') {
        Some(digits) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

fn in_sixty(value: f64) -> bool {
    (0.0..=60.0).contains(&value)
}

/// Split off one or two leading ASCII digits.
fn leading_digits(s: &str) -> Option<(&str, &str)> {
    let n = s.bytes().take(2).take_while(u8::is_ascii_digit).count();
    if n == 0 {
        None
    } else {
        Some(s.split_at(n))
    }
}

/// Drop surrounding whitespace and at most one separator from `seps`.
fn strip_separator<'a>(s: &'a str, seps: &[char]) -> &'a str {
    let s = s.trim_start();
    let s = s.strip_prefix(|c: char| seps.contains(&c)).unwrap_or(s);
    s.trim_start()
}

/// Leading whole component: one or two digits then an optional separator.
fn split_lead<'a>(s: &'a str, seps: &[char]) -> Option<(f64, &'a str)> {
    let (digits, rest) = leading_digits(s)?;
    let value = digits.parse::<f64>().ok()?;
    Some((value, strip_separator(rest, seps)))
}

/// One or two digits with an optional fractional part (`12`, `12.`, `12.5`).
fn split_number(s: &str) -> Option<(f64, &str)> {
    let (digits, mut rest) = leading_digits(s)?;
    let mut len = digits.len();

    if let Some(after_dot) = rest.strip_prefix('.') {
        let frac = after_dot.bytes().take_while(u8::is_ascii_digit).count();
        len += 1 + frac;
        rest = &after_dot[frac..];
    }

    let value = s[..len].parse::<f64>().ok()?;
    Some((value, rest))
}

/// Parse the unsigned sexagesimal form, returning the value in units of the
/// leading component (hours or degrees).
fn sexagesimal(s: &str, units: &Units) -> Option<f64> {
    let (lead, rest) = split_lead(s, units.lead)?;
    if lead > units.lead_max {
        return None;
    }

    if rest.is_empty() {
        return Some(lead);
    }

    if is_float(rest, false) {
        let m = rest.parse::<f64>().ok()?;
        return in_sixty(m).then_some(lead + m / 60.0);
    }

    let (m, rest) = split_number(rest)?;
    if !in_sixty(m) {
        return None;
    }
    let rest = strip_separator(rest, units.minute);

    if rest.is_empty() {
        return Some(lead + m / 60.0);
    }

    let s = if is_float(rest, false) {
        rest.parse::<f64>().ok()?
    } else {
        let (s, suffix) = split_number(rest)?;
        let suffix = suffix.trim_start();
        let mut chars = suffix.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if units.second.contains(&c) => s,
            _ => return None,
        }
    };

    in_sixty(s).then_some(lead + (m + s / 60.0) / 60.0)
}

/// Convert user text into a right ascension in decimal degrees.
///
/// Returns `None` for malformed input or a value outside [0, 360].
#[must_use]
pub fn parse_ra(text: &str) -> Option<f64> {
    let sval = text.trim();

    let ra = if is_float(sval, false) {
        sval.parse::<f64>().ok()?
    } else {
        15.0 * sexagesimal(sval, &RA_UNITS)?
    };

    if (0.0..=360.0).contains(&ra) {
        Some(ra)
    } else {
        debug!("Right ascension out of range: {sval}");
        None
    }
}

/// Convert user text into a declination in decimal degrees.
///
/// Returns `None` for malformed input or a value outside [-90, 90].
#[must_use]
pub fn parse_dec(text: &str) -> Option<f64> {
    let sval = text.trim();

    let dec = if is_float(sval, true) {
        sval.parse::<f64>().ok()?
    } else {
        let (sign, rest) = if let Some(rest) = sval.strip_prefix('-') {
            (-1.0, rest.trim_start())
        } else if let Some(rest) = sval.strip_prefix('+') {
            (1.0, rest.trim_start())
        } else {
            (1.0, sval)
        };
        sign * sexagesimal(rest, &DEC_UNITS)?
    };

    if (-90.0..=90.0).contains(&dec) {
        Some(dec)
    } else {
        debug!("Declination out of range: {sval}");
        None
    }
}

/// Parse `"ra, dec"` where the two halves are separated by a single comma.
#[must_use]
pub fn parse_position(text: &str) -> Option<(f64, f64)> {
    let mut parts = text.split(',');
    let (Some(ra), Some(dec), None) = (parts.next(), parts.next(), parts.next()) else {
        return None;
    };
    Some((parse_ra(ra)?, parse_dec(dec)?))
}
