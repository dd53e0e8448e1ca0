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

//! Target search.
//!
//! User text is classified as a coordinate pair, a CSC source name, or a
//! free-form name. Free-form names that are not stack ids go to the lookUP
//! name resolver; this module builds its query URL and interprets its JSON
//! response. The HTTP call itself belongs to the front end.

mod links;

pub use links::{
    chaser_obsid_url, ned_coord_url, ned_name_url, simbad_coord_url, simbad_name_url,
};

use std::fmt;
use std::fmt::Write as _;

use log::debug;
use serde::Deserialize;
use thiserror::Error;

use crate::coords::parse_position;

/// Default lookUP endpoint.
pub const LOOKUP_URL: &str = "https://www.strudel.org.uk/lookUP/json/";

/// Prefix of CSC source names.
pub const SOURCE_NAME_PREFIX: &str = "2CXO J";

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("there was a problem querying the lookUP service")]
    Service,

    #[error("invalid lookUP response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// What the user typed into the search box.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// `ra, dec` that parsed as coordinates. The label keeps the user's text.
    Position { ra: f64, dec: f64, label: String },
    /// A CSC source name (`2CXO J...`).
    SourceName(String),
    /// Anything else: a stack id or an astronomical name.
    Name(String),
}

/// Classify search text. Returns `None` for blank input.
#[must_use]
pub fn classify_target(text: &str) -> Option<Target> {
    let target = text.trim();
    if target.is_empty() {
        return None;
    }

    if let Some((ra, dec)) = parse_position(target) {
        let label = target
            .split(',')
            .map(str::trim)
            .collect::<Vec<_>>()
            .join(", ");
        return Some(Target::Position { ra, dec, label });
    }

    if target.starts_with(SOURCE_NAME_PREFIX) {
        return Some(Target::SourceName(target.to_owned()));
    }

    Some(Target::Name(target.to_owned()))
}

/// Source classification returned by lookUP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub avmcode: String,
    #[serde(default)]
    pub avmdesc: String,
}

/// Interpreted lookUP response.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Found {
        ra: f64,
        dec: f64,
        service: Option<String>,
        category: Option<Category>,
    },
    /// The name was not recognised but lookUP offered an alternative.
    Suggestion { name: String, suggestion: String },
    NotFound(String),
}

impl fmt::Display for LookupOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found {
                service, category, ..
            } => {
                match service {
                    Some(service) => write!(f, "Location provided by {service}.")?,
                    None => write!(f, "Location found.")?,
                }
                if let Some(cat) = category.as_ref().filter(|c| !c.avmcode.is_empty()) {
                    write!(f, " Source category: {}", cat.avmdesc)?;
                }
                Ok(())
            }
            Self::Suggestion { name, suggestion } => {
                write!(f, "Target \"{name}\" not found. Did you mean \"{suggestion}\"?")
            }
            Self::NotFound(msg) => f.write_str(msg),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawAngle {
    decimal: f64,
}

#[derive(Debug, Deserialize)]
struct RawTarget {
    #[serde(default)]
    suggestion: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawService {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    target: Option<RawTarget>,
    #[serde(default)]
    ra: Option<RawAngle>,
    #[serde(default)]
    dec: Option<RawAngle>,
    #[serde(default)]
    service: Option<RawService>,
    #[serde(default)]
    category: Option<Category>,
    #[serde(default)]
    message: Option<String>,
}

/// Interpret the JSON body returned by lookUP for `name`.
pub fn parse_lookup_response(name: &str, body: &str) -> Result<LookupOutcome, LookupError> {
    let d: RawResponse = serde_json::from_str(body)?;

    if d.kind.as_deref() == Some("error") {
        return Err(LookupError::Service);
    }

    if let Some(suggestion) = d.target.and_then(|t| t.suggestion) {
        return Ok(LookupOutcome::Suggestion {
            name: name.to_owned(),
            suggestion,
        });
    }

    if let (Some(ra), Some(dec)) = (d.ra, d.dec) {
        return Ok(LookupOutcome::Found {
            ra: ra.decimal,
            dec: dec.decimal,
            service: d.service.and_then(|s| s.name),
            category: d.category,
        });
    }

    debug!("lookUP has no position for {name}");
    Ok(LookupOutcome::NotFound(
        d.message
            .unwrap_or_else(|| format!("Target \"{name}\" not found.")),
    ))
}

/// lookUP query URL for a name.
#[must_use]
pub fn lookup_url(base: &str, name: &str) -> String {
    format!("{base}?name={}", escape_query_value(name))
}

/// Percent-encode a query value, leaving only RFC 3986 unreserved
/// characters (`A-Z a-z 0-9 - _ . ~`) as they are.
#[must_use]
pub fn escape_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(b));
        } else {
            let _ = write!(out, "%{b:02X}");
        }
    }
    out
}

/// Undo percent-encoding (and `+` for space). `None` on a malformed escape
/// or invalid UTF-8.
#[must_use]
pub fn unescape_query_value(value: &str) -> Option<String> {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = value.get(i + 1..i + 3)?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).ok()
}
