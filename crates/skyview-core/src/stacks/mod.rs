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

//! Observation stack table.
//!
//! A stack identifier embeds its approximate position, e.g.
//! `acisfJ0618409m705956_001` is at 06h18m40.9s -70°59'56". The table is
//! loaded once and then updated in place from status payloads.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, TimeZone, Utc};
use log::{debug, info, warn};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StackIdError {
    #[error("stack id must be 23 or 24 characters, got {0}")]
    InvalidLength(usize),

    #[error("stack id has malformed coordinates: {0}")]
    InvalidCoordinates(String),
}

#[derive(Debug, Error)]
pub enum StackError {
    #[error(transparent)]
    InvalidId(#[from] StackIdError),

    #[error("failed to decode stack data: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("duplicate stack id: {0}")]
    Duplicate(String),
}

fn decode_triplet(s: &str) -> Option<(u32, u32, u32)> {
    if !s.bytes().all(|b| b.is_ascii_digit()) || s.len() < 5 {
        return None;
    }
    Some((s[..2].parse().ok()?, s[2..4].parse().ok()?, s[4..].parse().ok()?))
}

/// Recover the (ra, dec) position embedded in a stack identifier.
///
/// 24-character ids carry the coordinates in characters 6..20, 23-character
/// ids in 5..19. The RA part is `hhmmsss` with seconds in tenths, then a
/// `p` or `m` sign, then the Dec part as `ddmmss`.
pub fn decode_stack_name(id: &str) -> Result<(f64, f64), StackIdError> {
    let coords = match id.len() {
        24 if id.is_ascii() => &id[6..20],
        23 if id.is_ascii() => &id[5..19],
        n => return Err(StackIdError::InvalidLength(n)),
    };

    let bad = || StackIdError::InvalidCoordinates(coords.to_owned());

    let (rh, rm, rs) = decode_triplet(&coords[..7]).ok_or_else(bad)?;
    let (dd, dm, ds) = decode_triplet(&coords[8..]).ok_or_else(bad)?;

    let sign = match coords.as_bytes()[7] {
        b'p' => 1.0,
        b'm' => -1.0,
        _ => return Err(bad()),
    };

    let ra = 15.0 * (f64::from(rh) + (f64::from(rm) + f64::from(rs) / 600.0) / 60.0);
    let dec = sign * (f64::from(dd) + (f64::from(dm) + f64::from(ds) / 60.0) / 60.0);
    Ok((ra, dec))
}

/// Pattern check used when a stack id arrives from outside (bookmarks).
#[must_use]
pub fn is_valid_stack_id(id: &str) -> bool {
    (id.starts_with("acisfJ") && id.len() == 24)
        || (id.starts_with("hrcfJ") && id.len() == 23)
        || id.ends_with("_001")
        || id.ends_with("_002")
}

/// Processing status of a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackStatus {
    #[default]
    Unprocessed,
    Finished,
    Processing,
}

impl StackStatus {
    #[must_use]
    pub fn is_finished(self) -> bool {
        self == Self::Finished
    }
}

/// Status as found in the JSON: older files use a boolean, newer ones a code.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum RawStatus {
    Flag(bool),
    Code(u8),
}

impl RawStatus {
    fn resolve(self, id: &str) -> StackStatus {
        match self {
            Self::Flag(false) | Self::Code(0) => StackStatus::Unprocessed,
            Self::Flag(true) | Self::Code(1) => StackStatus::Finished,
            Self::Code(2) => StackStatus::Processing,
            Self::Code(n) => {
                warn!("Unknown status code {n} for stack {id}");
                StackStatus::Unprocessed
            }
        }
    }
}

type RawPolygon = Vec<[f64; 2]>;

#[derive(Debug, Deserialize)]
struct RawStack {
    stackid: String,
    #[serde(default)]
    polygons: Vec<Vec<RawPolygon>>,
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    obis: Vec<String>,
    #[serde(default)]
    new_obis: Vec<String>,
    #[serde(default)]
    status: Option<RawStatus>,
    #[serde(default)]
    lastmod: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawStackData {
    stacks: Vec<RawStack>,
}

/// One observation stack.
#[derive(Debug, Clone)]
pub struct StackRecord {
    pub id: String,
    pub ra: f64,
    pub dec: f64,
    pub status: StackStatus,
    /// Observation interval identifiers (`ObsId_ObI`).
    pub observations: Vec<String>,
    /// Observations new in this release.
    pub new_observations: Vec<String>,
    /// Target names.
    pub names: Vec<String>,
    pub description: String,
    /// Footprint outlines: for each region, the first polygon is inclusive
    /// and any further ones are holes. Vertices are (ra, dec).
    pub polygons: Vec<Vec<Vec<(f64, f64)>>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub source_count: Option<u64>,
}

impl StackRecord {
    fn from_raw(raw: RawStack) -> Result<Self, StackIdError> {
        let (ra, dec) = decode_stack_name(&raw.stackid)?;
        let status = raw
            .status
            .map_or(StackStatus::Unprocessed, |s| s.resolve(&raw.stackid));
        let polygons = raw
            .polygons
            .into_iter()
            .map(|region| {
                region
                    .into_iter()
                    .map(|poly| poly.into_iter().map(|[x, y]| (x, y)).collect())
                    .collect()
            })
            .collect();

        Ok(Self {
            ra,
            dec,
            status,
            observations: raw.obis,
            new_observations: raw.new_obis,
            names: raw.names,
            description: raw.description,
            polygons,
            last_modified: raw.lastmod.and_then(epoch_to_utc),
            source_count: None,
            id: raw.stackid,
        })
    }

    /// Distinct observation ids, in first-seen order.
    #[must_use]
    pub fn obsids(&self) -> Vec<u32> {
        let mut seen = BTreeSet::new();
        self.observations
            .iter()
            .filter_map(|obi| obi.get(..5)?.parse::<u32>().ok())
            .filter(|obsid| seen.insert(*obsid))
            .collect()
    }

    /// Every outline of the stack, flattened.
    pub fn outlines(&self) -> impl Iterator<Item = &Vec<(f64, f64)>> {
        self.polygons.iter().flatten()
    }
}

fn epoch_to_utc(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

/// Status document published alongside the stack table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusPayload {
    #[serde(default)]
    stacks: HashMap<String, RawStatus>,
    /// Completion time (epoch seconds) per finished stack.
    #[serde(default)]
    pub completed: HashMap<String, i64>,
    /// Source count per stack.
    #[serde(default)]
    pub nsource: HashMap<String, u64>,
    #[serde(default)]
    pub lastupdate: Option<String>,
    #[serde(default)]
    pub lastupdate_db: Option<String>,
    #[serde(default, alias = "srcs_proc")]
    pub nsources: Option<u64>,
    #[serde(default)]
    pub nchunks: Option<usize>,
}

impl StatusPayload {
    pub fn from_json(text: &str) -> Result<Self, StackError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Number of stacks the payload reports on.
    #[must_use]
    pub fn stack_count(&self) -> usize {
        self.stacks.len()
    }
}

/// What applying a status payload changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSummary {
    pub updated: usize,
    pub finished: usize,
    /// Ids in the payload that the table does not know.
    pub unknown: usize,
}

/// All stacks, keyed by identifier.
#[derive(Debug, Default)]
pub struct StackTable {
    stacks: Vec<StackRecord>,
    index: HashMap<String, usize>,
    completed_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    last_update: Option<String>,
    last_update_db: Option<String>,
    sources_processed: Option<u64>,
    chunk_count: Option<usize>,
}

impl StackTable {
    /// Parse the stack data document (`{"stacks": [...]}`).
    ///
    /// Stacks whose identifier does not decode are skipped with a warning.
    pub fn from_json(text: &str) -> Result<Self, StackError> {
        let raw: RawStackData = serde_json::from_str(text)?;
        let mut table = Self::default();
        for stack in raw.stacks {
            match StackRecord::from_raw(stack) {
                Ok(record) => table.insert(record)?,
                Err(e) => warn!("Skipping stack: {e}"),
            }
        }
        info!("Loaded {} stacks", table.len());
        Ok(table)
    }

    pub fn insert(&mut self, record: StackRecord) -> Result<(), StackError> {
        if self.index.contains_key(&record.id) {
            return Err(StackError::Duplicate(record.id));
        }
        self.index.insert(record.id.clone(), self.stacks.len());
        self.stacks.push(record);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&StackRecord> {
        self.index.get(id).map(|&i| &self.stacks[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &StackRecord> {
        self.stacks.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// Update status, completion time and source count in place.
    pub fn apply_status(&mut self, payload: &StatusPayload) -> StatusSummary {
        let mut summary = StatusSummary::default();
        let mut range: Option<(DateTime<Utc>, DateTime<Utc>)> = None;

        for (id, raw) in &payload.stacks {
            let Some(&i) = self.index.get(id) else {
                debug!("Status for unknown stack {id}");
                summary.unknown += 1;
                continue;
            };
            let stack = &mut self.stacks[i];
            stack.status = raw.resolve(id);
            summary.updated += 1;
            if stack.status.is_finished() {
                summary.finished += 1;
            }
        }

        for (id, secs) in &payload.completed {
            let Some(stack) = self.index.get(id).map(|&i| &mut self.stacks[i]) else {
                continue;
            };
            let Some(when) = epoch_to_utc(*secs) else {
                warn!("Invalid completion time {secs} for stack {id}");
                continue;
            };
            stack.last_modified = Some(when);
            range = Some(match range {
                None => (when, when),
                Some((lo, hi)) => (lo.min(when), hi.max(when)),
            });
        }

        for (id, n) in &payload.nsource {
            if let Some(&i) = self.index.get(id) {
                self.stacks[i].source_count = Some(*n);
            }
        }

        if range.is_some() {
            self.completed_range = range;
        }
        if payload.lastupdate.is_some() {
            self.last_update.clone_from(&payload.lastupdate);
        }
        if payload.lastupdate_db.is_some() {
            self.last_update_db.clone_from(&payload.lastupdate_db);
        }
        if payload.nsources.is_some() {
            self.sources_processed = payload.nsources;
        }
        if payload.nchunks.is_some() {
            self.chunk_count = payload.nchunks;
        }

        if summary.unknown > 0 {
            warn!("Status payload mentions {} unknown stacks", summary.unknown);
        }
        info!(
            "Applied status: {} updated, {} finished",
            summary.updated, summary.finished
        );
        summary
    }

    /// Earliest and latest completion times seen so far.
    #[must_use]
    pub fn completed_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.completed_range
    }

    #[must_use]
    pub fn last_update(&self) -> Option<&str> {
        self.last_update.as_deref()
    }

    #[must_use]
    pub fn last_update_db(&self) -> Option<&str> {
        self.last_update_db.as_deref()
    }

    #[must_use]
    pub fn sources_processed(&self) -> Option<u64> {
        self.sources_processed
    }

    /// Chunk count announced by the last status payload, if any.
    #[must_use]
    pub fn chunk_count(&self) -> Option<usize> {
        self.chunk_count
    }
}

/// Mapping from stack id to the archived event-file version.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct StackVersions(HashMap<String, u32>);

impl StackVersions {
    pub fn from_json(text: &str) -> Result<Self, StackError> {
        Ok(serde_json::from_str(text)?)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<u32> {
        self.0.get(id).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STACKS: &str = r#"{"stacks": [
        {"stackid": "acisfJ0618409m705956_001",
         "polygons": [[[[94.6, -71.0], [94.8, -71.0], [94.8, -70.9]]]],
         "names": ["LMC X-4"], "description": "ACIS stack", "obis": ["09571_000", "09571_001", "12345_000"]},
        {"stackid": "hrcfJ1234567p123456_001", "polygons": [], "names": [], "description": "", "obis": []},
        {"stackid": "short_001"}
    ]}"#;

    #[test]
    fn test_decode_acis_stack() {
        let (ra, dec) = decode_stack_name("acisfJ0618409m705956_001").unwrap();
        assert!((ra - 94.670_417).abs() < 1e-5, "ra={ra}");
        assert!((dec + 70.998_889).abs() < 1e-5, "dec={dec}");
    }

    #[test]
    fn test_decode_hrc_stack() {
        let (ra, dec) = decode_stack_name("hrcfJ1234567p123456_001").unwrap();
        let expected_ra = 15.0 * (12.0 + (34.0 + 567.0 / 600.0) / 60.0);
        let expected_dec = 12.0 + (34.0 + 56.0 / 60.0) / 60.0;
        assert!((ra - expected_ra).abs() < 1e-9);
        assert!((dec - expected_dec).abs() < 1e-9);
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(
            decode_stack_name("acisfJ0618409"),
            Err(StackIdError::InvalidLength(13))
        );
        assert!(matches!(
            decode_stack_name("acisfJ0618409x705956_001"),
            Err(StackIdError::InvalidCoordinates(_))
        ));
        assert!(matches!(
            decode_stack_name("acisfJ06184a9m705956_001"),
            Err(StackIdError::InvalidCoordinates(_))
        ));
    }

    #[test]
    fn test_is_valid_stack_id() {
        assert!(is_valid_stack_id("acisfJ0618409m705956_001"));
        assert!(is_valid_stack_id("hrcfJ1234567p123456_001"));
        assert!(is_valid_stack_id("anything_002"));
        assert!(!is_valid_stack_id("acisfJ0618409m705956"));
        assert!(!is_valid_stack_id("hrcfJ1234567p123456_00"));
    }

    #[test]
    fn test_load_table_skips_bad_ids() {
        let table = StackTable::from_json(STACKS).unwrap();
        assert_eq!(table.len(), 2);
        let stack = table.get("acisfJ0618409m705956_001").unwrap();
        assert_eq!(stack.names, vec!["LMC X-4"]);
        assert_eq!(stack.outlines().count(), 1);
        assert_eq!(stack.obsids(), vec![9571, 12345]);
        assert_eq!(stack.status, StackStatus::Unprocessed);
        assert!(table.get("short_001").is_none());
    }

    #[test]
    fn test_duplicate_rejected() {
        let text = r#"{"stacks": [{"stackid": "acisfJ0618409m705956_001"},
                                  {"stackid": "acisfJ0618409m705956_001"}]}"#;
        assert!(matches!(
            StackTable::from_json(text),
            Err(StackError::Duplicate(_))
        ));
    }

    #[test]
    fn test_apply_status() {
        let mut table = StackTable::from_json(STACKS).unwrap();
        let payload = StatusPayload::from_json(
            r#"{"stacks": {"acisfJ0618409m705956_001": 1, "hrcfJ1234567p123456_001": 2, "nope_001": 0},
                "completed": {"acisfJ0618409m705956_001": 1600000000},
                "nsource": {"acisfJ0618409m705956_001": 42},
                "lastupdate": "today", "lastupdate_db": "yesterday",
                "nsources": 1000, "nchunks": 4}"#,
        )
        .unwrap();

        let summary = table.apply_status(&payload);
        assert_eq!(
            summary,
            StatusSummary {
                updated: 2,
                finished: 1,
                unknown: 1
            }
        );

        let acis = table.get("acisfJ0618409m705956_001").unwrap();
        assert_eq!(acis.status, StackStatus::Finished);
        assert_eq!(acis.source_count, Some(42));
        assert_eq!(acis.last_modified.unwrap().timestamp(), 1_600_000_000);

        let hrc = table.get("hrcfJ1234567p123456_001").unwrap();
        assert_eq!(hrc.status, StackStatus::Processing);

        let (lo, hi) = table.completed_range().unwrap();
        assert_eq!(lo, hi);
        assert_eq!(table.chunk_count(), Some(4));
        assert_eq!(table.sources_processed(), Some(1000));
        assert_eq!(table.last_update_db(), Some("yesterday"));
    }

    #[test]
    fn test_boolean_status() {
        let mut table = StackTable::from_json(STACKS).unwrap();
        let payload = StatusPayload::from_json(
            r#"{"stacks": {"acisfJ0618409m705956_001": true}, "srcs_proc": 7}"#,
        )
        .unwrap();
        table.apply_status(&payload);
        assert!(table.get("acisfJ0618409m705956_001").unwrap().status.is_finished());
        assert_eq!(table.sources_processed(), Some(7));
    }

    #[test]
    fn test_versions() {
        let versions = StackVersions::from_json(r#"{"acisfJ0618409m705956_001": 3}"#).unwrap();
        assert_eq!(versions.get("acisfJ0618409m705956_001"), Some(3));
        assert_eq!(versions.get("other"), None);
    }
}
