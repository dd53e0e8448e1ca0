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

//! Chunked catalog assembly.
//!
//! The primary catalog is published as N numbered chunks which are fetched
//! independently and may complete in any order. Each chunk carries the
//! total row count and the offset of its first row, so rows are written
//! straight into their final slots. The catalog is complete once every
//! chunk has been accepted.
//!
//! Every load is tagged with a [`Generation`]. Starting a new load
//! supersedes the previous one and chunks from an older generation are
//! discarded on arrival.

use std::fmt;

use log::{debug, error, info, warn};
use serde::Deserialize;
use thiserror::Error;

use super::schema::CSC_COLUMNS;
use super::CatalogRow;

/// Default number of source-property chunks.
pub const DEFAULT_CHUNK_COUNT: usize = 8;

/// Default chunk file name; `{index}` is replaced by the 1-based chunk
/// number.
pub const DEFAULT_CHUNK_PATTERN: &str = "wwt_srcprop.{index}.json.gz";

/// Largest row total a chunk may declare.
pub const MAX_TOTAL_ROWS: usize = 10_000_000;

/// File name of chunk `index` for a pattern containing `{index}`.
#[must_use]
pub fn chunk_file_name(pattern: &str, index: usize) -> String {
    pattern.replace("{index}", &index.to_string())
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("catalog chunk has {received} columns, expected {expected}")]
    ColumnCount { expected: usize, received: usize },

    #[error("invalid catalog schema: column {index} is {received:?}, expected {expected:?}")]
    ColumnMismatch {
        index: usize,
        expected: &'static str,
        received: String,
    },

    #[error("chunk {index} is outside the range 1..={count}")]
    ChunkIndex { index: usize, count: usize },

    #[error("chunk rows {start}..{end} run past the declared total of {ntotal}")]
    Overflow {
        start: usize,
        end: usize,
        ntotal: usize,
    },

    #[error("chunk declares {ntotal} rows in total, more than the limit of {limit}")]
    TotalTooLarge { ntotal: usize, limit: usize },

    #[error("chunk declares {received} rows in total but an earlier chunk declared {expected}")]
    TotalMismatch { expected: usize, received: usize },

    #[error("no catalog load is in progress")]
    NotLoading,

    #[error("failed to decode catalog chunk: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One chunk as published.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkPayload {
    pub ntotal: usize,
    pub start: usize,
    pub cols: Vec<String>,
    pub rows: Vec<CatalogRow>,
}

impl ChunkPayload {
    pub fn from_json(text: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(text)?)
    }

    fn check_schema(&self) -> Result<(), LoadError> {
        if self.cols.len() != CSC_COLUMNS.len() {
            return Err(LoadError::ColumnCount {
                expected: CSC_COLUMNS.len(),
                received: self.cols.len(),
            });
        }

        match CSC_COLUMNS
            .iter()
            .zip(&self.cols)
            .position(|(expected, received)| expected != received)
        {
            Some(index) => Err(LoadError::ColumnMismatch {
                index,
                expected: CSC_COLUMNS[index],
                received: self.cols[index].clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Identifies one load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}

/// Result of handing a chunk to the loader.
#[derive(Debug, PartialEq)]
pub enum ChunkOutcome {
    /// Accepted; more chunks are outstanding.
    Pending { received: usize, expected: usize },
    /// Accepted and the catalog is complete.
    Complete(Vec<CatalogRow>),
    /// The chunk belongs to a superseded load and was dropped.
    Stale,
    /// The chunk had already been received and was dropped.
    Duplicate,
}

struct Assembly {
    generation: Generation,
    received: Vec<bool>,
    slots: Vec<Option<CatalogRow>>,
    ntotal: Option<usize>,
    delivered: usize,
}

impl fmt::Debug for Assembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assembly")
            .field("generation", &self.generation)
            .field("received", &self.received)
            .field("ntotal", &self.ntotal)
            .finish_non_exhaustive()
    }
}

impl Assembly {
    fn received_count(&self) -> usize {
        self.received.iter().filter(|r| **r).count()
    }

    fn finish(self) -> Vec<CatalogRow> {
        let ntotal = self.ntotal.unwrap_or(0);
        if self.delivered != ntotal {
            warn!(
                "Catalog declared {ntotal} rows but the chunks held {}",
                self.delivered
            );
        }

        let missing = self.slots.iter().filter(|s| s.is_none()).count();
        if missing > 0 {
            warn!("{missing} catalog rows were never written");
        }

        let rows: Vec<CatalogRow> = self.slots.into_iter().flatten().collect();
        info!("Catalog assembled with {} rows ({})", rows.len(), self.generation);
        rows
    }
}

/// Assembles the primary catalog from its chunks.
#[derive(Debug, Default)]
pub struct ChunkedLoader {
    next_generation: u64,
    current: Option<Assembly>,
}

impl ChunkedLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a load of `chunks` chunks, superseding any load in progress.
    pub fn begin(&mut self, chunks: usize) -> Generation {
        self.next_generation += 1;
        let generation = Generation(self.next_generation);

        if let Some(previous) = self.current.take() {
            info!(
                "Catalog load {} superseded by {generation}",
                previous.generation
            );
        }

        debug!("Starting catalog load {generation} with {chunks} chunks");
        self.current = Some(Assembly {
            generation,
            received: vec![false; chunks],
            slots: Vec::new(),
            ntotal: None,
            delivered: 0,
        });
        generation
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.current.is_some()
    }

    #[must_use]
    pub fn current_generation(&self) -> Option<Generation> {
        self.current.as_ref().map(|a| a.generation)
    }

    /// Drop the load in progress.
    pub fn abort(&mut self) {
        if let Some(assembly) = self.current.take() {
            warn!("Catalog load {} aborted", assembly.generation);
        }
    }

    /// Accept chunk `index` (1-based) for `generation`.
    ///
    /// Any error aborts the whole load; nothing from a failed load is ever
    /// returned.
    pub fn accept(
        &mut self,
        generation: Generation,
        index: usize,
        chunk: ChunkPayload,
    ) -> Result<ChunkOutcome, LoadError> {
        let Some(assembly) = self.current.as_mut() else {
            if generation.0 <= self.next_generation {
                debug!("Dropping chunk {index} from finished load {generation}");
                return Ok(ChunkOutcome::Stale);
            }
            return Err(LoadError::NotLoading);
        };

        if generation != assembly.generation {
            info!(
                "Dropping chunk {index} from {generation}, current load is {}",
                assembly.generation
            );
            return Ok(ChunkOutcome::Stale);
        }

        let result = Self::write_chunk(assembly, index, chunk);
        match result {
            Err(e) => {
                error!("Catalog load {generation} failed: {e}");
                self.current = None;
                Err(e)
            }
            Ok(false) => Ok(ChunkOutcome::Duplicate),
            Ok(true) => {
                let received = assembly.received_count();
                let expected = assembly.received.len();
                if received < expected {
                    return Ok(ChunkOutcome::Pending { received, expected });
                }
                match self.current.take() {
                    Some(done) => Ok(ChunkOutcome::Complete(done.finish())),
                    None => Err(LoadError::NotLoading),
                }
            }
        }
    }

    /// Returns `Ok(false)` for a duplicate chunk.
    fn write_chunk(
        assembly: &mut Assembly,
        index: usize,
        chunk: ChunkPayload,
    ) -> Result<bool, LoadError> {
        let count = assembly.received.len();
        if index == 0 || index > count {
            return Err(LoadError::ChunkIndex { index, count });
        }

        chunk.check_schema()?;

        if assembly.received[index - 1] {
            warn!("Chunk {index} delivered twice, ignoring");
            return Ok(false);
        }

        if chunk.ntotal > MAX_TOTAL_ROWS {
            return Err(LoadError::TotalTooLarge {
                ntotal: chunk.ntotal,
                limit: MAX_TOTAL_ROWS,
            });
        }

        let start = chunk.start;
        let end = match start.checked_add(chunk.rows.len()) {
            Some(end) if end <= chunk.ntotal => end,
            end => {
                return Err(LoadError::Overflow {
                    start,
                    end: end.unwrap_or(usize::MAX),
                    ntotal: chunk.ntotal,
                })
            }
        };

        match assembly.ntotal {
            None => {
                assembly.ntotal = Some(chunk.ntotal);
                assembly.slots = vec![None; chunk.ntotal];
            }
            Some(ntotal) if ntotal != chunk.ntotal => {
                return Err(LoadError::TotalMismatch {
                    expected: ntotal,
                    received: chunk.ntotal,
                });
            }
            Some(_) => {}
        }

        debug!("Finalizing chunk {index} (rows {start}..{end})");
        let mut overlapped = 0;
        for (slot, row) in assembly.slots[start..end].iter_mut().zip(chunk.rows) {
            if slot.replace(row).is_some() {
                overlapped += 1;
            }
        }
        if overlapped > 0 {
            warn!("Chunk {index} overwrote {overlapped} rows written by an earlier chunk");
        }
        assembly.delivered += end - start - overlapped;
        assembly.received[index - 1] = true;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Field;

    fn row(n: usize) -> CatalogRow {
        let mut row = vec![Field::Null; CSC_COLUMNS.len()];
        row[0] = Field::Text(format!("src{n}"));
        row[1] = Field::Number(n as f64);
        row[2] = Field::Number(0.0);
        row
    }

    fn chunk(ntotal: usize, start: usize, len: usize) -> ChunkPayload {
        ChunkPayload {
            ntotal,
            start,
            cols: CSC_COLUMNS.iter().map(|c| (*c).to_owned()).collect(),
            rows: (start..start + len).map(row).collect(),
        }
    }

    fn complete(outcome: ChunkOutcome) -> Vec<CatalogRow> {
        match outcome {
            ChunkOutcome::Complete(rows) => rows,
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn test_chunk_file_name() {
        assert_eq!(
            chunk_file_name(DEFAULT_CHUNK_PATTERN, 3),
            "wwt_srcprop.3.json.gz"
        );
    }

    #[test]
    fn test_reverse_order_matches_single_chunk() {
        let mut loader = ChunkedLoader::new();
        let generation = loader.begin(2);
        assert_eq!(
            loader.accept(generation, 2, chunk(5, 3, 2)).unwrap(),
            ChunkOutcome::Pending {
                received: 1,
                expected: 2
            }
        );
        assert!(loader.is_loading());
        let reversed = complete(loader.accept(generation, 1, chunk(5, 0, 3)).unwrap());
        assert!(!loader.is_loading());

        let generation = loader.begin(1);
        let single = complete(loader.accept(generation, 1, chunk(5, 0, 5)).unwrap());

        assert_eq!(reversed, single);
        assert_eq!(reversed[4][0], Field::Text("src4".into()));
    }

    #[test]
    fn test_complete_only_after_last_chunk() {
        let mut loader = ChunkedLoader::new();
        let generation = loader.begin(3);
        for (i, start) in [(1, 0), (3, 4)] {
            let outcome = loader.accept(generation, i, chunk(6, start, 2)).unwrap();
            assert!(matches!(outcome, ChunkOutcome::Pending { .. }));
        }
        let rows = complete(loader.accept(generation, 2, chunk(6, 2, 2)).unwrap());
        assert_eq!(rows.len(), 6);
    }

    #[test]
    fn test_schema_mismatch_aborts() {
        let mut loader = ChunkedLoader::new();
        let generation = loader.begin(2);
        loader.accept(generation, 1, chunk(4, 0, 2)).unwrap();

        let mut bad = chunk(4, 2, 2);
        bad.cols[5] = "err_ellipse_angle".to_owned();
        assert!(matches!(
            loader.accept(generation, 2, bad),
            Err(LoadError::ColumnMismatch { index: 5, .. })
        ));
        assert!(!loader.is_loading());

        let mut short = chunk(4, 2, 2);
        short.cols.pop();
        let generation = loader.begin(1);
        assert!(matches!(
            loader.accept(generation, 1, short),
            Err(LoadError::ColumnCount { .. })
        ));
    }

    #[test]
    fn test_stale_generation_discarded() {
        let mut loader = ChunkedLoader::new();
        let old = loader.begin(1);
        let new = loader.begin(1);
        assert_ne!(old, new);

        assert_eq!(
            loader.accept(old, 1, chunk(2, 0, 2)).unwrap(),
            ChunkOutcome::Stale
        );
        assert!(loader.is_loading());
        let rows = complete(loader.accept(new, 1, chunk(2, 0, 2)).unwrap());
        assert_eq!(rows.len(), 2);

        // late arrival after completion
        assert_eq!(
            loader.accept(new, 1, chunk(2, 0, 2)).unwrap(),
            ChunkOutcome::Stale
        );
    }

    #[test]
    fn test_duplicate_chunk_ignored() {
        let mut loader = ChunkedLoader::new();
        let generation = loader.begin(2);
        loader.accept(generation, 1, chunk(4, 0, 2)).unwrap();
        assert_eq!(
            loader.accept(generation, 1, chunk(4, 0, 2)).unwrap(),
            ChunkOutcome::Duplicate
        );
        assert!(loader.is_loading());
    }

    #[test]
    fn test_bad_index_and_overflow() {
        let mut loader = ChunkedLoader::new();
        let generation = loader.begin(2);
        assert!(matches!(
            loader.accept(generation, 0, chunk(4, 0, 2)),
            Err(LoadError::ChunkIndex { index: 0, count: 2 })
        ));

        let generation = loader.begin(2);
        assert!(matches!(
            loader.accept(generation, 3, chunk(4, 0, 2)),
            Err(LoadError::ChunkIndex { .. })
        ));

        let generation = loader.begin(2);
        assert!(matches!(
            loader.accept(generation, 2, chunk(4, 3, 2)),
            Err(LoadError::Overflow { end: 5, .. })
        ));
        assert!(!loader.is_loading());
    }

    #[test]
    fn test_start_near_usize_max_overflows() {
        let mut loader = ChunkedLoader::new();
        let generation = loader.begin(2);
        let mut huge = chunk(4, 0, 1);
        huge.start = usize::MAX;
        assert!(matches!(
            loader.accept(generation, 1, huge),
            Err(LoadError::Overflow {
                start: usize::MAX,
                end: usize::MAX,
                ntotal: 4
            })
        ));
        assert!(!loader.is_loading());
    }

    #[test]
    fn test_oversized_total_rejected() {
        let mut loader = ChunkedLoader::new();
        let generation = loader.begin(1);
        assert!(matches!(
            loader.accept(generation, 1, chunk(MAX_TOTAL_ROWS + 1, 0, 1)),
            Err(LoadError::TotalTooLarge { .. })
        ));
        assert!(!loader.is_loading());
    }

    #[test]
    fn test_overlapping_chunks_not_double_counted() {
        let mut loader = ChunkedLoader::new();
        let generation = loader.begin(2);
        loader.accept(generation, 1, chunk(4, 0, 3)).unwrap();
        let rows = complete(loader.accept(generation, 2, chunk(4, 2, 2)).unwrap());
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[2][0], Field::Text("src2".into()));
        assert_eq!(rows[3][0], Field::Text("src3".into()));
    }

    #[test]
    fn test_total_mismatch() {
        let mut loader = ChunkedLoader::new();
        let generation = loader.begin(2);
        loader.accept(generation, 1, chunk(4, 0, 2)).unwrap();
        assert!(matches!(
            loader.accept(generation, 2, chunk(5, 2, 2)),
            Err(LoadError::TotalMismatch {
                expected: 4,
                received: 5
            })
        ));
    }

    #[test]
    fn test_unwritten_slots_dropped() {
        let mut loader = ChunkedLoader::new();
        let generation = loader.begin(2);
        loader.accept(generation, 1, chunk(6, 0, 2)).unwrap();
        let rows = complete(loader.accept(generation, 2, chunk(6, 4, 2)).unwrap());
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[2][0], Field::Text("src4".into()));
    }

    #[test]
    fn test_not_loading() {
        let mut loader = ChunkedLoader::new();
        let generation = Generation(7);
        assert!(matches!(
            loader.accept(generation, 1, chunk(1, 0, 1)),
            Err(LoadError::NotLoading)
        ));
    }

    #[test]
    fn test_payload_from_json() {
        let text = r#"{"ntotal": 1, "start": 0, "cols": ["name"], "rows": [["a"]]}"#;
        let payload = ChunkPayload::from_json(text).unwrap();
        assert_eq!(payload.ntotal, 1);
        assert!(ChunkPayload::from_json("{}").is_err());
    }
}
