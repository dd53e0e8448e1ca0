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

//! Column layout of the CSC 2.0 source-property rows.

use serde::Serialize;

use super::Field;

/// Column order of every primary catalog row. Chunks declaring anything
/// else are rejected.
pub const CSC_COLUMNS: [&str; 23] = [
    "name",
    "ra",
    "dec",
    "err_ellipse_r0",
    "err_ellipse_r1",
    "err_ellipse_ang",
    "conf_flag",
    "sat_src_flag",
    "acis_num",
    "hrc_num",
    "var_flag",
    "significance",
    "fluxband",
    "flux",
    "flux_lolim",
    "flux_hilim",
    "nh_gal",
    "hard_hm",
    "hard_hm_lolim",
    "hard_hm_hilim",
    "hard_ms",
    "hard_ms_lolim",
    "hard_ms_hilim",
];

pub const NAME_COLUMN: usize = 0;
pub const RA_COLUMN: usize = 1;
pub const DEC_COLUMN: usize = 2;
pub const NH_GAL_COLUMN: usize = 16;

/// Index of a named column.
#[must_use]
pub fn column_index(column: &str) -> Option<usize> {
    CSC_COLUMNS.iter().position(|c| *c == column)
}

/// Position of a primary catalog row, if both coordinates are present.
#[must_use]
pub fn row_position(row: &[Field]) -> Option<(f64, f64)> {
    Some((row.get(RA_COLUMN)?.as_f64()?, row.get(DEC_COLUMN)?.as_f64()?))
}

/// Primary rows without a Galactic column density have not been through
/// source processing yet.
#[must_use]
pub fn is_unprocessed(row: &[Field]) -> bool {
    row.get(NH_GAL_COLUMN).is_none_or(Field::is_null)
}

/// Typed view of one primary catalog row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceProperties {
    pub name: Option<String>,
    pub ra: Option<f64>,
    pub dec: Option<f64>,
    pub err_ellipse_r0: Option<f64>,
    pub err_ellipse_r1: Option<f64>,
    pub err_ellipse_ang: Option<f64>,
    pub conf_flag: Option<bool>,
    pub sat_src_flag: Option<bool>,
    pub acis_num: Option<u32>,
    pub hrc_num: Option<u32>,
    pub var_flag: Option<bool>,
    pub significance: Option<f64>,
    pub fluxband: Option<String>,
    pub flux: Option<f64>,
    pub flux_lolim: Option<f64>,
    pub flux_hilim: Option<f64>,
    pub nh_gal: Option<f64>,
    pub hard_hm: Option<f64>,
    pub hard_hm_lolim: Option<f64>,
    pub hard_hm_hilim: Option<f64>,
    pub hard_ms: Option<f64>,
    pub hard_ms_lolim: Option<f64>,
    pub hard_ms_hilim: Option<f64>,
}

impl SourceProperties {
    /// Build from a row laid out as [`CSC_COLUMNS`]. Missing trailing
    /// columns read as null.
    #[must_use]
    pub fn from_row(row: &[Field]) -> Self {
        let num = |i: usize| row.get(i).and_then(Field::as_f64);
        let flag = |i: usize| row.get(i).and_then(Field::as_bool);
        let text = |i: usize| row.get(i).and_then(Field::as_str).map(str::to_owned);
        let count = |i: usize| num(i).filter(|n| *n >= 0.0).map(|n| n as u32);

        Self {
            name: text(NAME_COLUMN),
            ra: num(RA_COLUMN),
            dec: num(DEC_COLUMN),
            err_ellipse_r0: num(3),
            err_ellipse_r1: num(4),
            err_ellipse_ang: num(5),
            conf_flag: flag(6),
            sat_src_flag: flag(7),
            acis_num: count(8),
            hrc_num: count(9),
            var_flag: flag(10),
            significance: num(11),
            fluxband: text(12),
            flux: num(13),
            flux_lolim: num(14),
            flux_hilim: num(15),
            nh_gal: num(NH_GAL_COLUMN),
            hard_hm: num(17),
            hard_hm_lolim: num(18),
            hard_hm_hilim: num(19),
            hard_ms: num(20),
            hard_ms_lolim: num(21),
            hard_ms_hilim: num(22),
        }
    }

    #[must_use]
    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.ra?, self.dec?))
    }

    #[must_use]
    pub fn is_unprocessed(&self) -> bool {
        self.nh_gal.is_none()
    }
}
