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

//! Messages for the SAMP desktop messaging bus.
//!
//! Only message construction lives here. Delivering them is up to a
//! [`MessageBus`] implementation supplied by the front end.

use log::debug;

use crate::lookup::escape_query_value;

const CSCCLI_PROPERTIES: &str =
    "http://cda.cfa.harvard.edu/csccli/getProperties?outputFormat=votable&version=cur";

const BASIC_COLUMNS: &[&str] = &[
    "name",
    "ra",
    "dec",
    "err_ellipse_r0",
    "err_ellipse_r1",
    "err_ellipse_ang",
    "significance",
    "likelihood_class",
    "conf_flag",
    "sat_src_flag",
    "streak_src_flag",
    "flux_aper_b",
    "flux_aper_lolim_b",
    "flux_aper_hilim_b",
    "flux_aper_w",
    "flux_aper_lolim_w",
    "flux_aper_hilim_w",
];

const SUMMARY_COLUMNS: &[&str] = &[
    "name",
    "ra",
    "dec",
    "err_ellipse_r0",
    "err_ellipse_r1",
    "err_ellipse_ang",
    "significance",
    "likelihood",
    "likelihood_class",
    "conf_flag",
    "extent_flag",
    "sat_src_flag",
    "streak_src_flag",
    "var_flag",
    "flux_aper_b",
    "flux_aper_lolim_b",
    "flux_aper_hilim_b",
    "flux_aper_w",
    "flux_aper_lolim_w",
    "flux_aper_hilim_w",
    "hard_hm",
    "hard_hm_lolim",
    "hard_hm_hilim",
    "hard_ms",
    "hard_ms_lolim",
    "hard_ms_hilim",
    "var_intra_index_b",
    "var_intra_index_w",
    "var_inter_index_b",
    "var_inter_index_w",
    "acis_time",
    "hrc_time",
];

/// Column set requested by a cone search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConeColumns {
    #[default]
    Basic,
    Summary,
}

impl ConeColumns {
    fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Basic => BASIC_COLUMNS,
            Self::Summary => SUMMARY_COLUMNS,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Basic => "basic summary",
            Self::Summary => "summary",
        }
    }
}

/// A message that can be broadcast to SAMP clients.
#[derive(Debug, Clone, PartialEq)]
pub enum SampMessage {
    /// `coord.pointAt.sky`
    PointAtSky { ra: f64, dec: f64 },
    /// `table.load.votable`
    LoadTable { url: String, name: String },
    /// `image.load.fits`
    LoadImage { url: String, name: String },
}

impl SampMessage {
    /// The SAMP mtype string.
    #[must_use]
    pub fn mtype(&self) -> &'static str {
        match self {
            Self::PointAtSky { .. } => "coord.pointAt.sky",
            Self::LoadTable { .. } => "table.load.votable",
            Self::LoadImage { .. } => "image.load.fits",
        }
    }

    /// Message parameters as key/value strings.
    #[must_use]
    pub fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::PointAtSky { ra, dec } => vec![("ra", ra.to_string()), ("dec", dec.to_string())],
            Self::LoadTable { url, name } | Self::LoadImage { url, name } => {
                vec![("url", url.clone()), ("name", name.clone())]
            }
        }
    }

    /// Send the stacked event file of a stack at the given archive version.
    #[must_use]
    pub fn stack_event_file(stack: &str, version: u32) -> Self {
        let url = format!(
            "http://cda.harvard.edu/csccli/retrieveFile?version=cur&filetype=stkevt3&filename={stack}N{version:03}_evt3.fits"
        );
        debug!("SAMP: stack={stack} ver={version}");
        Self::LoadImage {
            url,
            name: format!("Stack evt3 for {stack}"),
        }
    }

    /// Cone search of the master source table. `fov` is in degrees and is
    /// used as the search radius.
    #[must_use]
    pub fn cone_search(ra: f64, dec: f64, fov: f64, columns: ConeColumns) -> Self {
        let rmax = fov * 60.0;
        let url = format!(
            "{CSCCLI_PROPERTIES}&query=select%20distinct%20{}%20from%20master_source%20where%20dbo.cone_distance%28ra,dec,{ra},{dec}%29%3C%3D{rmax}%20order%20by%20flux_aper_b%20desc,%20flux_aper_w%20desc",
            columns.columns().join(",")
        );
        Self::LoadTable {
            url,
            name: format!("CSC 2.0 {} source properties (cone-search)", columns.label()),
        }
    }

    /// All master-source properties of one named source.
    #[must_use]
    pub fn source_properties(name: &str) -> Self {
        let url = format!(
            "{CSCCLI_PROPERTIES}&query=select%20*%20from%20master_source%20where%20name%20%3D%20%27{}%27",
            escape_query_value(name)
        );
        Self::LoadTable {
            url,
            name: "CSC 2.0 master-source properties (single source)".to_owned(),
        }
    }
}

/// Connection to a SAMP hub.
pub trait MessageBus {
    /// Is a hub currently registered?
    fn is_connected(&self) -> bool;

    /// Broadcast a message. Returns `false` if it could not be sent.
    fn send(&mut self, message: SampMessage) -> bool;
}

/// A bus that is never connected.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBus;

impl MessageBus for NullBus {
    fn is_connected(&self) -> bool {
        false
    }

    fn send(&mut self, message: SampMessage) -> bool {
        debug!("SAMP not connected, dropping {}", message.mtype());
        false
    }
}
