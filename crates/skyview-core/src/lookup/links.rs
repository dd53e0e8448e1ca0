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

//! Links to external archives for a name or a position.

use super::escape_query_value;

/// NED search by object name.
#[must_use]
pub fn ned_name_url(name: &str) -> String {
    format!(
        "https://ned.ipac.caltech.edu/?q=byname&objname={}",
        escape_query_value(name)
    )
}

/// NED search around a position (about 5 arcsec radius).
#[must_use]
pub fn ned_coord_url(ra: f64, dec: f64) -> String {
    format!(
        "http://ned.ipac.caltech.edu/?q=nearposn&lon={ra}d&lat={dec}&sr=0.0833&incsrcs=0&coordsys=Equatorial&equinox=J2000"
    )
}

/// SIMBAD search by identifier.
#[must_use]
pub fn simbad_name_url(name: &str) -> String {
    format!(
        "http://simbad.u-strasbg.fr/simbad/sim-id?Ident={}",
        escape_query_value(name)
    )
}

/// SIMBAD cone search around a position with a 5 arcsec radius.
#[must_use]
pub fn simbad_coord_url(ra: f64, dec: f64) -> String {
    format!(
        "http://simbad.u-strasbg.fr/simbad/sim-coo?Coord={ra}%20{dec}&CooFrame=FK5&CooEpoch=2000&CooEqui=2000&CooDefinedFrames=none&Radius=5&Radius.unit=arcsec&submit=submit%20query&CoordList="
    )
}

/// Chandra archive page for an observation.
#[must_use]
pub fn chaser_obsid_url(obsid: u32) -> String {
    format!("http://cda.cfa.harvard.edu/chaser/startViewer.do?menuItem=details&obsid={obsid}")
}
