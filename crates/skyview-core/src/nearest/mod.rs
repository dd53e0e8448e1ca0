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

//! Nearest-object selection.
//!
//! Given a reference point and a maximum radius, [`find_nearest`] filters a
//! candidate set by great-circle separation and returns the survivors
//! sorted closest first. The same routine drives click selection, the
//! "nearby" ring searches, and populating the catalog sources in view.

use crate::coords::separation;

/// A candidate that survived the radius test.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor<T> {
    /// Separation from the reference point, in degrees.
    pub separation: f64,
    pub item: T,
}

/// Find every candidate within `max_sep` degrees of (`ra0`, `dec0`).
///
/// `get_pos` is called exactly once per candidate and may return `None` when
/// the candidate has no usable position, in which case it is skipped.
/// `map` converts each surviving candidate into the result payload.
///
/// The radius test is inclusive and the result is sorted by ascending
/// separation. The sort is stable, so candidates at the same separation
/// keep their input order.
pub fn find_nearest<I, P, M, T>(
    ra0: f64,
    dec0: f64,
    max_sep: f64,
    candidates: I,
    mut get_pos: P,
    mut map: M,
) -> Vec<Neighbor<T>>
where
    I: IntoIterator,
    P: FnMut(&I::Item) -> Option<(f64, f64)>,
    M: FnMut(I::Item) -> T,
{
    let mut results = Vec::new();

    for candidate in candidates {
        let Some((ra, dec)) = get_pos(&candidate) else {
            continue;
        };

        let sep = separation(ra0, dec0, ra, dec);
        if sep <= max_sep {
            results.push(Neighbor {
                separation: sep,
                item: map(candidate),
            });
        }
    }

    results.sort_by(|a, b| a.separation.total_cmp(&b.separation));
    results
}

/// Convenience wrapper returning only the closest candidate.
pub fn find_closest<I, P, M, T>(
    ra0: f64,
    dec0: f64,
    max_sep: f64,
    candidates: I,
    get_pos: P,
    map: M,
) -> Option<Neighbor<T>>
where
    I: IntoIterator,
    P: FnMut(&I::Item) -> Option<(f64, f64)>,
    M: FnMut(I::Item) -> T,
{
    find_nearest(ra0, dec0, max_sep, candidates, get_pos, map)
        .into_iter()
        .next()
}
