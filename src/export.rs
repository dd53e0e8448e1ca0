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

//! CSV export of the sources in view.

use std::io::Write;

use skyview_core::coords::{format_position, format_separation, separation};
use skyview_core::SourceProperties;

/// Write the sources as CSV, one row per source with a header.
pub fn write_csv<W: Write>(writer: W, sources: &[SourceProperties]) -> Result<(), csv::Error> {
    let mut out = csv::Writer::from_writer(writer);
    for source in sources {
        out.serialize(source)?;
    }
    out.flush()?;
    Ok(())
}

/// One summary line per source for terminal output.
#[must_use]
pub fn summary_line(source: &SourceProperties, center: (f64, f64)) -> String {
    let name = source.name.as_deref().unwrap_or("?");
    match source.position() {
        Some((ra, dec)) => {
            let sep = separation(center.0, center.1, ra, dec);
            let flag = if source.is_unprocessed() {
                " (unprocessed)"
            } else {
                ""
            };
            format!(
                "{name}  {}  {}{flag}",
                format_position(ra, dec),
                format_separation(sep)
            )
        }
        None => format!("{name}  (no position)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(name: &str, ra: f64, dec: f64) -> SourceProperties {
        SourceProperties {
            name: Some(name.to_owned()),
            ra: Some(ra),
            dec: Some(dec),
            nh_gal: Some(0.07),
            flux: Some(1.2e-14),
            ..SourceProperties::default()
        }
    }

    #[test]
    fn test_write_csv_has_header_and_rows() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &[source("a", 1.0, 2.0), source("b", 3.0, -4.0)]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("name,ra,dec,err_ellipse_r0"));
        assert!(lines[2].starts_with("b,3"));
    }

    #[test]
    fn test_summary_line() {
        let line = summary_line(&source("2CXO J1", 15.0, 0.0), (15.0, 0.0));
        assert!(line.starts_with("2CXO J1  1h 0m 0s +0\u{b0} 0' 0\""));
        assert!(line.ends_with("0.0\""));

        let mut bare = source("x", 10.0, 0.0);
        bare.nh_gal = None;
        assert!(summary_line(&bare, (10.0, 0.0)).ends_with("(unprocessed)"));
    }
}
