use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::CatrecError;
use crate::models::identifier::CanonicalKey;
use crate::models::range::DateRange;
use crate::models::report::{ReconciliationRecord, Report, SourceStatus};

const GRID_LABEL: &str = "G-POD Catalogue";
const HUB_LABEL: &str = "COPHUB";

fn marker(record: &ReconciliationRecord) -> &'static str {
    match (record.has_differences(), record.is_degraded()) {
        (_, true) => " ?",
        (true, false) => " !",
        (false, false) => "",
    }
}

/// Fixed-width table. Mismatching rows end in `!`, degraded rows in `?`.
pub fn render_text(report: &Report) -> String {
    let chunk_width = report
        .records
        .iter()
        .map(|r| r.range.to_string().len())
        .max()
        .unwrap_or(0)
        .max(12);

    let mut out = format!("\nCatalog results for {}\n\n", report.meta.dataset);
    out.push_str(&format!(
        "{:^chunk_width$}|{:^17}|{:^8}\n",
        "CHUNK", GRID_LABEL, HUB_LABEL
    ));
    out.push_str(&"-".repeat(chunk_width + 27));
    out.push('\n');
    for record in &report.records {
        out.push_str(&format!(
            "{:^chunk_width$}|{:^17}|{:^8}{}\n",
            record.range.to_string(),
            record.count_a,
            record.count_b,
            marker(record)
        ));
    }
    if report.cancelled {
        out.push_str("\n(run cancelled before all chunks were processed)\n");
    }
    out
}

/// HTML table. Mismatching rows are red, degraded rows amber.
pub fn render_html(report: &Report) -> String {
    let mut out = String::from("<html>\n    <head><title></title></head>\n    <body>\n");
    out.push_str(&format!(
        "        <p>Catalog results for {}</p>\n",
        escape(&report.meta.dataset)
    ));
    out.push_str("        <table border=\"1\">\n");
    out.push_str(&format!(
        "        <tr><th>CHUNK</th><th>{GRID_LABEL}</th><th>{HUB_LABEL}</th><th>MISSING IN A</th><th>MISSING IN B</th></tr>\n"
    ));
    for record in &report.records {
        let row_attr = if record.is_degraded() {
            " bgcolor=\"#FFCC00\""
        } else if record.has_differences() {
            " bgcolor=\"#FF3333\""
        } else {
            ""
        };
        out.push_str(&format!(
            "        <tr{row_attr}><td>{}</td><td align=\"center\">{}</td><td align=\"center\">{}</td><td align=\"center\">{}</td><td align=\"center\">{}</td></tr>\n",
            record.range,
            record.count_a,
            record.count_b,
            record.missing_in_a.len(),
            record.missing_in_b.len(),
        ));
    }
    out.push_str("        </table>\n    </body>\n</html>\n");
    out
}

/// Newline-delimited, sorted keys.
pub fn missing_list(keys: &BTreeSet<CanonicalKey>) -> String {
    let mut out = String::new();
    for key in keys {
        out.push_str(key.as_str());
        out.push('\n');
    }
    out
}

/// Write the text and HTML reports plus one missing-key list per non-empty
/// difference into `dir`. Returns the paths written.
///
/// `missing_in_a` can only be trusted when the grid listing was complete,
/// and `missing_in_b` when the hub listing was. A list whose own side is
/// degraded goes to a `_incomplete` file headed by the degradation reason.
pub fn write_report(report: &Report, dir: &Path) -> Result<Vec<PathBuf>, CatrecError> {
    std::fs::create_dir_all(dir)?;
    let dataset = file_safe(&report.meta.dataset);
    let run_stem = file_stem(&dataset, &report.meta.range);

    let mut written = Vec::new();
    let mut write = |name: String, content: String| -> Result<(), CatrecError> {
        let path = dir.join(name);
        std::fs::write(&path, content)?;
        debug!(path = %path.display(), "wrote report file");
        written.push(path);
        Ok(())
    };

    write(format!("{run_stem}_report.txt"), render_text(report))?;
    write(format!("{run_stem}_report.html"), render_html(report))?;
    for record in &report.records {
        let chunk_stem = file_stem(&dataset, &record.range);
        let sides = [
            ("a", GRID_LABEL, &record.missing_in_a, &record.status_a),
            ("b", HUB_LABEL, &record.missing_in_b, &record.status_b),
        ];
        for (side, label, keys, status) in sides {
            if keys.is_empty() {
                continue;
            }
            match status {
                SourceStatus::Complete => {
                    write(format!("{chunk_stem}_missing_in_{side}.txt"), missing_list(keys))?
                }
                SourceStatus::Degraded { reason } => write(
                    format!("{chunk_stem}_missing_in_{side}_incomplete.txt"),
                    format!("# {label} listing incomplete: {reason}\n{}", missing_list(keys)),
                )?,
            }
        }
    }
    Ok(written)
}

fn file_stem(dataset: &str, range: &DateRange) -> String {
    format!("{dataset}_{}_{}", range.start(), range.end())
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::identifier::{IdentifierNormalizer, SourceKind};
    use crate::models::range::DateRange;
    use crate::models::report::{Mode, RecordKind, ReportAccumulator, ReportMeta};

    fn day(d: u32) -> DateRange {
        let day = NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        DateRange::new(day, day).unwrap()
    }

    fn sample_report() -> Report {
        let range = DateRange::new(day(1).start(), day(3).end()).unwrap();
        let mut acc = ReportAccumulator::new(ReportMeta::new(
            Mode::Daily,
            "S2A_PRD_MSIL1C",
            "Sentinel-2/S2MSI1C",
            range,
        ));
        let base = ReconciliationRecord {
            range: day(1),
            kind: RecordKind::CountOnly,
            count_a: 10,
            count_b: 10,
            reported_b: None,
            missing_in_b: BTreeSet::new(),
            missing_in_a: BTreeSet::new(),
            mismatch: false,
            status_a: SourceStatus::Complete,
            status_b: SourceStatus::Complete,
        };
        acc.push(base.clone()).unwrap();
        acc.push(ReconciliationRecord {
            range: day(2),
            count_b: 9,
            mismatch: true,
            ..base.clone()
        })
        .unwrap();
        acc.push(ReconciliationRecord {
            range: day(3),
            count_b: 0,
            mismatch: true,
            status_b: SourceStatus::degraded("unreachable"),
            ..base
        })
        .unwrap();
        acc.finish()
    }

    #[test]
    fn test_text_marks_rows() {
        let text = render_text(&sample_report());
        let lines: Vec<&str> = text.lines().collect();
        assert!(text.contains("Catalog results for S2A_PRD_MSIL1C"));
        let row = |d: &str| *lines.iter().find(|l| l.contains(d)).unwrap();
        assert!(!row("2024-01-01").ends_with('!'));
        assert!(row("2024-01-02").ends_with(" !"));
        assert!(row("2024-01-03").ends_with(" ?"));
    }

    #[test]
    fn test_html_highlights_rows() {
        let html = render_html(&sample_report());
        assert_eq!(html.matches("#FF3333").count(), 1);
        assert_eq!(html.matches("#FFCC00").count(), 1);
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn test_write_report_files() {
        let mut report = sample_report();
        let n = IdentifierNormalizer::new(".zip");
        report.records[1].missing_in_a = n.normalize_all(["Z9"], SourceKind::Hub);

        let dir = tempfile::tempdir().unwrap();
        let written = write_report(&report, dir.path()).unwrap();
        assert_eq!(written.len(), 3);

        let list = dir
            .path()
            .join("S2A_PRD_MSIL1C_2024-01-02_2024-01-02_missing_in_a.txt");
        assert_eq!(std::fs::read_to_string(list).unwrap(), "Z9\n");
        assert!(dir
            .path()
            .join("S2A_PRD_MSIL1C_2024-01-01_2024-01-03_report.html")
            .exists());
        assert_eq!(file_safe("S1/GRD x"), "S1_GRD_x");
    }

    #[test]
    fn test_degraded_side_list_is_marked_incomplete() {
        let mut report = sample_report();
        let n = IdentifierNormalizer::new(".zip");
        report.records[0].status_a = SourceStatus::degraded("gave up after 10 attempts");
        report.records[0].count_a = 0;
        report.records[0].missing_in_a = n.normalize_all(["P1", "P2", "P3"], SourceKind::Hub);
        report.records[0].missing_in_b = n.normalize_all(["Q1"], SourceKind::Hub);

        let dir = tempfile::tempdir().unwrap();
        let written = write_report(&report, dir.path()).unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert!(!names.contains(&"S2A_PRD_MSIL1C_2024-01-01_2024-01-01_missing_in_a.txt".to_string()));
        let incomplete = dir
            .path()
            .join("S2A_PRD_MSIL1C_2024-01-01_2024-01-01_missing_in_a_incomplete.txt");
        assert_eq!(
            std::fs::read_to_string(incomplete).unwrap(),
            "# G-POD Catalogue listing incomplete: gave up after 10 attempts\nP1\nP2\nP3\n"
        );
        // the hub side answered fully, so its list stays a plain finding
        assert!(names.contains(&"S2A_PRD_MSIL1C_2024-01-01_2024-01-01_missing_in_b.txt".to_string()));
    }

    #[test]
    fn test_missing_list_is_sorted() {
        let n = IdentifierNormalizer::new(".zip");
        let keys = n.normalize_all(["B.zip", "A.zip", "C.zip"], SourceKind::Grid);
        assert_eq!(missing_list(&keys), "A\nB\nC\n");
        assert_eq!(missing_list(&BTreeSet::new()), "");
    }
}
