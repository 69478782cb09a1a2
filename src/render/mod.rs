use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use image::{codecs::png::PngEncoder, ExtendedColorType, ImageEncoder};
use thiserror::Error;
use tracing::{debug, info};

pub mod charts;
pub mod font;
pub mod preview;
pub mod table;

use table::ParsedTable;

/// Number of report rows shown in the preview image.
pub const PREVIEW_ROWS: usize = 15;

/// Number of summary rows the summary chart maps onto its fixed labels.
pub const SUMMARY_ROWS: usize = 5;

/// One deliverable produced from a report, in send order.
#[derive(Debug, Clone)]
pub enum Artifact {
    Image {
        bytes: Vec<u8>,
        filename: String,
        caption: Option<String>,
    },
    File {
        bytes: Vec<u8>,
        filename: String,
    },
    /// A user-visible note about a skipped step.
    Notice(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("content is not parseable as delimited text: {0}")]
    Parse(String),
    #[error("summary chart needs {SUMMARY_ROWS} summary rows, found {0}")]
    InsufficientSummaryRows(usize),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Turn one stored report into its artifact sequence: preview image, the raw
/// CSV, then the charts the data supports. Only a parse failure aborts; a
/// short summary block downgrades to a notice.
pub fn render_report(
    name: &str,
    content: &str,
    created_at: DateTime<Utc>,
) -> Result<Vec<Artifact>, RenderError> {
    font::ensure_fonts()?;
    let table = ParsedTable::parse(content)?;
    let created = created_at.format("%Y-%m-%d").to_string();
    info!(
        name,
        rows = table.rows.len(),
        numeric = table.numeric_columns.len(),
        "rendering report"
    );

    let mut artifacts = vec![
        Artifact::Image {
            bytes: preview::table_image(name, &created, &table)?,
            filename: format!("{}.png", name),
            caption: Some(format!(
                "📄 {}\n🗓 {}\n\n📂 CSV file attached ⬇️",
                name, created
            )),
        },
        Artifact::File {
            bytes: content.as_bytes().to_vec(),
            filename: format!("{}.csv", name),
        },
    ];

    if table.numeric_columns.is_empty() {
        debug!(name, "no numeric columns; skipping charts");
        return Ok(artifacts);
    }

    if !table.main_rows().is_empty() {
        artifacts.push(Artifact::Image {
            bytes: charts::main_chart(&table)?,
            filename: format!("{}_main_chart.png", name),
            caption: None,
        });
    }

    let summary_count = table.summary_rows().len();
    if summary_count > 0 {
        match charts::summary_chart(&table) {
            Ok(bytes) => artifacts.push(Artifact::Image {
                bytes,
                filename: format!("{}_totals_chart.png", name),
                caption: None,
            }),
            Err(RenderError::InsufficientSummaryRows(found)) => {
                debug!(name, found, "summary chart skipped");
                artifacts.push(Artifact::Notice(format!(
                    "⚠️ Summary chart skipped: expected {} summary rows, found {}.",
                    SUMMARY_ROWS, found
                )));
            }
            Err(e) => return Err(e),
        }
    }

    Ok(artifacts)
}

/// Encode a raw RGB framebuffer as PNG bytes.
pub(crate) fn encode_png(buf: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(buf, width, height, ExtendedColorType::Rgb8)
        .context("encoding PNG")?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SCENARIO_CSV: &str = "\
Site,Truck,Gross (kg),Tare (kg)
North,KA-01,1200,300
South,KB-02,1500,320
West,KC-03,1100,290
Totals,,,4100
Totals,,,3800
Totals,,,2900
Totals,,,2600
Totals,,,300
";

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 25, 9, 30, 0).unwrap()
    }

    fn filenames(artifacts: &[Artifact]) -> Vec<String> {
        artifacts
            .iter()
            .filter_map(|a| match a {
                Artifact::Image { filename, .. } | Artifact::File { filename, .. } => {
                    Some(filename.clone())
                }
                Artifact::Notice(_) => None,
            })
            .collect()
    }

    #[test]
    fn full_report_yields_preview_file_and_both_charts() -> anyhow::Result<()> {
        let artifacts = render_report("daily", SCENARIO_CSV, created())?;
        assert_eq!(
            filenames(&artifacts),
            vec![
                "daily.png",
                "daily.csv",
                "daily_main_chart.png",
                "daily_totals_chart.png",
            ]
        );
        for artifact in &artifacts {
            if let Artifact::Image { bytes, .. } = artifact {
                assert!(bytes.starts_with(b"\x89PNG"));
            }
        }
        Ok(())
    }

    #[test]
    fn rendering_is_idempotent_on_chart_eligibility() -> anyhow::Result<()> {
        let first = render_report("daily", SCENARIO_CSV, created())?;
        let second = render_report("daily", SCENARIO_CSV, created())?;
        assert_eq!(filenames(&first), filenames(&second));
        Ok(())
    }

    #[test]
    fn header_only_content_skips_both_charts() -> anyhow::Result<()> {
        let artifacts = render_report("empty", "a,b,c\n", created())?;
        assert_eq!(filenames(&artifacts), vec!["empty.png", "empty.csv"]);
        assert!(!artifacts
            .iter()
            .any(|a| matches!(a, Artifact::Notice(_))));
        Ok(())
    }

    #[test]
    fn text_only_table_skips_both_charts() -> anyhow::Result<()> {
        let artifacts = render_report("text", "a,b\nx,y\nz,w\n", created())?;
        assert_eq!(filenames(&artifacts), vec!["text.png", "text.csv"]);
        Ok(())
    }

    #[test]
    fn short_summary_block_downgrades_to_a_notice() -> anyhow::Result<()> {
        let content = "\
Site,Truck,Gross (kg),Tare (kg)
North,KA-01,1200,300
Totals,,,4100
Totals,,,3800
";
        let artifacts = render_report("short", content, created())?;
        assert_eq!(
            filenames(&artifacts),
            vec!["short.png", "short.csv", "short_main_chart.png"]
        );
        assert!(artifacts
            .iter()
            .any(|a| matches!(a, Artifact::Notice(text) if text.contains("found 2"))));
        Ok(())
    }

    #[test]
    fn original_file_round_trips_content() -> anyhow::Result<()> {
        let artifacts = render_report("daily", SCENARIO_CSV, created())?;
        let file = artifacts
            .iter()
            .find_map(|a| match a {
                Artifact::File { bytes, .. } => Some(bytes.clone()),
                _ => None,
            })
            .expect("file artifact missing");
        assert_eq!(file, SCENARIO_CSV.as_bytes());
        Ok(())
    }

    #[test]
    fn unparseable_content_emits_nothing() {
        let err = render_report("broken", "", created()).unwrap_err();
        assert!(matches!(err, RenderError::Parse(_)));
    }
}
