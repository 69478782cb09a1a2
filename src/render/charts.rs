use anyhow::anyhow;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{FontDesc, FontFamily, FontStyle, FontTransform};
use tracing::debug;

use super::table::ParsedTable;
use super::{encode_png, RenderError, SUMMARY_ROWS};

/// Fixed labels of the five summary bars, in store order of the summary rows.
const SUMMARY_LABELS: [&str; SUMMARY_ROWS] = [
    "Gross in",
    "Gross out",
    "Net in",
    "Net out",
    "Overall remainder",
];

/// Fixed colors of the five summary bars.
const SUMMARY_COLORS: [RGBColor; SUMMARY_ROWS] = [
    RGBColor(76, 175, 80),
    RGBColor(244, 67, 54),
    RGBColor(33, 150, 243),
    RGBColor(255, 152, 0),
    RGBColor(156, 39, 176),
];

const MAIN_SIZE: (u32, u32) = (1200, 500);
const SUMMARY_SIZE: (u32, u32) = (900, 450);

/// `12345.6` -> `"12,346"`. Thousands-separated, zero decimal places.
pub fn format_thousands(v: f64) -> String {
    let n = v.round() as i64;
    let digits = n.abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if n < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

fn y_bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut lo = 0.0f64;
    let mut hi = 0.0f64;
    for v in values {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    // Headroom for annotations; guard against a degenerate range.
    let span = (hi - lo).max(1.0);
    (lo - if lo < 0.0 { span * 0.1 } else { 0.0 }, hi + span * 0.15)
}

/// Grouped bar chart over the main rows: one series per numeric column,
/// category labels taken from the second display column (prefixed with the
/// 1-based row position) and rotated for legibility.
pub fn main_chart(table: &ParsedTable) -> Result<Vec<u8>, RenderError> {
    let main = table.main_rows();
    // The displayed table has a synthetic index column in front, so its
    // "second column" is the first parsed one.
    let labels: Vec<String> = main
        .iter()
        .enumerate()
        .map(|(i, row)| format!("{}. {}", i + 1, row[0].display()))
        .collect();

    let series = &table.numeric_columns;
    let (y_min, y_max) = y_bounds(
        main.iter()
            .flat_map(|row| series.iter().filter_map(|&c| row[c].as_number())),
    );
    let n = main.len();
    let band = 0.8 / series.len() as f64;

    let (width, height) = MAIN_SIZE;
    let mut buf = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| anyhow!("main chart fill: {}", e))?;

        let mut chart = ChartBuilder::on(&root)
            .caption(
                "Main chart over numeric data",
                FontDesc::new(FontFamily::SansSerif, 22.0, FontStyle::Bold),
            )
            .margin(10)
            .x_label_area_size(150)
            .y_label_area_size(80)
            .build_cartesian_2d(0f64..n as f64, y_min..y_max)
            .map_err(|e| anyhow!("main chart axes: {}", e))?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_label_formatter(&|_| String::new())
            .draw()
            .map_err(|e| anyhow!("main chart mesh: {}", e))?;

        for (si, &col) in series.iter().enumerate() {
            let color = Palette99::pick(si).mix(1.0);
            let bars = main.iter().enumerate().map(|(i, row)| {
                let v = row[col].as_number().unwrap_or(0.0);
                let x0 = i as f64 + 0.1 + band * si as f64;
                Rectangle::new([(x0, 0.0), (x0 + band, v)], color.filled())
            });
            chart
                .draw_series(bars)
                .map_err(|e| anyhow!("main chart bars: {}", e))?
                .label(table.columns[col].clone())
                .legend(move |(x, y)| {
                    Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled())
                });
        }

        let legend_bg = WHITE.mix(0.85);
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(&legend_bg)
            .border_style(&BLACK)
            .draw()
            .map_err(|e| anyhow!("main chart legend: {}", e))?;

        // Category labels are drawn by hand below the axis, rotated.
        let label_font = ("sans-serif", 13)
            .into_font()
            .transform(FontTransform::Rotate90);
        let label_style = TextStyle::from(label_font).pos(Pos::new(HPos::Left, VPos::Center));
        for (i, label) in labels.iter().enumerate() {
            let (px, py) = chart.backend_coord(&(i as f64 + 0.5, y_min));
            root.draw(&Text::new(label.clone(), (px, py + 6), label_style.clone()))
                .map_err(|e| anyhow!("main chart labels: {}", e))?;
        }

        root.present().map_err(|e| anyhow!("main chart present: {}", e))?;
    }

    Ok(encode_png(&buf, width, height)?)
}

/// Five fixed bars over the summary rows, values from the tare/weight column,
/// each annotated with its thousands-separated value.
pub fn summary_chart(table: &ParsedTable) -> Result<Vec<u8>, RenderError> {
    let summary = table.summary_rows();
    if summary.len() < SUMMARY_ROWS {
        return Err(RenderError::InsufficientSummaryRows(summary.len()));
    }
    let value_col = table
        .tare_column()
        .ok_or_else(|| anyhow!("summary chart requested without a numeric value column"))?;

    let values: Vec<f64> = summary[..SUMMARY_ROWS]
        .iter()
        .map(|row| {
            let v = row[value_col].as_number();
            if v.is_none() {
                debug!("summary row has no value in the tare column; using 0");
            }
            v.unwrap_or(0.0)
        })
        .collect();
    let (y_min, y_max) = y_bounds(values.iter().copied());

    let (width, height) = SUMMARY_SIZE;
    let mut buf = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| anyhow!("summary fill: {}", e))?;

        let mut chart = ChartBuilder::on(&root)
            .caption(
                "Summary values",
                FontDesc::new(FontFamily::SansSerif, 22.0, FontStyle::Bold),
            )
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(80)
            .build_cartesian_2d(0f64..SUMMARY_ROWS as f64, y_min..y_max)
            .map_err(|e| anyhow!("summary axes: {}", e))?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_label_formatter(&|_| String::new())
            .y_desc("Amount (kg)")
            .draw()
            .map_err(|e| anyhow!("summary mesh: {}", e))?;

        chart
            .draw_series(values.iter().enumerate().map(|(i, &v)| {
                Rectangle::new(
                    [(i as f64 + 0.15, 0.0), (i as f64 + 0.85, v)],
                    SUMMARY_COLORS[i].filled(),
                )
            }))
            .map_err(|e| anyhow!("summary bars: {}", e))?;

        let value_style =
            TextStyle::from(FontDesc::new(FontFamily::SansSerif, 13.0, FontStyle::Bold))
                .pos(Pos::new(HPos::Center, VPos::Bottom));
        let label_style = TextStyle::from(("sans-serif", 13).into_font())
            .pos(Pos::new(HPos::Center, VPos::Top));
        for (i, &v) in values.iter().enumerate() {
            let x = i as f64 + 0.5;
            let (px, py) = chart.backend_coord(&(x, v.max(0.0)));
            root.draw(&Text::new(
                format!("{} kg", format_thousands(v)),
                (px, py - 4),
                value_style.clone(),
            ))
            .map_err(|e| anyhow!("summary annotations: {}", e))?;

            let (lx, ly) = chart.backend_coord(&(x, y_min));
            root.draw(&Text::new(
                SUMMARY_LABELS[i],
                (lx, ly + 6),
                label_style.clone(),
            ))
            .map_err(|e| anyhow!("summary labels: {}", e))?;
        }

        root.present().map_err(|e| anyhow!("summary present: {}", e))?;
    }

    Ok(encode_png(&buf, width, height)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_formatting() {
        assert_eq!(format_thousands(0.0), "0");
        assert_eq!(format_thousands(300.0), "300");
        assert_eq!(format_thousands(4100.0), "4,100");
        assert_eq!(format_thousands(1234567.0), "1,234,567");
        assert_eq!(format_thousands(-4100.4), "-4,100");
        assert_eq!(format_thousands(2600.6), "2,601");
    }

    #[test]
    fn summary_chart_requires_five_rows() {
        let table = ParsedTable::parse("a,b\nx,1\ny,\n").unwrap();
        let err = summary_chart(&table).unwrap_err();
        assert!(matches!(err, RenderError::InsufficientSummaryRows(1)));
    }

    #[test]
    fn main_chart_draws_for_complete_rows() -> anyhow::Result<()> {
        crate::render::font::ensure_fonts()?;
        let table = ParsedTable::parse("Site,Truck,W (kg)\nN,KA,100\nS,KB,200\n")?;
        let bytes = main_chart(&table)?;
        assert!(bytes.starts_with(b"\x89PNG"));
        Ok(())
    }

    #[test]
    fn summary_chart_draws_with_exactly_five_rows() -> anyhow::Result<()> {
        crate::render::font::ensure_fonts()?;
        let table = ParsedTable::parse(
            "Site,Gross (kg),Tare (kg)\nN,10,1\nt,,100\nt,,200\nt,,300\nt,,400\nt,,500\n",
        )?;
        let bytes = summary_chart(&table)?;
        assert!(bytes.starts_with(b"\x89PNG"));
        Ok(())
    }
}
