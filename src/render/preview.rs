use anyhow::anyhow;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{FontDesc, FontFamily, FontStyle};

use super::table::ParsedTable;
use super::{encode_png, RenderError, PREVIEW_ROWS};

const HEADER_BG: RGBColor = RGBColor(46, 134, 193);
const STRIPE_BG: RGBColor = RGBColor(248, 249, 249);
const GRID: RGBColor = RGBColor(208, 211, 212);

const ROW_H: i32 = 30;
const TITLE_H: i32 = 58;
const MARGIN: i32 = 12;
const MAX_CELL_CHARS: usize = 28;

fn clip(text: &str) -> String {
    if text.chars().count() <= MAX_CELL_CHARS {
        text.to_string()
    } else {
        let mut clipped: String = text.chars().take(MAX_CELL_CHARS - 1).collect();
        clipped.push('…');
        clipped
    }
}

/// Render the first rows of a table as a styled PNG: blue header row, body
/// rows striped by parity, report name + creation date on top. A synthetic
/// 1-based row index column is prepended for display.
pub fn table_image(name: &str, created: &str, table: &ParsedTable) -> Result<Vec<u8>, RenderError> {
    let shown = &table.rows[..table.rows.len().min(PREVIEW_ROWS)];

    let mut header: Vec<String> = vec!["#".to_string()];
    header.extend(table.columns.iter().map(|c| clip(c)));
    let body: Vec<Vec<String>> = shown
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut cells = vec![(i + 1).to_string()];
            cells.extend(row.iter().map(|c| clip(&c.display())));
            cells
        })
        .collect();

    let widths: Vec<i32> = (0..header.len())
        .map(|col| {
            let mut longest = header[col].chars().count();
            for row in &body {
                longest = longest.max(row[col].chars().count());
            }
            longest.clamp(2, MAX_CELL_CHARS) as i32 * 8 + 18
        })
        .collect();

    let table_w: i32 = widths.iter().sum();
    let width = (table_w + MARGIN * 2).max(360) as u32;
    let height = (TITLE_H + ROW_H * (body.len() as i32 + 1) + MARGIN * 2) as u32;

    let mut buf = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| anyhow!("preview fill: {}", e))?;

        let centered = Pos::new(HPos::Center, VPos::Center);
        let title_style =
            TextStyle::from(FontDesc::new(FontFamily::SansSerif, 20.0, FontStyle::Bold))
                .pos(centered);
        let subtitle_style = TextStyle::from(("sans-serif", 14).into_font()).pos(centered);
        let header_style =
            TextStyle::from(FontDesc::new(FontFamily::SansSerif, 14.0, FontStyle::Bold))
                .color(&WHITE)
                .pos(centered);
        let cell_style = TextStyle::from(("sans-serif", 14).into_font()).pos(centered);

        let cx = width as i32 / 2;
        root.draw(&Text::new(name.to_string(), (cx, MARGIN + 12), title_style))
            .map_err(|e| anyhow!("preview title: {}", e))?;
        root.draw(&Text::new(
            format!("Created: {}", created),
            (cx, MARGIN + 38),
            subtitle_style,
        ))
        .map_err(|e| anyhow!("preview subtitle: {}", e))?;

        let top = MARGIN + TITLE_H;
        let left = MARGIN + (width as i32 - MARGIN * 2 - table_w) / 2;
        for (r, cells) in std::iter::once(&header).chain(body.iter()).enumerate() {
            let y0 = top + r as i32 * ROW_H;
            let mut x0 = left;
            let bg = if r == 0 {
                Some(HEADER_BG)
            } else if r % 2 == 0 {
                Some(STRIPE_BG)
            } else {
                None
            };
            for (cell, w) in cells.iter().zip(&widths) {
                if let Some(bg) = bg {
                    root.draw(&Rectangle::new(
                        [(x0, y0), (x0 + w, y0 + ROW_H)],
                        bg.filled(),
                    ))
                    .map_err(|e| anyhow!("preview cell fill: {}", e))?;
                }
                root.draw(&Rectangle::new([(x0, y0), (x0 + w, y0 + ROW_H)], &GRID))
                    .map_err(|e| anyhow!("preview cell border: {}", e))?;
                let style = if r == 0 { &header_style } else { &cell_style };
                root.draw(&Text::new(
                    cell.clone(),
                    (x0 + w / 2, y0 + ROW_H / 2),
                    style.clone(),
                ))
                .map_err(|e| anyhow!("preview cell text: {}", e))?;
                x0 += w;
            }
        }

        root.present().map_err(|e| anyhow!("preview present: {}", e))?;
    }

    Ok(encode_png(&buf, width, height)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_is_a_png_and_caps_at_fifteen_rows() -> anyhow::Result<()> {
        crate::render::font::ensure_fonts()?;
        let mut content = String::from("a,b\n");
        for i in 0..40 {
            content.push_str(&format!("row{},{}\n", i, i));
        }
        let table = ParsedTable::parse(&content)?;
        let bytes = table_image("big", "2025-09-25", &table)?;
        assert!(bytes.starts_with(b"\x89PNG"));
        Ok(())
    }

    #[test]
    fn long_cell_text_is_clipped() {
        let long = "x".repeat(100);
        let clipped = clip(&long);
        assert_eq!(clipped.chars().count(), MAX_CELL_CHARS);
        assert!(clipped.ends_with('…'));
        assert_eq!(clip("short"), "short");
    }
}
