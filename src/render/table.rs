use tracing::warn;

use super::RenderError;

/// One parsed cell. `Missing` only ever appears in numeric columns; text
/// columns keep empty strings as empty text.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Cell text as shown in the preview table.
    pub fn display(&self) -> String {
        match self {
            Cell::Number(v) => {
                if v.fract() == 0.0 {
                    format!("{}", *v as i64)
                } else {
                    format!("{}", v)
                }
            }
            Cell::Text(s) => s.clone(),
            Cell::Missing => String::new(),
        }
    }
}

/// A report parsed into columns and typed rows. Column types are inferred
/// once, here; everything downstream reads `numeric_columns`.
#[derive(Debug)]
pub struct ParsedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    /// Indexes into `columns` for columns numeric across the whole table.
    pub numeric_columns: Vec<usize>,
}

/// Trim whitespace + strip outer quotes if present.
fn clean_field(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].replace("\"\"", "\"")
    } else {
        trimmed.to_string()
    }
}

/// A cell value counts as a number only when it is finite; literal
/// "NaN"/"inf" text reads as a missing value, not a measurement.
fn parse_number(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Split one CSV line on commas, honoring double-quoted fields.
fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => {
                fields.push(clean_field(&current));
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(clean_field(&current));
    fields
}

impl ParsedTable {
    pub fn parse(content: &str) -> Result<Self, RenderError> {
        let mut lines = content
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.trim().is_empty());

        let header = lines
            .next()
            .ok_or_else(|| RenderError::Parse("content has no header row".into()))?;
        let columns = split_line(header);
        if columns.iter().all(|c| c.is_empty()) {
            return Err(RenderError::Parse("header row is empty".into()));
        }

        let mut raw_rows: Vec<Vec<String>> = Vec::new();
        for line in lines {
            let mut fields = split_line(line);
            if fields.len() > columns.len() {
                warn!(
                    "row has {} fields, table has {} columns; extra fields dropped",
                    fields.len(),
                    columns.len()
                );
                fields.truncate(columns.len());
            }
            fields.resize(columns.len(), String::new());
            raw_rows.push(fields);
        }

        // Single inference pass: a column is numeric iff it holds at least
        // one number and no non-numeric non-empty value.
        let mut numeric_columns = Vec::new();
        for col in 0..columns.len() {
            let mut has_number = false;
            let mut has_text = false;
            for row in &raw_rows {
                let value = &row[col];
                if value.is_empty() {
                    continue;
                }
                match value.parse::<f64>() {
                    Ok(v) if v.is_finite() => has_number = true,
                    // Non-finite literals are missing values, like empties.
                    Ok(_) => {}
                    Err(_) => has_text = true,
                }
            }
            if has_number && !has_text {
                numeric_columns.push(col);
            }
        }

        let rows = raw_rows
            .into_iter()
            .map(|raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(col, value)| {
                        if numeric_columns.contains(&col) {
                            match parse_number(&value) {
                                Some(v) => Cell::Number(v),
                                None => Cell::Missing,
                            }
                        } else {
                            Cell::Text(value)
                        }
                    })
                    .collect()
            })
            .collect();

        Ok(Self {
            columns,
            rows,
            numeric_columns,
        })
    }

    /// A row is a summary row iff at least one numeric column value is
    /// missing; otherwise it is a main (per-entity) row.
    pub fn is_summary_row(&self, row: &[Cell]) -> bool {
        self.numeric_columns
            .iter()
            .any(|&col| row[col] == Cell::Missing)
    }

    pub fn main_rows(&self) -> Vec<&Vec<Cell>> {
        self.rows
            .iter()
            .filter(|r| !self.is_summary_row(r))
            .collect()
    }

    pub fn summary_rows(&self) -> Vec<&Vec<Cell>> {
        self.rows
            .iter()
            .filter(|r| self.is_summary_row(r))
            .collect()
    }

    /// The column feeding the summary chart: the tare/weight column when one
    /// exists, otherwise the last numeric column.
    pub fn tare_column(&self) -> Option<usize> {
        self.numeric_columns
            .iter()
            .copied()
            .find(|&col| {
                let name = self.columns[col].to_lowercase();
                name.contains("tare") || name.contains("weight") || name.contains("тара")
            })
            .or_else(|| self.numeric_columns.last().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Site,Truck,Gross (kg),Tare (kg)
North,KA-01,1200,300
South,KB-02,1500,320
Totals,,,4100
";

    #[test]
    fn infers_numeric_columns_once() {
        let table = ParsedTable::parse(SAMPLE).unwrap();
        assert_eq!(table.columns.len(), 4);
        // Site and Truck are text, the two weights are numeric.
        assert_eq!(table.numeric_columns, vec![2, 3]);
    }

    #[test]
    fn partition_is_total_and_disjoint() {
        let table = ParsedTable::parse(SAMPLE).unwrap();
        let main = table.main_rows();
        let summary = table.summary_rows();
        assert_eq!(main.len(), 2);
        assert_eq!(summary.len(), 1);
        assert_eq!(main.len() + summary.len(), table.rows.len());
        for row in &table.rows {
            let in_main = main.iter().any(|r| *r == row);
            let in_summary = summary.iter().any(|r| *r == row);
            assert!(in_main != in_summary);
        }
    }

    #[test]
    fn parsing_is_deterministic() {
        let a = ParsedTable::parse(SAMPLE).unwrap();
        let b = ParsedTable::parse(SAMPLE).unwrap();
        assert_eq!(a.numeric_columns, b.numeric_columns);
        assert_eq!(a.main_rows().len(), b.main_rows().len());
        assert_eq!(a.summary_rows().len(), b.summary_rows().len());
    }

    #[test]
    fn a_column_mixing_text_and_numbers_is_text() {
        let table = ParsedTable::parse("a,b\n1,x\n2,3\n").unwrap();
        assert_eq!(table.numeric_columns, vec![0]);
        assert_eq!(table.rows[0][1], Cell::Text("x".into()));
        assert_eq!(table.rows[1][1], Cell::Text("3".into()));
    }

    #[test]
    fn short_rows_are_padded_with_missing_values() {
        let table = ParsedTable::parse("a,b\n1,2\n3\n").unwrap();
        assert_eq!(table.numeric_columns, vec![0, 1]);
        assert_eq!(table.rows[1][1], Cell::Missing);
        assert!(table.is_summary_row(&table.rows[1]));
    }

    #[test]
    fn non_finite_literals_read_as_missing_values() {
        let table = ParsedTable::parse("a,b\nx,1\ny,NaN\nz,-inf\n").unwrap();
        // The non-finite literals do not demote the column to text.
        assert_eq!(table.numeric_columns, vec![1]);
        assert_eq!(table.rows[1][1], Cell::Missing);
        assert_eq!(table.rows[2][1], Cell::Missing);
        assert!(table.is_summary_row(&table.rows[1]));
        assert!(!table.is_summary_row(&table.rows[0]));
    }

    #[test]
    fn header_only_content_has_no_rows_and_no_numeric_columns() {
        let table = ParsedTable::parse("a,b,c\n").unwrap();
        assert!(table.rows.is_empty());
        assert!(table.numeric_columns.is_empty());
    }

    #[test]
    fn blank_content_fails_to_parse() {
        assert!(matches!(
            ParsedTable::parse("   \n  \n"),
            Err(RenderError::Parse(_))
        ));
        assert!(matches!(
            ParsedTable::parse(""),
            Err(RenderError::Parse(_))
        ));
    }

    #[test]
    fn quoted_fields_keep_embedded_commas() {
        let table = ParsedTable::parse("name,qty\n\"a, b\",3\n").unwrap();
        assert_eq!(table.rows[0][0], Cell::Text("a, b".into()));
        assert_eq!(table.rows[0][1], Cell::Number(3.0));
    }

    #[test]
    fn tare_column_prefers_name_match_then_last_numeric() {
        let named = ParsedTable::parse("x,Tare (kg),y\na,1,2\n").unwrap();
        assert_eq!(named.tare_column(), Some(1));

        let unnamed = ParsedTable::parse("x,p,q\na,1,2\n").unwrap();
        assert_eq!(unnamed.tare_column(), Some(2));

        let none = ParsedTable::parse("x,y\na,b\n").unwrap();
        assert_eq!(none.tare_column(), None);
    }
}
