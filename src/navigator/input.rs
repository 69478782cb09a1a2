use chrono::NaiveDate;

/// Parse user-entered `YYYY-MM` into `(year, month)`.
/// Accepts exactly two dash-separated integers with month in 1..=12.
pub fn parse_month(s: &str) -> Option<(i32, u32)> {
    let s = s.trim();
    let (year_part, month_part) = s.split_once('-')?;
    let year: i32 = year_part.trim().parse().ok()?;
    let month: u32 = month_part.trim().parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }
    Some((year, month))
}

/// Parse user-entered `YYYY-MM-DD` as an ISO calendar date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// The cancel keyword, with or without the leading slash, any case.
pub fn is_cancel(s: &str) -> bool {
    matches!(s.trim().to_lowercase().as_str(), "cancel" | "/cancel")
}
