use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::BTreeMap;

/// One answer cell. Multi-select questions carry the full value set so
/// aggregation can count each selection, not the joined string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Answer {
    Text(String),
    Multi(Vec<String>),
}

impl Answer {
    /// All values in this answer: one for text, each selection for multi.
    pub fn values(&self) -> Vec<&str> {
        match self {
            Answer::Text(s) => vec![s.as_str()],
            Answer::Multi(vs) => vs.iter().map(|v| v.as_str()).collect(),
        }
    }

    /// Single display string, multi-select re-joined the way the form
    /// originally stored it.
    pub fn display(&self) -> String {
        match self {
            Answer::Text(s) => s.clone(),
            Answer::Multi(vs) => vs.join(", "),
        }
    }
}

/// One survey submission. Rows are immutable once observed; the source only
/// appends. `submitted_at` is source-assigned and non-decreasing in arrival
/// order, but not guaranteed strictly increasing, and may be absent when the
/// cell is missing or unparseable.
#[derive(Clone, Debug)]
pub struct ResponseRow {
    pub submitted_at: Option<DateTime<Utc>>,
    pub answers: BTreeMap<String, Answer>,
}

impl ResponseRow {
    pub fn answer(&self, label: &str) -> Option<&Answer> {
        self.answers.get(label)
    }
}

/// Full snapshot of the response sheet: header row (question labels) plus
/// rows in arrival order. Recreated fresh on every fetch; there is no
/// incremental merge.
#[derive(Clone, Debug, Default)]
pub struct ResponseTable {
    headers: Vec<String>,
    rows: Vec<ResponseRow>,
}

/// Header label Google Forms assigns to the submission timestamp column.
pub const TIMESTAMP_LABEL: &str = "Timestamp";

/// Timestamp formats seen in form response sheets, tried in order.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

impl ResponseTable {
    /// Build a table from a raw values grid, header row first. Columns whose
    /// label appears in `multi_select` are split on commas into value sets.
    /// Short rows are padded with empty answers; a grid without a header row
    /// yields an empty table.
    pub fn from_grid(grid: Vec<Vec<String>>, multi_select: &[String]) -> Self {
        let mut iter = grid.into_iter();
        let headers: Vec<String> = match iter.next() {
            Some(h) => h.into_iter().map(|s| s.trim().to_string()).collect(),
            None => return Self::default(),
        };

        let rows = iter
            .map(|cells| {
                let mut answers = BTreeMap::new();
                let mut submitted_at = None;
                for (i, label) in headers.iter().enumerate() {
                    let raw = cells.get(i).map(String::as_str).unwrap_or("").trim();
                    if label == TIMESTAMP_LABEL {
                        submitted_at = parse_timestamp(raw);
                        continue;
                    }
                    let answer = if multi_select.iter().any(|m| m == label) {
                        Answer::Multi(
                            raw.split(',')
                                .map(str::trim)
                                .filter(|v| !v.is_empty())
                                .map(str::to_string)
                                .collect(),
                        )
                    } else {
                        Answer::Text(raw.to_string())
                    };
                    answers.insert(label.clone(), answer);
                }
                ResponseRow {
                    submitted_at,
                    answers,
                }
            })
            .collect();

        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Question labels from the header row, timestamp column included.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[ResponseRow] {
        &self.rows
    }

    /// The last `n` rows in arrival order.
    pub fn latest(&self, n: usize) -> &[ResponseRow] {
        let start = self.rows.len().saturating_sub(n);
        &self.rows[start..]
    }

    /// Rows submitted strictly after `since`. Rows without a parseable
    /// timestamp are excluded.
    pub fn rows_since(&self, since: DateTime<Utc>) -> Vec<&ResponseRow> {
        self.rows
            .iter()
            .filter(|r| r.submitted_at.map(|t| t > since).unwrap_or(false))
            .collect()
    }

    /// Earliest and latest submission timestamps present in the table.
    pub fn time_span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let mut stamps = self.rows.iter().filter_map(|r| r.submitted_at);
        let first = stamps.next()?;
        let (min, max) = stamps.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
        Some((min, max))
    }

    /// Resolve a question label by case-insensitive substring match, used
    /// when the configured label is a fragment like "experience".
    pub fn resolve_label(&self, fragment: &str) -> Option<&str> {
        let needle = fragment.to_lowercase();
        self.headers
            .iter()
            .find(|h| h.to_lowercase().contains(&needle))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn grid() -> Vec<Vec<String>> {
        vec![
            vec![
                "Timestamp".to_string(),
                "Experience Level".to_string(),
                "Technologies (Select all that apply)".to_string(),
            ],
            vec![
                "11/15/2025 10:00:00".to_string(),
                "Beginner".to_string(),
                "Spark, Delta Lake".to_string(),
            ],
            vec![
                "11/15/2025 10:05:30".to_string(),
                "Expert".to_string(),
                "MLflow".to_string(),
            ],
        ]
    }

    fn multi() -> Vec<String> {
        vec!["Technologies (Select all that apply)".to_string()]
    }

    #[test]
    fn parses_grid_with_header() {
        let table = ResponseTable::from_grid(grid(), &multi());
        assert_eq!(table.len(), 2);
        assert_eq!(table.headers().len(), 3);

        let row = &table.rows()[0];
        assert_eq!(
            row.submitted_at,
            Some(Utc.with_ymd_and_hms(2025, 11, 15, 10, 0, 0).unwrap())
        );
        assert_eq!(
            row.answer("Experience Level"),
            Some(&Answer::Text("Beginner".to_string()))
        );
        assert_eq!(
            row.answer("Technologies (Select all that apply)"),
            Some(&Answer::Multi(vec![
                "Spark".to_string(),
                "Delta Lake".to_string()
            ]))
        );
    }

    #[test]
    fn empty_grid_yields_empty_table() {
        let table = ResponseTable::from_grid(vec![], &[]);
        assert!(table.is_empty());
        assert!(table.headers().is_empty());
    }

    #[test]
    fn header_only_grid_has_headers_but_no_rows() {
        let table = ResponseTable::from_grid(vec![vec!["Timestamp".to_string()]], &[]);
        assert!(table.is_empty());
        assert_eq!(table.headers(), ["Timestamp".to_string()]);
    }

    #[test]
    fn short_rows_are_padded_with_empty_answers() {
        let mut g = grid();
        g.push(vec!["11/15/2025 10:10:00".to_string()]);
        let table = ResponseTable::from_grid(g, &multi());
        let row = &table.rows()[2];
        assert_eq!(
            row.answer("Experience Level"),
            Some(&Answer::Text(String::new()))
        );
        assert_eq!(
            row.answer("Technologies (Select all that apply)"),
            Some(&Answer::Multi(vec![]))
        );
    }

    #[test]
    fn unparseable_timestamp_is_none() {
        let mut g = grid();
        g[1][0] = "not a time".to_string();
        let table = ResponseTable::from_grid(g, &multi());
        assert_eq!(table.rows()[0].submitted_at, None);
        assert!(table.rows()[1].submitted_at.is_some());
    }

    #[test]
    fn timestamp_formats() {
        assert!(parse_timestamp("11/15/2025 9:05:00").is_some());
        assert!(parse_timestamp("2025-11-15 09:05:00").is_some());
        assert!(parse_timestamp("2025-11-15T09:05:00Z").is_some());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn latest_and_since() {
        let table = ResponseTable::from_grid(grid(), &multi());
        assert_eq!(table.latest(1).len(), 1);
        assert_eq!(table.latest(10).len(), 2);

        let cutoff = Utc.with_ymd_and_hms(2025, 11, 15, 10, 1, 0).unwrap();
        assert_eq!(table.rows_since(cutoff).len(), 1);
    }

    #[test]
    fn resolve_label_by_fragment() {
        let table = ResponseTable::from_grid(grid(), &multi());
        assert_eq!(table.resolve_label("experience"), Some("Experience Level"));
        assert_eq!(table.resolve_label("nope"), None);
    }
}
