pub mod draw;

use crate::refresh::{RenderSummary, Visualizer};
use crate::response::ResponseTable;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Upper bound of the survey rating scale. Ratings whose rounded value falls
/// outside `1..=MAX_RATING` are rejected as row issues, not binned.
pub const MAX_RATING: u32 = 5;

/// Which question feeds which chart. Labels are matched against the header
/// row by case-insensitive substring, so fragments like "experience" work
/// against the full form question text.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ChartPlan {
    /// Question for the category distribution bar chart.
    pub category: String,
    /// Question for the breakdown pie chart, usually a multi-select.
    pub breakdown: String,
    /// Question for the rating histogram.
    pub rating: String,
    /// Labels of multi-select questions, split on commas during parsing.
    pub multi_select: Vec<String>,
}

impl Default for ChartPlan {
    fn default() -> Self {
        Self {
            category: "experience".to_string(),
            breakdown: "interest".to_string(),
            rating: "rating".to_string(),
            multi_select: Vec::new(),
        }
    }
}

/// Aggregated data behind one chart. Pure values, no drawing state.
#[derive(Clone, Debug, PartialEq)]
pub enum ChartSpec {
    CategoryBar {
        title: String,
        counts: Vec<(String, usize)>,
    },
    Pie {
        title: String,
        counts: Vec<(String, usize)>,
    },
    RatingHistogram {
        title: String,
        ratings: Vec<u32>,
        mean: Option<f64>,
    },
    Timeline {
        title: String,
        points: Vec<(DateTime<Utc>, usize)>,
    },
}

/// A row that could not contribute to a chart, reported and skipped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowIssue {
    pub row: usize,
    pub detail: String,
}

/// Result of aggregating one table: the specs to draw, charts skipped for a
/// whole-chart reason (e.g. no matching column), and per-row issues.
#[derive(Clone, Debug, Default)]
pub struct ChartBuild {
    pub specs: Vec<ChartSpec>,
    pub skipped: Vec<String>,
    pub row_issues: Vec<RowIssue>,
}

pub(crate) fn value_counts(table: &ResponseTable, label: &str) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for row in table.rows() {
        if let Some(answer) = row.answer(label) {
            for value in answer.values() {
                if !value.is_empty() {
                    *counts.entry(value.to_string()).or_insert(0) += 1;
                }
            }
        }
    }
    let mut out: Vec<_> = counts.into_iter().collect();
    // Largest slice first; ties stay alphabetical from the BTreeMap.
    out.sort_by(|a, b| b.1.cmp(&a.1));
    out
}

/// Aggregate the fixed dashboard chart set from a table. Never fails: an
/// empty table yields empty specs, unmatched labels become skip notes, and
/// malformed rows are reported in `row_issues` and left out.
pub fn build_charts(table: &ResponseTable, plan: &ChartPlan) -> ChartBuild {
    let mut build = ChartBuild::default();

    match table.resolve_label(&plan.category) {
        Some(label) => build.specs.push(ChartSpec::CategoryBar {
            title: format!("Distribution of {}", label),
            counts: value_counts(table, label),
        }),
        None => build
            .skipped
            .push(format!("no question matching `{}`", plan.category)),
    }

    match table.resolve_label(&plan.breakdown) {
        Some(label) => build.specs.push(ChartSpec::Pie {
            title: format!("{} Breakdown", label),
            counts: value_counts(table, label),
        }),
        None => build
            .skipped
            .push(format!("no question matching `{}`", plan.breakdown)),
    }

    match table.resolve_label(&plan.rating) {
        Some(label) => {
            let mut ratings = Vec::new();
            for (i, row) in table.rows().iter().enumerate() {
                let Some(answer) = row.answer(label) else {
                    continue;
                };
                let raw = answer.display();
                if raw.is_empty() {
                    continue;
                }
                match raw.trim().parse::<f64>() {
                    Ok(v) if v.is_finite() && (1.0..=MAX_RATING as f64).contains(&v.round()) => {
                        ratings.push(v.round() as u32)
                    }
                    Ok(_) => build.row_issues.push(RowIssue {
                        row: i,
                        detail: format!("rating `{}` outside 1..={}", raw, MAX_RATING),
                    }),
                    Err(_) => build.row_issues.push(RowIssue {
                        row: i,
                        detail: format!("non-numeric rating `{}`", raw),
                    }),
                }
            }
            let mean = if ratings.is_empty() {
                None
            } else {
                Some(ratings.iter().map(|r| *r as f64).sum::<f64>() / ratings.len() as f64)
            };
            build.specs.push(ChartSpec::RatingHistogram {
                title: format!("{} Distribution", label),
                ratings,
                mean,
            });
        }
        None => build
            .skipped
            .push(format!("no question matching `{}`", plan.rating)),
    }

    // Timeline: cumulative submissions over time. Rows without a parseable
    // timestamp cannot be placed and are reported.
    let mut stamps = Vec::new();
    for (i, row) in table.rows().iter().enumerate() {
        match row.submitted_at {
            Some(ts) => stamps.push(ts),
            None => build.row_issues.push(RowIssue {
                row: i,
                detail: "missing or unparseable timestamp".to_string(),
            }),
        }
    }
    stamps.sort();
    build.specs.push(ChartSpec::Timeline {
        title: "Responses Over Time".to_string(),
        points: stamps
            .into_iter()
            .enumerate()
            .map(|(i, ts)| (ts, i + 1))
            .collect(),
    });

    build
}

/// Renders the dashboard chart set to PNG files in a fixed output directory.
/// File names are stable per chart so a display surface can re-show the same
/// path and pick up the update in place.
pub struct DashboardVisualizer {
    plan: ChartPlan,
    out_dir: PathBuf,
}

impl DashboardVisualizer {
    pub fn new(plan: ChartPlan, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            plan,
            out_dir: out_dir.into(),
        }
    }
}

impl Visualizer for DashboardVisualizer {
    fn render(&mut self, table: &ResponseTable) -> Result<RenderSummary> {
        let build = build_charts(table, &self.plan);
        for note in &build.skipped {
            debug!(%note, "chart skipped");
        }
        for issue in &build.row_issues {
            warn!(row = issue.row, detail = %issue.detail, "row skipped during chart build");
        }

        let files = draw::draw_all(&build.specs, &self.out_dir)?;
        Ok(RenderSummary {
            charts: files.len(),
            skipped: build.skipped.len(),
            row_issues: build.row_issues.len(),
        })
    }
}
