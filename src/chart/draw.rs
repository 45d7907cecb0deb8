use super::{ChartSpec, MAX_RATING};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use plotters::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

const CHART_SIZE: (u32, u32) = (800, 600);

const PALETTE: &[RGBColor] = &[
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
];

/// A chart artifact written to disk.
#[derive(Clone, Debug)]
pub struct ChartFile {
    pub title: String,
    pub path: PathBuf,
}

fn file_name(spec: &ChartSpec) -> &'static str {
    match spec {
        ChartSpec::CategoryBar { .. } => "category_distribution.png",
        ChartSpec::Pie { .. } => "breakdown.png",
        ChartSpec::RatingHistogram { .. } => "ratings.png",
        ChartSpec::Timeline { .. } => "timeline.png",
    }
}

fn title_of(spec: &ChartSpec) -> &str {
    match spec {
        ChartSpec::CategoryBar { title, .. }
        | ChartSpec::Pie { title, .. }
        | ChartSpec::RatingHistogram { title, .. }
        | ChartSpec::Timeline { title, .. } => title,
    }
}

/// Draw every spec into `out_dir` as a PNG. File names are fixed per chart
/// kind so repeated renders overwrite in place.
pub fn draw_all(specs: &[ChartSpec], out_dir: &Path) -> Result<Vec<ChartFile>> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("could not create `{}`", out_dir.display()))?;

    let mut files = Vec::with_capacity(specs.len());
    for spec in specs {
        let path = out_dir.join(file_name(spec));
        draw_one(spec, &path).with_context(|| format!("drawing `{}`", path.display()))?;
        files.push(ChartFile {
            title: title_of(spec).to_string(),
            path,
        });
    }
    Ok(files)
}

fn draw_one(spec: &ChartSpec, path: &Path) -> Result<()> {
    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    match spec {
        ChartSpec::CategoryBar { title, counts } => draw_bar(&root, title, counts)?,
        ChartSpec::Pie { title, counts } => draw_pie(&root, title, counts)?,
        ChartSpec::RatingHistogram {
            title,
            ratings,
            mean,
        } => draw_histogram(&root, title, ratings, *mean)?,
        ChartSpec::Timeline { title, points } => draw_timeline(&root, title, points)?,
    }

    root.present()?;
    Ok(())
}

type Area<'a> = DrawingArea<BitMapBackend<'a>, plotters::coord::Shift>;

/// Empty charts get a placeholder instead of an axis over nothing.
fn draw_placeholder(root: &Area, title: &str) -> Result<()> {
    let root = root.titled(title, ("sans-serif", 28))?;
    let (w, h) = root.dim_in_pixel();
    root.draw(&Text::new(
        "no responses yet",
        (w as i32 / 2 - 80, h as i32 / 2),
        ("sans-serif", 22),
    ))?;
    Ok(())
}

fn draw_bar(root: &Area, title: &str, counts: &[(String, usize)]) -> Result<()> {
    if counts.is_empty() {
        return draw_placeholder(root, title);
    }

    let max = counts.iter().map(|(_, c)| *c as u32).max().unwrap_or(1);
    let n = counts.len();

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 28))
        .margin(10)
        .x_label_area_size(70)
        .y_label_area_size(50)
        .build_cartesian_2d((0..n).into_segmented(), 0u32..max + 1)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_label_formatter(&|seg| match seg {
            SegmentValue::CenterOf(i) | SegmentValue::Exact(i) => counts
                .get(*i)
                .map(|(label, _)| label.clone())
                .unwrap_or_default(),
            SegmentValue::Last => String::new(),
        })
        .x_labels(n)
        .y_desc("Responses")
        .draw()?;

    chart.draw_series(counts.iter().enumerate().map(|(i, (_, c))| {
        Rectangle::new(
            [
                (SegmentValue::Exact(i), 0u32),
                (SegmentValue::Exact(i + 1), *c as u32),
            ],
            PALETTE[i % PALETTE.len()].mix(0.7).filled(),
        )
    }))?;

    Ok(())
}

fn draw_pie(root: &Area, title: &str, counts: &[(String, usize)]) -> Result<()> {
    if counts.is_empty() {
        return draw_placeholder(root, title);
    }

    let root = root.titled(title, ("sans-serif", 28))?;
    let (w, h) = root.dim_in_pixel();
    let center = (w as i32 / 2, h as i32 / 2);
    let radius = (w.min(h) as f64) * 0.35;

    let sizes: Vec<f64> = counts.iter().map(|(_, c)| *c as f64).collect();
    let labels: Vec<String> = counts
        .iter()
        .map(|(label, c)| format!("{} ({})", label, c))
        .collect();
    let colors: Vec<RGBColor> = (0..counts.len())
        .map(|i| PALETTE[i % PALETTE.len()])
        .collect();

    let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
    pie.start_angle(-90.0);
    pie.label_style(("sans-serif", 18).into_font());
    root.draw(&pie)?;

    Ok(())
}

fn draw_histogram(root: &Area, title: &str, ratings: &[u32], mean: Option<f64>) -> Result<()> {
    if ratings.is_empty() {
        return draw_placeholder(root, title);
    }

    let caption = match mean {
        Some(m) => format!("{} (avg {:.2})", title, m),
        None => title.to_string(),
    };
    // The x axis is the rating scale itself, never data-driven; values off
    // the scale are dropped here rather than stretching the chart.
    let mut tally = [0u32; MAX_RATING as usize + 1];
    for r in ratings {
        if (1..=MAX_RATING).contains(r) {
            tally[*r as usize] += 1;
        }
    }
    let max = tally.iter().copied().max().unwrap_or(0).max(1);

    let mut chart = ChartBuilder::on(root)
        .caption(caption, ("sans-serif", 28))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(50)
        .build_cartesian_2d((1u32..MAX_RATING + 1).into_segmented(), 0u32..max + 1)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Rating")
        .y_desc("Count")
        .draw()?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(PALETTE[0].mix(0.7).filled())
            .margin(20)
            .data(
                ratings
                    .iter()
                    .filter(|r| (1..=MAX_RATING).contains(*r))
                    .map(|r| (*r, 1u32)),
            ),
    )?;

    Ok(())
}

fn draw_timeline(root: &Area, title: &str, points: &[(DateTime<Utc>, usize)]) -> Result<()> {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return draw_placeholder(root, title);
    };

    let start = first.0;
    // A single submission still needs a non-degenerate x range.
    let end = if last.0 > start {
        last.0
    } else {
        start + Duration::minutes(1)
    };
    let max = points.last().map(|(_, c)| *c as u32).unwrap_or(1);

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 28))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(50)
        .build_cartesian_2d(start..end, 0u32..max + 1)?;

    chart
        .configure_mesh()
        .x_label_formatter(&|ts: &DateTime<Utc>| ts.format("%H:%M").to_string())
        .y_desc("Total responses")
        .draw()?;

    chart.draw_series(LineSeries::new(
        points.iter().map(|(ts, c)| (*ts, *c as u32)),
        PALETTE[0].stroke_width(2),
    ))?;

    Ok(())
}
