//! Monthly revenue trend chart.
//!
//! Rows are bucketed into calendar months, revenue is summed per bucket, and
//! the series is drawn as a standalone SVG line chart written under the
//! configured chart directory.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use insightflow_shared::{ChartRef, InsightFlowError, Result, RunId};

use crate::table::{Column, Table};

const WIDTH: f64 = 700.0;
const HEIGHT: f64 = 400.0;
const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 60.0;
const Y_TICKS: usize = 5;

/// Revenue summed over one calendar month.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyPoint {
    /// First day of the month.
    pub month: NaiveDate,
    pub revenue: f64,
}

/// Sum `revenue` per calendar month of `dates`, ordered by month.
///
/// Rows with an empty date or empty revenue are skipped. A date that does
/// not parse or a non-numeric revenue is an error.
pub fn monthly_totals(dates: &Column, revenue: &Column) -> Result<Vec<MonthlyPoint>> {
    let mut buckets: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    for (row, (date, amount)) in dates.values.iter().zip(&revenue.values).enumerate() {
        if date.is_empty() || amount.is_empty() {
            continue;
        }
        let when = date.as_datetime().ok_or_else(|| {
            InsightFlowError::chart(format!("row {}: cannot parse date '{date}'", row + 1))
        })?;
        let amount = amount.as_f64().ok_or_else(|| {
            InsightFlowError::chart(format!("row {}: revenue '{amount}' is not numeric", row + 1))
        })?;

        let month = NaiveDate::from_ymd_opt(when.year(), when.month(), 1)
            .ok_or_else(|| InsightFlowError::chart(format!("row {}: invalid month", row + 1)))?;
        *buckets.entry(month).or_insert(0.0) += amount;
    }

    Ok(buckets
        .into_iter()
        .map(|(month, revenue)| MonthlyPoint { month, revenue })
        .collect())
}

/// Render a time-ordered revenue series as an SVG line chart.
pub fn render_trend_svg(title: &str, points: &[MonthlyPoint]) -> String {
    let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let bottom = MARGIN_TOP + plot_h;

    // The value axis always includes zero and stretches to cover refunds.
    let max = points.iter().map(|p| p.revenue).fold(0.0_f64, f64::max);
    let min = points.iter().map(|p| p.revenue).fold(0.0_f64, f64::min);
    let y_max = if max > 0.0 { max * 1.1 } else if min < 0.0 { 0.0 } else { 1.0 };
    let y_min = min * 1.1;
    let span = y_max - y_min;

    let x_at = |i: usize| {
        if points.len() <= 1 {
            MARGIN_LEFT + plot_w / 2.0
        } else {
            MARGIN_LEFT + plot_w * i as f64 / (points.len() - 1) as f64
        }
    };
    let y_at = |v: f64| bottom - plot_h * ((v - y_min) / span);

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="sans-serif">"#
    );
    let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="28" text-anchor="middle" font-size="16">{title}</text>"#,
        WIDTH / 2.0
    );

    // Axes
    let _ = writeln!(
        svg,
        r#"<line x1="{MARGIN_LEFT}" y1="{MARGIN_TOP}" x2="{MARGIN_LEFT}" y2="{bottom}" stroke="black"/>"#
    );
    let _ = writeln!(
        svg,
        r#"<line x1="{MARGIN_LEFT}" y1="{bottom}" x2="{}" y2="{bottom}" stroke="black"/>"#,
        MARGIN_LEFT + plot_w
    );

    for tick in 0..=Y_TICKS {
        let value = y_min + span * tick as f64 / Y_TICKS as f64;
        let y = y_at(value);
        let _ = writeln!(
            svg,
            r##"<line x1="{MARGIN_LEFT}" y1="{y:.1}" x2="{}" y2="{y:.1}" stroke="#e0e0e0"/>"##,
            MARGIN_LEFT + plot_w
        );
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{:.1}" text-anchor="end" font-size="11">{value:.0}</text>"#,
            MARGIN_LEFT - 8.0,
            y + 4.0
        );
    }

    for (i, point) in points.iter().enumerate() {
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{}" text-anchor="middle" font-size="11">{}</text>"#,
            x_at(i),
            bottom + 18.0,
            point.month.format("%Y-%m")
        );
    }

    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="middle" font-size="13">Month</text>"#,
        MARGIN_LEFT + plot_w / 2.0,
        HEIGHT - 12.0
    );
    let _ = writeln!(
        svg,
        r#"<text x="18" y="{0}" text-anchor="middle" font-size="13" transform="rotate(-90 18 {0})">Revenue</text>"#,
        MARGIN_TOP + plot_h / 2.0
    );

    if !points.is_empty() {
        let coords: Vec<String> = points
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{:.1},{:.1}", x_at(i), y_at(p.revenue)))
            .collect();
        let _ = writeln!(
            svg,
            r##"<polyline fill="none" stroke="#1f77b4" stroke-width="2" points="{}"/>"##,
            coords.join(" ")
        );
        for (i, p) in points.iter().enumerate() {
            let _ = writeln!(
                svg,
                r##"<circle cx="{:.1}" cy="{:.1}" r="3" fill="#1f77b4"/>"##,
                x_at(i),
                y_at(p.revenue)
            );
        }
    }

    svg.push_str("</svg>\n");
    svg
}

/// Writes rendered charts into one directory.
#[derive(Debug, Clone)]
pub struct ChartWriter {
    dir: PathBuf,
}

impl ChartWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write `svg` as `<dir>/<name>-<run_id>.svg`.
    ///
    /// The run id in the file name keeps concurrent runs from overwriting
    /// each other's charts.
    pub fn write(&self, name: &str, run_id: RunId, svg: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            InsightFlowError::chart(format!("cannot create {}: {e}", self.dir.display()))
        })?;

        let path = self.dir.join(format!("{name}-{run_id}.svg"));
        std::fs::write(&path, svg).map_err(|e| {
            InsightFlowError::chart(format!("cannot write {}: {e}", path.display()))
        })?;

        debug!(path = %path.display(), "chart written");
        Ok(path)
    }
}

/// Build, render and write the monthly revenue chart for `table`.
pub fn monthly_revenue_chart(table: &Table, writer: &ChartWriter, run_id: RunId) -> Result<ChartRef> {
    let (Some(dates), Some(revenue)) = (table.column("date"), table.column("revenue")) else {
        return Err(InsightFlowError::chart("requires both 'date' and 'revenue' columns"));
    };

    let points = monthly_totals(dates, revenue)?;
    let svg = render_trend_svg("Monthly Revenue Trend", &points);
    let path = writer.write(insightflow_shared::MONTHLY_REVENUE_CHART, run_id, &svg)?;

    Ok(ChartRef { path })
}
