//! Plotting primitives.
//!
//! Each function draws one complete chart file from plain series data and
//! knows nothing about the sales table. Charts go to the SVG backend; the
//! line and scatter charts also draw to a PNG bitmap when the path ends in
//! `.png`. Bitmaps carry no text: no font backend is compiled in.

use anyhow::{ensure, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;

/// Canvas size in pixels.
pub type Size = (u32, u32);

const CAPTION_SIZE: u32 = 22;
const BAR_COLOR: RGBColor = RGBColor(66, 114, 196);
const LINE_COLOR: RGBColor = RGBColor(214, 96, 77);

/// Value axis from zero (or the smallest negative value) up to the maximum, padded.
fn value_range(values: impl IntoIterator<Item = f64>) -> (f64, f64) {
    let (mut lo, mut hi) = (0.0f64, 0.0f64);
    for v in values {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if hi <= lo {
        hi = lo + 1.0;
    }
    let pad = (hi - lo) * 0.1;
    (if lo < 0.0 { lo - pad } else { lo }, hi + pad)
}

/// Data extent, padded on both sides.
fn span(values: impl IntoIterator<Item = f64>) -> (f64, f64) {
    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for v in values {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    if hi <= lo {
        return (lo - 1.0, hi + 1.0);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad, hi + pad)
}

fn is_bitmap(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
}

fn category_label(labels: &[String], value: &SegmentValue<usize>) -> String {
    match value {
        SegmentValue::CenterOf(i) => labels.get(*i).cloned().unwrap_or_default(),
        _ => String::new(),
    }
}

/// One bar per category, categories along the x axis.
pub fn vertical_bars(
    path: &Path,
    size: Size,
    title: &str,
    y_desc: &str,
    labels: &[String],
    values: &[f64],
) -> Result<()> {
    ensure!(!values.is_empty(), "no data to plot");
    let n = values.len();
    let (lo, hi) = value_range(values.iter().copied());

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", CAPTION_SIZE))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d((0..n).into_segmented(), lo..hi)?;

    let fmt = |v: &SegmentValue<usize>| category_label(labels, v);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&fmt)
        .y_desc(y_desc)
        .draw()?;

    chart.draw_series(values.iter().enumerate().map(|(i, v)| {
        let mut bar = Rectangle::new(
            [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), *v)],
            BAR_COLOR.filled(),
        );
        bar.set_margin(0, 0, 4, 4);
        bar
    }))?;

    root.present()?;
    Ok(())
}

/// One bar per category, categories down the y axis with the first on top.
pub fn horizontal_bars(
    path: &Path,
    size: Size,
    title: &str,
    x_desc: &str,
    labels: &[String],
    values: &[f64],
) -> Result<()> {
    ensure!(!values.is_empty(), "no data to plot");
    let n = values.len();
    let (lo, hi) = value_range(values.iter().copied());

    // plotters' y axis grows upward
    let labels: Vec<String> = labels.iter().rev().cloned().collect();
    let values: Vec<f64> = values.iter().rev().copied().collect();

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", CAPTION_SIZE))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(120)
        .build_cartesian_2d(lo..hi, (0..n).into_segmented())?;

    let fmt = |v: &SegmentValue<usize>| category_label(&labels, v);
    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n)
        .y_label_formatter(&fmt)
        .x_desc(x_desc)
        .draw()?;

    chart.draw_series(values.iter().enumerate().map(|(i, v)| {
        let mut bar = Rectangle::new(
            [(0.0, SegmentValue::Exact(i)), (*v, SegmentValue::Exact(i + 1))],
            BAR_COLOR.filled(),
        );
        bar.set_margin(3, 3, 0, 0);
        bar
    }))?;

    root.present()?;
    Ok(())
}

/// Bars on the left axis with a line on a secondary right axis.
///
/// Line points that are `None` are left out.
pub fn bars_with_line(
    path: &Path,
    size: Size,
    title: &str,
    (bar_desc, line_desc): (&str, &str),
    labels: &[String],
    bars: &[f64],
    line: &[Option<f64>],
) -> Result<()> {
    ensure!(!bars.is_empty(), "no data to plot");
    let n = bars.len();
    let (lo, hi) = value_range(bars.iter().copied());
    let (line_lo, line_hi) = span(line.iter().flatten().copied());

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", CAPTION_SIZE))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .right_y_label_area_size(80)
        .build_cartesian_2d((0..n).into_segmented(), lo..hi)?
        .set_secondary_coord((0..n).into_segmented(), line_lo..line_hi);

    let fmt = |v: &SegmentValue<usize>| category_label(labels, v);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&fmt)
        .y_desc(bar_desc)
        .draw()?;
    chart.configure_secondary_axes().y_desc(line_desc).draw()?;

    chart.draw_series(bars.iter().enumerate().map(|(i, v)| {
        let mut bar = Rectangle::new(
            [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), *v)],
            BAR_COLOR.mix(0.8).filled(),
        );
        bar.set_margin(0, 0, 6, 6);
        bar
    }))?;

    let points: Vec<(SegmentValue<usize>, f64)> = line
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (SegmentValue::CenterOf(i), v)))
        .collect();
    chart.draw_secondary_series(LineSeries::new(
        points.clone(),
        LINE_COLOR.stroke_width(2),
    ))?;
    chart.draw_secondary_series(
        points
            .into_iter()
            .map(|p| Circle::new(p, 4, LINE_COLOR.filled())),
    )?;

    root.present()?;
    Ok(())
}

/// Grid of shaded cells; `None` cells are drawn grey.
pub fn heatmap(
    path: &Path,
    size: Size,
    title: &str,
    columns: &[String],
    rows: &[String],
    cells: &[Vec<Option<f64>>],
) -> Result<()> {
    ensure!(
        !columns.is_empty() && !rows.is_empty(),
        "no data to plot"
    );
    let max = cells
        .iter()
        .flatten()
        .flatten()
        .copied()
        .fold(0.0f64, f64::max);

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", CAPTION_SIZE))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(120)
        .build_cartesian_2d(
            (0..columns.len()).into_segmented(),
            (0..rows.len()).into_segmented(),
        )?;

    let x_fmt = |v: &SegmentValue<usize>| category_label(columns, v);
    let y_fmt = |v: &SegmentValue<usize>| category_label(rows, v);
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(columns.len())
        .y_labels(rows.len())
        .x_label_formatter(&x_fmt)
        .y_label_formatter(&y_fmt)
        .draw()?;

    chart.draw_series(cells.iter().enumerate().flat_map(|(r, row)| {
        row.iter().enumerate().map(move |(c, cell)| {
            let color = match cell {
                Some(v) => shade(if max > 0.0 { v / max } else { 0.0 }),
                None => RGBColor(220, 220, 220),
            };
            Rectangle::new(
                [
                    (SegmentValue::Exact(c), SegmentValue::Exact(r)),
                    (SegmentValue::Exact(c + 1), SegmentValue::Exact(r + 1)),
                ],
                color.filled(),
            )
        })
    }))?;

    root.present()?;
    Ok(())
}

/// White to dark blue for `t` in `[0, 1]`.
fn shade(t: f64) -> RGBColor {
    let t = t.clamp(0.0, 1.0);
    RGBColor(
        (255.0 - 215.0 * t) as u8,
        (255.0 - 175.0 * t) as u8,
        (255.0 - 95.0 * t) as u8,
    )
}

/// Equal-width histogram of `values`.
pub fn histogram(
    path: &Path,
    size: Size,
    title: &str,
    x_desc: &str,
    values: &[f64],
    bins: usize,
) -> Result<()> {
    ensure!(!values.is_empty(), "no data to plot");
    let counts = bin_counts(values, bins);
    let (min, max) = extent(values);
    let width = (max - min) / counts.len() as f64;
    let top = counts.iter().copied().max().unwrap_or(0) as f64;

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", CAPTION_SIZE))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(min..max, 0.0..(top * 1.1).max(1.0))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(x_desc)
        .y_desc("Count")
        .draw()?;

    chart.draw_series(counts.iter().enumerate().map(|(i, count)| {
        let x0 = min + width * i as f64;
        Rectangle::new([(x0, 0.0), (x0 + width, *count as f64)], BAR_COLOR.filled())
    }))?;

    root.present()?;
    Ok(())
}

/// Smallest and largest value; a single-valued series is widened by one.
fn extent(values: &[f64]) -> (f64, f64) {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max > min {
        (min, max)
    } else {
        (min, min + 1.0)
    }
}

/// Count values into `bins` equal-width buckets over their extent.
pub fn bin_counts(values: &[f64], bins: usize) -> Vec<usize> {
    let bins = bins.max(1);
    let mut counts = vec![0usize; bins];
    if values.is_empty() {
        return counts;
    }

    let (min, max) = extent(values);
    let width = (max - min) / bins as f64;
    for v in values {
        // the maximum falls into the last bucket
        let idx = (((v - min) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
}

/// Connected points, sorted by x by the caller.
pub fn line_chart(
    path: &Path,
    size: Size,
    title: &str,
    descs: (&str, &str),
    points: &[(f64, f64)],
) -> Result<()> {
    ensure!(!points.is_empty(), "no data to plot");
    if is_bitmap(path) {
        draw_line_chart(BitMapBackend::new(path, size).into_drawing_area(), title, descs, points)
    } else {
        draw_line_chart(SVGBackend::new(path, size).into_drawing_area(), title, descs, points)
    }
}

fn draw_line_chart<DB>(
    root: DrawingArea<DB, Shift>,
    title: &str,
    (x_desc, y_desc): (&str, &str),
    points: &[(f64, f64)],
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (x_lo, x_hi) = span(points.iter().map(|p| p.0));
    let (y_lo, y_hi) = span(points.iter().map(|p| p.1));

    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", CAPTION_SIZE))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;

    chart.configure_mesh().x_desc(x_desc).y_desc(y_desc).draw()?;

    chart.draw_series(LineSeries::new(
        points.iter().copied(),
        BAR_COLOR.stroke_width(2),
    ))?;
    chart.draw_series(
        points
            .iter()
            .map(|p| Circle::new(*p, 4, BAR_COLOR.filled())),
    )?;

    root.present()?;
    Ok(())
}

/// Unconnected semi-transparent points.
pub fn scatter(
    path: &Path,
    size: Size,
    title: &str,
    descs: (&str, &str),
    points: &[(f64, f64)],
) -> Result<()> {
    ensure!(!points.is_empty(), "no data to plot");
    if is_bitmap(path) {
        draw_scatter(BitMapBackend::new(path, size).into_drawing_area(), title, descs, points)
    } else {
        draw_scatter(SVGBackend::new(path, size).into_drawing_area(), title, descs, points)
    }
}

fn draw_scatter<DB>(
    root: DrawingArea<DB, Shift>,
    title: &str,
    (x_desc, y_desc): (&str, &str),
    points: &[(f64, f64)],
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (x_lo, x_hi) = span(points.iter().map(|p| p.0));
    let (y_lo, y_hi) = span(points.iter().map(|p| p.1));

    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", CAPTION_SIZE))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;

    chart.configure_mesh().x_desc(x_desc).y_desc(y_desc).draw()?;

    chart.draw_series(
        points
            .iter()
            .map(|p| Circle::new(*p, 2, BAR_COLOR.mix(0.3).filled())),
    )?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_value_range_starts_at_zero() {
        assert_eq!(value_range([10.0, 20.0]), (0.0, 22.0));
        assert_eq!(value_range([0.0, 0.0]), (0.0, 1.1));
        let (lo, hi) = value_range([-10.0, 10.0]);
        assert!(lo < -10.0 && hi > 10.0);
    }

    #[test]
    fn test_span_handles_constant_series() {
        assert_eq!(span([5.0, 5.0]), (4.0, 6.0));
        assert_eq!(span(std::iter::empty()), (0.0, 1.0));
    }

    #[test]
    fn test_bin_counts() {
        let values = [0.0, 1.0, 2.0, 3.0, 4.0, 10.0];
        let counts = bin_counts(&values, 2);
        assert_eq!(counts, vec![5, 1]);
        assert_eq!(counts.iter().sum::<usize>(), values.len());

        assert_eq!(bin_counts(&[7.0, 7.0], 3), vec![2, 0, 0]);
        assert_eq!(bin_counts(&[], 4), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_vertical_bars_writes_svg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bars.svg");
        vertical_bars(
            &path,
            (400, 300),
            "Volume",
            "Units",
            &labels(&["Asia", "Europe"]),
            &[10.0, 20.0],
        )
        .unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Europe"));
    }

    #[test]
    fn test_png_path_draws_a_bitmap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scatter.png");
        scatter(
            &path,
            (320, 240),
            "Mileage vs Price",
            ("km", "USD"),
            &[(10_000.0, 40_000.0), (60_000.0, 25_000.0)],
        )
        .unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"\x89PNG"));
        assert!(is_bitmap(Path::new("a.PNG")));
        assert!(!is_bitmap(Path::new("a.svg")));
    }

    #[test]
    fn test_empty_series_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.svg");
        assert!(scatter(&path, (400, 300), "Empty", ("x", "y"), &[]).is_err());
        assert!(!path.exists());
    }
}
