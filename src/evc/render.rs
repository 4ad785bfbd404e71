// Rendering of the chart specifications to PNG files.
//
// The charts are drawn in memory with plotters and encoded with image. Text uses the
// DejaVu Sans font embedded in the binary, so that no system font is required.

use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::register_font;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::evc::*;

pub const DEFAULT_WIDTH: u32 = 800;
pub const DEFAULT_HEIGHT: u32 = 600;

const MIN_WIDTH: u32 = 200;
const MIN_HEIGHT: u32 = 150;
const MAX_WIDTH: u32 = 4096;
const MAX_HEIGHT: u32 = 4096;

const FONT: &str = "sans-serif";
const FONT_BYTES: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

const PALETTE: [RGBColor; 8] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
];

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// Forwards to the inner key-point axis but opts into default label formatting, which
/// `configure_mesh()` requires; the labels themselves come from `x_label_formatter`.
struct ClusterAxis(plotters::coord::combinators::WithKeyPoints<plotters::coord::types::RangedCoordf64>);

impl Ranged for ClusterAxis {
    type ValueType = f64;
    type FormatOption = plotters::coord::ranged1d::DefaultFormatting;

    fn range(&self) -> std::ops::Range<f64> {
        self.0.range()
    }

    fn map(&self, value: &f64, limit: (i32, i32)) -> i32 {
        self.0.map(value, limit)
    }

    fn key_points<Hint: plotters::coord::ranged1d::KeyPointHint>(&self, hint: Hint) -> Vec<f64> {
        self.0.key_points(hint)
    }

    fn axis_pixel_range(&self, limit: (i32, i32)) -> std::ops::Range<i32> {
        self.0.axis_pixel_range(limit)
    }
}

fn color(idx: usize) -> RGBColor {
    PALETTE[idx % PALETTE.len()]
}

/// Writes the charts as PNG images of a fixed size.
#[derive(Debug, Clone, Copy)]
pub struct PngSink {
    width: u32,
    height: u32,
}

impl PngSink {
    /// The size is clamped between 200x150 and 4096x4096.
    pub fn new(width: u32, height: u32) -> PngSink {
        let clamped = (
            width.clamp(MIN_WIDTH, MAX_WIDTH),
            height.clamp(MIN_HEIGHT, MAX_HEIGHT),
        );
        if clamped != (width, height) {
            warn!(
                "PngSink: {}x{} is out of bounds, using {}x{}",
                width, height, clamped.0, clamped.1
            );
        }
        PngSink {
            width: clamped.0,
            height: clamped.1,
        }
    }

    /// Draws the chart and returns the RGB pixels.
    fn draw(&self, spec: &ChartSpec) -> Result<Vec<u8>, BoxedError> {
        register_font(FONT, FontStyle::Normal, FONT_BYTES)
            .map_err(|_| "the embedded font could not be loaded")?;
        let mut buf = vec![255u8; buffer_len(self.width, self.height)?];
        {
            let root = BitMapBackend::with_buffer(&mut buf, (self.width, self.height))
                .into_drawing_area();
            root.fill(&WHITE)?;
            match spec.kind {
                ChartKind::Pie => draw_pie(&root, spec)?,
                ChartKind::GroupedBar => draw_bars(&root, spec, false)?,
                ChartKind::StackedBar => draw_bars(&root, spec, true)?,
            }
            root.present()?;
        }
        Ok(buf)
    }
}

/// The size of an RGB buffer, or an error if it cannot be addressed.
fn buffer_len(width: u32, height: u32) -> Result<usize, BoxedError> {
    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(3))
        .ok_or_else(|| format!("an image of {}x{} pixels is too large", width, height))?;
    Ok(len)
}

impl ChartSink for PngSink {
    fn render(&self, spec: &ChartSpec, path: &Path) -> Result<(), BoxedError> {
        debug!("PngSink: rendering {:?} to {}", spec.kind, path.display());
        let buf = self.draw(spec)?;
        let img = RgbImage::from_raw(self.width, self.height, buf)
            .ok_or("the pixel buffer does not match the size of the image")?;

        // The image lands under its final name only once complete.
        let tmp = temporary_path(path);
        if let Err(e) = img.save_with_format(&tmp, ImageFormat::Png) {
            let _ = fs::remove_file(&tmp);
            return Err(Box::new(e));
        }
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(Box::new(e));
        }
        Ok(())
    }
}

fn temporary_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}

/// One wedge per category, clockwise from the top. Each wedge is labelled
/// with its category, value and share.
fn draw_pie(root: &Area, spec: &ChartSpec) -> Result<(), BoxedError> {
    let area = root.titled(&spec.title, (FONT, 28))?;
    let values: Vec<u64> = spec.values.first().cloned().unwrap_or_default();
    let total: u64 = values.iter().sum();

    let (w, h) = area.dim_in_pixel();
    let radius = (w.min(h) as f64 * 0.35).max(10.0);

    if total == 0 {
        warn!("draw_pie: nothing to draw for {:?}", spec.title);
        area.draw(&Circle::new(
            (w as i32 / 2, h as i32 / 2),
            radius as i32,
            BLACK.stroke_width(1),
        ))?;
        return Ok(());
    }

    // Zero wedges are left out, so that their labels do not pile up.
    let mut sizes = vec![];
    let mut colors = vec![];
    let mut labels = vec![];
    for (idx, (category, value)) in spec.categories.iter().zip(values.iter()).enumerate() {
        if *value == 0 {
            continue;
        }
        sizes.push(*value as f64);
        colors.push(color(idx));
        labels.push(format!(
            "{}: {} ({}%)",
            category,
            value,
            (value * 100 + total / 2) / total
        ));
    }

    // The pie is placed in backend pixels, not in area coordinates.
    let (x0, y0) = area.get_base_pixel();
    let center = (x0 + w as i32 / 2, y0 + h as i32 / 2);
    let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
    pie.start_angle(-90.0);
    pie.label_style((FONT, 16).into_font().color(&BLACK));
    pie.label_offset(12.0);
    area.draw(&pie)?;
    Ok(())
}

/// One cluster per event, one bar (or one segment of a stacked bar) per category.
fn draw_bars(root: &Area, spec: &ChartSpec, stacked: bool) -> Result<(), BoxedError> {
    let n_clusters = spec.clusters.len().max(1);
    let n_categories = spec.categories.len().max(1);

    let max_value: Option<u64> = if stacked {
        spec.values.iter().map(|v| v.iter().sum::<u64>()).max()
    } else {
        spec.values.iter().flat_map(|v| v.iter().copied()).max()
    };
    let max_value = max_value.unwrap_or(0);
    // Headroom for the value labels.
    let y_top = max_value + max_value / 10 + 1;

    // One unit per cluster, with the tick and the label in its middle.
    let centers: Vec<f64> = (0..n_clusters).map(|i| i as f64 + 0.5).collect();
    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, (FONT, 28))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(
            ClusterAxis((0f64..n_clusters as f64).with_key_points(centers)),
            0u64..y_top,
        )?;

    let cluster_label = |x: &f64| -> String {
        spec.clusters
            .get(x.floor() as usize)
            .cloned()
            .unwrap_or_default()
    };
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_label_formatter(&cluster_label)
        .y_labels(6)
        .label_style((FONT, 14))
        .draw()?;

    let value_style =
        TextStyle::from((FONT, 13).into_font()).pos(Pos::new(HPos::Center, VPos::Bottom));
    let mut value_labels: Vec<(f64, u64)> = vec![];
    let mut bases = vec![0u64; n_clusters];
    for (idx, category) in spec.categories.iter().enumerate() {
        let bar_color = color(idx);
        let mut bars = vec![];
        for (cidx, values) in spec.values.iter().enumerate() {
            let value = values.get(idx).copied().unwrap_or(0);
            let (left, right, bottom) = if stacked {
                (cidx as f64 + 0.2, cidx as f64 + 0.8, bases[cidx])
            } else {
                let width = 0.8 / n_categories as f64;
                let left = cidx as f64 + 0.1 + idx as f64 * width;
                value_labels.push((left + width / 2.0, value));
                (left, left + width, 0)
            };
            if value > 0 {
                bars.push(Rectangle::new(
                    [(left, bottom + value), (right, bottom)],
                    bar_color.filled(),
                ));
            }
            bases[cidx] += value;
        }
        chart
            .draw_series(bars)?
            .label(category.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 6), (x + 12, y + 6)], bar_color.filled()));
    }
    if stacked {
        value_labels = bases
            .iter()
            .enumerate()
            .map(|(cidx, total)| (cidx as f64 + 0.5, *total))
            .collect();
    }
    chart.draw_series(
        value_labels
            .into_iter()
            .map(|(x, value)| Text::new(value.to_string(), (x, value), value_style.clone())),
    )?;

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .label_font((FONT, 14))
        .draw()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(kind: ChartKind, clusters: &[&str], values: Vec<Vec<u64>>) -> ChartSpec {
        ChartSpec {
            kind,
            title: "Attendance by Event".to_string(),
            clusters: clusters.iter().map(|s| s.to_string()).collect(),
            categories: vec!["Yes".to_string(), "No".to_string()],
            values,
            file_name: "Attendance_Multi.png".to_string(),
        }
    }

    fn render_and_open(sink: PngSink, spec: &ChartSpec) -> RgbImage {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(&spec.file_name);
        sink.render(spec, &path).unwrap();
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        image::open(&path).unwrap().to_rgb8()
    }

    fn count_color(img: &RgbImage, c: RGBColor) -> usize {
        img.pixels().filter(|p| p.0 == [c.0, c.1, c.2]).count()
    }

    #[test]
    fn pie_chart() {
        let spec = spec(ChartKind::Pie, &["Spring"], vec![vec![3, 1]]);
        let img = render_and_open(PngSink::new(400, 300), &spec);
        assert_eq!(img.dimensions(), (400, 300));
        // Below the title. The first wedge starts at the top and covers three quarters.
        let center = (200u32, 165u32);
        assert_eq!(img.get_pixel(center.0 + 40, center.1).0, [31, 119, 180]);
        assert_eq!(img.get_pixel(center.0 - 45, center.1 - 45).0, [255, 127, 14]);
        assert_eq!(img.get_pixel(5, 295).0, [255, 255, 255]);
    }

    #[test]
    fn empty_pie_chart() {
        let spec = spec(ChartKind::Pie, &["Spring"], vec![vec![0, 0]]);
        let img = render_and_open(PngSink::new(400, 300), &spec);
        assert_eq!(img.dimensions(), (400, 300));
        assert_eq!(count_color(&img, PALETTE[0]), 0);
        assert_eq!(count_color(&img, PALETTE[1]), 0);
    }

    #[test]
    fn bar_charts() {
        for kind in [ChartKind::GroupedBar, ChartKind::StackedBar] {
            let spec = spec(
                kind,
                &["Gala", "Mixer", "Event_3"],
                vec![vec![2, 1], vec![0, 4], vec![0, 0]],
            );
            let img = render_and_open(PngSink::new(DEFAULT_WIDTH, DEFAULT_HEIGHT), &spec);
            assert_eq!(img.dimensions(), (DEFAULT_WIDTH, DEFAULT_HEIGHT));
            // Far more than the legend swatches.
            assert!(count_color(&img, PALETTE[0]) > 1000, "{:?}", kind);
            assert!(count_color(&img, PALETTE[1]) > 1000, "{:?}", kind);
        }
    }

    #[test]
    fn single_cluster_bars() {
        let mut spec = spec(ChartKind::GroupedBar, &["Spring Gala"], vec![vec![45, 20]]);
        spec.categories = vec!["Members".to_string(), "Non-Members".to_string()];
        let img = render_and_open(PngSink::new(DEFAULT_WIDTH, DEFAULT_HEIGHT), &spec);
        assert!(count_color(&img, PALETTE[0]) > count_color(&img, PALETTE[1]));
        assert!(count_color(&img, PALETTE[1]) > 1000);
    }

    #[test]
    fn minimum_size() {
        let spec = spec(ChartKind::GroupedBar, &["Spring"], vec![vec![15, 20]]);
        let img = render_and_open(PngSink::new(10, 10), &spec);
        assert_eq!(img.dimensions(), (MIN_WIDTH, MIN_HEIGHT));
    }

    #[test]
    fn maximum_size() {
        let sink = PngSink::new(70000, 70000);
        assert_eq!((sink.width, sink.height), (MAX_WIDTH, MAX_HEIGHT));
        let sink = PngSink::new(u32::MAX, 300);
        assert_eq!((sink.width, sink.height), (MAX_WIDTH, 300));
    }

    #[test]
    fn buffer_sizes() {
        assert_eq!(buffer_len(400, 300).unwrap(), 360_000);
        assert_eq!(buffer_len(70000, 70000).unwrap(), 14_700_000_000);
        assert!(buffer_len(u32::MAX, u32::MAX).is_err());
    }

    #[test]
    fn failed_render_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("Attendance_Multi.png");
        let spec = spec(ChartKind::Pie, &["Spring"], vec![vec![1, 1]]);
        assert!(PngSink::new(400, 300).render(&spec, &path).is_err());
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn temporary_names() {
        assert_eq!(
            temporary_path(Path::new("static/Sales_spring.png")),
            PathBuf::from("static/.Sales_spring.png.tmp")
        );
    }
}
