//! Yield line chart rendering.
//!
//! The chart is laid out as SVG in CSS pixels (96 per inch), then rasterized
//! once at the configured DPI. The resulting PNG bytes feed both the
//! workbook's chart sheet and the standalone image.

use crate::config::ChartConfig;
use crate::error::{Result, YieldError};
use crate::models::YieldTable;
use resvg::{tiny_skia, usvg};
use std::fmt::Write;
use tracing::{debug, warn};

/// SVG user units per inch.
const CSS_DPI: f64 = 96.0;
const FONT_FAMILY: &str = "DejaVu Sans, Liberation Sans, Arial, Helvetica, sans-serif";
const BUNDLED_FAMILY: &str = "DejaVu Sans";
static BUNDLED_REGULAR: &[u8] =
    include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/fonts/DejaVuSans.ttf"));
static BUNDLED_BOLD: &[u8] =
    include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/fonts/DejaVuSans-Bold.ttf"));
const TEXT_COLOR: &str = "#333333";
const GRID_COLOR: &str = "#B0B0B0";

const MARGIN_LEFT: f64 = 95.0;
const MARGIN_RIGHT: f64 = 40.0;
const MARGIN_TOP: f64 = 80.0;
const MARGIN_BOTTOM: f64 = 140.0;

/// A rasterized chart.
#[derive(Debug, Clone)]
pub struct RenderedChart {
    /// PNG-encoded image, tagged with its DPI.
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
}

/// Y axis limits: the observed range plus padding, clamped to 0-100.
///
/// An empty table gets the full 0-100 range; a zero-width range is widened so
/// the line still sits inside the plot.
pub fn y_axis_range(table: &YieldTable, padding: f64) -> (f64, f64) {
    let (lo, hi) = match table.yield_bounds() {
        Some(bounds) => bounds,
        None => return (0.0, 100.0),
    };

    let mut min = (lo - padding).max(0.0);
    let mut max = (hi + padding).min(100.0);

    // out-of-range yields still have to be visible
    min = min.min(lo);
    max = max.max(hi);

    if max - min < f64::EPSILON * hi.abs().max(1.0) {
        // relative, so the span survives rounding for very large values
        let widen = (hi.abs() * 1e-6).max(1.0);
        min -= widen;
        max += widen;
    }

    (min, max)
}

/// Evenly spaced "nice" tick values covering `[min, max]`.
pub fn y_ticks(min: f64, max: f64) -> Vec<f64> {
    let span = max - min;
    if span <= 0.0 || !span.is_finite() {
        return vec![min];
    }

    let raw = span / 6.0;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 2.5, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|s| *s >= raw)
        .unwrap_or(10.0 * magnitude);

    let mut ticks = Vec::new();
    let mut value = (min / step).ceil() * step;
    while value <= max + step * 1e-9 {
        ticks.push(value);
        value += step;
    }
    ticks
}

fn tick_decimals(ticks: &[f64]) -> usize {
    match ticks {
        [a, b, ..] if (b - a) < 0.1 => 2,
        [a, b, ..] if (b - a) < 1.0 => 1,
        _ => 0,
    }
}

/// Escape text for use in SVG content and attributes.
fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Lay out the chart as an SVG document.
pub fn build_svg(table: &YieldTable, config: &ChartConfig) -> String {
    let width = config.width_inches * CSS_DPI;
    let height = config.height_inches * CSS_DPI;

    let left = MARGIN_LEFT;
    let right = width - MARGIN_RIGHT;
    let top = MARGIN_TOP;
    let bottom = height - MARGIN_BOTTOM;
    let plot_width = right - left;
    let plot_height = bottom - top;

    let (y_min, y_max) = y_axis_range(table, config.y_axis_padding);
    let to_y = |value: f64| bottom - (value - y_min) / (y_max - y_min) * plot_height;

    let count = table.len();
    let inset = plot_width * 0.04;
    let to_x = |index: usize| {
        if count <= 1 {
            left + plot_width / 2.0
        } else {
            left + inset + index as f64 * (plot_width - 2.0 * inset) / (count - 1) as f64
        }
    };

    let mut svg = String::new();

    // writing to a String cannot fail
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="{font}">"#,
        w = width,
        h = height,
        font = FONT_FAMILY
    );
    let _ = writeln!(svg, r#"<rect width="{}" height="{}" fill="white"/>"#, width, height);

    // Title
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="middle" font-size="24" font-weight="bold" fill="{}">{}</text>"#,
        width / 2.0,
        top - 35.0,
        escape_xml(&config.line_color),
        escape_xml(&config.title)
    );

    // Plot area
    let _ = writeln!(
        svg,
        r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{}"/>"#,
        left,
        top,
        plot_width,
        plot_height,
        escape_xml(&config.background_color)
    );

    // Horizontal grid and y tick labels
    let ticks = y_ticks(y_min, y_max);
    let decimals = tick_decimals(&ticks);
    for tick in &ticks {
        let y = to_y(*tick);
        let _ = writeln!(
            svg,
            r#"<line x1="{}" y1="{y}" x2="{}" y2="{y}" stroke="{}" stroke-width="0.8" stroke-dasharray="6 4" stroke-opacity="0.6"/>"#,
            left,
            right,
            GRID_COLOR,
            y = y
        );
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="end" font-size="13" fill="{}">{:.*}</text>"#,
            left - 10.0,
            y + 4.5,
            TEXT_COLOR,
            decimals,
            tick
        );
    }

    // Vertical grid and x tick labels
    for (index, record) in table.iter().enumerate() {
        let x = to_x(index);
        let _ = writeln!(
            svg,
            r#"<line x1="{x}" y1="{}" x2="{x}" y2="{}" stroke="{}" stroke-width="0.8" stroke-dasharray="6 4" stroke-opacity="0.6"/>"#,
            top,
            bottom,
            GRID_COLOR,
            x = x
        );
        let _ = writeln!(
            svg,
            r#"<text class="x-label" transform="translate({} {}) rotate(-45)" text-anchor="end" font-size="13" fill="{}">{}</text>"#,
            x,
            bottom + 18.0,
            TEXT_COLOR,
            escape_xml(record.wafer_id())
        );
    }

    // Axes
    let _ = writeln!(
        svg,
        r#"<path d="M {l} {t} L {l} {b} L {r} {b}" fill="none" stroke="{c}" stroke-width="1.2"/>"#,
        l = left,
        t = top,
        b = bottom,
        r = right,
        c = TEXT_COLOR
    );

    // Axis labels
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="middle" font-size="18" font-weight="bold" fill="{}">{}</text>"#,
        left + plot_width / 2.0,
        height - 20.0,
        TEXT_COLOR,
        escape_xml(&config.x_label)
    );
    let _ = writeln!(
        svg,
        r#"<text transform="translate(28 {}) rotate(-90)" text-anchor="middle" font-size="18" font-weight="bold" fill="{}">{}</text>"#,
        top + plot_height / 2.0,
        TEXT_COLOR,
        escape_xml(&config.y_label)
    );

    if table.is_empty() {
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="middle" font-size="20" fill="{}">No data</text>"#,
            left + plot_width / 2.0,
            top + plot_height / 2.0,
            GRID_COLOR
        );
    } else {
        let points: Vec<String> = table
            .iter()
            .enumerate()
            .map(|(index, record)| format!("{:.2},{:.2}", to_x(index), to_y(record.yield_percent())))
            .collect();
        let _ = writeln!(
            svg,
            r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="2.5" stroke-linejoin="round" stroke-linecap="round"/>"#,
            points.join(" "),
            escape_xml(&config.line_color)
        );

        for (index, record) in table.iter().enumerate() {
            let x = to_x(index);
            let y = to_y(record.yield_percent());
            let _ = writeln!(
                svg,
                r#"<circle class="point" cx="{:.2}" cy="{:.2}" r="6" fill="{}" stroke="white" stroke-width="2"/>"#,
                x,
                y,
                escape_xml(&config.marker_color)
            );
            let _ = writeln!(
                svg,
                r#"<text class="value-label" x="{:.2}" y="{:.2}" text-anchor="middle" font-size="12" font-weight="bold" fill="{}">{:.2}%</text>"#,
                x,
                y - 14.0,
                TEXT_COLOR,
                record.yield_percent()
            );
        }
    }

    // Legend
    let legend_x = right - 170.0;
    let legend_y = top + 14.0;
    let _ = writeln!(
        svg,
        r#"<rect x="{}" y="{}" width="156" height="36" rx="4" fill="white" fill-opacity="0.9" stroke="{}"/>"#,
        legend_x,
        legend_y,
        GRID_COLOR
    );
    let _ = writeln!(
        svg,
        r#"<line x1="{}" y1="{y}" x2="{}" y2="{y}" stroke="{}" stroke-width="2.5"/>"#,
        legend_x + 10.0,
        legend_x + 46.0,
        escape_xml(&config.line_color),
        y = legend_y + 18.0
    );
    let _ = writeln!(
        svg,
        r#"<circle cx="{}" cy="{}" r="5" fill="{}" stroke="white" stroke-width="1.5"/>"#,
        legend_x + 28.0,
        legend_y + 18.0,
        escape_xml(&config.marker_color)
    );
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" font-size="14" fill="{}">Wafer Yield</text>"#,
        legend_x + 56.0,
        legend_y + 23.0,
        TEXT_COLOR
    );

    svg.push_str("</svg>\n");
    svg
}

/// Rasterize an SVG document at `dpi` and encode it as PNG.
pub fn rasterize(svg: &str, dpi: u32) -> Result<RenderedChart> {
    let mut options = render_options();
    options.fontdb_mut().load_system_fonts();
    rasterize_with(svg, dpi, &options)
}

/// Options with the bundled fonts loaded, so text renders on hosts without
/// any system fonts.
fn render_options() -> usvg::Options<'static> {
    let mut options = usvg::Options {
        font_family: BUNDLED_FAMILY.to_string(),
        ..usvg::Options::default()
    };
    let fontdb = options.fontdb_mut();
    fontdb.load_font_data(BUNDLED_REGULAR.to_vec());
    fontdb.load_font_data(BUNDLED_BOLD.to_vec());
    options
}

fn rasterize_with(svg: &str, dpi: u32, options: &usvg::Options) -> Result<RenderedChart> {
    if options.fontdb.is_empty() {
        warn!("No fonts available; chart labels will be missing");
    }

    let tree = usvg::Tree::from_str(svg, options).map_err(|e| YieldError::Render(e.to_string()))?;

    let zoom = dpi as f32 / CSS_DPI as f32;
    let size = tree.size();
    let width = (size.width() * zoom).round() as u32;
    let height = (size.height() * zoom).round() as u32;

    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| YieldError::Render(format!("cannot allocate a {}x{} canvas", width, height)))?;
    pixmap.fill(tiny_skia::Color::WHITE);
    resvg::render(&tree, tiny_skia::Transform::from_scale(zoom, zoom), &mut pixmap.as_mut());

    let png = encode_png(pixmap.data(), width, height, dpi)?;
    debug!("Rendered {}x{} chart at {} DPI ({} bytes)", width, height, dpi, png.len());

    Ok(RenderedChart {
        png,
        width,
        height,
        dpi,
    })
}

/// Encode RGBA pixels as PNG with a physical resolution chunk.
fn encode_png(rgba: &[u8], width: u32, height: u32, dpi: u32) -> Result<Vec<u8>> {
    let to_render_error = |e: png::EncodingError| YieldError::Render(e.to_string());

    let mut buffer = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut buffer, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);

        let pixels_per_meter = (f64::from(dpi) / 0.0254).round() as u32;
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu: pixels_per_meter,
            yppu: pixels_per_meter,
            unit: png::Unit::Meter,
        }));

        let mut writer = encoder.write_header().map_err(to_render_error)?;
        writer.write_image_data(rgba).map_err(to_render_error)?;
        writer.finish().map_err(to_render_error)?;
    }

    Ok(buffer)
}

/// Render the table's chart once.
pub fn render_chart(table: &YieldTable, config: &ChartConfig) -> Result<RenderedChart> {
    let svg = build_svg(table, config);
    rasterize(&svg, config.dpi)
}
