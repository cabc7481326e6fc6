//! # Chart Rendering
//! Presentation seam: turns labeled numeric series from a report into
//! image bytes for the notifier. The series preparation is the part
//! with rules; rendering itself stays behind a trait.

use anyhow::Result;

use crate::report::{format_delta, CollectionReport};

/// One labeled bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesPoint {
    pub label: String,
    pub value: i64,
}

/// Renders a labeled series into image bytes.
pub trait ChartRenderer: Send + Sync {
    fn render(&self, title: &str, series: &[SeriesPoint]) -> Result<Vec<u8>>;
    /// File extension for the produced bytes (`svg`, `png`, ...).
    fn extension(&self) -> &'static str;
}

/// Per-channel short-window gains, chart-ready. Channels with absent or
/// non-positive deltas are left out; the chart shows gains only.
pub fn short_window_series(report: &CollectionReport) -> Vec<SeriesPoint> {
    report
        .channels
        .iter()
        .filter_map(|ch| match ch.short_delta.value {
            Some(v) if v > 0 => Some(SeriesPoint {
                label: ch.name.clone(),
                value: v,
            }),
            _ => None,
        })
        .collect()
}

/// Dependency-free horizontal bar chart as an SVG document.
pub struct SvgChartRenderer {
    width: u32,
    bar_height: u32,
    bar_color: String,
}

impl Default for SvgChartRenderer {
    fn default() -> Self {
        Self {
            width: 900,
            bar_height: 28,
            bar_color: "#43B581".to_string(),
        }
    }
}

impl SvgChartRenderer {
    pub fn with_bar_color(mut self, color: &str) -> Self {
        self.bar_color = color.to_string();
        self
    }
}

impl ChartRenderer for SvgChartRenderer {
    fn render(&self, title: &str, series: &[SeriesPoint]) -> Result<Vec<u8>> {
        let label_col = 220u32;
        let value_col = 90u32;
        let row_gap = 10u32;
        let top = 48u32;
        let row = self.bar_height + row_gap;
        let height = top + series.len() as u32 * row + 16;
        let plot_width = self.width - label_col - value_col - 24;
        let max = series.iter().map(|p| p.value.max(0)).max().unwrap_or(0).max(1);

        let mut svg = String::new();
        svg.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{}\" height=\"{}\" \
             font-family=\"sans-serif\">\n",
            self.width, height
        ));
        svg.push_str("<rect width=\"100%\" height=\"100%\" fill=\"#2C2F33\"/>\n");
        svg.push_str(&format!(
            "<text x=\"{}\" y=\"28\" fill=\"#FFFFFF\" font-size=\"18\" \
             font-weight=\"bold\" text-anchor=\"middle\">{}</text>\n",
            self.width / 2,
            escape_text(title)
        ));

        for (i, point) in series.iter().enumerate() {
            let y = top + i as u32 * row;
            let text_y = y + self.bar_height / 2 + 5;
            let bar_w =
                ((point.value.max(0) as f64 / max as f64) * plot_width as f64).round() as u32;
            svg.push_str(&format!(
                "<text x=\"{}\" y=\"{text_y}\" fill=\"#FFFFFF\" font-size=\"13\" \
                 text-anchor=\"end\">{}</text>\n",
                label_col - 8,
                escape_text(&point.label)
            ));
            svg.push_str(&format!(
                "<rect x=\"{label_col}\" y=\"{y}\" width=\"{bar_w}\" height=\"{}\" \
                 fill=\"{}\" fill-opacity=\"0.85\"/>\n",
                self.bar_height, self.bar_color
            ));
            svg.push_str(&format!(
                "<text x=\"{}\" y=\"{text_y}\" fill=\"#FFFFFF\" font-size=\"13\">{}</text>\n",
                label_col + bar_w + 8,
                format_delta(point.value)
            ));
        }

        svg.push_str("</svg>\n");
        Ok(svg.into_bytes())
    }

    fn extension(&self) -> &'static str {
        "svg"
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
