// Copyright (c) 2022. Sebastien Soudan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http:www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Presentation of a [`TestResult`]: histogram of the null distribution with
//! the observed difference marked, and text/JSON summaries.

use std::io;

use serde::Serialize;

use crate::input::InputWarning;
use crate::permutation::{PValueType, Relabeling, TestResult};

/// Number of histogram bins when nothing else is asked for.
pub const DEFAULT_BINS: usize = 50;

/// Histogram bars (xkcd "dark sky blue").
pub const BAR_COLOR: &str = "#448ee4";

/// Observed difference marker and annotation (xkcd "vermillion").
pub const MARKER_COLOR: &str = "#f4320c";

/// Equal-width binning of a set of values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    /// left edge of the first bin
    pub start: f64,
    /// width of every bin
    pub bin_width: f64,
    /// number of values per bin
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Bin the finite values of `values` into `bins` bins spanning their range.
    ///
    /// When all values are equal the bins span a unit window centered on them.
    pub fn new(values: &[f64], bins: usize) -> Self {
        let bins = bins.max(1);
        let (min, max) = values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });

        let (start, bin_width) = if min > max {
            (0.0, 1.0 / bins as f64)
        } else if max > min {
            (min, (max - min) / bins as f64)
        } else {
            (min - 0.5, 1.0 / bins as f64)
        };

        let mut counts = vec![0; bins];
        for v in values.iter().copied().filter(|v| v.is_finite()) {
            // the last bin is closed on the right
            let i = (((v - start) / bin_width) as usize).min(bins - 1);
            counts[i] += 1;
        }

        Self {
            start,
            bin_width,
            counts,
        }
    }

    /// Right edge of the last bin.
    pub fn end(&self) -> f64 {
        self.start + self.bin_width * self.counts.len() as f64
    }

    /// Height of the tallest bin.
    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// Number of binned values.
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// `p` as a percentage with one decimal: `0.0512` gives `5.1%`.
pub fn format_p_value_percent(p: f64) -> String {
    format!("{:.1}%", p * 100.0)
}

/// Size and binning of the rendered histogram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SvgOptions {
    /// image width in pixels
    pub width: f64,
    /// image height in pixels
    pub height: f64,
    /// number of bins
    pub bins: usize,
}

impl Default for SvgOptions {
    fn default() -> Self {
        Self {
            width: 640.0,
            height: 480.0,
            bins: DEFAULT_BINS,
        }
    }
}

const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 55.0;
const TICKS: usize = 5;

/// Render the null distribution of `result` as an SVG histogram, with a
/// vertical marker at the observed difference annotated with the p-value.
pub fn render_svg(result: &TestResult<f64>, options: &SvgOptions) -> String {
    let histogram = Histogram::new(result.null_distribution(), options.bins);
    let observed = result.observed_difference();

    // the x range always shows the marker
    let lo = histogram.start.min(observed);
    let hi = histogram.end().max(observed);
    let pad = if hi > lo { (hi - lo) * 0.05 } else { 0.5 };
    let (x_min, x_max) = (lo - pad, hi + pad);
    let y_max = (histogram.max_count().max(1) as f64) * 1.05;

    let plot_width = options.width - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = options.height - MARGIN_TOP - MARGIN_BOTTOM;
    let sx = |x: f64| MARGIN_LEFT + (x - x_min) / (x_max - x_min) * plot_width;
    let sy = |y: f64| MARGIN_TOP + plot_height - y / y_max * plot_height;

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\" font-family=\"sans-serif\">\n",
        w = options.width,
        h = options.height
    ));
    svg.push_str(&format!(
        "<defs><marker id=\"arrow\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"8\" markerHeight=\"8\" orient=\"auto-start-reverse\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"{MARKER_COLOR}\"/></marker></defs>\n"
    ));
    svg.push_str(&format!(
        "<rect width=\"{}\" height=\"{}\" fill=\"white\"/>\n",
        options.width, options.height
    ));

    // grid and ticks
    for i in 0..=TICKS {
        let x = x_min + (x_max - x_min) * i as f64 / TICKS as f64;
        let y = y_max * i as f64 / TICKS as f64;
        svg.push_str(&format!(
            "<line class=\"grid\" x1=\"{0:.2}\" y1=\"{1:.2}\" x2=\"{0:.2}\" y2=\"{2:.2}\" stroke=\"#dddddd\"/>\n",
            sx(x),
            sy(0.0),
            sy(y_max)
        ));
        svg.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" font-size=\"11\" text-anchor=\"middle\">{:.2}</text>\n",
            sx(x),
            sy(0.0) + 16.0,
            x
        ));
        svg.push_str(&format!(
            "<line class=\"grid\" x1=\"{1:.2}\" y1=\"{0:.2}\" x2=\"{2:.2}\" y2=\"{0:.2}\" stroke=\"#dddddd\"/>\n",
            sy(y),
            sx(x_min),
            sx(x_max)
        ));
        svg.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" font-size=\"11\" text-anchor=\"end\">{:.0}</text>\n",
            sx(x_min) - 6.0,
            sy(y) + 4.0,
            y
        ));
    }

    for (i, &count) in histogram.counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let left = histogram.start + histogram.bin_width * i as f64;
        let x0 = sx(left);
        let x1 = sx(left + histogram.bin_width);
        svg.push_str(&format!(
            "<rect class=\"bar\" x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{BAR_COLOR}\"/>\n",
            x0,
            sy(count as f64),
            (x1 - x0).max(0.5),
            sy(0.0) - sy(count as f64)
        ));
    }

    // observed difference
    let marker_x = sx(observed);
    svg.push_str(&format!(
        "<line class=\"observed\" x1=\"{marker_x:.2}\" y1=\"{:.2}\" x2=\"{marker_x:.2}\" y2=\"{:.2}\" stroke=\"{MARKER_COLOR}\" stroke-width=\"2\"/>\n",
        sy(0.0),
        sy(y_max)
    ));

    let label_x = sx(observed + (x_max - observed) * 0.5);
    let label_y = sy((y_max / 2.0).floor());
    svg.push_str(&format!(
        "<line x1=\"{label_x:.2}\" y1=\"{label_y:.2}\" x2=\"{:.2}\" y2=\"{label_y:.2}\" stroke=\"{MARKER_COLOR}\" stroke-width=\"2\" marker-end=\"url(#arrow)\"/>\n",
        marker_x + 4.0
    ));
    svg.push_str(&format!(
        "<text class=\"p-value\" x=\"{:.2}\" y=\"{:.2}\" font-size=\"16\" fill=\"{MARKER_COLOR}\" dominant-baseline=\"middle\">{}</text>\n",
        label_x + 4.0,
        label_y,
        format_p_value_percent(result.p_value())
    ));

    svg.push_str(&format!(
        "<text x=\"{:.2}\" y=\"{:.2}\" font-size=\"13\" text-anchor=\"middle\">score difference</text>\n",
        MARGIN_LEFT + plot_width / 2.0,
        options.height - 12.0
    ));
    svg.push_str(&format!(
        "<text x=\"16\" y=\"{0:.2}\" font-size=\"13\" text-anchor=\"middle\" transform=\"rotate(-90 16 {0:.2})\">number</text>\n",
        MARGIN_TOP + plot_height / 2.0
    ));
    svg.push_str(&format!(
        "<text x=\"{:.2}\" y=\"24\" font-size=\"14\" text-anchor=\"middle\">observed difference {:.4}, p-value {:.4}</text>\n",
        MARGIN_LEFT + plot_width / 2.0,
        observed,
        result.p_value()
    ));
    svg.push_str("</svg>\n");

    svg
}

/// What a run produced, ready to print or serialize.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// `mean(B) - mean(A)`
    pub observed_difference: f64,
    /// p-value, unrounded
    pub p_value: f64,
    /// p-value as a percentage with one decimal
    pub p_value_percent: String,
    /// length of the null distribution
    pub simulations: usize,
    /// size of group A
    pub n_a: usize,
    /// size of group B
    pub n_b: usize,
    /// relabeling scheme
    pub relabeling: Relabeling,
    /// tail(s) counted
    pub pvalue_type: PValueType,
    /// seed of the random stream, if any
    pub seed: Option<u64>,
    /// skipped input
    pub warnings: Vec<InputWarning>,
    /// whether typed input contained letters
    pub contains_text: bool,
}

impl Summary {
    /// Summarize `result`.
    pub fn new(result: &TestResult<f64>, seed: Option<u64>, warnings: Vec<InputWarning>) -> Self {
        Self {
            observed_difference: result.observed_difference(),
            p_value: result.p_value(),
            p_value_percent: format_p_value_percent(result.p_value()),
            simulations: result.null_distribution().len(),
            n_a: result.n_a(),
            n_b: result.n_b(),
            relabeling: result.config().relabeling,
            pvalue_type: result.config().pvalue_type,
            seed,
            warnings,
            contains_text: false,
        }
    }

    /// Record whether the typed input contained letters.
    pub fn with_contains_text(mut self, contains_text: bool) -> Self {
        self.contains_text = contains_text;
        self
    }

    /// Human readable report.
    pub fn to_text(&self) -> String {
        let mut text = format!(
            "group A: {} observations\ngroup B: {} observations\n\
             observed difference (mean B - mean A): {:.4}\n\
             simulations: {} ({}, {})\n\
             p-value: {} ({})\n",
            self.n_a,
            self.n_b,
            self.observed_difference,
            self.simulations,
            self.relabeling,
            self.pvalue_type,
            self.p_value,
            self.p_value_percent,
        );
        if let Some(seed) = self.seed {
            text.push_str(&format!("seed: {seed}\n"));
        }
        if !self.warnings.is_empty() {
            text.push_str(&format!("warnings: {}\n", self.warnings.len()));
        }
        if self.contains_text {
            text.push_str("text found in input\n");
        }
        text
    }

    /// JSON report.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Write the null distribution as CSV, one difference per row.
pub fn write_distribution_csv<W: io::Write>(
    writer: W,
    result: &TestResult<f64>,
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(["difference"])?;
    for difference in result.null_distribution() {
        writer.write_record([difference.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::permutation::{permutation_ht_with_seed, PermutationConfig};

    fn constant_groups_result() -> TestResult<f64> {
        let config = PermutationConfig::default().with_simulations(2_000);
        permutation_ht_with_seed(&[1.0, 1.0, 1.0], &[10.0, 10.0, 10.0], &config, Some(42))
            .unwrap()
    }

    #[test]
    fn test_histogram_counts() {
        let values = vec![0.0, 0.1, 0.5, 0.9, 1.0, 1.0];
        let histogram = Histogram::new(&values, 4);

        assert_relative_eq!(histogram.start, 0.0);
        assert_relative_eq!(histogram.bin_width, 0.25);
        assert_relative_eq!(histogram.end(), 1.0);
        assert_eq!(histogram.counts, vec![2, 0, 1, 3]);
        assert_eq!(histogram.total(), values.len());
        assert_eq!(histogram.max_count(), 3);
    }

    #[test]
    fn test_histogram_degenerate() {
        let histogram = Histogram::new(&[3.0, 3.0, 3.0], 10);
        assert_relative_eq!(histogram.start, 2.5);
        assert_relative_eq!(histogram.end(), 3.5);
        assert_eq!(histogram.total(), 3);

        let empty = Histogram::new(&[], 0);
        assert_eq!(empty.counts, vec![0]);
        assert_eq!(empty.max_count(), 0);
    }

    #[test]
    fn test_format_p_value_percent() {
        assert_eq!(format_p_value_percent(0.0512), "5.1%");
        assert_eq!(format_p_value_percent(0.0), "0.0%");
        assert_eq!(format_p_value_percent(1.0), "100.0%");
    }

    #[test]
    fn test_render_svg() {
        let result = constant_groups_result();
        let svg = render_svg(&result, &SvgOptions::default());

        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains("score difference"));
        assert!(svg.contains(">number<"));
        assert!(svg.contains(&format!(
            ">{}<",
            format_p_value_percent(result.p_value())
        )));
        assert_eq!(svg.matches("class=\"observed\"").count(), 1);

        // only -9, -3, 3 and 9 occur
        assert_eq!(svg.matches("class=\"bar\"").count(), 4);
    }

    #[test]
    fn test_render_svg_marker_outside_distribution() {
        // 10 is above every simulated difference
        let config = PermutationConfig::default().with_simulations(100);
        let result =
            permutation_ht_with_seed(&[0.0, 1.0, 2.0], &[10.0, 11.0, 42.0], &config, Some(1))
                .unwrap();
        let svg = render_svg(&result, &SvgOptions::default());
        assert!(svg.contains("class=\"observed\""));
    }

    #[test]
    fn test_summary() {
        let result = constant_groups_result();
        let warnings = vec![InputWarning::NonNumericToken {
            token: "abc".to_string(),
        }];
        let summary = Summary::new(&result, Some(42), warnings);

        assert_eq!(summary.observed_difference, 9.0);
        assert_eq!(summary.simulations, 2_000);
        assert_eq!((summary.n_a, summary.n_b), (3, 3));

        let text = summary.to_text();
        assert!(text.contains("observed difference (mean B - mean A): 9.0000"));
        assert!(text.contains("seed: 42"));
        assert!(text.contains("warnings: 1"));

        let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
        assert_eq!(json["observed_difference"], 9.0);
        assert_eq!(json["relabeling"], "shuffle");
        assert_eq!(json["pvalue_type"], "one-sided-right-tail");
        assert_eq!(json["warnings"][0]["kind"], "non-numeric-token");
        assert_eq!(json["warnings"][0]["token"], "abc");
        assert_eq!(json["contains_text"], false);
        assert!(!text.contains("text found in input"));
    }

    #[test]
    fn test_summary_contains_text() {
        let result = constant_groups_result();
        let summary = Summary::new(&result, None, Vec::new()).with_contains_text(true);

        assert!(summary.to_text().contains("text found in input\n"));
        let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
        assert_eq!(json["contains_text"], true);
    }

    #[test]
    fn test_write_distribution_csv() {
        let result = constant_groups_result();
        let mut out = Vec::new();
        write_distribution_csv(&mut out, &result).unwrap();

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("difference"));
        assert_eq!(lines.count(), 2_000);
    }
}
