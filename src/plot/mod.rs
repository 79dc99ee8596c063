//! # PCA variance diagnostics
//!
//! Two side-by-side line charts: the variance explained by each principal
//! component and the cumulative explained variance, both in percent. An
//! optional threshold adds a horizontal marker on the cumulative panel and a
//! vertical marker at the first component reaching it.
//!
//! Figures are always rendered to an in-memory SVG document; a `save_path`
//! additionally writes the figure to disk, with the format taken from the
//! file extension.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use plotters::coord::ranged1d::{AsRangedCoord, ValueFormatter};
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::data::PcaInfo;
use crate::error::DimRedError;

/// Pixels per inch used to turn `figsize` into a canvas size.
const DPI: f64 = 100.0;

/// Largest canvas side, in pixels.
const MAX_SIDE_PX: f64 = 10_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct VariancePlotParams {
    /// Number of leading components to show; clamped to what was computed.
    pub n_pcs: usize,
    /// Logarithmic y axis on the per-component panel.
    pub log: bool,
    /// Cumulative explained-variance fraction to mark, in `[0, 1]`.
    pub threshold: Option<f64>,
    /// Width and height in inches.
    pub figsize: (f64, f64),
    pub save_path: Option<PathBuf>,
    pub return_fig: bool,
}

impl Default for VariancePlotParams {
    fn default() -> Self {
        Self {
            n_pcs: 50,
            log: false,
            threshold: None,
            figsize: (10.0, 4.0),
            save_path: None,
            return_fig: false,
        }
    }
}

impl VariancePlotParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_pcs(mut self, n_pcs: usize) -> Self {
        self.n_pcs = n_pcs;
        self
    }

    pub fn log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn figsize(mut self, width: f64, height: f64) -> Self {
        self.figsize = (width, height);
        self
    }

    pub fn save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_path = Some(path.into());
        self
    }

    pub fn return_fig(mut self, return_fig: bool) -> Self {
        self.return_fig = return_fig;
        self
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.n_pcs == 0 {
            return Err(
                DimRedError::InvalidParameter("n_pcs must be at least 1".to_string()).into(),
            );
        }
        if let Some(t) = self.threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(DimRedError::InvalidParameter(format!(
                    "threshold must be a fraction in [0, 1], got {}",
                    t
                ))
                .into());
            }
        }
        let (w, h) = self.figsize;
        let in_range = |inches: f64| (1.0..=MAX_SIDE_PX).contains(&(inches * DPI).round());
        if !(in_range(w) && in_range(h)) {
            return Err(DimRedError::InvalidParameter(format!(
                "figsize must give 1 to {} pixels per side at {} dpi, got ({}, {})",
                MAX_SIDE_PX, DPI, w, h
            ))
            .into());
        }
        if let Some(path) = &self.save_path {
            ImageFormat::from_path(path)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageFormat {
    Svg,
    Bitmap,
}

impl ImageFormat {
    fn from_path(path: &Path) -> anyhow::Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("svg") => Ok(Self::Svg),
            Some("png") | Some("jpg") | Some("jpeg") | Some("bmp") => Ok(Self::Bitmap),
            _ => Err(DimRedError::InvalidParameter(format!(
                "cannot infer an image format from `{}` (use .svg, .png, .jpg or .bmp)",
                path.display()
            ))
            .into()),
        }
    }
}

/// A rendered variance plot together with the data it shows.
#[derive(Debug, Clone)]
pub struct VarianceFigure {
    variance_pct: Vec<f64>,
    cumulative_pct: Vec<f64>,
    log: bool,
    threshold: Option<f64>,
    n_pcs_for_threshold: Option<usize>,
    size: (u32, u32),
    svg: String,
}

impl VarianceFigure {
    /// Number of components on the x axis.
    pub fn n_pcs(&self) -> usize {
        self.variance_pct.len()
    }

    /// Explained variance per component, in percent.
    pub fn variance_pct(&self) -> &[f64] {
        &self.variance_pct
    }

    /// Cumulative explained variance, in percent.
    pub fn cumulative_pct(&self) -> &[f64] {
        &self.cumulative_pct
    }

    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    /// Components needed to reach the threshold, when it is reached.
    pub fn n_pcs_for_threshold(&self) -> Option<usize> {
        self.n_pcs_for_threshold
    }

    /// Canvas size in pixels.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// The figure as an SVG document.
    pub fn svg(&self) -> &str {
        &self.svg
    }

    /// Writes the figure to `path`; `.svg` gives a vector image, `.png`,
    /// `.jpg` and `.bmp` a raster one.
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        match ImageFormat::from_path(path)? {
            ImageFormat::Svg => std::fs::write(path, &self.svg)?,
            ImageFormat::Bitmap => {
                let root = BitMapBackend::new(path, self.size).into_drawing_area();
                self.render(&root, false)?;
                root.present()?;
            }
        }
        info!("Saved PCA variance plot to {}", path.display());
        Ok(())
    }

    fn render_svg(&mut self) -> anyhow::Result<()> {
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, self.size).into_drawing_area();
            self.render(&root, true)?;
            root.present()?;
        }
        self.svg = svg;
        Ok(())
    }

    /// Raster backends have no font engine compiled in, so they are drawn
    /// with `text == false`: same lines and markers, no titles or tick labels.
    fn render<DB>(&self, root: &DrawingArea<DB, Shift>, text: bool) -> anyhow::Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        root.fill(&WHITE)?;
        let panels = root.split_evenly((1, 2));

        let components: Vec<f64> = (1..=self.n_pcs()).map(|pc| pc as f64).collect();
        let max_variance = self.variance_pct.iter().copied().fold(0.0_f64, f64::max);

        let variance_panel = Panel {
            title: "PCA Explained Variance",
            x_desc: "Principal Component",
            y_desc: "Explained Variance Ratio (%)",
            points: components
                .iter()
                .copied()
                .zip(self.variance_pct.iter().copied())
                .collect(),
            n_pcs: self.n_pcs(),
            threshold_pct: None,
            threshold_pc: None,
        };

        if self.log {
            // log axes cannot show zero
            let positive: Vec<(f64, f64)> = variance_panel
                .points
                .iter()
                .copied()
                .filter(|&(_, y)| y > 0.0)
                .collect();
            let min_positive = positive
                .iter()
                .map(|&(_, y)| y)
                .fold(f64::INFINITY, f64::min);
            let (lo, hi) = if positive.is_empty() {
                (1e-3, 1.0)
            } else {
                (min_positive * 0.5, max_variance * 2.0)
            };
            let panel = Panel {
                points: positive,
                ..variance_panel
            };
            panel.draw(&panels[0], (lo..hi).log_scale(), text)?;
        } else {
            let hi = if max_variance > 0.0 {
                max_variance * 1.1
            } else {
                1.0
            };
            variance_panel.draw(&panels[0], 0.0..hi, text)?;
        }

        let cumulative_panel = Panel {
            title: "PCA Cumulative Explained Variance",
            x_desc: "Number of Principal Components",
            y_desc: "Cumulative Explained Variance (%)",
            points: components
                .iter()
                .copied()
                .zip(self.cumulative_pct.iter().copied())
                .collect(),
            n_pcs: self.n_pcs(),
            threshold_pct: self.threshold.map(|t| t * 100.0),
            threshold_pc: self.n_pcs_for_threshold,
        };
        cumulative_panel.draw(&panels[1], 0.0..105.0, text)?;

        Ok(())
    }
}

struct Panel {
    title: &'static str,
    x_desc: &'static str,
    y_desc: &'static str,
    points: Vec<(f64, f64)>,
    n_pcs: usize,
    threshold_pct: Option<f64>,
    threshold_pc: Option<usize>,
}

impl Panel {
    fn draw<DB, Y>(
        &self,
        area: &DrawingArea<DB, Shift>,
        y_spec: Y,
        text: bool,
    ) -> anyhow::Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
        Y: AsRangedCoord<Value = f64>,
        Y::CoordDescType: ValueFormatter<f64>,
    {
        let x_max = self.n_pcs as f64 + 0.5;
        let mut builder = ChartBuilder::on(area);
        builder
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(55);
        if text {
            builder.caption(self.title, ("sans-serif", 18));
        }
        let mut chart = builder.build_cartesian_2d(0.5..x_max, y_spec)?;

        if text {
            // one tick every 5 components
            let n_ticks = self.n_pcs.div_ceil(5) + 1;
            chart
                .configure_mesh()
                .x_desc(self.x_desc)
                .y_desc(self.y_desc)
                .x_labels(n_ticks)
                .x_label_formatter(&|x| format!("{:.0}", x))
                .draw()?;
        } else {
            chart.configure_mesh().x_labels(0).y_labels(0).draw()?;
        }

        chart.draw_series(LineSeries::new(self.points.iter().copied(), &BLUE))?;
        chart.draw_series(
            self.points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 3, BLUE.filled())),
        )?;

        if let Some(pct) = self.threshold_pct {
            chart
                .draw_series(LineSeries::new(vec![(0.5, pct), (x_max, pct)], &RED))?
                .label(format!("{:.0}% threshold", pct))
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

            if let Some(pc) = self.threshold_pc {
                chart
                    .draw_series(LineSeries::new(
                        vec![(pc as f64, 0.0), (pc as f64, pct)],
                        &RED,
                    ))?
                    .label(format!("{} PCs", pc))
                    .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));
            }
        }

        if text && self.threshold_pct.is_some() {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::LowerRight)
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;
        }

        Ok(())
    }
}

/// Builds (and optionally saves) the variance plot for `info`.
///
/// Returns the figure when `params.return_fig` is set.
pub fn plot_variance(
    info: &PcaInfo,
    params: &VariancePlotParams,
) -> anyhow::Result<Option<VarianceFigure>> {
    params.validate()?;

    let n_pcs = params.n_pcs.min(info.n_components());
    if n_pcs < params.n_pcs {
        debug!(
            "Requested {} PCs but only {} were computed",
            params.n_pcs, n_pcs
        );
    }

    let cumulative: Vec<f64> = info
        .cumulative_variance_ratio()
        .iter()
        .take(n_pcs)
        .copied()
        .collect();
    let n_pcs_for_threshold = params.threshold.and_then(|t| {
        let needed = cumulative.iter().position(|&c| c >= t).map(|i| i + 1);
        match needed {
            Some(n) => info!(
                "{} PCs explain {:.1}% of the variance (threshold {:.1}%)",
                n,
                cumulative[n - 1] * 100.0,
                t * 100.0
            ),
            None => warn!(
                "The {} plotted PCs explain {:.1}% of the variance, below the {:.1}% threshold",
                n_pcs,
                cumulative.last().copied().unwrap_or(0.0) * 100.0,
                t * 100.0
            ),
        }
        needed
    });

    let (w, h) = params.figsize;
    let mut figure = VarianceFigure {
        variance_pct: info
            .variance_ratio
            .iter()
            .take(n_pcs)
            .map(|r| r * 100.0)
            .collect(),
        cumulative_pct: cumulative.iter().map(|c| c * 100.0).collect(),
        log: params.log,
        threshold: params.threshold,
        n_pcs_for_threshold,
        size: ((w * DPI).round() as u32, (h * DPI).round() as u32),
        svg: String::new(),
    };
    figure.render_svg()?;

    match &params.save_path {
        Some(path) => figure.save(path)?,
        None => debug!("No save path given; PCA variance plot kept in memory"),
    }

    Ok(params.return_fig.then_some(figure))
}
