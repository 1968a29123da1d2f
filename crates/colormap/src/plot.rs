//! Side-by-side comparison plots written as PNG.
//!
//! Panels share one color scale; a vertical color bar on the right shows
//! the scale from `min` (bottom) to `max` (top). Labels are kept on the
//! panels for the caller to report, no text is drawn.

use std::path::Path;

use image::{Rgba, RgbaImage};
use tracing::debug;
use urbanlens_core::raster::{MultiBandRaster, Raster, RasterElement};

use crate::error::PlotError;
use crate::render::{raster_to_rgba, ColormapParams, NEUTRAL_NODATA};

const MARGIN: u32 = 16;
const BAR_WIDTH: u32 = 20;
const TICK_LENGTH: u32 = 6;
const TICKS: u32 = 5;
/// Auto-scaling aims for panels at least this tall
const TARGET_HEIGHT: u32 = 400;
const BACKGROUND: [u8; 4] = [255, 255, 255, 255];
const INK: [u8; 4] = [30, 30, 30, 255];

/// One rendered image in a comparison
#[derive(Debug, Clone)]
pub struct Panel {
    label: String,
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl Panel {
    /// Render a scalar raster with `params`.
    pub fn from_raster<T: RasterElement>(
        label: impl Into<String>,
        raster: &Raster<T>,
        params: &ColormapParams,
    ) -> Self {
        Self {
            label: label.into(),
            width: raster.cols() as u32,
            height: raster.rows() as u32,
            rgba: raster_to_rgba(raster, params),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * self.width + x) * 4) as usize;
        [self.rgba[i], self.rgba[i + 1], self.rgba[i + 2], self.rgba[i + 3]]
    }
}

/// True-colour panel from three 8-bit bands in R, G, B order.
///
/// Pixels where all three bands are 0 (outside the study polygon) are
/// drawn in a neutral grey.
pub fn rgb_composite(
    label: impl Into<String>,
    bands: &MultiBandRaster<u8>,
) -> Result<Panel, PlotError> {
    if bands.len() != 3 {
        return Err(PlotError::BandCount(bands.len()));
    }
    let (rows, cols) = bands.shape();
    let mut rgba = Vec::with_capacity(rows * cols * 4);
    for px in bands.interleaved().chunks_exact(3) {
        if px.iter().all(|&v| v == 0) {
            rgba.extend_from_slice(&NEUTRAL_NODATA);
        } else {
            rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
        }
    }
    Ok(Panel {
        label: label.into(),
        width: cols as u32,
        height: rows as u32,
        rgba,
    })
}

/// N panels side by side with an optional shared color bar.
#[derive(Debug, Clone, Default)]
pub struct ComparisonPlot {
    panels: Vec<Panel>,
    colorbar: Option<ColormapParams>,
    /// Integer upscaling factor, 0 = automatic
    scale: u32,
}

impl ComparisonPlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scalar comparison: every raster rendered with the same `params`,
    /// nodata in neutral grey, color bar on the right.
    pub fn scalar<'a, I>(params: &ColormapParams, rasters: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a Raster<f64>)>,
    {
        let params = params.clone().with_nodata_color(NEUTRAL_NODATA);
        let panels = rasters
            .into_iter()
            .map(|(label, r)| Panel::from_raster(label, r, &params))
            .collect();
        Self {
            panels,
            colorbar: Some(params),
            scale: 0,
        }
    }

    pub fn with_panel(mut self, panel: Panel) -> Self {
        self.panels.push(panel);
        self
    }

    pub fn with_colorbar(mut self, params: ColormapParams) -> Self {
        self.colorbar = Some(params);
        self
    }

    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    fn effective_scale(&self, max_h: u32) -> u32 {
        if self.scale > 0 {
            self.scale
        } else {
            (TARGET_HEIGHT / max_h.max(1)).max(1)
        }
    }

    /// Compose the figure.
    pub fn render(&self) -> Result<RgbaImage, PlotError> {
        if self.panels.is_empty() {
            return Err(PlotError::Empty);
        }
        if let Some(p) = self.panels.iter().find(|p| p.width == 0 || p.height == 0) {
            return Err(PlotError::EmptyPanel(p.label.clone()));
        }

        let max_h = self.panels.iter().map(|p| p.height).max().unwrap_or(1);
        let s = self.effective_scale(max_h);
        let plot_h = max_h * s;

        let panels_w: u32 = self.panels.iter().map(|p| p.width * s + MARGIN).sum();
        let bar_w = if self.colorbar.is_some() {
            BAR_WIDTH + TICK_LENGTH + MARGIN
        } else {
            0
        };
        let width = MARGIN + panels_w + bar_w;
        let height = plot_h + 2 * MARGIN;
        debug!(width, height, scale = s, panels = self.panels.len(), "rendering comparison plot");

        let mut img = RgbaImage::from_pixel(width, height, Rgba(BACKGROUND));

        let mut x0 = MARGIN;
        for panel in &self.panels {
            for y in 0..panel.height * s {
                for x in 0..panel.width * s {
                    let px = panel.pixel(x / s, y / s);
                    if px[3] > 0 {
                        img.put_pixel(x0 + x, MARGIN + y, Rgba(px));
                    }
                }
            }
            x0 += panel.width * s + MARGIN;
        }

        if let Some(params) = &self.colorbar {
            draw_colorbar(&mut img, params, x0, MARGIN, plot_h);
        }

        Ok(img)
    }

    /// Render and write a PNG.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), PlotError> {
        let img = self.render()?;
        img.save(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "plot written");
        Ok(())
    }
}

fn draw_colorbar(img: &mut RgbaImage, params: &ColormapParams, x0: u32, y0: u32, h: u32) {
    let denom = (h.max(2) - 1) as f64;
    for y in 0..h {
        // top of the bar is max
        let t = 1.0 - y as f64 / denom;
        let c = params.scheme.color_at(t).to_rgba(255);
        for x in 0..BAR_WIDTH {
            img.put_pixel(x0 + x, y0 + y, Rgba(c));
        }
    }

    for i in 0..TICKS {
        let y = y0 + ((h - 1) * i) / (TICKS - 1);
        for x in 0..TICK_LENGTH {
            img.put_pixel(x0 + BAR_WIDTH + x, y, Rgba(INK));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::ColorScheme;

    fn ndvi_like(v: f64) -> Raster<f64> {
        let mut r = Raster::filled(10, 8, v);
        r.set(0, 0, f64::NAN).unwrap();
        r
    }

    #[test]
    fn scalar_plot_layout() {
        let params = ColormapParams::with_range(ColorScheme::RdYlGn, -1.0, 1.0);
        let a = ndvi_like(0.2);
        let b = ndvi_like(0.6);
        let plot =
            ComparisonPlot::scalar(&params, [("Jan 2020", &a), ("Jan 2025", &b)]).with_scale(2);

        let img = plot.render().unwrap();
        let expected_w = MARGIN + 2 * (8 * 2 + MARGIN) + BAR_WIDTH + TICK_LENGTH + MARGIN;
        assert_eq!(img.width(), expected_w);
        assert_eq!(img.height(), 10 * 2 + 2 * MARGIN);
        assert_eq!(plot.panels()[1].label(), "Jan 2025");

        // NaN corner drawn as neutral grey
        assert_eq!(img.get_pixel(MARGIN, MARGIN).0, NEUTRAL_NODATA);
        let expected = params.color_of(0.2);
        assert_eq!(img.get_pixel(MARGIN + 3, MARGIN + 3).0, expected);

        // Bar: top is max color, bottom is min color
        let bar_x = MARGIN + 2 * (8 * 2 + MARGIN);
        assert_eq!(img.get_pixel(bar_x, MARGIN).0, params.color_of(1.0));
        assert_eq!(img.get_pixel(bar_x, MARGIN + 19).0, params.color_of(-1.0));
    }

    #[test]
    fn auto_scale_enlarges_small_areas() {
        let params = ColormapParams::with_range(ColorScheme::Inferno, 18.0, 22.0);
        let a = Raster::filled(50, 40, 20.0);
        let img = ComparisonPlot::scalar(&params, [("a", &a)]).render().unwrap();
        assert_eq!(img.height(), 400 + 2 * MARGIN);
    }

    #[test]
    fn rgb_composite_masks_outside() {
        let r = Raster::from_vec(vec![0u8, 200], 1, 2).unwrap();
        let g = Raster::from_vec(vec![0u8, 100], 1, 2).unwrap();
        let b = Raster::from_vec(vec![0u8, 50], 1, 2).unwrap();
        let stack = MultiBandRaster::new(vec![r, g, b]).unwrap();

        let panel = rgb_composite("Dec 2023", &stack).unwrap();
        assert_eq!(panel.dimensions(), (2, 1));
        assert_eq!(panel.pixel(0, 0), NEUTRAL_NODATA);
        assert_eq!(panel.pixel(1, 0), [200, 100, 50, 255]);

        let two =
            MultiBandRaster::new(vec![Raster::filled(1, 1, 1u8), Raster::filled(1, 1, 1u8)])
                .unwrap();
        assert!(matches!(rgb_composite("x", &two), Err(PlotError::BandCount(2))));
    }

    #[test]
    fn empty_plot_is_error() {
        assert!(matches!(ComparisonPlot::new().render(), Err(PlotError::Empty)));
    }

    #[test]
    fn save_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.png");
        let stack = MultiBandRaster::new(vec![
            Raster::filled(4, 4, 120u8),
            Raster::filled(4, 4, 80u8),
            Raster::filled(4, 4, 40u8),
        ])
        .unwrap();
        let plot = ComparisonPlot::new()
            .with_panel(rgb_composite("before", &stack).unwrap())
            .with_panel(rgb_composite("after", &stack).unwrap());
        plot.save(&path).unwrap();

        let back = image::open(&path).unwrap().to_rgba8();
        assert_eq!(back.height(), 4 * 100 + 2 * MARGIN);
    }
}
