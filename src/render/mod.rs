use image::{GrayImage, Luma};
use log::debug;
use std::path::{Path, PathBuf};

use crate::config::{Policy, RenderConfig};
use crate::error::{Error, Result};
use crate::spectrogram::DecibelMatrix;

/// Physical figure size for a pixel target at a given density.
///
/// `width_in * dpi` and `height_in * dpi` multiply back to the requested
/// pixel counts, so the raster size never depends on the dpi chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FigureSize {
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: f64,
}

impl FigureSize {
    pub fn from_pixels(width: u32, height: u32, dpi: f32) -> Self {
        let dpi = dpi as f64;
        Self {
            width_in: width as f64 / dpi,
            height_in: height as f64 / dpi,
            dpi,
        }
    }

    pub fn raster_dims(&self) -> (u32, u32) {
        (
            (self.width_in * self.dpi).round() as u32,
            (self.height_in * self.dpi).round() as u32,
        )
    }
}

/// Resolved contrast window for one image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContrastLimits {
    pub lo: f32,
    pub hi: f32,
}

impl ContrastLimits {
    pub fn resolve(lo: &Policy, hi: &Policy, db: &DecibelMatrix) -> Self {
        Self {
            lo: lo.resolve(db.values()),
            hi: hi.resolve(db.values()),
        }
    }

    /// Reversed grayscale: `hi` and above is black, `lo` and below white.
    /// An empty window (`hi <= lo`) paints everything white.
    pub fn shade(&self, value: f32) -> u8 {
        if !(self.hi > self.lo) || value.is_nan() {
            return u8::MAX;
        }
        let t = (value.clamp(self.lo, self.hi) - self.lo) / (self.hi - self.lo);
        (255.0 * (1.0 - t)).round() as u8
    }
}

/// Turns decibel matrices into fixed-size grayscale PNGs with no axes.
#[derive(Debug, Clone)]
pub struct ImageRenderer {
    figure: FigureSize,
    clim_lo: Policy,
    clim_hi: Policy,
}

impl ImageRenderer {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            figure: FigureSize::from_pixels(config.img_size.0, config.img_size.1, config.dpi),
            clim_lo: config.clim_lo,
            clim_hi: config.clim_hi,
        }
    }

    pub fn figure(&self) -> FigureSize {
        self.figure
    }

    /// Samples the matrix onto the raster by nearest cell: time runs left
    /// to right, frequency bottom to top.
    pub fn rasterize(&self, db: &DecibelMatrix) -> GrayImage {
        let (width, height) = self.figure.raster_dims();
        let (bins, frames) = db.shape();
        let limits = ContrastLimits::resolve(&self.clim_lo, &self.clim_hi, db);

        if bins == 0 || frames == 0 {
            return GrayImage::from_pixel(width, height, Luma([u8::MAX]));
        }

        let columns: Vec<usize> = (0..width as usize)
            .map(|x| x * frames / width as usize)
            .collect();

        GrayImage::from_fn(width, height, |x, y| {
            let row = bins - 1 - (y as usize * bins / height as usize);
            Luma([limits.shade(db.get(row, columns[x as usize]))])
        })
    }

    /// Rasterizes and writes `<output_dir>/<image_name>.png`, replacing any
    /// existing file.
    pub fn render(&self, db: &DecibelMatrix, output_dir: &Path, image_name: &str) -> Result<PathBuf> {
        let path = output_dir.join(format!("{}.png", image_name));
        let img = self.rasterize(db);
        img.save(&path).map_err(|source| Error::Render {
            path: path.clone(),
            source,
        })?;
        debug!("wrote {}x{} image {}", img.width(), img.height(), path.display());
        Ok(path)
    }
}
