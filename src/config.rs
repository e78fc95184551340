use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::spectrogram::FrequencyWindow;

/// A reduction evaluated over every finite value of a matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reduction {
    Max,
    Min,
    Mean,
    Median,
    /// Linear-interpolated percentile, `0.0..=100.0`.
    Percentile(f32),
}

impl Reduction {
    /// Applies the reduction. Non-finite values are ignored; an empty input
    /// resolves to `0.0`.
    pub fn apply(&self, values: &[f32]) -> f32 {
        let finite = values.iter().copied().filter(|v| v.is_finite());
        let value = match self {
            Reduction::Max => finite.fold(None, |acc: Option<f32>, v| Some(acc.map_or(v, |a| a.max(v)))),
            Reduction::Min => finite.fold(None, |acc: Option<f32>, v| Some(acc.map_or(v, |a| a.min(v)))),
            Reduction::Mean => {
                let (sum, count) = finite.fold((0.0f64, 0usize), |(s, n), v| (s + v as f64, n + 1));
                (count > 0).then(|| (sum / count as f64) as f32)
            }
            Reduction::Median => percentile(finite.collect(), 50.0),
            Reduction::Percentile(p) => percentile(finite.collect(), *p),
        };
        value.unwrap_or(0.0)
    }
}

fn percentile(mut values: Vec<f32>, p: f32) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));

    let rank = (p.clamp(0.0, 100.0) as f64 / 100.0) * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = (rank - lo as f64) as f32;
    Some(values[lo] + (values[hi] - values[lo]) * frac)
}

impl FromStr for Reduction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "max" => Ok(Reduction::Max),
            "min" => Ok(Reduction::Min),
            "mean" => Ok(Reduction::Mean),
            "median" => Ok(Reduction::Median),
            other => other
                .strip_prefix('p')
                .and_then(|p| p.parse::<f32>().ok())
                .filter(|p| (0.0..=100.0).contains(p))
                .map(Reduction::Percentile)
                .ok_or_else(|| format!("Invalid reduction '{}'. Use: max, min, mean, median, p<0-100>", s)),
        }
    }
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reduction::Max => write!(f, "max"),
            Reduction::Min => write!(f, "min"),
            Reduction::Mean => write!(f, "mean"),
            Reduction::Median => write!(f, "median"),
            Reduction::Percentile(p) => write!(f, "p{}", p),
        }
    }
}

/// A value that is either fixed up front or computed from the matrix it
/// applies to. Resolved once per clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Policy {
    Fixed(f32),
    Reduction(Reduction),
}

impl Policy {
    pub fn resolve(&self, values: &[f32]) -> f32 {
        match self {
            Policy::Fixed(v) => *v,
            Policy::Reduction(r) => r.apply(values),
        }
    }
}

impl FromStr for Policy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Ok(v) = s.trim().parse::<f32>() {
            return if v.is_finite() {
                Ok(Policy::Fixed(v))
            } else {
                Err(format!("Invalid constant '{}'", s))
            };
        }
        s.trim().parse::<Reduction>().map(Policy::Reduction)
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Fixed(v) => write!(f, "{}", v),
            Policy::Reduction(r) => write!(f, "{}", r),
        }
    }
}

/// Settings shared by every clip of a render run.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// Rate audio is resampled to before the transform.
    pub sampling_rate: u32,
    pub n_fft: usize,
    pub hop_length: usize,
    pub dpi: f32,
    pub min_freq: f32,
    pub max_freq: f32,
    /// Output raster size in pixels, `(width, height)`.
    pub img_size: (u32, u32),
    /// Decibel reference, resolved over the cropped magnitudes.
    pub reference: Policy,
    /// Dynamic range kept below the loudest cell; `None` disables the floor.
    pub top_db: Option<f32>,
    pub clim_lo: Policy,
    pub clim_hi: Policy,
}

impl Default for RenderConfig {
    fn default() -> Self {
        let n_fft = 512;
        Self {
            sampling_rate: 48_000,
            n_fft,
            hop_length: n_fft / 4,
            dpi: 100.0,
            min_freq: 3_000.0,
            max_freq: 22_000.0,
            img_size: (256, 256),
            reference: Policy::Reduction(Reduction::Max),
            top_db: Some(80.0),
            clim_lo: Policy::Reduction(Reduction::Min),
            clim_hi: Policy::Reduction(Reduction::Max),
        }
    }
}

impl RenderConfig {
    /// Width of one frequency bin in Hz.
    pub fn f_step(&self) -> f64 {
        self.sampling_rate as f64 / self.n_fft as f64
    }

    pub fn validate(&self) -> Result<()> {
        if self.sampling_rate == 0 {
            return Err(Error::InvalidConfig("sampling_rate must be positive".into()));
        }
        if self.n_fft == 0 {
            return Err(Error::InvalidConfig("n_fft must be positive".into()));
        }
        if self.hop_length == 0 {
            return Err(Error::InvalidConfig("hop_length must be positive".into()));
        }
        if !(self.dpi.is_finite() && self.dpi > 0.0) {
            return Err(Error::InvalidConfig(format!("dpi must be positive, got {}", self.dpi)));
        }
        if self.img_size.0 == 0 || self.img_size.1 == 0 {
            return Err(Error::InvalidConfig(format!(
                "img_size must be non-zero, got {}x{}",
                self.img_size.0, self.img_size.1
            )));
        }
        if let Some(top_db) = self.top_db {
            if !(top_db.is_finite() && top_db >= 0.0) {
                return Err(Error::InvalidConfig(format!("top_db must be non-negative, got {}", top_db)));
            }
        }
        FrequencyWindow::new(self.sampling_rate, self.n_fft, self.min_freq, self.max_freq)?;
        Ok(())
    }
}

/// Settings for moving a held-out share of each class into the test tree.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitConfig {
    /// Fraction of each class kept for training.
    pub train_ratio: f64,
    /// Fixed RNG seed; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_ratio: 0.8,
            seed: None,
        }
    }
}

impl SplitConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.train_ratio) {
            return Err(Error::InvalidConfig(format!(
                "train_ratio must be within [0, 1], got {}",
                self.train_ratio
            )));
        }
        Ok(())
    }
}
