use log::debug;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::audio::AudioData;
use crate::config::{Policy, RenderConfig};
use crate::error::{Error, Result};

/// Magnitudes below this are treated as this when taking logarithms.
pub const AMIN: f32 = 1e-5;

/// Half-open range of STFT bins kept after cropping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyWindow {
    pub min_bin: usize,
    pub max_bin: usize,
}

impl FrequencyWindow {
    /// Maps `[min_freq, max_freq)` onto bin indices with
    /// `bin = floor(freq / f_step)`. The upper bound is clamped to the
    /// `n_fft / 2 + 1` bins the transform produces.
    pub fn new(sampling_rate: u32, n_fft: usize, min_freq: f32, max_freq: f32) -> Result<Self> {
        if !(min_freq.is_finite() && max_freq.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "frequency bounds must be finite, got [{}, {})",
                min_freq, max_freq
            )));
        }
        let n_bins = n_fft / 2 + 1;
        let f_step = sampling_rate as f64 / n_fft as f64;
        let min_bin = (min_freq as f64 / f_step).floor() as i64;
        let max_bin = (max_freq as f64 / f_step).floor() as i64;

        let invalid = Error::InvalidRange {
            min_bin,
            max_bin,
            n_bins,
        };
        if min_bin < 0 || max_bin < 0 || min_bin >= max_bin {
            return Err(invalid);
        }
        let max_bin = (max_bin as usize).min(n_bins);
        let min_bin = min_bin as usize;
        if min_bin >= max_bin {
            return Err(invalid);
        }
        Ok(Self { min_bin, max_bin })
    }

    pub fn len(&self) -> usize {
        self.max_bin - self.min_bin
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Complex STFT output laid out bin-major: `data[bin * frames + frame]`.
#[derive(Debug, Clone)]
pub struct SpectralMatrix {
    bins: usize,
    frames: usize,
    first_bin: usize,
    f_step: f64,
    hop_secs: f64,
    data: Vec<Complex<f32>>,
}

/// Decibel-scaled magnitudes with the same layout as [`SpectralMatrix`].
#[derive(Debug, Clone)]
pub struct DecibelMatrix {
    bins: usize,
    frames: usize,
    first_bin: usize,
    f_step: f64,
    hop_secs: f64,
    data: Vec<f32>,
}

/// Periodic Hann window.
fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos()))
        .collect()
}

/// Short-time Fourier transform with frames centred on `t * hop_length`
/// (signal zero-padded by `n_fft / 2` on both sides). Produces
/// `n_fft / 2 + 1` bins and `1 + len / hop_length` frames.
pub fn stft(audio: &AudioData, n_fft: usize, hop_length: usize) -> SpectralMatrix {
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n_fft);
    let mut scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

    let samples = &audio.samples;
    let bins = n_fft / 2 + 1;
    let frames = 1 + samples.len() / hop_length;
    let pad = n_fft / 2;
    let window = hann_window(n_fft);

    let mut data = vec![Complex::new(0.0, 0.0); bins * frames];
    let mut frame = vec![Complex::new(0.0, 0.0); n_fft];

    for t in 0..frames {
        let start = t * hop_length;
        for (i, (slot, &w)) in frame.iter_mut().zip(window.iter()).enumerate() {
            let s = (start + i)
                .checked_sub(pad)
                .and_then(|k| samples.get(k))
                .copied()
                .unwrap_or(0.0);
            *slot = Complex::new(s * w, 0.0);
        }

        fft.process_with_scratch(&mut frame, &mut scratch);

        for (b, value) in frame[..bins].iter().enumerate() {
            data[b * frames + t] = *value;
        }
    }

    SpectralMatrix {
        bins,
        frames,
        first_bin: 0,
        f_step: audio.sample_rate as f64 / n_fft as f64,
        hop_secs: hop_length as f64 / audio.sample_rate as f64,
        data,
    }
}

impl SpectralMatrix {
    /// `(bins, frames)`
    pub fn shape(&self) -> (usize, usize) {
        (self.bins, self.frames)
    }

    pub fn get(&self, bin: usize, frame: usize) -> Complex<f32> {
        self.data[bin * self.frames + frame]
    }

    /// Keeps rows `window.min_bin..window.max_bin`, indexed relative to the
    /// full transform.
    pub fn crop(&self, window: FrequencyWindow) -> Result<SpectralMatrix> {
        let lo = window.min_bin.checked_sub(self.first_bin);
        let hi = window.max_bin.checked_sub(self.first_bin);
        let (lo, hi) = match (lo, hi) {
            (Some(lo), Some(hi)) if lo < hi && hi <= self.bins => (lo, hi),
            _ => {
                return Err(Error::InvalidRange {
                    min_bin: window.min_bin as i64,
                    max_bin: window.max_bin as i64,
                    n_bins: self.bins,
                })
            }
        };

        Ok(SpectralMatrix {
            bins: hi - lo,
            frames: self.frames,
            first_bin: self.first_bin + lo,
            f_step: self.f_step,
            hop_secs: self.hop_secs,
            data: self.data[lo * self.frames..hi * self.frames].to_vec(),
        })
    }

    pub fn magnitudes(&self) -> Vec<f32> {
        self.data.iter().map(|c| c.norm()).collect()
    }

    /// `20 * log10(|Y| / ref)`, with `ref` resolved once over the magnitudes
    /// and, when `top_db` is set, everything below `max - top_db` raised to
    /// that floor.
    pub fn to_decibels(&self, reference: &Policy, top_db: Option<f32>) -> DecibelMatrix {
        let magnitudes = self.magnitudes();
        let ref_value = reference.resolve(&magnitudes);
        let ref_db = 20.0 * ref_value.abs().max(AMIN).log10();

        let mut data: Vec<f32> = magnitudes
            .iter()
            .map(|&m| 20.0 * m.max(AMIN).log10() - ref_db)
            .collect();

        if let Some(top_db) = top_db {
            let peak = data.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let floor = peak - top_db;
            data.iter_mut().for_each(|v| *v = v.max(floor));
        }

        DecibelMatrix {
            bins: self.bins,
            frames: self.frames,
            first_bin: self.first_bin,
            f_step: self.f_step,
            hop_secs: self.hop_secs,
            data,
        }
    }
}

impl DecibelMatrix {
    /// Builds a matrix from bin-major values, bin 0 first.
    pub fn from_rows(rows: &[Vec<f32>]) -> Self {
        let frames = rows.first().map_or(0, Vec::len);
        Self {
            bins: rows.len(),
            frames,
            first_bin: 0,
            f_step: 1.0,
            hop_secs: 1.0,
            data: rows.iter().flat_map(|r| r.iter().copied().take(frames)).collect(),
        }
    }

    /// `(bins, frames)`
    pub fn shape(&self) -> (usize, usize) {
        (self.bins, self.frames)
    }

    pub fn get(&self, bin: usize, frame: usize) -> f32 {
        self.data[bin * self.frames + frame]
    }

    pub fn values(&self) -> &[f32] {
        &self.data
    }

    /// Absolute index, in the uncropped transform, of row 0.
    pub fn first_bin(&self) -> usize {
        self.first_bin
    }

    /// Centre frequency of every row, in Hz.
    pub fn frequencies(&self) -> Vec<f32> {
        (0..self.bins)
            .map(|r| ((self.first_bin + r) as f64 * self.f_step) as f32)
            .collect()
    }

    /// Centre time of every frame, in seconds.
    pub fn times(&self) -> Vec<f32> {
        (0..self.frames).map(|t| (t as f64 * self.hop_secs) as f32).collect()
    }

    /// Absolute bin index of the row with the highest mean level.
    pub fn peak_bin(&self) -> Option<usize> {
        if self.frames == 0 {
            return None;
        }
        self.data
            .chunks(self.frames)
            .map(|row| row.iter().sum::<f32>())
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(r, _)| self.first_bin + r)
    }

    pub fn peak_frequency(&self) -> Option<f32> {
        self.peak_bin().map(|b| (b as f64 * self.f_step) as f32)
    }
}

/// Full per-clip transform: STFT, crop to the configured band, decibels.
pub fn compute_spectrogram(audio: &AudioData, config: &RenderConfig) -> Result<DecibelMatrix> {
    let window = FrequencyWindow::new(
        audio.sample_rate,
        config.n_fft,
        config.min_freq,
        config.max_freq,
    )?;
    let spectrum = stft(audio, config.n_fft, config.hop_length).crop(window)?;
    debug!(
        "spectrogram {:?} (bins {}..{})",
        spectrum.shape(),
        window.min_bin,
        window.max_bin
    );
    Ok(spectrum.to_decibels(&config.reference, config.top_db))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Reduction;
    use crate::test_utils::sine;

    fn clip(samples: Vec<f32>, sample_rate: u32) -> AudioData {
        AudioData {
            samples,
            sample_rate,
        }
    }

    #[test]
    fn window_bins_follow_floor_of_frequency_over_step() {
        // f_step = 48000 / 512 = 93.75
        let w = FrequencyWindow::new(48_000, 512, 3_000.0, 22_000.0).unwrap();
        assert_eq!(w, FrequencyWindow { min_bin: 32, max_bin: 234 });
        assert_eq!(w.len(), 202);
    }

    #[test]
    fn degenerate_window_is_rejected() {
        // Both bounds land in bin 32.
        assert!(matches!(
            FrequencyWindow::new(48_000, 512, 3_000.0, 3_050.0),
            Err(Error::InvalidRange { min_bin: 32, max_bin: 32, .. })
        ));
        assert!(FrequencyWindow::new(48_000, 512, 5_000.0, 3_000.0).is_err());
        // Adjacent bins leave exactly one row.
        let w = FrequencyWindow::new(48_000, 512, 3_000.0, 3_100.0).unwrap();
        assert_eq!(w.len(), 1);
    }

    #[test]
    fn invalid_iff_min_bin_not_below_max_bin() {
        for &(sr, n_fft) in &[(16_000u32, 256usize), (22_050, 1024), (44_100, 2048), (48_000, 512)] {
            let f_step = sr as f64 / n_fft as f64;
            for &(lo, hi) in &[(0.0f32, 100.0f32), (200.0, 210.0), (1_000.0, 4_000.0), (4_000.0, 1_000.0), (500.0, 500.0)] {
                let min_bin = (lo as f64 / f_step).floor() as i64;
                let max_bin = (hi as f64 / f_step).floor() as i64;
                let result = FrequencyWindow::new(sr, n_fft, lo, hi);
                assert_eq!(result.is_err(), min_bin >= max_bin, "sr={sr} n_fft={n_fft} [{lo}, {hi})");
            }
        }
    }

    #[test]
    fn nan_bounds_are_rejected() {
        assert!(matches!(
            FrequencyWindow::new(48_000, 512, f32::NAN, 22_000.0),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn constructed_windows_are_never_empty() {
        let w = FrequencyWindow::new(48_000, 512, 0.0, 100.0).unwrap();
        assert_eq!(w.len(), 1);
        assert!(!w.is_empty());
        assert!(FrequencyWindow { min_bin: 4, max_bin: 4 }.is_empty());
    }

    #[test]
    fn upper_bound_is_clamped_to_nyquist() {
        let w = FrequencyWindow::new(16_000, 256, 1_000.0, 20_000.0).unwrap();
        assert_eq!(w.max_bin, 129);
    }

    #[test]
    fn negative_frequency_is_rejected() {
        assert!(FrequencyWindow::new(16_000, 256, -500.0, 1_000.0).is_err());
    }

    #[test]
    fn stft_shape_follows_length_and_hop() {
        let audio = clip(vec![0.0; 4_800], 48_000);
        let spec = stft(&audio, 512, 128);
        assert_eq!(spec.shape(), (257, 1 + 4_800 / 128));
    }

    #[test]
    fn stft_handles_clips_shorter_than_window() {
        let audio = clip(vec![0.5; 100], 48_000);
        let spec = stft(&audio, 512, 128);
        assert_eq!(spec.shape(), (257, 1));
        assert!(spec.get(0, 0).norm() > 0.0);
    }

    #[test]
    fn tone_peaks_at_its_bin() {
        let audio = clip(sine(1_000.0, 16_000, 0.5), 16_000);
        let spec = stft(&audio, 512, 128);
        let db = spec.to_decibels(&Policy::Reduction(Reduction::Max), None);
        // f_step = 31.25 Hz -> 1000 Hz sits exactly on bin 32.
        assert_eq!(db.peak_bin(), Some(32));
    }

    #[test]
    fn crop_keeps_absolute_bin_numbering() {
        let audio = clip(sine(1_000.0, 16_000, 0.5), 16_000);
        let window = FrequencyWindow::new(16_000, 512, 500.0, 2_000.0).unwrap();
        let cropped = stft(&audio, 512, 128).crop(window).unwrap();
        assert_eq!(cropped.shape().0, window.len());

        let db = cropped.to_decibels(&Policy::Reduction(Reduction::Max), Some(80.0));
        assert_eq!(db.first_bin(), 16);
        assert_eq!(db.peak_bin(), Some(32));
        assert_eq!(db.frequencies()[0], 500.0);
    }

    #[test]
    fn frame_times_step_by_hop() {
        let audio = clip(vec![0.0; 1_600], 16_000);
        let db = stft(&audio, 256, 160).to_decibels(&Policy::Fixed(1.0), None);
        let times = db.times();
        assert_eq!(times.len(), 11);
        assert_eq!(times[0], 0.0);
        assert!((times[1] - 0.01).abs() < 1e-6);
        assert!((times[10] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn max_reference_puts_loudest_cell_at_zero_db() {
        let audio = clip(sine(2_000.0, 16_000, 0.25), 16_000);
        let db = stft(&audio, 256, 64).to_decibels(&Policy::Reduction(Reduction::Max), None);
        let peak = db.values().iter().copied().fold(f32::NEG_INFINITY, f32::max);
        assert!(peak.abs() < 1e-4);
    }

    #[test]
    fn top_db_floors_dynamic_range() {
        let audio = clip(sine(2_000.0, 16_000, 0.25), 16_000);
        let db = stft(&audio, 256, 64).to_decibels(&Policy::Reduction(Reduction::Max), Some(60.0));
        let min = db.values().iter().copied().fold(f32::INFINITY, f32::min);
        let max = db.values().iter().copied().fold(f32::NEG_INFINITY, f32::max);
        assert!((max - min) <= 60.0 + 1e-3);
        assert!((min - (max - 60.0)).abs() < 1e-3);
    }

    #[test]
    fn fixed_reference_offsets_levels() {
        let audio = clip(sine(2_000.0, 16_000, 0.25), 16_000);
        let spec = stft(&audio, 256, 64);
        let unit = spec.to_decibels(&Policy::Fixed(1.0), None);
        let ten = spec.to_decibels(&Policy::Fixed(10.0), None);
        let (bin, frame) = (32, 10);
        assert!((unit.get(bin, frame) - ten.get(bin, frame) - 20.0).abs() < 1e-3);
    }

    #[test]
    fn compute_spectrogram_rejects_degenerate_band() {
        let audio = clip(sine(2_000.0, 48_000, 0.1), 48_000);
        let config = RenderConfig {
            min_freq: 3_000.0,
            max_freq: 3_000.0,
            ..RenderConfig::default()
        };
        assert!(matches!(
            compute_spectrogram(&audio, &config),
            Err(Error::InvalidRange { .. })
        ));
    }
}
