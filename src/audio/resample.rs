use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::{Error, Result};

/// Resamples a mono signal, compensating for the sinc filter delay so the
/// output starts aligned with the input and holds `len * to / from` samples.
pub fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>> {
    if from == to || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    let fail = |reason: String| Error::Resample { from, to, reason };

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to as f64 / from as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, samples.len(), 1)
        .map_err(|e| fail(e.to_string()))?;
    let delay = resampler.output_delay();
    let expected = (samples.len() as f64 * ratio).round() as usize;

    let input = vec![samples.to_vec()];
    let mut output = resampler
        .process(&input, None)
        .map_err(|e| fail(e.to_string()))?
        .into_iter()
        .next()
        .unwrap_or_default();

    // Flush the filter tail so the delay trim doesn't shorten the clip.
    let tail = resampler
        .process_partial::<Vec<f32>>(None, None)
        .map_err(|e| fail(e.to_string()))?;
    if let Some(tail) = tail.into_iter().next() {
        output.extend(tail);
    }

    output.drain(..delay.min(output.len()));
    output.truncate(expected);
    Ok(output)
}
