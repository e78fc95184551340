use log::{debug, warn};
use std::fs::File;
use std::io;
use std::path::Path;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::conv::FromSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;

use crate::error::{Error, Result};

mod resample;

pub use resample::resample;

/// A decoded mono clip.
#[derive(Debug, Clone)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioData {
    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Decodes `path` and resamples it to `target_rate`.
pub fn load_audio<P: AsRef<Path>>(path: P, target_rate: u32) -> Result<AudioData> {
    let decoded = decode_audio(path)?;
    if decoded.sample_rate == target_rate {
        return Ok(decoded);
    }

    debug!("resampling {} Hz -> {} Hz", decoded.sample_rate, target_rate);
    let samples = resample(&decoded.samples, decoded.sample_rate, target_rate)?;
    Ok(AudioData {
        samples,
        sample_rate: target_rate,
    })
}

/// Decodes the default track of `path` at its native rate, averaging all
/// channels down to mono.
pub fn decode_audio<P: AsRef<Path>>(path: P) -> Result<AudioData> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::decode(path, e))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    let format_opts = FormatOptions::default();
    let metadata_opts = MetadataOptions::default();
    let decoder_opts = DecoderOptions::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &metadata_opts)
        .map_err(|e| Error::decode(path, e))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| Error::decode(path, "no audio track"))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| Error::decode(path, "unknown sample rate"))?;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &decoder_opts)
        .map_err(|e| Error::decode(path, e))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(Error::decode(path, e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => mix_down(decoded, &mut samples),
            Err(SymphoniaError::DecodeError(reason)) => {
                warn!("{}: skipping corrupt packet ({})", path.display(), reason);
            }
            Err(e) => return Err(Error::decode(path, e)),
        }
    }

    if samples.is_empty() {
        return Err(Error::decode(path, "no samples decoded"));
    }
    debug!(
        "decoded {} samples at {} Hz from {}",
        samples.len(),
        sample_rate,
        path.display()
    );

    Ok(AudioData {
        samples,
        sample_rate,
    })
}

fn mix_down(decoded: AudioBufferRef<'_>, out: &mut Vec<f32>) {
    match decoded {
        AudioBufferRef::F32(buf) => average_channels(&*buf, out),
        AudioBufferRef::F64(buf) => average_channels(&*buf, out),
        AudioBufferRef::U8(buf) => average_channels(&*buf, out),
        AudioBufferRef::U16(buf) => average_channels(&*buf, out),
        AudioBufferRef::U24(buf) => average_channels(&*buf, out),
        AudioBufferRef::U32(buf) => average_channels(&*buf, out),
        AudioBufferRef::S8(buf) => average_channels(&*buf, out),
        AudioBufferRef::S16(buf) => average_channels(&*buf, out),
        AudioBufferRef::S24(buf) => average_channels(&*buf, out),
        AudioBufferRef::S32(buf) => average_channels(&*buf, out),
    }
}

fn average_channels<S>(buf: &AudioBuffer<S>, out: &mut Vec<f32>)
where
    S: Sample,
    f32: FromSample<S>,
{
    let channels = buf.spec().channels.count();
    if channels == 0 {
        return;
    }
    let start = out.len();
    out.extend(buf.chan(0).iter().map(|&s| f32::from_sample(s)));
    for ch in 1..channels {
        for (acc, &s) in out[start..].iter_mut().zip(buf.chan(ch)) {
            *acc += f32::from_sample(s);
        }
    }
    if channels > 1 {
        let scale = 1.0 / channels as f32;
        out[start..].iter_mut().for_each(|s| *s *= scale);
    }
}
