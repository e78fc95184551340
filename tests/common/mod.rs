use std::f32::consts::PI;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// A scratch directory removed again when dropped.
pub struct TmpDir(PathBuf);

impl Deref for TmpDir {
    type Target = Path;

    fn deref(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for TmpDir {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Drop for TmpDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

pub fn tmp_dir(label: &str) -> TmpDir {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let p = std::env::temp_dir().join(format!("sonogram-it-{label}-{}-{nanos}", std::process::id()));
    std::fs::create_dir_all(&p).expect("mkdir");
    TmpDir(p)
}

/// Writes a mono 16-bit tone of `secs` seconds.
pub fn write_tone(path: &Path, freq: f32, sample_rate: u32, secs: f32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
    let n = (sample_rate as f32 * secs) as usize;
    for i in 0..n {
        let s = 0.5 * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin();
        writer.write_sample((s * i16::MAX as f32) as i16).expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
