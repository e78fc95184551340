//! Fixtures shared by the unit tests: synthetic tones, WAV writing and
//! scratch directories.

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

/// A fresh, empty directory under the system temp dir.
pub fn tmp_dir(label: &str) -> TmpDir {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let p = std::env::temp_dir().join(format!(
        "sonogram-{label}-{}-{nanos}",
        std::process::id()
    ));
    std::fs::create_dir_all(&p).expect("mkdir");
    TmpDir(p)
}

pub fn sine(freq: f32, sample_rate: u32, secs: f32) -> Vec<f32> {
    let n = (sample_rate as f32 * secs) as usize;
    (0..n)
        .map(|i| 0.8 * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

/// Writes interleaved samples as 16-bit PCM.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32, channels: u16) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
    for &s in samples {
        writer
            .write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}

/// Creates an empty file named `name` in `dir`.
pub fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"").expect("touch");
    path
}

mod tests {
    use super::*;

    #[test]
    fn tmp_dir_is_removed_on_drop() {
        let dir = tmp_dir("guard");
        touch(&dir, "a.png");
        std::fs::create_dir(dir.join("nested")).unwrap();
        let path = dir.to_path_buf();
        assert!(path.is_dir());

        drop(dir);
        assert!(!path.exists());
    }
}
