use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::fs;
use std::io;
use std::path::Path;

use crate::config::SplitConfig;
use crate::corpus::class_dirs;
use crate::error::{Error, Result};

/// Outcome of splitting one class. Files selected for the test partition
/// end up either in `moved` or, if relocating them failed, in `failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitReport {
    pub label: String,
    pub total: usize,
    pub moved: usize,
    pub failed: usize,
}

impl SplitReport {
    /// Files never selected for the test partition.
    pub fn kept(&self) -> usize {
        self.total - self.moved - self.failed
    }
}

/// Per-class results of a dataset split. A failing class doesn't stop the
/// others; `failed` holds classes that could not be split at all.
#[derive(Debug, Default)]
pub struct SplitSummary {
    pub classes: Vec<SplitReport>,
    pub failed: Vec<(String, Error)>,
}

impl SplitSummary {
    pub fn moved(&self) -> usize {
        self.classes.iter().map(|c| c.moved).sum()
    }

    /// Files selected for testing that are still in the training tree.
    pub fn unmoved(&self) -> usize {
        self.classes.iter().map(|c| c.failed).sum()
    }
}

/// Number of files held out for testing: `round(total * (1 - train_ratio))`,
/// halves rounded away from zero.
pub fn test_count(total: usize, train_ratio: f64) -> usize {
    let count = (total as f64 * (1.0 - train_ratio)).round();
    (count.max(0.0) as usize).min(total)
}

/// Moves a shuffled `test_count` share of the files in `source` into
/// `dest`, creating `dest` if needed. A file that can't be moved is logged
/// and counted; the rest of the class still goes through.
pub fn split_class<R: Rng + ?Sized>(
    label: &str,
    source: &Path,
    dest: &Path,
    train_ratio: f64,
    rng: &mut R,
) -> Result<SplitReport> {
    let mut names = Vec::new();
    for entry in fs::read_dir(source).map_err(|e| Error::fs(source, e))? {
        let entry = entry.map_err(|e| Error::fs(source, e))?;
        let is_file = entry.file_type().map_err(|e| Error::fs(&entry.path(), e))?.is_file();
        if is_file {
            names.push(entry.file_name());
        }
    }

    let total = names.len();
    let mut report = SplitReport {
        label: label.to_string(),
        total,
        moved: 0,
        failed: 0,
    };
    if total == 0 {
        return Ok(report);
    }

    fs::create_dir_all(dest).map_err(|e| Error::fs(dest, e))?;

    // Directory order is arbitrary; sort so a seeded rng reproduces a split.
    names.sort();
    names.shuffle(rng);

    for name in &names[..test_count(total, train_ratio)] {
        match move_file(&source.join(name), &dest.join(name)) {
            Ok(()) => report.moved += 1,
            Err(e) => {
                warn!("{}: {}", label, e);
                report.failed += 1;
            }
        }
    }
    info!(
        "{}: {} files, {} moved to test, {} kept, {} failed",
        label,
        total,
        report.moved,
        report.kept(),
        report.failed
    );
    Ok(report)
}

/// Renames `from` to `to`, copying instead when a rename is impossible
/// (different filesystems). An existing `to` is never replaced by the copy.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    let rename_err = match fs::rename(from, to) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    let rename_failed = |detail: String| {
        Error::fs(
            to,
            io::Error::new(
                rename_err.kind(),
                format!("rename from '{}' failed: {}{}", from.display(), rename_err, detail),
            ),
        )
    };
    if to.exists() {
        return Err(rename_failed(String::new()));
    }

    if let Err(copy_err) = fs::copy(from, to) {
        return Err(rename_failed(format!("; copy fallback failed: {}", copy_err)));
    }
    fs::remove_file(from).map_err(|e| Error::fs(from, e))
}

/// Splits every class directory under `source_root`, mirroring the class
/// layout under `dest_root`.
pub fn split_dataset(source_root: &Path, dest_root: &Path, config: &SplitConfig) -> Result<SplitSummary> {
    config.validate()?;
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut summary = SplitSummary::default();
    for class in class_dirs(source_root)? {
        let dest = dest_root.join(&class.label);
        match split_class(&class.label, &class.path, &dest, config.train_ratio, &mut rng) {
            Ok(report) => summary.classes.push(report),
            Err(e) => {
                warn!("{}: split failed: {}", class.label, e);
                summary.failed.push((class.label, e));
            }
        }
    }
    Ok(summary)
}
