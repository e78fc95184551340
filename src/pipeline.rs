use indicatif::ProgressBar;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::audio::load_audio;
use crate::config::{RenderConfig, SplitConfig};
use crate::corpus::{class_dirs, discover_clips, reset_storage};
use crate::error::{Error, Result};
use crate::render::ImageRenderer;
use crate::spectrogram::compute_spectrogram;
use crate::split::{split_dataset, SplitSummary};

/// Run-scoped source of output names. Indices are handed out on one thread
/// before any clip is dispatched, so parallel renders never collide.
#[derive(Debug, Default)]
pub struct ClipCounter {
    next: usize,
}

impl ClipCounter {
    pub fn reserve(&mut self) -> usize {
        let index = self.next;
        self.next += 1;
        index
    }
}

/// A clip with its output location already fixed.
#[derive(Debug, Clone)]
struct RenderTask {
    class: usize,
    clip: PathBuf,
    output_dir: PathBuf,
    index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassRender {
    pub label: String,
    pub rendered: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub per_class: Vec<ClassRender>,
}

impl RenderSummary {
    pub fn rendered(&self) -> usize {
        self.per_class.iter().map(|c| c.rendered).sum()
    }

    pub fn failed(&self) -> usize {
        self.per_class.iter().map(|c| c.failed).sum()
    }
}

/// Loads, transforms and renders a single clip to `<output_dir>/<name>.png`.
pub fn render_clip(
    clip: &Path,
    output_dir: &Path,
    image_name: &str,
    config: &RenderConfig,
    renderer: &ImageRenderer,
) -> Result<PathBuf> {
    let audio = load_audio(clip, config.sampling_rate)?;
    let db = compute_spectrogram(&audio, config)?;
    renderer.render(&db, output_dir, image_name)
}

/// Renders a whole labelled corpus: one image per clip, one output
/// directory per class.
pub struct Pipeline {
    config: RenderConfig,
    renderer: ImageRenderer,
    jobs: usize,
}

impl Pipeline {
    pub fn new(config: RenderConfig) -> Result<Self> {
        config.validate()?;
        let renderer = ImageRenderer::new(&config);
        Ok(Self {
            config,
            renderer,
            jobs: 0,
        })
    }

    /// Worker threads for rendering; `0` lets rayon decide.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Clears `output_root/<label>` for every class under `input_root`, then
    /// renders every clip. Clip failures are logged and counted.
    pub fn render_corpus(
        &self,
        input_root: &Path,
        output_root: &Path,
        progress: &ProgressBar,
    ) -> Result<RenderSummary> {
        let classes = class_dirs(input_root)?;
        let mut counter = ClipCounter::default();
        let mut tasks = Vec::new();
        let mut summary = RenderSummary::default();

        for (class, dir) in classes.iter().enumerate() {
            let output_dir = output_root.join(&dir.label);
            reset_storage(&output_dir)?;

            let before = tasks.len();
            for clip in discover_clips(&dir.path)? {
                tasks.push(RenderTask {
                    class,
                    clip,
                    output_dir: output_dir.clone(),
                    index: counter.reserve(),
                });
            }
            info!("{}: {} clips", dir.label, tasks.len() - before);
            summary.per_class.push(ClassRender {
                label: dir.label.clone(),
                rendered: 0,
                failed: 0,
            });
        }

        progress.set_length(tasks.len() as u64);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("cannot start render workers: {}", e)))?;

        let outcomes: Vec<(usize, bool)> = pool.install(|| {
            tasks
                .par_iter()
                .map(|task| {
                    let name = task.index.to_string();
                    let ok = match render_clip(&task.clip, &task.output_dir, &name, &self.config, &self.renderer) {
                        Ok(path) => {
                            debug!("{} -> {}", task.clip.display(), path.display());
                            true
                        }
                        Err(e) => {
                            warn!("skipping {}: {}", task.clip.display(), e);
                            false
                        }
                    };
                    progress.inc(1);
                    (task.class, ok)
                })
                .collect()
        });
        progress.finish();

        for (class, ok) in outcomes {
            let entry = &mut summary.per_class[class];
            if ok {
                entry.rendered += 1;
            } else {
                entry.failed += 1;
            }
        }
        info!(
            "rendered {} images ({} clips failed)",
            summary.rendered(),
            summary.failed()
        );
        Ok(summary)
    }

    /// Renders the corpus, then splits the result once every render is done.
    pub fn run(
        &self,
        input_root: &Path,
        output_root: &Path,
        test_root: &Path,
        split: &SplitConfig,
        progress: &ProgressBar,
    ) -> Result<(RenderSummary, SplitSummary)> {
        split.validate()?;
        let rendered = self.render_corpus(input_root, output_root, progress)?;
        let splits = split_dataset(output_root, test_root, split)?;
        Ok((rendered, splits))
    }
}
