use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::PathBuf;

use sonogram::split::split_dataset;
use sonogram::{Pipeline, Policy, RenderConfig, RenderSummary, SplitConfig, SplitSummary};

mod init;

#[derive(Parser)]
#[command(author, version, about = "Render audio clips to spectrogram images and split them for training")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render every clip under INPUT/<class>/ to OUTPUT/<class>/<n>.png
    Render {
        #[command(flatten)]
        paths: RenderPaths,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Move a held-out share of SOURCE/<class>/ into DEST/<class>/
    Split {
        /// Directory holding one subdirectory of images per class
        #[arg(short, long)]
        source: PathBuf,

        /// Root of the test partition
        #[arg(short, long)]
        dest: PathBuf,

        #[command(flatten)]
        split: SplitArgs,
    },

    /// Render, then split the rendered images
    Run {
        #[command(flatten)]
        paths: RenderPaths,

        /// Root of the test partition
        #[arg(short, long)]
        test_output: PathBuf,

        #[command(flatten)]
        render: RenderArgs,

        #[command(flatten)]
        split: SplitArgs,
    },
}

#[derive(Args)]
struct RenderPaths {
    /// Directory holding one subdirectory of clips per class
    #[arg(short, long)]
    input: PathBuf,

    /// Output root; each class directory in it is wiped before rendering
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Args)]
struct RenderArgs {
    /// Rate clips are resampled to before the transform
    #[arg(long, default_value_t = 48_000)]
    sampling_rate: u32,

    /// FFT window size
    #[arg(long, default_value_t = 512)]
    n_fft: usize,

    /// Hop between frames (defaults to n_fft / 4)
    #[arg(long)]
    hop_length: Option<usize>,

    #[arg(long, default_value_t = 100.0)]
    dpi: f32,

    /// Lower edge of the kept band, Hz
    #[arg(long, default_value_t = 3_000.0)]
    min_freq: f32,

    /// Upper edge of the kept band, Hz
    #[arg(long, default_value_t = 22_000.0)]
    max_freq: f32,

    /// Image width in pixels
    #[arg(long, default_value_t = 256)]
    width: u32,

    /// Image height in pixels
    #[arg(long, default_value_t = 256)]
    height: u32,

    /// Decibel reference: a constant or max, min, mean, median, p<N>
    #[arg(long, default_value = "max")]
    reference: Policy,

    /// Dynamic range kept below the loudest cell, dB (negative disables)
    #[arg(long, default_value_t = 80.0, allow_hyphen_values = true)]
    top_db: f32,

    /// Value mapped to white: a constant or a reduction
    #[arg(long, default_value = "min", allow_hyphen_values = true)]
    clim_lo: Policy,

    /// Value mapped to black: a constant or a reduction
    #[arg(long, default_value = "max", allow_hyphen_values = true)]
    clim_hi: Policy,

    /// Render threads (0 = one per core)
    #[arg(short, long, default_value_t = 0)]
    jobs: usize,
}

impl RenderArgs {
    fn to_config(&self) -> RenderConfig {
        RenderConfig {
            sampling_rate: self.sampling_rate,
            n_fft: self.n_fft,
            hop_length: self.hop_length.unwrap_or(self.n_fft / 4).max(1),
            dpi: self.dpi,
            min_freq: self.min_freq,
            max_freq: self.max_freq,
            img_size: (self.width, self.height),
            reference: self.reference,
            top_db: (self.top_db >= 0.0).then_some(self.top_db),
            clim_lo: self.clim_lo,
            clim_hi: self.clim_hi,
        }
    }
}

#[derive(Args)]
struct SplitArgs {
    /// Fraction of each class kept for training
    #[arg(short = 'r', long, default_value_t = 0.8)]
    train_ratio: f64,

    /// Seed for a reproducible split
    #[arg(long)]
    seed: Option<u64>,
}

impl SplitArgs {
    fn to_config(&self) -> SplitConfig {
        SplitConfig {
            train_ratio: self.train_ratio,
            seed: self.seed,
        }
    }
}

fn progress_bar() -> Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn report_render(summary: &RenderSummary) {
    for class in &summary.per_class {
        info!("{}: {} images, {} failed", class.label, class.rendered, class.failed);
    }
    if summary.failed() > 0 {
        warn!("{} clips could not be rendered", summary.failed());
    }
}

fn report_split(summary: &SplitSummary) {
    for class in &summary.classes {
        info!("{}: {} train / {} test", class.label, class.kept(), class.moved);
        if class.failed > 0 {
            warn!("{}: {} files could not be moved to test", class.label, class.failed);
        }
    }
    for (label, err) in &summary.failed {
        warn!("{}: not split: {}", label, err);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Render { paths, render } => {
            let pipeline = Pipeline::new(render.to_config())
                .context("Invalid render settings")?
                .with_jobs(render.jobs);
            let summary = pipeline
                .render_corpus(&paths.input, &paths.output, &progress_bar()?)
                .with_context(|| format!("Failed to render {}", paths.input.display()))?;
            report_render(&summary);
        }
        Commands::Split { source, dest, split } => {
            let summary = split_dataset(&source, &dest, &split.to_config())
                .with_context(|| format!("Failed to split {}", source.display()))?;
            report_split(&summary);
        }
        Commands::Run {
            paths,
            test_output,
            render,
            split,
        } => {
            let pipeline = Pipeline::new(render.to_config())
                .context("Invalid render settings")?
                .with_jobs(render.jobs);
            let (rendered, splits) = pipeline
                .run(
                    &paths.input,
                    &paths.output,
                    &test_output,
                    &split.to_config(),
                    &progress_bar()?,
                )
                .with_context(|| format!("Failed to process {}", paths.input.display()))?;
            report_render(&rendered);
            report_split(&splits);
        }
    }

    Ok(())
}
