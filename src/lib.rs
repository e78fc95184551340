//! Turns labelled audio clips into fixed-size grayscale spectrogram images
//! and splits the resulting image corpus into train and test sets.
//!
//! A clip goes through [`audio::load_audio`] (decode, downmix, resample),
//! [`spectrogram::compute_spectrogram`] (STFT, band crop, decibels) and
//! [`render::ImageRenderer`] (contrast window, reversed grayscale PNG).
//! [`pipeline::Pipeline`] drives that over a whole corpus and
//! [`split::split_dataset`] holds out a share of every class afterwards.

pub mod audio;
pub mod config;
pub mod corpus;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod spectrogram;
pub mod split;

#[cfg(test)]
mod test_utils;

pub use config::{Policy, Reduction, RenderConfig, SplitConfig};
pub use error::{Error, Result};
pub use pipeline::{Pipeline, RenderSummary};
pub use split::{SplitReport, SplitSummary};
