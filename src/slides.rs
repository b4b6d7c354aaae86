//! Ordering of rasterized frames left in a finished working directory.

use crate::{config, fs::FileSystem};
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    pub image_path: PathBuf,
    /// 1-based position in presentation order.
    pub display_index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideCollection {
    pub slides: Vec<Slide>,
}

impl SlideCollection {
    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.slides.iter().map(|s| s.image_path.as_path())
    }
}

/// Extracts the frame number from names like `slide-12.jpg`.
pub struct SlideKey {
    re: Regex,
}

impl SlideKey {
    pub fn new(stem: &str, extension: &str) -> Result<Self> {
        let pattern = format!(
            r"(?i)^{}-(\d+)\.{}$",
            regex::escape(stem),
            regex::escape(extension)
        );
        let re = Regex::new(&pattern).with_context(|| format!("slide pattern: {pattern}"))?;
        Ok(Self { re })
    }

    /// Names without a number (including `slide.jpg` for one-page input) map
    /// to 0. Numbers too large for `u64` saturate so they still sort last.
    pub fn key(&self, file_name: &str) -> u64 {
        self.re
            .captures(file_name)
            .and_then(|c| c.get(1))
            .map_or(0, |m| m.as_str().parse().unwrap_or(u64::MAX))
    }
}

pub fn collect(
    cfg: &config::Pipeline,
    fs: &impl FileSystem,
    dir: &Path,
) -> Result<SlideCollection> {
    let key = SlideKey::new(&cfg.slide_stem, &cfg.image_extension)?;

    let mut frames: Vec<(u64, String, PathBuf)> = fs
        .list_dir(dir)?
        .into_iter()
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(&cfg.image_extension))
        })
        .filter_map(|p| {
            let name = p.file_name()?.to_str()?.to_string();
            Some((key.key(&name), name, p))
        })
        .collect();
    frames.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));

    let slides = frames
        .into_iter()
        .enumerate()
        .map(|(i, (_, _, image_path))| Slide {
            image_path,
            display_index: i + 1,
        })
        .collect();
    Ok(SlideCollection { slides })
}
