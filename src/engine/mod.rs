pub mod system;
pub mod types;

use crate::config::Config;
use anyhow::Result;
use std::path::Path;

pub use types::{Invocation, Stage, ToolDiag, ToolExit};

/// A running external tool. Every method must return without blocking on the
/// child.
pub trait ToolProcess {
    fn id(&self) -> u32;
    /// `Ok(None)` while the child is still running.
    fn try_wait(&mut self) -> Result<Option<ToolExit>>;
    /// Forcibly terminates and reaps the child. Killing an exited child is not
    /// an error.
    fn kill(&mut self) -> Result<()>;
}

pub trait Launcher {
    fn launch(&self, invocation: &Invocation) -> Result<Box<dyn ToolProcess>>;
}

/// Headless office conversion of `source` into a PDF inside `out_dir`.
pub fn intermediate_invocation(cfg: &Config, source: &Path, out_dir: &Path) -> Invocation {
    Invocation {
        stage: Stage::Intermediate,
        program: cfg.tools.office_exe.clone(),
        args: vec![
            "--headless".into(),
            "--invisible".into(),
            "--convert-to".into(),
            cfg.pipeline.intermediate_extension.clone(),
            "--outdir".into(),
            out_dir.display().to_string(),
            source.display().to_string(),
        ],
    }
}

/// Rasterizes `intermediate` into `out_dir`. The raster tool expands the
/// output template into one numbered file per page (`slide-0.jpg`, ...), or
/// writes the bare template name for single-page input.
pub fn image_invocation(cfg: &Config, intermediate: &Path, out_dir: &Path) -> Invocation {
    let template = out_dir.join(format!(
        "{}.{}",
        cfg.pipeline.slide_stem, cfg.pipeline.image_extension
    ));
    Invocation {
        stage: Stage::Images,
        program: cfg.tools.raster_exe.clone(),
        args: vec![
            intermediate.display().to_string(),
            template.display().to_string(),
        ],
    }
}
