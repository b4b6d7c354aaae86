use super::{Invocation, Launcher, ToolDiag, ToolExit, ToolProcess};
use crate::config::Config;
use anyhow::{Context, Result};
use std::process::{Child, Command, Stdio};
use tracing::{debug, warn};

/// Spawns the configured tools as real OS processes.
#[derive(Debug, Default, Clone)]
pub struct SystemLauncher;

impl SystemLauncher {
    pub fn new() -> Self {
        Self
    }

    /// Runs each tool with its version flag and reports whether it could be
    /// executed.
    pub fn doctor(&self, cfg: &Config) -> Vec<ToolDiag> {
        [
            (&cfg.tools.office_exe, &cfg.tools.office_version_arg),
            (&cfg.tools.raster_exe, &cfg.tools.raster_version_arg),
        ]
        .into_iter()
        .map(|(program, version_arg)| version_check(program, version_arg))
        .collect()
    }
}

fn version_check(program: &str, version_arg: &str) -> ToolDiag {
    debug!("probing {program} {version_arg}");
    match Command::new(program)
        .arg(version_arg)
        .stdin(Stdio::null())
        .output()
    {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let version = stdout
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .map(String::from);
            let error = if output.status.success() {
                None
            } else {
                Some(format!("exited with {}", output.status))
            };
            ToolDiag {
                program: program.to_string(),
                available: output.status.success(),
                version,
                error,
            }
        }
        Err(err) => ToolDiag {
            program: program.to_string(),
            available: false,
            version: None,
            error: Some(err.to_string()),
        },
    }
}

impl Launcher for SystemLauncher {
    fn launch(&self, invocation: &Invocation) -> Result<Box<dyn ToolProcess>> {
        debug!("spawn {}", invocation.command_line());
        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("spawning {}", invocation.program))?;
        Ok(Box::new(SystemProcess {
            program: invocation.program.clone(),
            child,
        }))
    }
}

pub struct SystemProcess {
    program: String,
    child: Child,
}

impl ToolProcess for SystemProcess {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn try_wait(&mut self) -> Result<Option<ToolExit>> {
        let status = self
            .child
            .try_wait()
            .with_context(|| format!("try_wait {}", self.program))?;
        Ok(status.map(|s| ToolExit { code: s.code() }))
    }

    fn kill(&mut self) -> Result<()> {
        match self.try_wait() {
            Ok(Some(_)) => return Ok(()),
            Ok(None) => {}
            Err(err) => warn!("{err:#}; killing anyway"),
        }
        if let Err(err) = self.child.kill() {
            // The child may have exited between the check and the signal.
            warn!("kill {} (pid {}): {err}", self.program, self.child.id());
        }
        self.child
            .wait()
            .with_context(|| format!("wait after kill: {}", self.program))?;
        Ok(())
    }
}
