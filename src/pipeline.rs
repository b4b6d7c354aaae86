use crate::{
    config::Config,
    engine::{image_invocation, intermediate_invocation, Invocation, Launcher, ToolProcess},
    error::PipelineError,
    fs::FileSystem,
    report::{JobReport, StageReport},
    slides::{self, SlideCollection},
    state::{ConversionState, Failure, PollResult},
};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Opaque reference to the job created by [`ConversionPipeline::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobHandle(u64);

impl JobHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Converts one document at a time into numbered slide images by running an
/// office tool and a raster tool in sequence.
///
/// The pipeline never blocks: callers invoke [`poll`](Self::poll) from a
/// periodic timer and each call advances the job by at most one step.
pub struct ConversionPipeline<L: Launcher, F: FileSystem> {
    cfg: Config,
    launcher: L,
    fs: F,
    next_id: u64,
    job: Option<ConversionJob>,
}

struct ConversionJob {
    handle: JobHandle,
    source: PathBuf,
    work_dir: PathBuf,
    state: ConversionState,
    process: Option<Running>,
    intermediate: Option<PathBuf>,
    skipped_intermediate: bool,
    stages: Vec<StageReport>,
}

struct Running {
    process: Box<dyn ToolProcess>,
    program: String,
    started: Instant,
}

impl<L: Launcher, F: FileSystem> ConversionPipeline<L, F> {
    pub fn new(cfg: &Config, launcher: L, fs: F) -> Self {
        Self {
            cfg: cfg.clone(),
            launcher,
            fs,
            next_id: 1,
            job: None,
        }
    }

    /// Validates `source`, prepares `work_dir` and registers a new job.
    ///
    /// `work_dir` must be empty if it already exists; otherwise it is created.
    /// A PDF source is copied into it so the office stage is skipped.
    pub fn start(&mut self, source: &Path, work_dir: &Path) -> Result<JobHandle, PipelineError> {
        if let Some(active) = self.job.as_ref().filter(|j| !j.state.is_terminal()) {
            return Err(PipelineError::Usage(format!(
                "{} is still {}",
                active.handle,
                active.state.name()
            )));
        }

        if !self.cfg.pipeline.accepts(source) {
            return Err(PipelineError::InvalidInput(format!(
                "unsupported file type: {}",
                source.display()
            )));
        }
        self.fs
            .check_readable(source)
            .map_err(|e| PipelineError::InvalidInput(format!("{e:#}")))?;

        let preexisting = self.fs.exists(work_dir);
        if preexisting {
            let empty = self
                .fs
                .is_empty_dir(work_dir)
                .map_err(|e| PipelineError::InvalidInput(format!("{e:#}")))?;
            if !empty {
                return Err(PipelineError::InvalidInput(format!(
                    "working directory is not empty: {}",
                    work_dir.display()
                )));
            }
            self.fs
                .check_writable(work_dir)
                .map_err(|e| PipelineError::InvalidInput(format!("{e:#}")))?;
        }

        self.fs
            .create_dir_all(work_dir)
            .map_err(|e| PipelineError::Filesystem(format!("{e:#}")))?;

        let mut intermediate = None;
        if self.cfg.pipeline.is_intermediate(source) {
            let Some(file_name) = source.file_name() else {
                return Err(PipelineError::InvalidInput(format!(
                    "source has no file name: {}",
                    source.display()
                )));
            };
            let staged = work_dir.join(file_name);
            if let Err(err) = self.fs.copy(source, &staged) {
                // A caller-provided directory is left in place.
                if !preexisting {
                    remove_work_dir(&self.fs, work_dir);
                }
                return Err(PipelineError::Filesystem(format!("{err:#}")));
            }
            intermediate = Some(staged);
        }

        let handle = JobHandle(self.next_id);
        self.next_id += 1;

        info!(
            "{handle} start source={} work_dir={} skip_office={}",
            source.display(),
            work_dir.display(),
            intermediate.is_some()
        );

        self.job = Some(ConversionJob {
            handle,
            source: source.to_path_buf(),
            work_dir: work_dir.to_path_buf(),
            state: ConversionState::Init,
            process: None,
            skipped_intermediate: intermediate.is_some(),
            intermediate,
            stages: Vec::new(),
        });
        Ok(handle)
    }

    /// Advances the job by one step without blocking.
    ///
    /// Conversion failures are reported as [`PollResult::Failed`]; the `Err`
    /// case is reserved for a stale handle.
    pub fn poll(&mut self, handle: JobHandle) -> Result<PollResult, PipelineError> {
        let Self {
            cfg,
            launcher,
            fs,
            job,
            ..
        } = self;
        let job = find_mut(job, handle)?;

        if job.state.is_terminal() {
            return Ok(PollResult::from(&job.state));
        }

        if let Err(failure) = job.step(&*cfg, &*launcher, &*fs) {
            warn!("{} failed: {failure}", job.handle);
            job.abort(&*fs);
            job.advance(ConversionState::Failed(failure));
        }
        Ok(PollResult::from(&job.state))
    }

    /// Kills any running tool and discards the working directory. Does nothing
    /// once the job has reached a terminal state.
    pub fn cancel(&mut self, handle: JobHandle) -> Result<(), PipelineError> {
        let Self { fs, job, .. } = self;
        let job = find_mut(job, handle)?;

        if job.state.is_terminal() {
            debug!("{} cancel ignored, already {}", job.handle, job.state.name());
            return Ok(());
        }
        job.abort(&*fs);
        job.advance(ConversionState::Cancelled);
        Ok(())
    }

    /// Ordered slides of a finished job. Asking before the job has finished is
    /// a usage error and does not touch the filesystem.
    pub fn collect_slides(&self, handle: JobHandle) -> Result<SlideCollection, PipelineError> {
        let job = self.find(handle)?;
        if job.state != ConversionState::Finished {
            return Err(PipelineError::Usage(format!(
                "slides requested while {} is {}",
                job.handle,
                job.state.name()
            )));
        }
        slides::collect(&self.cfg.pipeline, &self.fs, &job.work_dir)
            .map_err(|e| PipelineError::Filesystem(format!("{e:#}")))
    }

    pub fn state(&self, handle: JobHandle) -> Result<&ConversionState, PipelineError> {
        Ok(&self.find(handle)?.state)
    }

    pub fn work_dir(&self, handle: JobHandle) -> Result<&Path, PipelineError> {
        Ok(&self.find(handle)?.work_dir)
    }

    pub fn report(&self, handle: JobHandle) -> Result<JobReport, PipelineError> {
        let job = self.find(handle)?;
        let failure = match &job.state {
            ConversionState::Failed(f) => Some(f.to_string()),
            _ => None,
        };
        Ok(JobReport {
            job_id: job.handle.id(),
            source: job.source.display().to_string(),
            work_dir: job.work_dir.display().to_string(),
            skipped_intermediate: job.skipped_intermediate,
            state: job.state.name().to_string(),
            failure,
            stages: job.stages.clone(),
        })
    }

    fn find(&self, handle: JobHandle) -> Result<&ConversionJob, PipelineError> {
        self.job
            .as_ref()
            .filter(|j| j.handle == handle)
            .ok_or_else(|| PipelineError::Usage(format!("unknown {handle}")))
    }
}

/// Dropping the pipeline with a job still running behaves like `cancel`.
impl<L: Launcher, F: FileSystem> Drop for ConversionPipeline<L, F> {
    fn drop(&mut self) {
        let Some(job) = self.job.as_mut().filter(|j| !j.state.is_terminal()) else {
            return;
        };
        warn!("{} dropped while {}; cancelling", job.handle, job.state.name());
        job.abort(&self.fs);
        job.advance(ConversionState::Cancelled);
    }
}

fn find_mut(
    job: &mut Option<ConversionJob>,
    handle: JobHandle,
) -> Result<&mut ConversionJob, PipelineError> {
    job.as_mut()
        .filter(|j| j.handle == handle)
        .ok_or_else(|| PipelineError::Usage(format!("unknown {handle}")))
}

fn remove_work_dir(fs: &impl FileSystem, dir: &Path) {
    if !fs.exists(dir) {
        return;
    }
    if let Err(err) = fs.remove_dir_all(dir) {
        warn!("cleanup of {} failed: {err:#}", dir.display());
    }
}

impl ConversionJob {
    fn step<L: Launcher, F: FileSystem>(
        &mut self,
        cfg: &Config,
        launcher: &L,
        fs: &F,
    ) -> Result<(), Failure> {
        if self.state == ConversionState::Init {
            let (inv, next) = match &self.intermediate {
                Some(staged) => (
                    image_invocation(cfg, staged, &self.work_dir),
                    ConversionState::ConvertingToImages,
                ),
                None => (
                    intermediate_invocation(cfg, &self.source, &self.work_dir),
                    ConversionState::ConvertingToIntermediate,
                ),
            };
            self.launch(launcher, inv)?;
            self.advance(next);
            return Ok(());
        }

        let Some(running) = self.process.as_mut() else {
            return Err(Failure::tool(format!(
                "no tool running while {}",
                self.state.name()
            )));
        };
        let exit = running
            .process
            .try_wait()
            .map_err(|e| Failure::tool(format!("{e:#}")))?;
        let Some(exit) = exit else {
            debug!("{} {} still running", self.handle, running.program);
            return Ok(());
        };

        let program = running.program.clone();
        let elapsed = running.started.elapsed();
        self.process = None;
        if let Some(report) = self.stages.last_mut() {
            report.exit_code = exit.code;
            report.elapsed_ms = elapsed.as_millis() as u64;
        }
        info!(
            "{} {program} exited code={:?} after {:?}",
            self.handle, exit.code, elapsed
        );

        if !exit.success() {
            return Err(Failure::tool(format!(
                "{program} exited with {}: error processing {}",
                exit.code
                    .map_or_else(|| "signal".to_string(), |c| format!("code {c}")),
                self.source.display()
            )));
        }

        match self.state {
            ConversionState::ConvertingToIntermediate => {
                let found = locate_intermediate(cfg, fs, &self.work_dir)?;
                let inv = image_invocation(cfg, &found, &self.work_dir);
                self.intermediate = Some(found);
                self.launch(launcher, inv)?;
                self.advance(ConversionState::ConvertingToImages);
            }
            ConversionState::ConvertingToImages => {
                if !cfg.pipeline.keep_intermediate {
                    if let Some(intermediate) = self.intermediate.take() {
                        fs.remove_file(&intermediate)
                            .map_err(|e| Failure::filesystem(&e))?;
                    }
                }
                self.advance(ConversionState::Finished);
            }
            _ => {}
        }
        Ok(())
    }

    fn launch<L: Launcher>(&mut self, launcher: &L, inv: Invocation) -> Result<(), Failure> {
        let process = launcher
            .launch(&inv)
            .map_err(|e| Failure::tool(format!("{e:#}")))?;
        let pid = process.id();
        debug!("{} launched pid={pid}: {}", self.handle, inv.command_line());
        self.stages.push(StageReport {
            stage: inv.stage,
            command: inv.command_line(),
            pid,
            exit_code: None,
            elapsed_ms: 0,
            killed: false,
        });
        self.process = Some(Running {
            process,
            program: inv.program,
            started: Instant::now(),
        });
        Ok(())
    }

    /// Kills the active tool, if any, and removes the working directory.
    /// Failures here are logged only; the job is terminal either way.
    fn abort<F: FileSystem>(&mut self, fs: &F) {
        if let Some(mut running) = self.process.take() {
            if let Err(err) = running.process.kill() {
                warn!("{} kill {} failed: {err:#}", self.handle, running.program);
            }
            if let Some(report) = self.stages.last_mut() {
                report.killed = true;
                report.elapsed_ms = running.started.elapsed().as_millis() as u64;
            }
        }
        remove_work_dir(fs, &self.work_dir);
    }

    fn advance(&mut self, next: ConversionState) {
        debug_assert!(
            next.rank() > self.state.rank(),
            "illegal transition {} -> {}",
            self.state.name(),
            next.name()
        );
        info!("{} {} -> {}", self.handle, self.state.name(), next.name());
        self.state = next;
    }
}

fn locate_intermediate<F: FileSystem>(
    cfg: &Config,
    fs: &F,
    work_dir: &Path,
) -> Result<PathBuf, Failure> {
    let mut found: Vec<PathBuf> = fs
        .list_dir(work_dir)
        .map_err(|e| Failure::filesystem(&e))?
        .into_iter()
        .filter(|p| cfg.pipeline.is_intermediate(p))
        .collect();
    found.sort();
    found.into_iter().next().ok_or_else(|| {
        Failure::tool(format!(
            "{} file not produced in {}",
            cfg.pipeline.intermediate_extension,
            work_dir.display()
        ))
    })
}

/// Ticks `poll` every `interval` until the job reaches a terminal state.
///
/// This stands in for a UI timer. When `deadline` is set and passes before
/// the job finishes, the job is cancelled.
pub fn run_to_completion<L: Launcher, F: FileSystem>(
    pipeline: &mut ConversionPipeline<L, F>,
    handle: JobHandle,
    interval: std::time::Duration,
    deadline: Option<std::time::Duration>,
) -> Result<PollResult, PipelineError> {
    let started = Instant::now();
    let mut ticks: u64 = 0;
    loop {
        let result = pipeline.poll(handle)?;
        if result.is_terminal() {
            debug!("{handle} terminal after {ticks} ticks");
            return Ok(result);
        }
        if deadline.is_some_and(|d| started.elapsed() >= d) {
            warn!("{handle} exceeded deadline {deadline:?}; cancelling");
            pipeline.cancel(handle)?;
            return Ok(PollResult::from(pipeline.state(handle)?));
        }
        ticks += 1;
        if ticks % 50 == 0 {
            debug!("{handle} {result:?} ({ticks} ticks)");
        }
        std::thread::sleep(interval);
    }
}
