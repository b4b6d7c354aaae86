//! Scripted stand-ins for the launcher and filesystem capabilities.
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use slidepush::engine::{Invocation, Launcher, ToolExit, ToolProcess};
use slidepush::fs::{FileSystem, StdFileSystem};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// What one launched tool does: stay running for `running_polls` polls, then
/// write `creates` and exit with `code`.
#[derive(Debug, Clone)]
pub struct Script {
    pub running_polls: u32,
    pub code: i32,
    pub creates: Vec<PathBuf>,
}

impl Script {
    pub fn ok(running_polls: u32, creates: Vec<PathBuf>) -> Self {
        Self {
            running_polls,
            code: 0,
            creates,
        }
    }

    pub fn fail(code: i32) -> Self {
        Self {
            running_polls: 0,
            code,
            creates: Vec::new(),
        }
    }

    pub fn hang() -> Self {
        Self {
            running_polls: u32::MAX,
            code: 0,
            creates: Vec::new(),
        }
    }
}

#[derive(Default)]
struct Shared {
    scripts: VecDeque<Script>,
    launched: Vec<Invocation>,
    killed: Vec<u32>,
}

#[derive(Clone, Default)]
pub struct FakeLauncher {
    shared: Rc<RefCell<Shared>>,
}

impl FakeLauncher {
    pub fn new(scripts: Vec<Script>) -> Self {
        let launcher = Self::default();
        launcher.shared.borrow_mut().scripts = scripts.into();
        launcher
    }

    pub fn launched(&self) -> Vec<Invocation> {
        self.shared.borrow().launched.clone()
    }

    pub fn killed(&self) -> usize {
        self.shared.borrow().killed.len()
    }
}

impl Launcher for FakeLauncher {
    fn launch(&self, invocation: &Invocation) -> Result<Box<dyn ToolProcess>> {
        let mut shared = self.shared.borrow_mut();
        shared.launched.push(invocation.clone());
        let script = shared
            .scripts
            .pop_front()
            .ok_or_else(|| anyhow!("spawning {}: No such file or directory", invocation.program))?;
        Ok(Box::new(FakeProcess {
            pid: 1000 + shared.launched.len() as u32,
            script,
            polls: 0,
            exited: None,
            shared: self.shared.clone(),
        }))
    }
}

struct FakeProcess {
    pid: u32,
    script: Script,
    polls: u32,
    exited: Option<ToolExit>,
    shared: Rc<RefCell<Shared>>,
}

impl ToolProcess for FakeProcess {
    fn id(&self) -> u32 {
        self.pid
    }

    fn try_wait(&mut self) -> Result<Option<ToolExit>> {
        if self.exited.is_some() {
            return Ok(self.exited);
        }
        if self.polls < self.script.running_polls {
            self.polls += 1;
            return Ok(None);
        }
        for path in &self.script.creates {
            std::fs::write(path, b"frame")?;
        }
        self.exited = Some(ToolExit {
            code: Some(self.script.code),
        });
        Ok(self.exited)
    }

    fn kill(&mut self) -> Result<()> {
        self.shared.borrow_mut().killed.push(self.pid);
        self.exited = Some(ToolExit { code: None });
        Ok(())
    }
}

/// Real filesystem that counts directory scans and can be told to fail
/// individual operations.
#[derive(Clone, Default)]
pub struct ScriptedFs {
    scans: Rc<Cell<usize>>,
    fail_scans: bool,
    fail_writable: bool,
    fail_copy: bool,
    fail_remove_file: bool,
    fail_remove_dir_all: bool,
}

impl ScriptedFs {
    pub fn failing_scans(mut self) -> Self {
        self.fail_scans = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.fail_writable = true;
        self
    }

    pub fn failing_copy(mut self) -> Self {
        self.fail_copy = true;
        self
    }

    pub fn failing_remove_file(mut self) -> Self {
        self.fail_remove_file = true;
        self
    }

    pub fn failing_remove_dir_all(mut self) -> Self {
        self.fail_remove_dir_all = true;
        self
    }

    pub fn scans(&self) -> usize {
        self.scans.get()
    }
}

impl FileSystem for ScriptedFs {
    fn exists(&self, path: &Path) -> bool {
        StdFileSystem.exists(path)
    }

    fn check_readable(&self, path: &Path) -> Result<()> {
        StdFileSystem.check_readable(path)
    }

    fn is_empty_dir(&self, path: &Path) -> Result<bool> {
        StdFileSystem.is_empty_dir(path)
    }

    fn check_writable(&self, path: &Path) -> Result<()> {
        if self.fail_writable {
            return Err(anyhow!("directory not writable: {}", path.display()));
        }
        StdFileSystem.check_writable(path)
    }

    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        self.scans.set(self.scans.get() + 1);
        if self.fail_scans {
            return Err(anyhow!("read_dir {}: Permission denied", dir.display()));
        }
        StdFileSystem.list_dir(dir)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        StdFileSystem.create_dir_all(path)
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        if self.fail_copy {
            return Err(anyhow!("copy {} -> {}: Permission denied", from.display(), to.display()));
        }
        StdFileSystem.copy(from, to)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        if self.fail_remove_file {
            return Err(anyhow!("remove_file {}: Permission denied", path.display()));
        }
        StdFileSystem.remove_file(path)
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        if self.fail_remove_dir_all {
            return Err(anyhow!("remove_dir_all {}: Permission denied", path.display()));
        }
        StdFileSystem.remove_dir_all(path)
    }
}

/// Writes a placeholder source document and returns its path.
pub fn source_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"document").expect("write source");
    path
}
