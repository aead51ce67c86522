//! Command executors - the only boundary to the operating environment
//!
//! Resources never spawn processes themselves. They describe an
//! [`Invocation`] and hand it to a [`CommandExecutor`], which makes the
//! exact command sequence of an apply observable in tests.

use crate::error::{Error, Result};
use crate::types::{CommandOutput, Invocation};
use std::process::{Command, Stdio};
use std::sync::{Mutex, MutexGuard};

/// Capability to run an external command
pub trait CommandExecutor: Send + Sync {
    /// Run a command and capture its output
    ///
    /// A non-zero exit is reported through [`CommandOutput::success`], not as
    /// an error. Errors mean the command could not be run at all.
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;

    /// Run a command and fail with [`Error::CommandFailed`] on non-zero exit
    fn run_checked(&self, invocation: &Invocation) -> Result<CommandOutput> {
        let output = self.run(invocation)?;
        if !output.success {
            return Err(Error::CommandFailed {
                command: invocation.to_string(),
                stderr: output.stderr_str().trim().to_string(),
            });
        }
        Ok(output)
    }
}

/// Executor that spawns OS processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl CommandExecutor for SystemExecutor {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        log::debug!("Running: {invocation}");

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args).stdin(Stdio::null());
        if let Some(dir) = &invocation.dir {
            command.current_dir(dir);
        }

        let output = command.output().map_err(|source| Error::Spawn {
            command: invocation.to_string(),
            source,
        })?;

        Ok(output.into())
    }
}

type Responder = Box<dyn Fn(&Invocation) -> Result<CommandOutput> + Send + Sync>;

/// Executor that records every invocation instead of running it
///
/// Each call is logged and then answered by the responder, which by default
/// reports success with empty output.
///
/// ```
/// use applykit::{CommandExecutor, Invocation, RecordingExecutor};
///
/// let exec = RecordingExecutor::new();
/// exec.run(&Invocation::new("zip").args(["-r", "out.zip", "."])).unwrap();
/// assert_eq!(exec.argvs(), vec![vec!["zip", "-r", "out.zip", "."]]);
/// ```
pub struct RecordingExecutor {
    calls: Mutex<Vec<Invocation>>,
    responder: Responder,
}

impl RecordingExecutor {
    /// Recorder that answers every call with success
    pub fn new() -> Self {
        Self::with_responder(|_| Ok(CommandOutput::succeeded()))
    }

    /// Recorder that answers each call with `responder`
    ///
    /// The call is recorded before the responder runs, so a responder may
    /// inspect files the invocation points at while they still exist.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&Invocation) -> Result<CommandOutput> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        }
    }

    /// Recorder where every call to `program` exits non-zero with `stderr`
    pub fn failing_on(program: &str, stderr: &str) -> Self {
        let program = program.to_string();
        let stderr = stderr.to_string();
        Self::with_responder(move |inv| {
            if inv.program == program {
                Ok(CommandOutput::failed(stderr.clone()))
            } else {
                Ok(CommandOutput::succeeded())
            }
        })
    }

    /// All recorded invocations in call order
    pub fn calls(&self) -> Vec<Invocation> {
        self.lock().clone()
    }

    /// Recorded invocations as `argv` vectors
    pub fn argvs(&self) -> Vec<Vec<String>> {
        self.lock().iter().map(Invocation::argv).collect()
    }

    pub fn call_count(&self) -> usize {
        self.lock().len()
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Invocation>> {
        match self.calls.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for RecordingExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RecordingExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingExecutor")
            .field("calls", &self.call_count())
            .finish_non_exhaustive()
    }
}

impl CommandExecutor for RecordingExecutor {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        self.lock().push(invocation.clone());
        (self.responder)(invocation)
    }
}
