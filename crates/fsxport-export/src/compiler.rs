//! External model compiler integration
//!
//! XToMdl turns the scene file into a `.MDL`. The tools are opaque
//! executables from the simulator SDK, so the contract is only the command
//! line, the exit status and the artifact they leave on disk.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use fsxport_core::naming::replace_extension;
use fsxport_core::{Error, ExportConfig, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Inputs of one model compilation
#[derive(Debug, Clone, PartialEq)]
pub struct CompileRequest {
    /// Scene file to compile
    pub scene_path: PathBuf,
    /// Animation dictionary, passed as `/DICT:`
    pub modeldef: Option<PathBuf>,
    /// Compile the `.xanim` next to the scene file
    pub animation: bool,
    /// Pass `/WRITETOFILE`
    pub write_to_file: bool,
    /// Pass `/XMLSAMPLE`
    pub xml_sample: bool,
}

impl CompileRequest {
    /// Request matching an export configuration
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            scene_path: config.output_path.clone(),
            modeldef: config.modeldef_path.clone(),
            animation: config.export_animation,
            write_to_file: config.compiler.write_to_file,
            xml_sample: config.compiler.xml_sample,
        }
    }

    /// Where the compiler leaves the model
    pub fn artifact_path(&self) -> PathBuf {
        replace_extension(&self.scene_path, ".MDL")
    }
}

/// Result of a tool run that did not fail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompileOutcome {
    /// Artifact written with nonzero size
    Compiled {
        /// Produced file
        artifact: PathBuf,
        /// Its size in bytes
        size: u64,
    },
    /// Tool was killed after its time budget, earlier artifacts are kept
    TimedOut {
        /// Tool name
        tool: String,
        /// Budget in seconds
        seconds: u64,
    },
}

impl CompileOutcome {
    /// Produced file, if any
    pub fn artifact(&self) -> Option<&Path> {
        match self {
            CompileOutcome::Compiled { artifact, .. } => Some(artifact),
            CompileOutcome::TimedOut { .. } => None,
        }
    }

    /// Whether the tool ran out of time
    pub fn is_timeout(&self) -> bool {
        matches!(self, CompileOutcome::TimedOut { .. })
    }
}

/// Compiles a written scene into a binary model
pub trait ModelCompiler {
    /// Run the compilation described by `request`
    fn compile(&self, request: &CompileRequest) -> Result<CompileOutcome>;
}

/// How a tool process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolRun {
    /// Exited on its own
    Finished(ExitStatus),
    /// Killed after the time budget
    TimedOut,
}

/// An SDK executable run with a time budget
#[derive(Debug, Clone)]
pub struct ToolProcess {
    name: String,
    executable: PathBuf,
    timeout: Duration,
}

impl ToolProcess {
    /// Tool `name` at `executable`
    pub fn new(name: impl Into<String>, executable: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            executable: executable.into(),
            timeout,
        }
    }

    /// Tool name used in logs and errors
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Executable path
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Time budget
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run with `args`, killing the process once the budget is spent
    ///
    /// Console output is captured and logged at debug level.
    pub fn run(&self, args: &[OsString]) -> Result<ToolRun> {
        if !self.executable.is_file() {
            return Err(Error::ToolNotFound(self.executable.clone()));
        }
        tracing::info!(tool = %self.name, executable = %self.executable.display(), ?args, "starting tool");

        let mut child = Command::new(&self.executable)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::tool_failed(&self.name, format!("could not start: {e}")))?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        let run = self.wait(&mut child)?;

        for (stream, handle) in [("stdout", stdout), ("stderr", stderr)] {
            let text = handle.and_then(|h| h.join().ok()).unwrap_or_default();
            for line in text.lines().filter(|l| !l.trim().is_empty()) {
                tracing::debug!(tool = %self.name, stream, "{line}");
            }
        }
        Ok(run)
    }

    fn wait(&self, child: &mut Child) -> Result<ToolRun> {
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                tracing::debug!(tool = %self.name, ?status, elapsed = ?started.elapsed(), "tool finished");
                return Ok(ToolRun::Finished(status));
            }
            if started.elapsed() >= self.timeout {
                tracing::warn!(tool = %self.name, timeout = ?self.timeout, "tool timed out, killing it");
                child.kill()?;
                child.wait()?;
                return Ok(ToolRun::TimedOut);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Turn a run into an outcome by checking the artifact it should leave
    ///
    /// A failed run or a missing or empty artifact is an error. An empty
    /// artifact is deleted first.
    pub fn outcome(&self, run: ToolRun, artifact: &Path) -> Result<CompileOutcome> {
        match run {
            ToolRun::TimedOut => Ok(CompileOutcome::TimedOut {
                tool: self.name.clone(),
                seconds: self.timeout.as_secs(),
            }),
            ToolRun::Finished(status) => {
                let size = std::fs::metadata(artifact).map(|m| m.len()).unwrap_or(0);
                if status.success() && size > 0 {
                    tracing::info!(tool = %self.name, artifact = %artifact.display(), size, "tool succeeded");
                    return Ok(CompileOutcome::Compiled {
                        artifact: artifact.to_path_buf(),
                        size,
                    });
                }
                if artifact.exists() && size == 0 {
                    if let Err(e) = std::fs::remove_file(artifact) {
                        tracing::warn!(artifact = %artifact.display(), error = %e, "could not remove empty artifact");
                    }
                }
                let message = if status.success() {
                    format!("no usable {} was produced", artifact.display())
                } else {
                    format!("exited with {status}")
                };
                Err(Error::tool_failed(&self.name, message))
            }
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<thread::JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut bytes = Vec::new();
            // partial output is still worth logging
            let _ = pipe.read_to_end(&mut bytes);
            String::from_utf8_lossy(&bytes).into_owned()
        })
    })
}

/// The SDK's XToMdl compiler
#[derive(Debug, Clone)]
pub struct XToMdl {
    process: ToolProcess,
}

impl XToMdl {
    /// Compiler at `executable`
    pub fn new(executable: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            process: ToolProcess::new("XToMdl", executable, timeout),
        }
    }

    /// Compiler located through the configuration
    pub fn from_config(config: &ExportConfig) -> Result<Self> {
        let executable = config.compiler.xtomdl(config.sdk).ok_or_else(|| Error::MissingConfig {
            key: "compiler.sdk_root".to_string(),
        })?;
        Ok(Self::new(executable, Duration::from_secs(config.compiler.timeout_secs)))
    }

    /// Command line for `request`
    pub fn arguments(request: &CompileRequest) -> Vec<OsString> {
        let mut args = Vec::new();
        if request.animation {
            args.push(OsString::from("/XANIM"));
        }
        if request.write_to_file {
            args.push(OsString::from("/WRITETOFILE"));
        }
        if let Some(modeldef) = &request.modeldef {
            let mut dict = OsString::from("/DICT:");
            dict.push(modeldef.as_os_str());
            args.push(dict);
        }
        if request.xml_sample {
            args.push(OsString::from("/XMLSAMPLE"));
        }
        args.push(request.scene_path.clone().into_os_string());
        args
    }

    /// Underlying process
    pub fn process(&self) -> &ToolProcess {
        &self.process
    }
}

impl ModelCompiler for XToMdl {
    fn compile(&self, request: &CompileRequest) -> Result<CompileOutcome> {
        let run = self.process.run(&Self::arguments(request))?;
        self.process.outcome(run, &request.artifact_path())
    }
}
