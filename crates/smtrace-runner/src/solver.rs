//! External solver invocation with a wall-clock limit

use smtrace_core::SmtraceError;
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// How long to wait for the pipes to close once the solver has exited
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// How to run the solver on one problem.
///
/// The command line is
/// `<program> -T:<secs> trace=true trace_file_name=<log> <extra args> <problem>`.
/// The solver enforces `timeout` itself; the process is killed if it is
/// still alive `kill_grace` later. On unix the solver gets its own process
/// group and the whole group is killed, so wrapper scripts cannot leave a
/// running solver behind.
#[derive(Debug, Clone)]
pub struct SolverCommand {
    program: PathBuf,
    timeout: Duration,
    kill_grace: Duration,
    extra_args: Vec<String>,
}

/// Result of one solver process
#[derive(Debug, Clone)]
pub struct SolverRun {
    /// `None` if the process was killed by a signal
    pub exit_code: Option<i32>,
    /// First non-empty line of stdout, usually `sat`, `unsat`, `unknown` or `timeout`
    pub first_line: Option<String>,
    pub stderr: String,
    pub elapsed: Duration,
    pub killed: bool,
}

impl SolverRun {
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        !self.killed && matches!(self.exit_code, Some(0))
    }

    /// Short human readable reason when the run did not succeed
    #[must_use]
    pub fn failure_reason(&self) -> Option<String> {
        if self.killed {
            return Some(format!(
                "killed after {:.1}s",
                self.elapsed.as_secs_f32()
            ));
        }
        match self.exit_code {
            Some(0) => None,
            Some(code) => {
                let detail = self
                    .stderr
                    .lines()
                    .chain(self.first_line.as_deref())
                    .find(|l| !l.trim().is_empty())
                    .unwrap_or("no output");
                Some(format!("exit code {code}: {}", detail.trim()))
            }
            None => Some("terminated by signal".to_string()),
        }
    }
}

impl SolverCommand {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: Duration::from_secs(10),
            kill_grace: Duration::from_secs(5),
            extra_args: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    #[must_use]
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whole seconds passed to `-T:`, at least one
    fn timeout_secs(&self) -> u64 {
        let secs = self.timeout.as_secs();
        if self.timeout.subsec_nanos() > 0 || secs == 0 {
            secs + 1
        } else {
            secs
        }
    }

    #[must_use]
    pub fn args_for(&self, problem: &Path, log: &Path) -> Vec<OsString> {
        let mut trace_file = OsString::from("trace_file_name=");
        trace_file.push(log);

        let mut args = vec![
            OsString::from(format!("-T:{}", self.timeout_secs())),
            OsString::from("trace=true"),
            trace_file,
        ];
        args.extend(self.extra_args.iter().map(OsString::from));
        args.push(problem.as_os_str().to_os_string());
        args
    }

    /// Run the solver on `problem`, writing its trace to `log`
    ///
    /// # Errors
    ///
    /// Returns `SmtraceError::SolverSpawn` if the process cannot be started
    /// or waited on. A solver that runs but fails is not an error; inspect
    /// the returned `SolverRun`.
    pub fn run(&self, problem: &Path, log: &Path) -> Result<SolverRun, SmtraceError> {
        let spawn_err = |source| SmtraceError::SolverSpawn {
            program: self.program.clone(),
            source,
        };

        let mut command = Command::new(&self.program);
        command
            .args(self.args_for(problem, log))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let started = Instant::now();
        let mut child = command.spawn().map_err(spawn_err)?;

        // Drain both pipes so a chatty solver cannot block on a full buffer
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = self.timeout + self.kill_grace;
        let (status, killed) =
            wait_with_deadline(&mut child, started, deadline).map_err(spawn_err)?;
        // Background children of a wrapper would keep the pipes open
        if let Err(err) = kill_group(&mut child) {
            tracing::debug!("cleaning up after {}: {err}", self.program.display());
        }

        let drain_deadline = Instant::now() + DRAIN_TIMEOUT;
        let stdout = collect(&stdout, drain_deadline, "stdout");
        let stderr = collect(&stderr, drain_deadline, "stderr");
        let elapsed = started.elapsed();

        let first_line = stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string);

        if killed {
            tracing::warn!(
                "{} did not stop within {:.1}s on {}, killed",
                self.program.display(),
                deadline.as_secs_f32(),
                problem.display()
            );
        }

        Ok(SolverRun {
            exit_code: status.code(),
            first_line,
            stderr,
            elapsed,
            killed,
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            // A read error only loses diagnostics output
            let _ = pipe.read_to_end(&mut buf);
        }
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

/// Output read so far, or nothing if the pipe is still held open at `deadline`
fn collect(rx: &mpsc::Receiver<String>, deadline: Instant, name: &str) -> String {
    let wait = deadline.saturating_duration_since(Instant::now());
    rx.recv_timeout(wait).unwrap_or_else(|_| {
        tracing::warn!("solver {name} still open after exit, output dropped");
        String::new()
    })
}

#[cfg(unix)]
fn kill_group(child: &mut Child) -> std::io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(pgid) = i32::try_from(child.id()) else {
        return child.kill();
    };
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        // Nothing left in the group
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) -> std::io::Result<()> {
    child.kill()
}

fn wait_with_deadline(
    child: &mut Child,
    started: Instant,
    deadline: Duration,
) -> std::io::Result<(ExitStatus, bool)> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status, false));
        }
        if started.elapsed() >= deadline {
            kill_group(child)?;
            let status = child.wait()?;
            return Ok((status, true));
        }
        thread::sleep(POLL_INTERVAL);
    }
}
