//! Node Process Management
//!
//! Spawns the node binary as a child process, waits for its query endpoint to
//! accept connections, and stops it with SIGTERM escalating to SIGKILL.
//! Stopping is synchronous and bounded so it can run from `Drop` during
//! test teardown.

use std::fs::OpenOptions;
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{HarnessError, HarnessResult};

/// Log lines quoted in setup failure messages
const LOG_TAIL_LINES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Starting,
    Ready,
    Stopped,
    Failed,
}

/// Everything needed to launch one node process
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub binary: PathBuf,
    pub args: Vec<String>,
    pub work_dir: PathBuf,
    /// Endpoint the node advertises; readiness is polled here
    pub query_addr: SocketAddr,
    pub env: Vec<(String, String)>,
    /// stdout and stderr are appended here
    pub log_path: PathBuf,
}

impl SpawnSpec {
    pub fn new(binary: impl Into<PathBuf>, work_dir: impl Into<PathBuf>, query_addr: SocketAddr) -> Self {
        let work_dir = work_dir.into();
        Self {
            binary: binary.into(),
            args: Vec::new(),
            log_path: work_dir.join("node.log"),
            work_dir,
            query_addr,
            env: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = path.into();
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(&self.args)
            .current_dir(&self.work_dir)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null());
        cmd
    }

    fn check_launchable(&self) -> HarnessResult<()> {
        let is_path = self
            .binary
            .parent()
            .map(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(false);
        if is_path && !self.binary.is_file() {
            return Err(HarnessError::spawn_failed(self.binary.display(), "binary not found"));
        }
        if !self.work_dir.is_dir() {
            return Err(HarnessError::spawn_failed(
                self.binary.display(),
                format!("working directory {} does not exist", self.work_dir.display()),
            ));
        }
        Ok(())
    }
}

/// A spawned node process. Dropping one that is still alive kills and reaps it.
pub struct NodeProcess {
    child: Child,
    pid: u32,
    binary: PathBuf,
    work_dir: PathBuf,
    query_addr: SocketAddr,
    log_path: PathBuf,
    status: NodeStatus,
    exit_status: Option<ExitStatus>,
    started_at: Instant,
}

impl std::fmt::Debug for NodeProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeProcess")
            .field("pid", &self.pid)
            .field("query_addr", &self.query_addr)
            .field("status", &self.status)
            .field("exit_status", &self.exit_status)
            .finish()
    }
}

impl NodeProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn query_addr(&self) -> SocketAddr {
        self.query_addr
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Check if the process is still running, reaping it if it exited
    pub fn is_running(&mut self) -> bool {
        self.poll_exit().is_none()
    }

    /// Last lines of the node log
    pub fn log_tail(&self, lines: usize) -> String {
        log_tail(&self.log_path, lines)
    }

    fn poll_exit(&mut self) -> Option<ExitStatus> {
        if self.exit_status.is_some() {
            return self.exit_status;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!("🏁 Node pid {} exited with {}", self.pid, status);
                self.exit_status = Some(status);
                self.exit_status
            }
            Ok(None) => None,
            Err(e) => {
                warn!("⚠️ Error checking node pid {} status: {}", self.pid, e);
                None
            }
        }
    }
}

impl Drop for NodeProcess {
    fn drop(&mut self) {
        if self.poll_exit().is_none() {
            warn!("🚨 Emergency cleanup: force killing node pid {}", self.pid);
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Spawns, readies and stops node processes
#[derive(Debug, Clone)]
pub struct ProcessController {
    /// Window in which an immediate exit counts as a spawn failure
    spawn_timeout: Duration,
    poll_interval: Duration,
    /// Time allowed between SIGTERM and SIGKILL
    grace_period: Duration,
    /// Time allowed for SIGKILL to take effect
    kill_timeout: Duration,
}

impl Default for ProcessController {
    fn default() -> Self {
        Self {
            spawn_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(50),
            grace_period: Duration::from_secs(5),
            kill_timeout: Duration::from_secs(2),
        }
    }
}

impl ProcessController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spawn_timeout(mut self, timeout: Duration) -> Self {
        self.spawn_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    pub fn with_kill_timeout(mut self, timeout: Duration) -> Self {
        self.kill_timeout = timeout;
        self
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Launch the node and make sure it survives the startup window
    pub async fn spawn(&self, spec: &SpawnSpec) -> HarnessResult<NodeProcess> {
        spec.check_launchable()?;

        let log_failure = |e: std::io::Error| {
            HarnessError::spawn_failed(
                spec.binary.display(),
                format!("cannot open log {}: {e}", spec.log_path.display()),
            )
        };
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&spec.log_path)
            .map_err(log_failure)?;
        let log_err = log.try_clone().map_err(log_failure)?;

        let mut cmd = spec.command();
        cmd.stdout(Stdio::from(log)).stderr(Stdio::from(log_err));

        let child = cmd
            .spawn()
            .map_err(|e| HarnessError::spawn_failed(spec.binary.display(), format!("failed to start: {e}")))?;
        let pid = child.id();

        info!(
            "🚀 Spawned {} (pid {}) in {} for {}",
            spec.binary.display(),
            pid,
            spec.work_dir.display(),
            spec.query_addr
        );

        let mut node = NodeProcess {
            child,
            pid,
            binary: spec.binary.clone(),
            work_dir: spec.work_dir.clone(),
            query_addr: spec.query_addr,
            log_path: spec.log_path.clone(),
            status: NodeStatus::Starting,
            exit_status: None,
            started_at: Instant::now(),
        };

        let deadline = Instant::now() + self.spawn_timeout;
        loop {
            if let Some(status) = node.poll_exit() {
                node.status = NodeStatus::Failed;
                return Err(HarnessError::spawn_failed(
                    node.binary.display(),
                    format!(
                        "exited with {status} during startup; log tail:\n{}",
                        node.log_tail(LOG_TAIL_LINES)
                    ),
                ));
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            sleep(self.poll_interval.min(deadline - now)).await;
        }

        Ok(node)
    }

    /// Poll the query endpoint until it accepts a connection
    pub async fn wait_ready(&self, node: &mut NodeProcess, timeout: Duration) -> HarnessResult<()> {
        let started = Instant::now();
        let addr = node.query_addr;
        debug!("⏳ Waiting up to {:?} for pid {} to serve {}", timeout, node.pid, addr);

        loop {
            if let Some(status) = node.poll_exit() {
                node.status = NodeStatus::Failed;
                return Err(HarnessError::NotReady {
                    addr,
                    pid: Some(node.pid),
                    waited: started.elapsed(),
                    reason: format!(
                        "process exited with {status} before serving; log tail:\n{}",
                        node.log_tail(LOG_TAIL_LINES)
                    ),
                });
            }

            let remaining = timeout.saturating_sub(started.elapsed());
            let connect_budget = remaining.clamp(Duration::from_millis(10), Duration::from_secs(1));
            if let Ok(Ok(_stream)) = tokio::time::timeout(connect_budget, TcpStream::connect(addr)).await {
                node.status = NodeStatus::Ready;
                info!("✅ Node pid {} ready on {} after {:?}", node.pid, addr, started.elapsed());
                return Ok(());
            }

            let waited = started.elapsed();
            if waited >= timeout {
                node.status = NodeStatus::Failed;
                return Err(HarnessError::NotReady {
                    addr,
                    pid: Some(node.pid),
                    waited,
                    reason: format!(
                        "endpoint never accepted a connection; log tail:\n{}",
                        node.log_tail(LOG_TAIL_LINES)
                    ),
                });
            }

            sleep(self.poll_interval).await;
        }
    }

    /// Stop the node. Idempotent.
    ///
    /// With `force` false sends SIGTERM, waits the grace period, then
    /// escalates to SIGKILL. With `force` true kills immediately. Blocks for
    /// at most grace period plus kill timeout.
    pub fn stop(&self, node: &mut NodeProcess, force: bool) -> HarnessResult<()> {
        if node.status == NodeStatus::Stopped {
            return Ok(());
        }
        if let Some(status) = node.poll_exit() {
            debug!("✅ Node pid {} already exited with {}", node.pid, status);
            node.status = NodeStatus::Stopped;
            return Ok(());
        }

        let pid = node.pid;
        if !force {
            match terminate_gracefully(node) {
                Ok(()) => {
                    debug!("📤 Sent SIGTERM to node pid {}", pid);
                    if self.wait_for_exit(node, self.grace_period) {
                        node.status = NodeStatus::Stopped;
                        info!("✅ Node pid {} terminated gracefully after {:?} uptime", pid, node.uptime());
                        return Ok(());
                    }
                    warn!(
                        "🔨 Node pid {} didn't respond to SIGTERM within {:?}, using SIGKILL",
                        pid, self.grace_period
                    );
                }
                Err(e) => warn!("⚠️ Failed to terminate node pid {} gracefully: {}", pid, e),
            }
        }

        if let Err(e) = node.child.kill() {
            if node.poll_exit().is_none() {
                node.status = NodeStatus::Failed;
                return Err(HarnessError::StopFailed {
                    pid,
                    reason: format!("SIGKILL failed: {e}"),
                });
            }
        }

        if self.wait_for_exit(node, self.kill_timeout) {
            node.status = NodeStatus::Stopped;
            info!("🔨 Node pid {} force killed", pid);
            Ok(())
        } else {
            node.status = NodeStatus::Failed;
            Err(HarnessError::StopFailed {
                pid,
                reason: format!("still running {:?} after SIGKILL", self.kill_timeout),
            })
        }
    }

    /// Run a short-lived node command (such as `init`) to completion.
    ///
    /// Output is appended to the `SpawnSpec` log path; a non-zero exit or a
    /// timeout is a spawn failure.
    pub async fn run_to_completion(&self, spec: &SpawnSpec, timeout: Duration) -> HarnessResult<Output> {
        spec.check_launchable()?;

        let mut cmd = tokio::process::Command::from(spec.command());
        cmd.kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(HarnessError::spawn_failed(
                    spec.binary.display(),
                    format!("failed to run {:?}: {e}", spec.args),
                ))
            }
            Err(_) => {
                return Err(HarnessError::spawn_failed(
                    spec.binary.display(),
                    format!("{:?} did not finish within {:?}", spec.args, timeout),
                ))
            }
        };

        if let Ok(mut log) = OpenOptions::new().create(true).append(true).open(&spec.log_path) {
            let _ = log.write_all(&output.stdout);
            let _ = log.write_all(&output.stderr);
        }

        if !output.status.success() {
            return Err(HarnessError::spawn_failed(
                spec.binary.display(),
                format!(
                    "{:?} exited with {}: {}",
                    spec.args,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        debug!("✅ {} {:?} completed", spec.binary.display(), spec.args);
        Ok(output)
    }

    fn wait_for_exit(&self, node: &mut NodeProcess, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        loop {
            if node.poll_exit().is_some() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(self.poll_interval);
        }
    }
}

#[cfg(unix)]
fn terminate_gracefully(node: &mut NodeProcess) -> HarnessResult<()> {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    signal::kill(Pid::from_raw(node.pid as i32), Signal::SIGTERM).map_err(|e| HarnessError::StopFailed {
        pid: node.pid,
        reason: format!("SIGTERM failed: {e}"),
    })
}

#[cfg(not(unix))]
fn terminate_gracefully(node: &mut NodeProcess) -> HarnessResult<()> {
    node.child.kill().map_err(HarnessError::from)
}

/// Last `lines` lines of a log file, or a placeholder when it is empty or unreadable
pub fn log_tail(path: &Path, lines: usize) -> String {
    let Ok(bytes) = std::fs::read(path) else {
        return format!("<no log at {}>", path.display());
    };
    let text = String::from_utf8_lossy(&bytes);
    let all: Vec<&str> = text.lines().collect();
    if all.is_empty() {
        return "<empty log>".to_string();
    }
    all[all.len().saturating_sub(lines)..].join("\n")
}
