//! Test Fixture
//!
//! A per-test value bundling one node process, its query connection and the
//! cleanup stack that releases them. Teardown runs from `teardown()` or from
//! `Drop`, so it happens whether the test passes, fails or panics.
//!
//! State machine: `Uninitialized → Starting → Ready → TornDown`, with
//! `Starting → TornDown` on setup failure and `Uninitialized → TornDown` when
//! torn down before start. Nothing leaves `TornDown`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::FixtureConfig;
use crate::connection::QueryConnection;
use crate::error::{HarnessError, HarnessResult};
use crate::runtime::{reserve_port, CleanupReport, CleanupStack, NodeProcess, ProcessController, SpawnSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureState {
    Uninitialized,
    Starting,
    Ready,
    TornDown,
}

/// Describes the running node
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub pid: u32,
    pub home: PathBuf,
    pub work_dir: PathBuf,
    pub query_addr: SocketAddr,
    pub log_path: PathBuf,
}

pub struct Fixture {
    id: Uuid,
    config: FixtureConfig,
    controller: ProcessController,
    state: FixtureState,
    work_dir: PathBuf,
    home: PathBuf,
    query_addr: SocketAddr,
    node: Option<Arc<Mutex<NodeProcess>>>,
    info: Option<NodeInfo>,
    conn: Option<QueryConnection>,
    cleanup: CleanupStack,
}

impl std::fmt::Debug for Fixture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fixture")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("work_dir", &self.work_dir)
            .field("query_addr", &self.query_addr)
            .field("node", &self.info)
            .finish()
    }
}

impl Fixture {
    /// Allocate a private work dir and query port for one node
    pub fn new(config: FixtureConfig) -> HarnessResult<Self> {
        config.validate()?;

        let id = Uuid::new_v4();
        let mut cleanup = CleanupStack::new();

        let dir = tempfile::Builder::new()
            .prefix(&format!("harness-{id}-"))
            .tempdir()?;
        let work_dir = dir.path().to_path_buf();
        let removed = work_dir.display().to_string();
        cleanup.push(format!("remove work dir {removed}"), move || {
            dir.close()?;
            Ok(())
        });

        let lease = reserve_port()?;
        let query_addr = lease.addr();
        cleanup.push(format!("release port {}", lease.port()), move || {
            drop(lease);
            Ok(())
        });

        info!("🧪 Fixture {} prepared in {} for {}", id, work_dir.display(), query_addr);

        Ok(Self {
            id,
            controller: config.controller(),
            config,
            state: FixtureState::Uninitialized,
            home: work_dir.join("home"),
            work_dir,
            query_addr,
            node: None,
            info: None,
            conn: None,
            cleanup,
        })
    }

    /// Launch the node and wait until its query endpoint is serving.
    ///
    /// On failure everything acquired so far is released before the error
    /// is returned and the fixture is torn down.
    pub async fn start(&mut self) -> HarnessResult<NodeInfo> {
        match self.state {
            FixtureState::Uninitialized => {}
            state => {
                return Err(HarnessError::invalid_state(format!(
                    "cannot start fixture {} in state {:?}",
                    self.id, state
                )))
            }
        }
        self.state = FixtureState::Starting;

        let node = match self.launch().await {
            Ok(node) => node,
            Err(e) => {
                warn!("❌ Fixture {} setup failed: {}", self.id, e);
                self.teardown();
                return Err(e);
            }
        };

        let info = NodeInfo {
            pid: node.pid(),
            home: self.home.clone(),
            work_dir: self.work_dir.clone(),
            query_addr: self.query_addr,
            log_path: node.log_path().to_path_buf(),
        };

        let node = Arc::new(Mutex::new(node));
        let handle = Arc::clone(&node);
        let controller = self.controller.clone();
        self.cleanup.push(format!("stop node pid {}", info.pid), move || {
            let mut node = handle
                .lock()
                .map_err(|_| HarnessError::invalid_state("node handle poisoned"))?;
            controller.stop(&mut node, false)
        });

        self.node = Some(node);
        self.info = Some(info.clone());
        self.state = FixtureState::Ready;
        info!("✅ Fixture {} ready: pid {} on {}", self.id, info.pid, info.query_addr);
        Ok(info)
    }

    async fn launch(&self) -> HarnessResult<NodeProcess> {
        if self.config.init_home {
            let init = self.spawn_spec(self.config.init_args(&self.home));
            self.controller
                .run_to_completion(&init, self.config.ready_timeout)
                .await?;
        }

        let spec = self.spawn_spec(self.config.start_args(&self.home, self.query_addr));
        let mut node = self.controller.spawn(&spec).await?;

        if let Err(e) = self.controller.wait_ready(&mut node, self.config.ready_timeout).await {
            if let Err(stop_err) = self.controller.stop(&mut node, true) {
                warn!("⚠️ Could not stop unready node pid {}: {}", node.pid(), stop_err);
            }
            return Err(e);
        }
        Ok(node)
    }

    fn spawn_spec(&self, args: Vec<String>) -> SpawnSpec {
        self.config.env.iter().fold(
            SpawnSpec::new(&self.config.binary, &self.work_dir, self.query_addr).args(args),
            |spec, (key, value)| spec.env(key.clone(), value.clone()),
        )
    }

    /// Connection to the node's query endpoint.
    ///
    /// Opened on first use; later calls return handles to the same session
    /// while it is usable. A closed or broken session is replaced. A connect
    /// failure tears the fixture down.
    pub async fn query_conn(&mut self) -> HarnessResult<QueryConnection> {
        if self.state != FixtureState::Ready {
            return Err(HarnessError::invalid_state(format!(
                "query connection requires a ready fixture, {} is {:?}",
                self.id, self.state
            )));
        }
        if let Some(conn) = self.conn.take() {
            if conn.is_usable() {
                self.conn = Some(conn.clone());
                return Ok(conn);
            }
            if !conn.is_closed() {
                warn!("♻️ Fixture {} replacing broken query connection", self.id);
                conn.close()?;
            }
        }

        let conn = match QueryConnection::open(self.query_addr, self.config.connect_options()).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("❌ Fixture {} could not connect: {}", self.id, e);
                self.teardown();
                return Err(e);
            }
        };

        let handle = conn.clone();
        self.cleanup
            .push(format!("close query connection to {}", self.query_addr), move || handle.close());
        self.conn = Some(conn.clone());
        Ok(conn)
    }

    /// Stop the node now. The automatic cleanup stays safe to run afterwards.
    pub fn stop_node(&self, force: bool) -> HarnessResult<()> {
        let node = self
            .node
            .as_ref()
            .ok_or_else(|| HarnessError::invalid_state(format!("fixture {} has no node", self.id)))?;
        let mut node = node
            .lock()
            .map_err(|_| HarnessError::invalid_state("node handle poisoned"))?;
        self.controller.stop(&mut node, force)
    }

    /// Release everything the fixture holds. Runs once; later calls return an empty report.
    pub fn teardown(&mut self) -> CleanupReport {
        if self.state == FixtureState::TornDown {
            return CleanupReport::default();
        }
        self.state = FixtureState::TornDown;
        self.conn = None;

        let report = self.cleanup.run();
        if report.is_clean() {
            info!("🧹 Fixture {} torn down ({} actions)", self.id, report.ran.len());
        } else {
            warn!(
                "⚠️ Fixture {} torn down with {} failed actions",
                self.id,
                report.failures.len()
            );
        }
        report
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> FixtureState {
        self.state
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn query_addr(&self) -> SocketAddr {
        self.query_addr
    }

    pub fn node(&self) -> Option<&NodeInfo> {
        self.info.as_ref()
    }

    pub fn config(&self) -> &FixtureConfig {
        &self.config
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        self.teardown();
    }
}
