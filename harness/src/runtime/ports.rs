//! Localhost port reservation
//!
//! Ports come from the OS ephemeral range (bind to port 0) and are tracked in
//! a process-wide reservation set until their lease drops, so fixtures running
//! in parallel inside one test binary never receive the same port.

use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::sync::{Mutex, OnceLock};
use tracing::debug;

use crate::error::{HarnessError, HarnessResult};

const MAX_ATTEMPTS: usize = 64;

fn reserved() -> &'static Mutex<HashSet<u16>> {
    static RESERVED: OnceLock<Mutex<HashSet<u16>>> = OnceLock::new();
    RESERVED.get_or_init(|| Mutex::new(HashSet::new()))
}

/// A reserved localhost port, released on drop
#[derive(Debug)]
pub struct PortLease {
    port: u16,
}

impl PortLease {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, self.port))
    }
}

impl Drop for PortLease {
    fn drop(&mut self) {
        if let Ok(mut set) = reserved().lock() {
            set.remove(&self.port);
        }
        debug!("🔓 Released port {}", self.port);
    }
}

/// Reserve a free localhost port
pub fn reserve_port() -> HarnessResult<PortLease> {
    for _ in 0..MAX_ATTEMPTS {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
        let port = listener.local_addr()?.port();
        drop(listener);

        let mut set = reserved()
            .lock()
            .map_err(|_| HarnessError::invalid_state("port reservation set poisoned"))?;
        if set.insert(port) {
            debug!("🔒 Reserved port {}", port);
            return Ok(PortLease { port });
        }
    }

    Err(HarnessError::config(format!(
        "no free localhost port after {MAX_ATTEMPTS} attempts"
    )))
}

/// Whether `port` is currently leased in this process
pub fn is_reserved(port: u16) -> bool {
    reserved().lock().map(|set| set.contains(&port)).unwrap_or(false)
}
