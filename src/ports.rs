//! Port assignment and reserved-port preflight.
//!
//! Every selected target gets `base_port + ordinal_index`. Before any
//! bundler starts, the two reserved ports (the bundling base port and the
//! status port) are probed; a port that is already bound aborts the whole
//! run. Partial startup with some targets silently unreachable is worse
//! than refusing to start.

use std::io::ErrorKind;
use std::net::{Ipv4Addr, TcpListener};
use thiserror::Error;

/// Fixed port for the status endpoint.
pub const STATUS_PORT: u16 = 7117;

#[derive(Debug, Error)]
pub enum PortError {
    #[error("reserved port {0} is already in use")]
    ReservedPortBound(u16),
}

/// Port for the target at the given ordinal index.
#[inline]
pub fn port_for(base_port: u16, index: usize) -> u16 {
    base_port.saturating_add(index as u16)
}

/// Probe the reserved ports on the loopback interface.
///
/// A definite `AddrInUse` is fatal. A probe that errors for any other
/// reason cannot tell us the port is taken, so it is logged and skipped.
pub fn preflight(reserved: &[u16]) -> Result<(), PortError> {
    for &port in reserved {
        match TcpListener::bind((Ipv4Addr::LOCALHOST, port)) {
            Ok(listener) => drop(listener),
            Err(e) if e.kind() == ErrorKind::AddrInUse => {
                return Err(PortError::ReservedPortBound(port));
            }
            Err(e) => {
                crate::log!("warning"; "port {} probe failed ({}), skipping check", port, e);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_for_is_base_plus_index() {
        for i in 0..16 {
            assert_eq!(port_for(1200, i), 1200 + i as u16);
        }
    }

    #[test]
    fn test_ports_pairwise_distinct() {
        let ports: Vec<u16> = (0..8).map(|i| port_for(1200, i)).collect();
        for (a, pa) in ports.iter().enumerate() {
            for (b, pb) in ports.iter().enumerate() {
                assert_eq!(a == b, pa == pb);
            }
        }
    }

    #[test]
    fn test_preflight_free_ports() {
        // Ephemeral-range ports that are almost certainly free
        assert!(preflight(&[49371, 49372]).is_ok());
    }

    #[test]
    fn test_preflight_detects_bound_port() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();

        let err = preflight(&[port]).unwrap_err();
        assert!(matches!(err, PortError::ReservedPortBound(p) if p == port));
    }
}
