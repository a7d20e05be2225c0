//! Runtime configuration of the datagram service.
use crate::protocol::transport::{ALIAS_RESOLUTION_TIMEOUT_MS, DATAGRAM_RESPONSE_TIMEOUT_MS};
use embassy_time::Duration;

/// Timeouts applied by every send flow of a [`DatagramSupport`](super::support::DatagramSupport).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatagramConfig {
    /// Wait for Datagram OK / Rejected after the last frame went out.
    pub response_timeout: Duration,
    /// Budget for resolving a destination alias (AME, then Verify Node ID at half time).
    pub alias_resolution_timeout: Duration,
}

impl Default for DatagramConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_millis(DATAGRAM_RESPONSE_TIMEOUT_MS as u64),
            alias_resolution_timeout: Duration::from_millis(ALIAS_RESOLUTION_TIMEOUT_MS as u64),
        }
    }
}

impl DatagramConfig {
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_alias_resolution_timeout(mut self, timeout: Duration) -> Self {
        self.alias_resolution_timeout = timeout;
        self
    }

    /// Response timeout in the unit taken by `LcbTimer::delay_ms`.
    pub(crate) fn response_timeout_ms(&self) -> u32 {
        saturating_ms(self.response_timeout)
    }

    pub(crate) fn alias_resolution_timeout_ms(&self) -> u32 {
        saturating_ms(self.alias_resolution_timeout)
    }
}

fn saturating_ms(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}
