//! Heartbeat timing and the deadlines derived from it.
//!
//! All intervals hang off a single base value, `pong_wait`: the longest
//! silence tolerated from the peer. Pings go out every `pong_wait * 9 / 10`
//! so that a healthy peer always has a ping to answer before its silence
//! trips the read deadline.

use std::time::Duration;

use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

use crate::error::PolicyError;

pub const DEFAULT_PONG_WAIT: Duration = Duration::from_secs(2);
pub const DEFAULT_WRITE_WAIT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 512;
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// Timing and size limits enforced on one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatPolicy {
    pong_wait: Duration,
    ping_period: Duration,
    write_wait: Duration,
    max_message_size: usize,
}

impl HeartbeatPolicy {
    /// Builds a policy with the ping period derived from `pong_wait`.
    pub fn new(
        pong_wait: Duration,
        write_wait: Duration,
        max_message_size: usize,
    ) -> Result<Self, PolicyError> {
        let policy = Self {
            pong_wait,
            ping_period: pong_wait * 9 / 10,
            write_wait,
            max_message_size,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Replaces the derived ping period.
    pub fn with_ping_period(mut self, ping_period: Duration) -> Result<Self, PolicyError> {
        self.ping_period = ping_period;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.pong_wait.is_zero() {
            return Err(PolicyError::ZeroPongWait);
        }
        if self.ping_period.is_zero() {
            return Err(PolicyError::ZeroPingPeriod);
        }
        if self.ping_period >= self.pong_wait {
            return Err(PolicyError::PingPeriodTooLong {
                ping_period: self.ping_period,
                pong_wait: self.pong_wait,
            });
        }
        if self.write_wait.is_zero() {
            return Err(PolicyError::ZeroWriteWait);
        }
        if self.max_message_size == 0 {
            return Err(PolicyError::ZeroMessageSize);
        }
        Ok(())
    }

    pub fn pong_wait(&self) -> Duration {
        self.pong_wait
    }

    pub fn ping_period(&self) -> Duration {
        self.ping_period
    }

    pub fn write_wait(&self) -> Duration {
        self.write_wait
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Instant by which the next inbound frame must arrive.
    pub fn read_deadline(&self, now: Instant) -> Instant {
        now + self.pong_wait
    }

    /// Instant by which a write started at `now` must complete.
    pub fn write_deadline(&self, now: Instant) -> Instant {
        now + self.write_wait
    }

    /// Transport configuration that rejects frames above `max_message_size`.
    pub fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig::default()
            .max_message_size(Some(self.max_message_size))
            .max_frame_size(Some(self.max_message_size))
    }
}

impl Default for HeartbeatPolicy {
    fn default() -> Self {
        Self {
            pong_wait: DEFAULT_PONG_WAIT,
            ping_period: DEFAULT_PONG_WAIT * 9 / 10,
            write_wait: DEFAULT_WRITE_WAIT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}
