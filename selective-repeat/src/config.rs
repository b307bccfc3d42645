//! Protocol operating envelope.
//!
//! Both peers must agree on the same [`ProtocolConfig`]: the window size, the
//! modulus used for sequence-number arithmetic, and the retransmission
//! timeout.  Selective Repeat only distinguishes a new packet from a
//! previous-cycle duplicate when `seq_space >= 2 * window_size`, so the
//! validated constructor refuses anything smaller.

use std::time::Duration;

use thiserror::Error;

use crate::packet::NOT_IN_USE;

/// Maximum number of unacknowledged (sender) or buffered (receiver) packets.
pub const WINDOW_SIZE: usize = 6;

/// Modulus for sequence numbers in the reference configuration.
pub const SEQ_SPACE: u32 = 12;

/// Retransmission timeout in the reference configuration (16 time units).
pub const TIMEOUT: Duration = Duration::from_millis(16);

/// Window size, sequence space and retransmission timeout shared by both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Number of slots in the send and receive buffers.
    pub window_size: usize,
    /// Sequence numbers live in `0..seq_space`.
    pub seq_space: u32,
    /// Delay before the sender's single timer fires.
    pub timeout: Duration,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            window_size: WINDOW_SIZE,
            seq_space: SEQ_SPACE,
            timeout: TIMEOUT,
        }
    }
}

impl ProtocolConfig {
    /// Build a validated configuration.
    pub fn new(window_size: usize, seq_space: u32, timeout: Duration) -> Result<Self, ConfigError> {
        let config = Self {
            window_size,
            seq_space,
            timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Convert a timeout given in milliseconds, as read from a command line.
    ///
    /// Rejects values that are not positive or do not fit in a [`Duration`].
    pub fn timeout_from_millis(millis: f64) -> Result<Duration, ConfigError> {
        if millis.is_nan() || millis <= 0.0 {
            return Err(ConfigError::InvalidTimeout(millis));
        }
        Duration::try_from_secs_f64(millis / 1000.0).map_err(|_| ConfigError::InvalidTimeout(millis))
    }

    /// Check the Selective Repeat constraints on an existing configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.seq_space >= NOT_IN_USE {
            return Err(ConfigError::SeqSpaceTooLarge(self.seq_space));
        }
        // u64 so a huge window cannot overflow the doubling.
        if u64::from(self.seq_space) < 2 * self.window_size as u64 {
            return Err(ConfigError::SeqSpaceTooSmall {
                seq_space: self.seq_space,
                window_size: self.window_size,
            });
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Reasons a [`ProtocolConfig`] is rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("window size must be at least 1")]
    ZeroWindow,
    #[error("sequence space {seq_space} is smaller than twice the window size {window_size}")]
    SeqSpaceTooSmall { seq_space: u32, window_size: usize },
    #[error("sequence space {0} collides with the unused-field marker")]
    SeqSpaceTooLarge(u32),
    #[error("retransmission timeout must be non-zero")]
    ZeroTimeout,
    #[error("timeout of {0} ms is not a usable duration")]
    InvalidTimeout(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_reference_configuration() {
        let c = ProtocolConfig::default();
        assert_eq!(c.window_size, 6);
        assert_eq!(c.seq_space, 12);
        assert_eq!(c.timeout, Duration::from_millis(16));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn seq_space_must_cover_two_windows() {
        assert_eq!(
            ProtocolConfig::new(6, 11, TIMEOUT),
            Err(ConfigError::SeqSpaceTooSmall {
                seq_space: 11,
                window_size: 6
            })
        );
        assert!(ProtocolConfig::new(6, 12, TIMEOUT).is_ok());
    }

    #[test]
    fn zero_window_rejected() {
        assert_eq!(
            ProtocolConfig::new(0, 12, TIMEOUT),
            Err(ConfigError::ZeroWindow)
        );
    }

    #[test]
    fn zero_timeout_rejected() {
        assert_eq!(
            ProtocolConfig::new(4, 8, Duration::ZERO),
            Err(ConfigError::ZeroTimeout)
        );
    }

    #[test]
    fn seq_space_cannot_reach_marker() {
        assert_eq!(
            ProtocolConfig::new(4, NOT_IN_USE, TIMEOUT),
            Err(ConfigError::SeqSpaceTooLarge(NOT_IN_USE))
        );
    }

    #[test]
    fn timeout_from_millis_bounds() {
        assert_eq!(
            ProtocolConfig::timeout_from_millis(16.0),
            Ok(Duration::from_millis(16))
        );
        assert_eq!(
            ProtocolConfig::timeout_from_millis(0.5),
            Ok(Duration::from_micros(500))
        );
        for bad in [0.0, -3.0, f64::NAN, f64::INFINITY, 1e300] {
            assert!(
                matches!(
                    ProtocolConfig::timeout_from_millis(bad),
                    Err(ConfigError::InvalidTimeout(_))
                ),
                "{bad} accepted"
            );
        }
    }
}
