//! Configuration for building and driving the automaton.

use std::time::Duration;

use modbot_core::PortLayout;
use serde::{Deserialize, Serialize};

use crate::decoder::{MAX_TARGET_PORT, MAX_TARGET_UNIT};
use crate::error::{AutomatonError, AutomatonResult};

/// Configuration for the automaton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomatonConfig {
    /// Number of robot units (excluding the control unit).
    pub units: u8,

    /// Port and orientation arity of every unit.
    #[serde(default)]
    pub layout: PortLayout,

    /// Largest unit count the builder accepts.
    #[serde(default = "default_max_units")]
    pub max_units: u8,

    /// Largest estimated state count the builder accepts.
    #[serde(default = "default_max_states")]
    pub max_states: u64,

    /// Build the transition table on the rayon thread pool.
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    /// Pause after each applied action, in milliseconds.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

fn default_max_units() -> u8 {
    4
}

fn default_max_states() -> u64 {
    250_000
}

fn default_parallel() -> bool {
    true
}

fn default_settle_ms() -> u64 {
    500
}

impl Default for AutomatonConfig {
    fn default() -> Self {
        Self {
            units: 3,
            layout: PortLayout::default(),
            max_units: default_max_units(),
            max_states: default_max_states(),
            parallel: default_parallel(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl AutomatonConfig {
    /// Create a config for `units` units with default limits.
    pub fn with_units(units: u8) -> Self {
        Self {
            units,
            ..Default::default()
        }
    }

    /// Two units, sequential build, no settle delay. Intended for tests.
    pub fn small() -> Self {
        Self {
            units: 2,
            parallel: false,
            settle_ms: 0,
            ..Default::default()
        }
    }

    /// Four units with a raised state limit.
    pub fn thorough() -> Self {
        Self {
            units: 4,
            max_states: 1_000_000,
            ..Default::default()
        }
    }

    /// Settle delay as a duration.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Check the config before any enumeration work.
    ///
    /// Limits on state counts are enforced by the builder, which knows the
    /// estimate.
    pub fn validate(&self) -> AutomatonResult<()> {
        if self.units == 0 {
            return Err(AutomatonError::Topology(modbot_core::TopologyError::NoUnits));
        }
        if self.units > MAX_TARGET_UNIT {
            return Err(AutomatonError::InvalidLayout {
                message: format!(
                    "{} units cannot be addressed by the 5-bit sensor encoding (max {})",
                    self.units, MAX_TARGET_UNIT
                ),
            });
        }
        if self.layout.female == 0 || self.layout.male == 0 || self.layout.orientations == 0 {
            return Err(AutomatonError::InvalidLayout {
                message: "layout needs at least one female port, one male port and one orientation"
                    .to_string(),
            });
        }
        if self.layout.port_count() > u16::from(MAX_TARGET_PORT) {
            return Err(AutomatonError::InvalidLayout {
                message: format!(
                    "{} ports cannot be addressed by the 3-bit sensor encoding (max {})",
                    self.layout.port_count(),
                    MAX_TARGET_PORT
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(AutomatonConfig::default().validate().is_ok());
        assert!(AutomatonConfig::small().validate().is_ok());
        assert!(AutomatonConfig::thorough().validate().is_ok());
    }

    #[test]
    fn test_zero_units_rejected() {
        let config = AutomatonConfig::with_units(0);
        assert!(matches!(
            config.validate(),
            Err(AutomatonError::Topology(_))
        ));
    }

    #[test]
    fn test_too_many_ports_rejected() {
        let config = AutomatonConfig {
            layout: PortLayout {
                female: 4,
                male: 4,
                orientations: 2,
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AutomatonError::InvalidLayout { .. })
        ));
    }

    #[test]
    fn test_huge_layout_rejected_without_overflow() {
        let config = AutomatonConfig {
            layout: PortLayout {
                female: 200,
                male: 100,
                orientations: 2,
            },
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, AutomatonError::InvalidLayout { .. }));
        assert!(err.to_string().contains("300 ports"));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: AutomatonConfig = serde_json::from_str(r#"{"units": 2}"#).unwrap();
        assert_eq!(config.units, 2);
        assert_eq!(config.layout, PortLayout::default());
        assert_eq!(config.max_units, 4);
        assert_eq!(config.settle_delay(), Duration::from_millis(500));
    }
}
