//! Connect/disconnect actions and their text encoding.
//!
//! Actions travel as underscore-separated tokens:
//!
//! ```text
//! connect_M1_P2_M3_P4_O1      unit 1 socket P2 takes unit 3 plug P4, orientation O1
//! disconnect_M1_P2            free unit 1 socket P2
//! connect_M1_P2_M0_P0_O1      unit 1 socket P2 takes the control unit
//! connect_C_O1_M1_P2          same, legacy control form
//! disconnect_C_M1_P2          free unit 1 socket P2 if it holds the control unit
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::topology::{check_unit, Link};
use crate::{Connection, Orientation, PortId, PortKey, PortLayout, UnitId};

/// A single requested change to the robot's topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Plug `target`'s male `target_port` into `unit`'s female `port`.
    Connect {
        unit: UnitId,
        port: PortId,
        target: UnitId,
        target_port: PortId,
        orientation: Orientation,
    },
    /// Free `unit`'s female `port`, whatever it holds.
    Disconnect { unit: UnitId, port: PortId },
    /// Plug the control unit into `unit`'s female `port`.
    ConnectControl {
        unit: UnitId,
        port: PortId,
        orientation: Orientation,
    },
    /// Free `unit`'s female `port` if it holds the control unit.
    DisconnectControl { unit: UnitId, port: PortId },
}

/// Reason an action or link can never be valid for a given robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("unit {unit} is outside M1..=M{units}")]
    UnitOutOfRange { unit: UnitId, units: u8 },

    #[error("{port} is not a female port")]
    NotFemale { port: PortId },

    #[error("{port} is not a male port")]
    NotMale { port: PortId },

    #[error("{unit} cannot connect to itself")]
    SelfConnection { unit: UnitId },

    #[error("orientation {orientation} does not exist")]
    UnknownOrientation { orientation: Orientation },

    #[error("control unit only mates through P0, not {port}")]
    ControlPort { port: PortId },
}

/// Errors produced while parsing action text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionParseError {
    #[error("empty action")]
    Empty,

    #[error("unknown action verb '{verb}'")]
    UnknownVerb { verb: String },

    #[error("'{text}' has the wrong number of tokens for {verb}")]
    WrongArity { verb: &'static str, text: String },

    #[error("expected {expected} token, found '{token}'")]
    BadToken {
        token: String,
        expected: &'static str,
    },
}

impl Action {
    /// The female socket this action targets.
    pub fn key(&self) -> PortKey {
        match *self {
            Action::Connect { unit, port, .. }
            | Action::Disconnect { unit, port }
            | Action::ConnectControl { unit, port, .. }
            | Action::DisconnectControl { unit, port } => PortKey::new(unit, port),
        }
    }

    /// Whether this action adds a connection.
    pub fn is_connect(&self) -> bool {
        matches!(self, Action::Connect { .. } | Action::ConnectControl { .. })
    }

    /// Check the action against a robot of `units` units with `layout` ports.
    pub fn validate(&self, units: u8, layout: &PortLayout) -> Result<(), Violation> {
        match *self {
            Action::Connect {
                unit,
                port,
                target,
                target_port,
                orientation,
            } => Link::new(
                PortKey::new(unit, port),
                Connection::new(target, target_port, orientation),
            )
            .validate(units, layout),
            Action::ConnectControl {
                unit,
                port,
                orientation,
            } => Link::new(PortKey::new(unit, port), Connection::control(orientation))
                .validate(units, layout),
            Action::Disconnect { unit, port } | Action::DisconnectControl { unit, port } => {
                check_unit(unit, units)?;
                if layout.is_female(port) {
                    Ok(())
                } else {
                    Err(Violation::NotFemale { port })
                }
            }
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Connect {
                unit,
                port,
                target,
                target_port,
                orientation,
            } => write!(
                f,
                "connect_{}_{}_{}_{}_{}",
                unit, port, target, target_port, orientation
            ),
            Action::Disconnect { unit, port } => write!(f, "disconnect_{}_{}", unit, port),
            Action::ConnectControl {
                unit,
                port,
                orientation,
            } => write!(
                f,
                "connect_{}_{}_{}_{}_{}",
                unit,
                port,
                UnitId::CONTROL,
                PortId::CONTROL,
                orientation
            ),
            Action::DisconnectControl { unit, port } => {
                write!(f, "disconnect_C_{}_{}", unit, port)
            }
        }
    }
}

fn numbered(token: &str, prefix: char, expected: &'static str) -> Result<u8, ActionParseError> {
    token
        .strip_prefix(prefix)
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(|| ActionParseError::BadToken {
            token: token.to_string(),
            expected,
        })
}

fn unit(token: &str) -> Result<UnitId, ActionParseError> {
    numbered(token, 'M', "unit (M<n>)").map(UnitId)
}

fn port(token: &str) -> Result<PortId, ActionParseError> {
    numbered(token, 'P', "port (P<n>)").map(PortId)
}

fn orientation(token: &str) -> Result<Orientation, ActionParseError> {
    numbered(token, 'O', "orientation (O<n>)").map(Orientation)
}

impl FromStr for Action {
    type Err = ActionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.is_empty() {
            return Err(ActionParseError::Empty);
        }
        let tokens: Vec<&str> = text.split('_').collect();

        match tokens.as_slice() {
            ["connect", "C", o, m, p] => Ok(Action::ConnectControl {
                unit: unit(m)?,
                port: port(p)?,
                orientation: orientation(o)?,
            }),
            ["connect", m, p, t, tp, o] => {
                let (target, target_port) = (unit(t)?, port(tp)?);
                if target.is_control() && target_port == PortId::CONTROL {
                    Ok(Action::ConnectControl {
                        unit: unit(m)?,
                        port: port(p)?,
                        orientation: orientation(o)?,
                    })
                } else {
                    Ok(Action::Connect {
                        unit: unit(m)?,
                        port: port(p)?,
                        target,
                        target_port,
                        orientation: orientation(o)?,
                    })
                }
            }
            ["disconnect", "C", m, p] => Ok(Action::DisconnectControl {
                unit: unit(m)?,
                port: port(p)?,
            }),
            ["disconnect", m, p] => Ok(Action::Disconnect {
                unit: unit(m)?,
                port: port(p)?,
            }),
            ["connect", ..] => Err(ActionParseError::WrongArity {
                verb: "connect",
                text: text.to_string(),
            }),
            ["disconnect", ..] => Err(ActionParseError::WrongArity {
                verb: "disconnect",
                text: text.to_string(),
            }),
            [verb, ..] => Err(ActionParseError::UnknownVerb {
                verb: verb.to_string(),
            }),
            [] => Err(ActionParseError::Empty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connect() {
        let action: Action = "connect_M1_P2_M3_P4_O2".parse().unwrap();
        assert_eq!(
            action,
            Action::Connect {
                unit: UnitId(1),
                port: PortId(2),
                target: UnitId(3),
                target_port: PortId(4),
                orientation: Orientation::O2,
            }
        );
        assert_eq!(action.to_string(), "connect_M1_P2_M3_P4_O2");
    }

    #[test]
    fn test_parse_control_forms() {
        let expected = Action::ConnectControl {
            unit: UnitId(2),
            port: PortId(3),
            orientation: Orientation::O1,
        };
        assert_eq!("connect_M2_P3_M0_P0_O1".parse::<Action>().unwrap(), expected);
        assert_eq!("connect_C_O1_M2_P3".parse::<Action>().unwrap(), expected);
        assert_eq!(expected.to_string(), "connect_M2_P3_M0_P0_O1");

        let disconnect: Action = "disconnect_C_M2_P3".parse().unwrap();
        assert_eq!(
            disconnect,
            Action::DisconnectControl {
                unit: UnitId(2),
                port: PortId(3)
            }
        );
        assert_eq!(disconnect.to_string(), "disconnect_C_M2_P3");
    }

    #[test]
    fn test_parse_disconnect_with_whitespace() {
        let action: Action = "  disconnect_M3_P1\n".parse().unwrap();
        assert_eq!(
            action,
            Action::Disconnect {
                unit: UnitId(3),
                port: PortId(1)
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<Action>(), Err(ActionParseError::Empty));
        assert!(matches!(
            "flip_M1".parse::<Action>(),
            Err(ActionParseError::UnknownVerb { .. })
        ));
        assert!(matches!(
            "connect_M1_P2".parse::<Action>(),
            Err(ActionParseError::WrongArity { verb: "connect", .. })
        ));
        assert!(matches!(
            "disconnect_X1_P2".parse::<Action>(),
            Err(ActionParseError::BadToken { .. })
        ));
        assert!(matches!(
            "connect_M1_P2_M3_P4_Ox".parse::<Action>(),
            Err(ActionParseError::BadToken { .. })
        ));
    }

    #[test]
    fn test_validate_actions() {
        let layout = PortLayout::default();
        let ok: Action = "connect_M1_P1_M2_P4_O1".parse().unwrap();
        assert!(ok.validate(3, &layout).is_ok());

        let self_loop: Action = "connect_M3_P3_M3_P4_O1".parse().unwrap();
        assert_eq!(
            self_loop.validate(3, &layout),
            Err(Violation::SelfConnection { unit: UnitId(3) })
        );

        let bad_disconnect: Action = "disconnect_M1_P5".parse().unwrap();
        assert_eq!(
            bad_disconnect.validate(3, &layout),
            Err(Violation::NotFemale { port: PortId(5) })
        );

        let control: Action = "connect_M1_P1_M0_P0_O2".parse().unwrap();
        assert!(control.validate(1, &layout).is_ok());

        let to_control_plug: Action = "connect_M1_P1_M0_P4_O1".parse().unwrap();
        assert!(to_control_plug.validate(3, &layout).is_err());
    }

    #[test]
    fn test_serde_tagged() {
        let action = Action::Disconnect {
            unit: UnitId(1),
            port: PortId(2),
        };
        let json = serde_json::to_string(&action).unwrap();
        assert_eq!(json, r#"{"kind":"disconnect","unit":1,"port":2}"#);
    }
}
