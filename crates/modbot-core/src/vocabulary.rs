//! Enumeration of every well-formed action for a robot.

use crate::topology::TopologyError;
use crate::{Action, PortLayout, UnitId};

/// Number of actions [`vocabulary`] produces.
pub fn vocabulary_size(units: u8, layout: &PortLayout) -> usize {
    let n = units as usize;
    let f = layout.female as usize;
    let o = layout.orientations as usize;
    n * n.saturating_sub(1) * layout.edge_choices() + n * f + n * f * o + n * f
}

/// Every action over `units` units: module connects for each ordered pair of
/// distinct units, disconnects for each female socket, then the control-unit
/// variants.
pub fn vocabulary(units: u8, layout: &PortLayout) -> Result<Vec<Action>, TopologyError> {
    if units == 0 {
        return Err(TopologyError::NoUnits);
    }

    let ids: Vec<UnitId> = (1..=units).map(UnitId).collect();
    let mut actions = Vec::with_capacity(vocabulary_size(units, layout));

    for &unit in &ids {
        for &target in &ids {
            if unit == target {
                continue;
            }
            for target_port in layout.male_ports() {
                for port in layout.female_ports() {
                    for orientation in layout.orientations() {
                        actions.push(Action::Connect {
                            unit,
                            port,
                            target,
                            target_port,
                            orientation,
                        });
                    }
                }
            }
        }
        for port in layout.female_ports() {
            actions.push(Action::Disconnect { unit, port });
        }
    }

    for &unit in &ids {
        for port in layout.female_ports() {
            for orientation in layout.orientations() {
                actions.push(Action::ConnectControl {
                    unit,
                    port,
                    orientation,
                });
            }
            actions.push(Action::DisconnectControl { unit, port });
        }
    }

    Ok(actions)
}
