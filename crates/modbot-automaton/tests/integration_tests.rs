//! End-to-end tests for modbot-automaton: build, decode, run, persist.

use std::sync::Arc;

use modbot_automaton::{
    estimate_states, AutomatonConfig, AutomatonError, AutomatonRuntime, ConnectivityMatrix,
    ControlLoop, LineMatrixSource, Lookup, MatrixDecoder, RenderFormat, ReplaySource, StateId,
    StepOutcome, TableStore, TransitionTable, WriterSink,
};
use modbot_core::{vocabulary, Action, PortId, PortKey, Topology, UnitId};
use tempfile::TempDir;

// ============================================================================
// Fixtures
// ============================================================================

fn table(units: u8) -> Arc<TransitionTable> {
    let config = AutomatonConfig {
        parallel: false,
        settle_ms: 0,
        ..AutomatonConfig::with_units(units)
    };
    Arc::new(TransitionTable::build(&config).expect("table builds"))
}

fn matrix(rows: &[&[u8]]) -> ConnectivityMatrix {
    ConnectivityMatrix::new(rows.iter().map(|r| r.to_vec()).collect()).expect("valid matrix")
}

// ============================================================================
// State space and table properties
// ============================================================================

#[test]
fn test_empty_state_for_every_unit_count() {
    for units in 1..=3 {
        let table = table(units);
        assert_eq!(table.state_id(&Topology::empty()), Some(StateId::EMPTY));
        assert_eq!(
            table.state_count() as u128,
            estimate_states(units, table.layout())
        );
    }
}

#[test]
fn test_apply_is_deterministic() {
    let table = table(2);
    for state in table.space().states().iter().take(20) {
        for action in table.actions() {
            assert_eq!(state.apply(action), state.apply(action));
        }
    }
}

#[test]
fn test_disconnect_undoes_connect_on_free_port() {
    let table = table(3);
    let actions = vocabulary(3, table.layout()).unwrap();

    for state in table.space().states().iter().step_by(37) {
        for action in actions.iter().filter(|a| a.is_connect()) {
            let key = action.key();
            if state.is_occupied(&key) {
                continue;
            }
            let undo = match action {
                Action::ConnectControl { unit, port, .. } => Action::DisconnectControl {
                    unit: *unit,
                    port: *port,
                },
                _ => Action::Disconnect {
                    unit: key.unit,
                    port: key.port,
                },
            };
            assert_eq!(&state.apply(action).apply(&undo), state);
        }
    }
}

#[test]
fn test_lookup_distinguishes_unknown_and_forbidden() {
    let table = table(3);
    let start = table.initial_state();

    let unknown: Action = "connect_M1_P1_M2_P4_O1".parse().unwrap();
    let Lookup::Hit(one_edge) = table.lookup(start, &unknown) else {
        panic!("single edge should be enumerated");
    };
    // Unit 2 cannot also hold unit 1: that closes a cycle.
    let cycle: Action = "connect_M2_P1_M1_P4_O1".parse().unwrap();
    assert_eq!(table.lookup(one_edge, &cycle), Lookup::Unknown);

    let wrong_gender: Action = "connect_M1_P4_M2_P1_O1".parse().unwrap();
    assert!(matches!(table.lookup(start, &wrong_gender), Lookup::Forbidden(_)));
}

#[test]
fn test_state_limit_reports_estimate() {
    let config = AutomatonConfig {
        max_states: 10,
        ..AutomatonConfig::with_units(2)
    };
    let err = TransitionTable::build(&config).unwrap_err();
    assert!(matches!(
        err,
        AutomatonError::StateLimitExceeded {
            estimated_states: 49,
            max_states: 10
        }
    ));
}

// ============================================================================
// Decoder scenarios
// ============================================================================

#[test]
fn test_decoder_scenario_sequence() {
    let mut decoder = MatrixDecoder::new();
    let first = matrix(&[&[1, 0, 0], &[0, 12, 0], &[0, 0, 28]]);

    let actions: Vec<String> = decoder.decode(&first).iter().map(|a| a.to_string()).collect();
    assert_eq!(
        actions,
        vec![
            "connect_M1_P1_M0_P0_O1",
            "connect_M2_P2_M1_P4_O1",
            "connect_M3_P3_M3_P4_O1",
        ]
    );
    assert!(decoder.decode(&first).is_empty());

    let cleared = matrix(&[&[1, 0, 0], &[0, 0, 0], &[0, 0, 28]]);
    let actions: Vec<String> = decoder.decode(&cleared).iter().map(|a| a.to_string()).collect();
    assert_eq!(actions, vec!["disconnect_M2_P2"]);
    assert!(!decoder.is_occupied(1, 1));
}

// ============================================================================
// Runtime and control loop
// ============================================================================

#[test]
fn test_runtime_survives_unknown_and_malformed() -> anyhow::Result<()> {
    let mut runtime = AutomatonRuntime::new(table(3));
    let script = [
        "connect_M1_P1_M2_P4_O1",
        "connect_M2_P1_M1_P4_O1",
        "bogus",
        "connect_M2_P2_M3_P6_O2",
    ];

    let outcomes = script
        .iter()
        .map(|line| runtime.perform_text(line))
        .collect::<Result<Vec<_>, _>>()?;

    assert!(outcomes[0].is_transition());
    assert!(matches!(outcomes[1], StepOutcome::Unknown { .. }));
    assert!(matches!(outcomes[2], StepOutcome::Malformed { .. }));
    assert!(outcomes[3].is_transition());

    let current = runtime.current_topology().expect("runtime has a state");
    assert_eq!(current.len(), 2);
    assert_eq!(runtime.stats().total(), 4);
    Ok(())
}

#[test]
fn test_control_loop_from_line_source() -> anyhow::Result<()> {
    let input = "\
20,0,0
0,0,0

20,0,0
0,0,0

0,0,0
0,0,0
";
    let source = LineMatrixSource::new(std::io::Cursor::new(input), 2)?;
    let sink = WriterSink::new(Vec::new(), RenderFormat::Text);
    let mut control = ControlLoop::new(AutomatonRuntime::new(table(2)), source, sink);

    let summary = control.run()?;
    assert_eq!(summary.samples, 3);
    assert_eq!(summary.stats.transitioned, 2);
    assert!(!summary.cancelled);

    let rendered = String::from_utf8(control.sink().get_ref().clone())?;
    assert!(rendered.contains("# connect_M1_P1_M2_P4_O1"));
    assert!(rendered.contains("M1 P1 <- M2 P4 [O1]"));
    assert!(rendered.contains("# disconnect_M1_P1"));
    assert!(rendered.contains("(disconnected)"));
    Ok(())
}

#[test]
fn test_short_read_surfaces_from_loop() {
    let source = LineMatrixSource::new(std::io::Cursor::new("0,0,0\n"), 2).unwrap();
    let mut control = ControlLoop::new(AutomatonRuntime::new(table(2)), source, ());
    assert!(matches!(
        control.run(),
        Err(AutomatonError::ShortRead {
            expected: 2,
            received: 1
        })
    ));
}

#[test]
fn test_detached_runtime_fails_in_loop() {
    let source = ReplaySource::new([matrix(&[&[20, 0, 0], &[0, 0, 0]])]);
    let mut control = ControlLoop::new(AutomatonRuntime::detached(table(2)), source, ());
    assert!(matches!(control.run(), Err(AutomatonError::NoCurrentState)));
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_store_round_trip_and_resume() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let store = TableStore::new(temp.path());
    let built = table(2);
    store.save_table(&built)?;

    let loaded = Arc::new(store.load_table()?.expect("table was saved"));
    assert_eq!(loaded.transitions(), built.transitions());

    let mut runtime = AutomatonRuntime::new(Arc::clone(&loaded));
    runtime.perform_text("connect_M2_P3_M1_P6_O2")?;
    store.save_runtime(&runtime)?;

    let resumed = store.resume_runtime(Arc::clone(&loaded))?;
    let current = resumed.current_topology().expect("resumed state");
    assert!(current.is_occupied(&PortKey::new(UnitId(2), PortId(3))));
    Ok(())
}
