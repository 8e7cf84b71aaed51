//! Consumers of topology changes.
//!
//! The runtime loop hands every successful transition to a
//! [`TopologySink`]. Sinks never feed anything back into the automaton.

use std::io::Write;

use modbot_core::{Action, Topology};
use petgraph::dot::Dot;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Receives the topology after every successful transition.
pub trait TopologySink {
    fn on_transition(&mut self, action: &Action, from: &Topology, to: &Topology);
}

/// Discards everything.
impl TopologySink for () {
    fn on_transition(&mut self, _action: &Action, _from: &Topology, _to: &Topology) {}
}

/// Logs each transition through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl TopologySink for LogSink {
    fn on_transition(&mut self, action: &Action, from: &Topology, to: &Topology) {
        info!(
            action = %action,
            links_before = from.len(),
            links_after = to.len(),
            topology = %to,
            "topology_changed"
        );
    }
}

/// Output format for [`WriterSink`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderFormat {
    /// One line per link.
    #[default]
    Text,
    /// Graphviz DOT of the unit adjacency.
    Dot,
}

impl std::str::FromStr for RenderFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(RenderFormat::Text),
            "dot" | "graphviz" => Ok(RenderFormat::Dot),
            other => Err(format!("unknown render format '{}' (expected text or dot)", other)),
        }
    }
}

/// Human-readable listing of a topology.
pub fn render_text(topology: &Topology) -> String {
    if topology.is_empty() {
        return "(disconnected)\n".to_string();
    }
    let mut out = String::new();
    for link in topology.links() {
        let target = if link.to.is_control() {
            "control".to_string()
        } else {
            format!("{} {}", link.to.unit, link.to.port)
        };
        out.push_str(&format!(
            "{} {} <- {} [{}]\n",
            link.from.unit, link.from.port, target, link.to.orientation
        ));
    }
    out
}

/// Graphviz rendering of the symmetric unit adjacency.
pub fn render_dot(topology: &Topology) -> String {
    format!("{}", Dot::new(&topology.adjacency()))
}

/// Writes a rendering of each new topology to a writer.
pub struct WriterSink<W> {
    writer: W,
    format: RenderFormat,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W, format: RenderFormat) -> Self {
        Self { writer, format }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TopologySink for WriterSink<W> {
    fn on_transition(&mut self, action: &Action, _from: &Topology, to: &Topology) {
        let body = match self.format {
            RenderFormat::Text => render_text(to),
            RenderFormat::Dot => render_dot(to),
        };
        let written = writeln!(self.writer, "# {}", action)
            .and_then(|_| self.writer.write_all(body.as_bytes()))
            .and_then(|_| self.writer.flush());
        if let Err(error) = written {
            warn!(%error, "render_write_failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Topology {
        Topology::empty()
            .apply(&"connect_M1_P1_M2_P4_O1".parse().unwrap())
            .apply(&"connect_M2_P2_M3_P5_O2".parse().unwrap())
    }

    #[test]
    fn test_render_text() {
        assert_eq!(render_text(&Topology::empty()), "(disconnected)\n");
        assert_eq!(
            render_text(&chain()),
            "M1 P1 <- M2 P4 [O1]\nM2 P2 <- M3 P5 [O2]\n"
        );
        let control = Topology::empty().apply(&"connect_M1_P3_M0_P0_O1".parse().unwrap());
        assert_eq!(render_text(&control), "M1 P3 <- control [O1]\n");
    }

    #[test]
    fn test_render_dot_lists_units_and_links() {
        let dot = render_dot(&chain());
        assert!(dot.starts_with("graph {"));
        assert!(dot.trim_end().ends_with('}'));
        assert!(dot.contains("M1"));
        assert!(dot.contains("M3"));
        assert!(dot.contains("M2_P2"));
        assert!(dot.contains("--"));
    }

    #[test]
    fn test_writer_sink_writes_each_transition() {
        let mut sink = WriterSink::new(Vec::new(), RenderFormat::Text);
        let to = chain();
        let action = "connect_M2_P2_M3_P5_O2".parse().unwrap();
        sink.on_transition(&action, &Topology::empty(), &to);

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.starts_with("# connect_M2_P2_M3_P5_O2\n"));
        assert!(out.contains("M2 P2 <- M3 P5 [O2]"));
    }

    #[test]
    fn test_render_format_parse() {
        assert_eq!("dot".parse::<RenderFormat>().unwrap(), RenderFormat::Dot);
        assert_eq!("TEXT".parse::<RenderFormat>().unwrap(), RenderFormat::Text);
        assert!("svg".parse::<RenderFormat>().is_err());
    }
}
