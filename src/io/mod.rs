//! Loading element universes and recorded event traces from disk.

use crate::analysis::MeasurementTool;
use crate::errors::PerfmapError;
use crate::measurement::events::{MeasurementEvent, MeasurementOrder};
use crate::measurement::MeasurableElement;
use anyhow::{Context, Result};
use crate::measurement::CodeSection;
use log::debug;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Read the measurable-element universe from a JSON file.
pub fn load_universe(path: &Path) -> Result<Vec<MeasurableElement>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open universe file {}", path.display()))?;
    let universe: Vec<MeasurableElement> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("invalid universe in {}", path.display()))?;
    debug!("loaded {} element(s) from {}", universe.len(), path.display());
    Ok(universe)
}

/// Read a recorded event trace from a JSON file.
pub fn load_trace(path: &Path) -> Result<Vec<MeasurementEvent>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open trace file {}", path.display()))?;
    let events: Vec<MeasurementEvent> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("invalid trace in {}", path.display()))?;
    debug!("loaded {} event(s) from {}", events.len(), path.display());
    Ok(events)
}

/// Replays a recorded trace instead of instrumenting a live program.
///
/// Each measurement round serves the slice of recorded events whose
/// sections the order asks for, plus any event at a section no element of
/// the universe could ever claim: holding those back would hide observed
/// facts from the parser's drop accounting, so they go out with the first
/// batch. The whole trace is handed out once; later rounds for the same
/// sections get nothing new, which mirrors a recording that has been fully
/// consumed.
pub struct ReplayTool {
    events: Vec<MeasurementEvent>,
    served: Vec<bool>,
    known_sections: BTreeSet<CodeSection>,
}

impl ReplayTool {
    pub fn new(events: Vec<MeasurementEvent>, universe: &[MeasurableElement]) -> Self {
        let mut known_sections = BTreeSet::new();
        for element in universe {
            known_sections.insert(element.section().clone());
            match element {
                MeasurableElement::Branch { alternatives, .. } => {
                    known_sections.extend(alternatives.iter().cloned());
                }
                MeasurableElement::Loop { body, .. } => {
                    known_sections.insert(body.clone());
                }
                _ => {}
            }
        }
        let served = vec![false; events.len()];
        Self {
            events,
            served,
            known_sections,
        }
    }

    pub fn from_trace(path: &Path, universe: &[MeasurableElement]) -> Result<Self> {
        Ok(Self::new(load_trace(path)?, universe))
    }
}

impl MeasurementTool for ReplayTool {
    fn measure(
        &mut self,
        order: &MeasurementOrder,
    ) -> Result<Vec<MeasurementEvent>, PerfmapError> {
        let mut batch = Vec::new();
        for (event, served) in self.events.iter().zip(self.served.iter_mut()) {
            if *served {
                continue;
            }
            let section = event.section();
            if order.covers(section) || !self.known_sections.contains(section) {
                *served = true;
                batch.push(event.clone());
            }
        }
        debug!("replayed {} event(s)", batch.len());
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::results::ResourceType;
    use crate::measurement::CodeSection;
    use pretty_assertions::assert_eq;

    fn section(start: usize) -> CodeSection {
        CodeSection::new("src/lib.rs", start, start + 10)
    }

    fn capture(start: usize, value: f64) -> MeasurementEvent {
        MeasurementEvent::ResourceDemandCaptured {
            section: section(start),
            resource: ResourceType::Cpu,
            value,
            parameterisation: None,
        }
    }

    fn demand_element(start: usize) -> MeasurableElement {
        MeasurableElement::ResourceDemand {
            section: section(start),
            resource: ResourceType::Cpu,
        }
    }

    #[test]
    fn replay_withholds_known_sections_the_order_skips() {
        let universe = vec![demand_element(0), demand_element(100)];
        let mut tool = ReplayTool::new(vec![capture(0, 1.0), capture(100, 2.0)], &universe);
        let order = MeasurementOrder {
            resource_demand_sections: vec![section(0)],
            ..Default::default()
        };
        let batch = tool.measure(&order).unwrap();
        assert_eq!(batch, vec![capture(0, 1.0)]);
    }

    #[test]
    fn replay_hands_over_events_no_element_can_claim() {
        let universe = vec![demand_element(0)];
        let mut tool = ReplayTool::new(vec![capture(0, 1.0), capture(900, 9.0)], &universe);
        let order = MeasurementOrder {
            resource_demand_sections: vec![section(0)],
            ..Default::default()
        };
        // The stray event at section 900 belongs to nobody; it must still
        // reach the parser so it can be dropped and counted there.
        let batch = tool.measure(&order).unwrap();
        assert_eq!(batch, vec![capture(0, 1.0), capture(900, 9.0)]);
        assert!(tool.measure(&order).unwrap().is_empty());
    }

    #[test]
    fn replay_serves_each_event_once() {
        let universe = vec![demand_element(0)];
        let mut tool = ReplayTool::new(vec![capture(0, 1.0)], &universe);
        let order = MeasurementOrder {
            resource_demand_sections: vec![section(0)],
            ..Default::default()
        };
        assert_eq!(tool.measure(&order).unwrap().len(), 1);
        assert!(tool.measure(&order).unwrap().is_empty());
    }

    #[test]
    fn universe_and_trace_round_trip_through_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let universe = vec![MeasurableElement::ResourceDemand {
            section: section(0),
            resource: ResourceType::Cpu,
        }];
        let trace = vec![capture(0, 4.0)];

        let universe_path = dir.path().join("universe.json");
        let trace_path = dir.path().join("trace.json");
        std::fs::write(&universe_path, serde_json::to_string(&universe).unwrap()).unwrap();
        std::fs::write(&trace_path, serde_json::to_string(&trace).unwrap()).unwrap();

        assert_eq!(load_universe(&universe_path).unwrap(), universe);
        assert_eq!(load_trace(&trace_path).unwrap(), trace);
    }

    #[test]
    fn malformed_universe_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("universe.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(load_universe(&path).is_err());
    }
}
