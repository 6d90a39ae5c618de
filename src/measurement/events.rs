//! Raw instrumentation events and the orders sent to measurement tools.

use super::results::{Parameterisation, ResourceType};
use super::CodeSection;
use serde::{Deserialize, Serialize};

/// One low-level event emitted by an instrumented program run.
///
/// Streams are chronological; the parser reconstructs enter/left pairs and
/// correlates them to measurable elements.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MeasurementEvent {
    SectionEntered {
        section: CodeSection,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parameterisation: Option<Parameterisation>,
    },
    SectionLeft {
        section: CodeSection,
    },
    /// Implies the section ran to completion.
    ResourceDemandCaptured {
        section: CodeSection,
        resource: ResourceType,
        value: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parameterisation: Option<Parameterisation>,
    },
    ParameterCaptured {
        section: CodeSection,
        name: String,
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parameterisation: Option<Parameterisation>,
    },
}

impl MeasurementEvent {
    /// The code section this event concerns.
    pub fn section(&self) -> &CodeSection {
        match self {
            MeasurementEvent::SectionEntered { section, .. }
            | MeasurementEvent::SectionLeft { section }
            | MeasurementEvent::ResourceDemandCaptured { section, .. }
            | MeasurementEvent::ParameterCaptured { section, .. } => section,
        }
    }
}

/// What a measurement tool is asked to observe in one run.
///
/// The three section sets are disjoint by construction at the board: a
/// section requests either a demand capture, an execution trace, or a
/// parameter capture.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementOrder {
    pub resource_demand_sections: Vec<CodeSection>,
    pub execution_sections: Vec<CodeSection>,
    pub parameter_sections: Vec<CodeSection>,
    /// Launch configurations the tool should run the program under.
    pub launch_configurations: Vec<String>,
}

impl MeasurementOrder {
    pub fn is_empty(&self) -> bool {
        self.resource_demand_sections.is_empty()
            && self.execution_sections.is_empty()
            && self.parameter_sections.is_empty()
    }

    /// True when `section` is named anywhere in the order.
    pub fn covers(&self, section: &CodeSection) -> bool {
        self.resource_demand_sections.contains(section)
            || self.execution_sections.contains(section)
            || self.parameter_sections.contains(section)
    }

    /// True when every section of `element` is named in the order.
    pub fn covers_element(&self, element: &super::MeasurableElement) -> bool {
        use super::MeasurableElement::*;
        match element {
            ResourceDemand { section, .. } => self.resource_demand_sections.contains(section),
            Branch {
                section,
                alternatives,
            } => {
                self.execution_sections.contains(section)
                    && alternatives.iter().all(|alt| self.execution_sections.contains(alt))
            }
            Loop { section, body } => {
                self.execution_sections.contains(section)
                    && self.execution_sections.contains(body)
            }
            Parameter { section, .. } => self.parameter_sections.contains(section),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_round_trip_through_json() {
        let event = MeasurementEvent::ResourceDemandCaptured {
            section: CodeSection::new("src/a.rs", 5, 25),
            resource: ResourceType::Cpu,
            value: 17.25,
            parameterisation: Some(Parameterisation::new().with("n", 4.0)),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: MeasurementEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn empty_order_reports_empty_and_covers_nothing() {
        let order = MeasurementOrder::default();
        assert!(order.is_empty());
        assert!(!order.covers(&CodeSection::new("src/a.rs", 0, 1)));
    }
}
