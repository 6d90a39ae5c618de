//! Measurable elements and the code sections that identify them.
//!
//! A program under measurement is abstracted into four element kinds:
//! resource-demanding actions, branch points, loops, and external-call
//! parameters. Each element is identified by the source code section it
//! covers; branches also carry the ordered list of alternative sections
//! whose positions serve as branch indices.

pub mod events;
pub mod parser;
pub mod results;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub use events::{MeasurementEvent, MeasurementOrder};
pub use parser::EventParser;
pub use results::{
    MeasuredValue, MeasurementError, MeasurementResult, Parameterisation, ResourceType,
};

/// A contiguous region of source code, identified by file and offsets.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CodeSection {
    pub file: PathBuf,
    pub start: usize,
    pub end: usize,
}

impl CodeSection {
    pub fn new(file: impl Into<PathBuf>, start: usize, end: usize) -> Self {
        Self {
            file: file.into(),
            start,
            end,
        }
    }
}

impl fmt::Display for CodeSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.file.display(), self.start, self.end)
    }
}

/// The element kinds a model fact can be attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementKind {
    ResourceDemand,
    Branch,
    Loop,
    Parameter,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ElementKind::ResourceDemand => "rdseff",
            ElementKind::Branch => "branch",
            ElementKind::Loop => "loop",
            ElementKind::Parameter => "parameter",
        };
        f.write_str(label)
    }
}

/// One measurable element of the program under analysis.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MeasurableElement {
    /// An action whose resource demand (cpu, disk, ..) is to be modelled.
    ResourceDemand {
        section: CodeSection,
        resource: ResourceType,
    },
    /// A branch point with an ordered list of alternative sections.
    ///
    /// Branch decisions are recorded as indices into `alternatives`; the
    /// list order is fixed at construction and must never be reordered.
    Branch {
        section: CodeSection,
        alternatives: Vec<CodeSection>,
    },
    /// A loop with a single body section.
    Loop {
        section: CodeSection,
        body: CodeSection,
    },
    /// An external-call parameter observed at the call site.
    Parameter { section: CodeSection, name: String },
}

impl MeasurableElement {
    /// The code section identifying this element.
    pub fn section(&self) -> &CodeSection {
        match self {
            MeasurableElement::ResourceDemand { section, .. }
            | MeasurableElement::Branch { section, .. }
            | MeasurableElement::Loop { section, .. }
            | MeasurableElement::Parameter { section, .. } => section,
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            MeasurableElement::ResourceDemand { .. } => ElementKind::ResourceDemand,
            MeasurableElement::Branch { .. } => ElementKind::Branch,
            MeasurableElement::Loop { .. } => ElementKind::Loop,
            MeasurableElement::Parameter { .. } => ElementKind::Parameter,
        }
    }

    /// Stable identifier used as a map key in reports and side-channel slots.
    pub fn id(&self) -> String {
        format!("{}:{}", self.kind(), self.section())
    }

    /// Index of `section` in this branch's alternative list, if any.
    pub fn alternative_index(&self, section: &CodeSection) -> Option<usize> {
        match self {
            MeasurableElement::Branch { alternatives, .. } => {
                alternatives.iter().position(|alt| alt == section)
            }
            _ => None,
        }
    }
}

impl fmt::Display for MeasurableElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(start: usize) -> CodeSection {
        CodeSection::new("src/service.rs", start, start + 10)
    }

    #[test]
    fn branch_resolves_alternative_indices_in_list_order() {
        let branch = MeasurableElement::Branch {
            section: section(0),
            alternatives: vec![section(100), section(200)],
        };
        assert_eq!(branch.alternative_index(&section(100)), Some(0));
        assert_eq!(branch.alternative_index(&section(200)), Some(1));
        assert_eq!(branch.alternative_index(&section(300)), None);
    }

    #[test]
    fn non_branch_elements_have_no_alternatives() {
        let lp = MeasurableElement::Loop {
            section: section(0),
            body: section(100),
        };
        assert_eq!(lp.alternative_index(&section(100)), None);
    }

    #[test]
    fn element_ids_are_stable_and_kind_prefixed() {
        let element = MeasurableElement::Parameter {
            section: section(40),
            name: "payload".into(),
        };
        assert_eq!(element.id(), "parameter:src/service.rs:40-50");
    }
}
