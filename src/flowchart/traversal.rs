//! Walks the method declarations of a [SourceUnit] and chains them into one trace.

use tracing::{debug, info};

use crate::ast::{MethodDeclaration, SourceUnit};

use super::graph::{NId, Shape};
use super::synthesizer::{Cursor, Synthesizer};
use super::Flowchart;

/// Id of the entry node drawn for the first method.
pub const ENTRY_NID: NId = 0;

/// Name, parameters and entry id of a visited method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDescriptor {
    pub name: String,
    pub parameters: Vec<String>,
    /// Id the method's first statement is given.
    pub entry_nid: NId,
}

/// Drives the [Synthesizer] over every method of a source unit.
pub struct MethodTraversal {
    synthesizer: Synthesizer,
    cursor: Cursor,
    parent: Option<NId>,
    methods: Vec<MethodDescriptor>,
}

impl MethodTraversal {
    pub fn new() -> Self {
        Self {
            synthesizer: Synthesizer::new(),
            cursor: Cursor::new(ENTRY_NID + 1),
            parent: None,
            methods: vec![],
        }
    }

    /// Visit every method of `unit` in document order.
    pub fn traverse(mut self, unit: &SourceUnit) -> Flowchart {
        for method in &unit.methods {
            self.visit_method(method);
        }

        let (document, environment) = self.synthesizer.finish();
        Flowchart {
            document,
            environment,
            methods: self.methods,
        }
    }

    fn visit_method(&mut self, method: &MethodDeclaration) {
        info!(method = method.name.as_str(), "Analyzing method");

        let parent = match self.parent {
            Some(parent) => parent,
            None => {
                let label = format!("{}()", method.name);
                debug!(nid = ENTRY_NID, label = %label, "Entry");
                self.synthesizer
                    .document_mut()
                    .push_node(ENTRY_NID, label, Shape::Box);
                ENTRY_NID
            }
        };

        self.methods.push(MethodDescriptor {
            name: method.name.clone(),
            parameters: method.parameters.clone(),
            entry_nid: self.cursor.peek(),
        });

        // The last node of this method is where the next method continues.
        let tail = self
            .synthesizer
            .process_statements(&method.body, &mut self.cursor, parent);
        self.parent = Some(tail);
    }
}

impl Default for MethodTraversal {
    fn default() -> Self {
        Self::new()
    }
}
