//! Synthesis of a flowchart from the methods of a [SourceUnit].
//!
//! Every method body is walked statement by statement. Declarations, calls and conditions
//! become nodes, variables are substituted into call and condition texts, and conditions are
//! evaluated statically so only the branch that would run is drawn.

use std::path::Path;

use tracing::info;

use crate::ast::SourceUnit;
use crate::utils::{ImageFormat, VisualizerError};

use self::environment::VariableEnvironment;
use self::graph::FlowchartDocument;
use self::traversal::{MethodDescriptor, MethodTraversal};

pub mod environment;
pub mod evaluator;
pub mod graph;
mod graph_visualizer;
pub mod synthesizer;
pub mod traversal;

/// The result of analyzing a [SourceUnit].
#[derive(Debug, Clone)]
pub struct Flowchart {
    pub document: FlowchartDocument,
    /// Variable values at the end of the run.
    pub environment: VariableEnvironment,
    /// Methods in the order they were visited.
    pub methods: Vec<MethodDescriptor>,
}

impl Flowchart {
    pub fn dot_repr(&self) -> String {
        self.document.dot_repr()
    }

    pub fn visualize(&self, output_path: &Path, format: ImageFormat) -> Result<(), VisualizerError> {
        self.document.visualize(output_path, format)
    }

    pub fn print(&self) {
        println!("Methods:");
        for method in &self.methods {
            println!(
                "\t{}({}) : entry {}",
                method.name,
                method.parameters.join(", "),
                method.entry_nid
            );
        }
        self.environment.print();
        self.document.print();
    }
}

/// Synthesize the flowchart of every method in `unit`.
pub fn synthesize(unit: &SourceUnit) -> Flowchart {
    info!(methods = unit.methods.len(), "Analyzing methods");
    let flowchart = MethodTraversal::new().traverse(unit);
    info!(
        nodes = flowchart.document.nodes().count(),
        variables = flowchart.environment.len(),
        "Analysis done"
    );
    flowchart
}
