use std::path::Path;

use crate::utils::{self, ImageFormat, VisualizerError};

use super::graph::{FlowchartDocument, GraphElement};

/// Escape a label for use inside a quoted dot string.
fn escape_label(label: &str) -> String {
    label.replace('"', "\\\"")
}

pub fn create_dot(document: &FlowchartDocument) -> String {
    let mut dot = "digraph Flowchart {\n".to_string();

    for element in document.elements() {
        match element {
            GraphElement::Node(node) => {
                dot += &format!(
                    "\tNode{}\t[shape={} label=\"{}\"]\n",
                    node.id,
                    node.shape,
                    escape_label(&node.label)
                );
            }
            GraphElement::Edge(edge) => match &edge.label {
                Some(label) => {
                    dot += &format!(
                        "\tNode{} -> Node{}\t[label=\"{}\"]\n",
                        edge.from,
                        edge.to,
                        escape_label(label)
                    );
                }
                None => {
                    dot += &format!("\tNode{} -> Node{}\n", edge.from, edge.to);
                }
            },
        }
    }

    dot += "}\n";
    dot
}

pub fn visualize(
    document: &FlowchartDocument,
    output_path: &Path,
    format: ImageFormat,
) -> Result<(), VisualizerError> {
    let dot = create_dot(document);
    utils::render_dot(&dot, output_path, format)
}
