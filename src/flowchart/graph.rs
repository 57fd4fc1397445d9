//! The flowchart document: an append-only sequence of nodes and edges.

use std::fmt::Display;
use std::path::Path;

use fnv::FnvHashSet;

use super::graph_visualizer;
use crate::utils::{ImageFormat, VisualizerError};

/// Node id.
pub type NId = usize;

/// Shape of a flowchart node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Calls and the entry node.
    Box,
    /// Variable declarations.
    Ellipse,
    /// Conditions.
    Diamond,
}

impl Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Shape::Box => "box",
            Shape::Ellipse => "ellipse",
            Shape::Diamond => "diamond",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub id: NId,
    /// Unescaped display text.
    pub label: String,
    pub shape: Shape,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge {
    pub from: NId,
    pub to: NId,
    pub label: Option<String>,
}

/// An element of the document in production order.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphElement {
    Node(GraphNode),
    Edge(GraphEdge),
}

/// Nodes and edges of a flowchart, in the order they were produced.
///
/// Node ids must be strictly increasing and an edge may only reference nodes that are already
/// in the document.
#[derive(Debug, Clone, Default)]
pub struct FlowchartDocument {
    elements: Vec<GraphElement>,
    node_ids: FnvHashSet<NId>,
    last_nid: Option<NId>,
}

impl FlowchartDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_node<S>(&mut self, id: NId, label: S, shape: Shape)
    where
        S: ToString,
    {
        debug_assert!(
            self.last_nid.map_or(true, |last| id > last),
            "node id {id} emitted out of order"
        );
        self.node_ids.insert(id);
        self.last_nid = Some(id);
        self.elements.push(GraphElement::Node(GraphNode {
            id,
            label: label.to_string(),
            shape,
        }));
    }

    pub fn push_edge(&mut self, from: NId, to: NId, label: Option<String>) {
        debug_assert!(
            self.has_node(from) && self.has_node(to),
            "edge {from} -> {to} references a missing node"
        );
        self.elements
            .push(GraphElement::Edge(GraphEdge { from, to, label }));
    }

    pub fn has_node(&self, id: NId) -> bool {
        self.node_ids.contains(&id)
    }

    pub fn elements(&self) -> &[GraphElement] {
        &self.elements
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> + '_ {
        self.elements.iter().filter_map(|element| match element {
            GraphElement::Node(node) => Some(node),
            GraphElement::Edge(_) => None,
        })
    }

    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge> + '_ {
        self.elements.iter().filter_map(|element| match element {
            GraphElement::Node(_) => None,
            GraphElement::Edge(edge) => Some(edge),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn print(&self) {
        println!("Flowchart:");
        println!("\tNodes:");
        for node in self.nodes() {
            println!("\t\t{} : {} : {}", node.id, node.shape, node.label);
        }
        println!("\n\tEdges:");
        for edge in self.edges() {
            match &edge.label {
                Some(label) => println!("\t\t{} -> {} : {}", edge.from, edge.to, label),
                None => println!("\t\t{} -> {}", edge.from, edge.to),
            }
        }
    }

    /// The document in the Graphviz dot language.
    pub fn dot_repr(&self) -> String {
        graph_visualizer::create_dot(self)
    }

    /// Render the document to an image with Graphviz.
    pub fn visualize(&self, output_path: &Path, format: ImageFormat) -> Result<(), VisualizerError> {
        graph_visualizer::visualize(self, output_path, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn nodes_and_edges_keep_production_order() {
        let mut doc = FlowchartDocument::new();
        doc.push_node(0, "Main()", Shape::Box);
        doc.push_node(1, "x = 7", Shape::Ellipse);
        doc.push_edge(0, 1, None);
        doc.push_node(3, "7 > 5", Shape::Diamond);
        doc.push_edge(1, 3, Some("x > 5".to_string()));

        let ids: Vec<NId> = doc.nodes().map(|n| n.id).collect();
        assert_eq!(ids, vec![0, 1, 3]);

        let edges: Vec<(NId, NId)> = doc.edges().map(|e| (e.from, e.to)).collect();
        assert_eq!(edges, vec![(0, 1), (1, 3)]);

        assert_eq!(doc.elements().len(), 5);
        assert!(matches!(doc.elements()[3], GraphElement::Node(_)));
        assert!(doc.has_node(3));
        assert!(!doc.has_node(2));
    }

    #[test]
    #[should_panic]
    fn edge_to_missing_node_panics_in_debug() {
        let mut doc = FlowchartDocument::new();
        doc.push_node(0, "Main()", Shape::Box);
        doc.push_edge(0, 1, None);
    }

    #[test]
    #[should_panic]
    fn repeated_node_id_panics_in_debug() {
        let mut doc = FlowchartDocument::new();
        doc.push_node(1, "a", Shape::Box);
        doc.push_node(1, "b", Shape::Box);
    }
}
