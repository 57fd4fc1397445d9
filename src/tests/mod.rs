mod synthesis;

use std::rc::Rc;

use pretty_assertions::assert_eq;

use crate::{
    ast::SourceUnit,
    diagnostics::{Diagnostic, DiagnosticsBag},
    flowchart::{
        self,
        graph::{GraphElement, NId, Shape},
        Flowchart,
    },
    text::SourceText,
};

/// Parse and synthesize `code`, asserting it has no syntax errors.
fn flowchart_from(code: &str) -> Flowchart {
    let code = Rc::new(SourceText::from_str(code));
    let bag = DiagnosticsBag::new_ref();
    let unit = SourceUnit::from_source(code, bag.clone());
    bag.borrow().print();
    assert_eq!(bag.borrow().error_count(), 0);
    flowchart::synthesize(&unit)
}

fn nodes(flowchart: &Flowchart) -> Vec<(NId, Shape, String)> {
    flowchart
        .document
        .nodes()
        .map(|n| (n.id, n.shape, n.label.clone()))
        .collect()
}

fn edges(flowchart: &Flowchart) -> Vec<(NId, NId, Option<String>)> {
    flowchart
        .document
        .edges()
        .map(|e| (e.from, e.to, e.label.clone()))
        .collect()
}

/// Node ids only grow and every edge points between nodes that were already emitted.
fn assert_well_formed(flowchart: &Flowchart) {
    let mut seen: Vec<NId> = vec![];
    for element in flowchart.document.elements() {
        match element {
            GraphElement::Node(node) => {
                if let Some(last) = seen.last() {
                    assert!(node.id > *last, "node {} after {}", node.id, last);
                }
                seen.push(node.id);
            }
            GraphElement::Edge(edge) => {
                assert!(seen.contains(&edge.from), "edge from unknown {}", edge.from);
                assert!(seen.contains(&edge.to), "edge to unknown {}", edge.to);
            }
        }
    }
}

#[test]
fn report_syntax_errors_and_continue() {
    let code = Rc::new(SourceText::from_str(
        "
    class Program {
        static void Main() {
            int x = ;
            Run();
        }
    }
",
    ));

    let bag = DiagnosticsBag::new_ref();
    let unit = SourceUnit::from_source(code, bag.clone());
    bag.borrow().print();
    assert_eq!(bag.borrow().error_count(), 1);
    assert!(matches!(
        bag.borrow().diagnostics()[0],
        Diagnostic::Localized { .. }
    ));

    let flowchart = flowchart::synthesize(&unit);
    assert_eq!(
        nodes(&flowchart),
        vec![
            (0, Shape::Box, "Main()".to_string()),
            (1, Shape::Box, "Run()".to_string()),
        ]
    );
}

#[test]
fn report_bad_tokens() {
    let code = Rc::new(SourceText::from_str(
        "class A { void M() { Foo(\"unterminated); } }",
    ));
    let bag = DiagnosticsBag::new_ref();
    SourceUnit::from_source(code, bag.clone());
    bag.borrow().print();
    assert!(bag.borrow().has_errored());
}

#[test]
fn empty_source() {
    let flowchart = flowchart_from("using System;");
    assert!(flowchart.document.is_empty());
    assert!(flowchart.methods.is_empty());
    assert_eq!(flowchart.dot_repr(), "digraph Flowchart {\n}\n");
}

#[test]
fn dot_of_program_parses_back() {
    let flowchart = flowchart_from(
        "
    class Program {
        static void Main() {
            string greeting = \"hi\";
            int x = 4 + 3;
            if (x > 5) {
                Console.WriteLine($\"{greeting} there\");
            }
            Print(greeting);
        }
    }
",
    );

    let dot = flowchart.dot_repr();
    let graph = graphviz_rust::parse(&dot).unwrap();
    let graphviz_rust::dot_structures::Graph::DiGraph { stmts, .. } = graph else {
        panic!("expected a digraph");
    };
    let node_count = stmts
        .iter()
        .filter(|s| matches!(s, graphviz_rust::dot_structures::Stmt::Node(_)))
        .count();
    let edge_count = stmts
        .iter()
        .filter(|s| matches!(s, graphviz_rust::dot_structures::Stmt::Edge(_)))
        .count();
    assert_eq!(node_count, flowchart.document.nodes().count());
    assert_eq!(edge_count, flowchart.document.edges().count());
}
