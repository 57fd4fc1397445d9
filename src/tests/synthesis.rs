use pretty_assertions::assert_eq;

use super::{assert_well_formed, edges, flowchart_from, nodes};
use crate::flowchart::graph::Shape;

fn node(id: usize, shape: Shape, label: &str) -> (usize, Shape, String) {
    (id, shape, label.to_string())
}

fn edge(from: usize, to: usize) -> (usize, usize, Option<String>) {
    (from, to, None)
}

fn labelled_edge(from: usize, to: usize, label: &str) -> (usize, usize, Option<String>) {
    (from, to, Some(label.to_string()))
}

#[test]
fn declaration_and_call() {
    let flowchart = flowchart_from(
        "
    class Program {
        static void Main(string[] args) {
            int x = 4 + 3;
            Test(x);
        }
    }
",
    );

    assert_eq!(
        nodes(&flowchart),
        vec![
            node(0, Shape::Box, "Main()"),
            node(1, Shape::Ellipse, "x = 7"),
            node(2, Shape::Box, "Test(7)"),
        ]
    );
    assert_eq!(edges(&flowchart), vec![edge(0, 1), edge(1, 2)]);
    assert_eq!(flowchart.environment.get("x"), Some("7"));
}

#[test]
fn only_the_taken_branch_is_drawn() {
    let flowchart = flowchart_from(
        "
    class Program {
        static void Main() {
            int x = 4 + 3;
            if (x > 5) {
                A();
            } else {
                B();
            }
            C();
        }
    }
",
    );

    assert_eq!(
        nodes(&flowchart),
        vec![
            node(0, Shape::Box, "Main()"),
            node(1, Shape::Ellipse, "x = 7"),
            node(2, Shape::Diamond, "7 > 5"),
            node(3, Shape::Box, "A()"),
            node(4, Shape::Box, "C()"),
        ]
    );
    assert_eq!(
        edges(&flowchart),
        vec![
            edge(0, 1),
            labelled_edge(1, 2, "x > 5"),
            edge(2, 3),
            edge(3, 4),
        ]
    );
    assert_well_formed(&flowchart);
}

#[test]
fn else_branch_when_condition_is_false() {
    let flowchart = flowchart_from(
        "
    class Program {
        static void Main() {
            int x = 1 + 2;
            if (x > 5) A(); else B();
        }
    }
",
    );

    assert_eq!(
        nodes(&flowchart),
        vec![
            node(0, Shape::Box, "Main()"),
            node(1, Shape::Ellipse, "x = 3"),
            node(2, Shape::Diamond, "3 > 5"),
            node(3, Shape::Box, "B()"),
        ]
    );
}

#[test]
fn false_condition_without_else_continues_from_diamond() {
    let flowchart = flowchart_from(
        "
    class Program {
        static void Main() {
            if (1 > 2) { A(); }
            Done();
        }
    }
",
    );

    assert_eq!(
        nodes(&flowchart),
        vec![
            node(0, Shape::Box, "Main()"),
            node(1, Shape::Diamond, "1 > 2"),
            node(2, Shape::Box, "Done()"),
        ]
    );
    assert_eq!(
        edges(&flowchart),
        vec![labelled_edge(0, 1, "1 > 2"), edge(1, 2)]
    );
}

#[test]
fn unevaluable_condition_is_false() {
    let flowchart = flowchart_from(
        "
    class Program {
        static void Main() {
            if (IsReady()) { A(); } else { B(); }
        }
    }
",
    );

    let labels: Vec<String> = nodes(&flowchart).into_iter().map(|n| n.2).collect();
    assert_eq!(labels, vec!["Main()", "IsReady()", "B()"]);
}

#[test]
fn interpolated_placeholder_across_methods() {
    let flowchart = flowchart_from(
        "
    class Program {
        static void Main() {
            string message = \"vlakas\";
            Hix(message);
        }

        static void Hix(string message) {
            Console.WriteLine($\"Hello {message}\");
        }
    }
",
    );

    assert_eq!(
        nodes(&flowchart),
        vec![
            node(0, Shape::Box, "Main()"),
            node(1, Shape::Ellipse, "message = \"vlakas\""),
            node(2, Shape::Box, "Hix(\"vlakas\")"),
            node(3, Shape::Box, "Console.WriteLine($\"Hello vlakas\")"),
        ]
    );
    // The second method continues where the first one ended.
    assert_eq!(edges(&flowchart), vec![edge(0, 1), edge(1, 2), edge(2, 3)]);

    let methods: Vec<(&str, usize)> = flowchart
        .methods
        .iter()
        .map(|m| (m.name.as_str(), m.entry_nid))
        .collect();
    assert_eq!(methods, vec![("Main", 1), ("Hix", 3)]);
    assert_eq!(flowchart.methods[1].parameters, vec!["message".to_string()]);
}

#[test]
fn unsupported_statements_reserve_ids() {
    let flowchart = flowchart_from(
        "
    class Program {
        static void Main() {
            int x = 1;
            x++;
            for (int i = 0; i < x; i++) { Loop(i); }
            Foo(x);
            return;
        }
    }
",
    );

    assert_eq!(
        nodes(&flowchart),
        vec![
            node(0, Shape::Box, "Main()"),
            node(1, Shape::Ellipse, "x = 1"),
            node(4, Shape::Box, "Foo(1)"),
        ]
    );
    assert_eq!(edges(&flowchart), vec![edge(0, 1), edge(1, 4)]);
}

#[test]
fn nested_conditions_keep_ids_increasing() {
    let flowchart = flowchart_from(
        "
    class Program {
        static void Main() {
            int x = 2;
            if (x > 5) {
                A();
            } else {
                if (x < 3) {
                    B();
                    return;
                }
                Log(x);
            }
            Done();
        }
    }
",
    );

    assert_eq!(
        nodes(&flowchart),
        vec![
            node(0, Shape::Box, "Main()"),
            node(1, Shape::Ellipse, "x = 2"),
            node(2, Shape::Diamond, "2 > 5"),
            node(3, Shape::Diamond, "2 < 3"),
            node(4, Shape::Box, "B()"),
            // 5 is taken by the `return`.
            node(6, Shape::Box, "Log(2)"),
            node(7, Shape::Box, "Done()"),
        ]
    );
    assert_eq!(
        edges(&flowchart),
        vec![
            edge(0, 1),
            labelled_edge(1, 2, "x > 5"),
            labelled_edge(2, 3, "x < 3"),
            edge(3, 4),
            edge(4, 6),
            edge(6, 7),
        ]
    );
    assert_well_formed(&flowchart);
}

#[test]
fn ids_reserved_inside_a_branch_are_not_reused() {
    let flowchart = flowchart_from(
        "
    class Program {
        static void Main() {
            if (1 < 2) { A(); return; }
            B();
        }
    }
",
    );

    assert_eq!(
        nodes(&flowchart),
        vec![
            node(0, Shape::Box, "Main()"),
            node(1, Shape::Diamond, "1 < 2"),
            node(2, Shape::Box, "A()"),
            node(4, Shape::Box, "B()"),
        ]
    );
    assert_eq!(
        edges(&flowchart),
        vec![labelled_edge(0, 1, "1 < 2"), edge(1, 2), edge(2, 4)]
    );
    assert_well_formed(&flowchart);
}

#[test]
fn shift_declarations_are_drawn() {
    let flowchart = flowchart_from(
        "
    class Program {
        static void Main() {
            int s = 1 << 2;
            int t = s >> 1;
            s <<= 1;
            Done(t);
        }
    }
",
    );

    assert_eq!(
        nodes(&flowchart),
        vec![
            node(0, Shape::Box, "Main()"),
            node(1, Shape::Ellipse, "s = 0"),
            node(2, Shape::Ellipse, "t = 0"),
            node(4, Shape::Box, "Done(0)"),
        ]
    );
    assert_eq!(edges(&flowchart), vec![edge(0, 1), edge(1, 2), edge(2, 4)]);
}

#[test]
fn declaration_values() {
    let flowchart = flowchart_from(
        "
    class Program {
        static void Main() {
            int a = 1, b = 2;
            string name;
            double ratio = 10 / 0;
            var items = new List<int>();
            bool flag = a > b;
        }
    }
",
    );

    let labels: Vec<String> = nodes(&flowchart).into_iter().map(|n| n.2).collect();
    assert_eq!(
        labels,
        vec![
            "Main()",
            "a = 1",
            "name = null",
            "ratio = 0",
            "items = new List<int>()",
            "flag = 0",
        ]
    );
    assert_eq!(flowchart.environment.get("b"), None);
}

#[test]
fn environment_is_shared_between_methods() {
    let flowchart = flowchart_from(
        "
    class Program {
        void First() {
            int limit = 10;
        }

        void Second() {
            if (limit >= 10) { Reached(limit); }
        }
    }
",
    );

    let labels: Vec<String> = nodes(&flowchart).into_iter().map(|n| n.2).collect();
    assert_eq!(
        labels,
        vec!["First()", "limit = 10", "10 >= 10", "Reached(10)"]
    );
    assert_well_formed(&flowchart);
}

#[test]
fn entry_node_uses_first_method_even_without_body() {
    let flowchart = flowchart_from(
        "
    abstract class Shape {
        public abstract double Area();

        public void Describe() {
            Console.WriteLine(Area());
        }
    }
",
    );

    assert_eq!(
        nodes(&flowchart),
        vec![
            node(0, Shape::Box, "Area()"),
            node(1, Shape::Box, "Console.WriteLine(Area())"),
        ]
    );
    assert_eq!(edges(&flowchart), vec![edge(0, 1)]);
}

#[test]
fn methods_of_nested_types_in_document_order() {
    let flowchart = flowchart_from(
        "
    namespace App;

    class Outer {
        void One() { First(); }

        class Inner {
            void Two() { Second(); }
        }

        void Three() { Third(); }
    }
",
    );

    let names: Vec<&str> = flowchart.methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["One", "Two", "Three"]);

    let labels: Vec<String> = nodes(&flowchart).into_iter().map(|n| n.2).collect();
    assert_eq!(labels, vec!["One()", "First()", "Second()", "Third()"]);
}
