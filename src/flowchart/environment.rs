//! The variable environment used for substitution.

use fnv::FnvHashMap;

use crate::ast::InvocationExpression;

/// A binding from variable name to its current value.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    /// Source text or evaluated result. String literals keep their quotes.
    pub value: String,
}

/// Flat mapping from variable names to values, shared by every method of a run.
///
/// Bindings are never removed. Iteration follows first insertion, an overwrite keeps the
/// binding's position.
#[derive(Debug, Clone, Default)]
pub struct VariableEnvironment {
    bindings: Vec<Binding>,
    index: FnvHashMap<String, usize>,
}

impl VariableEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value`. The last write wins.
    pub fn declare<N, V>(&mut self, name: N, value: V)
    where
        N: Into<String>,
        V: Into<String>,
    {
        let name = name.into();
        let value = value.into();
        match self.index.get(&name) {
            Some(&i) => self.bindings[i].value = value,
            None => {
                self.index.insert(name.clone(), self.bindings.len());
                self.bindings.push(Binding { name, value });
            }
        }
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.index
            .get(name)
            .map(|&i| self.bindings[i].value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> + '_ {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Substitute known variables into the text of a call.
    ///
    /// For every argument that is a bare identifier naming a binding, a `{name}` placeholder in
    /// the call is replaced by the unquoted value, or if there is none, every occurrence of the
    /// name is replaced by the value. Afterwards every `{name}` placeholder of any binding is
    /// replaced by the unquoted value.
    pub fn substitute_call(&self, call: &InvocationExpression) -> String {
        let mut text = call.text().to_string();

        for binding in &self.bindings {
            for argument in &call.arguments {
                if argument.expression.as_identifier() != Some(binding.name.as_str()) {
                    continue;
                }
                let placeholder = placeholder(&binding.name);
                text = match text.contains(&placeholder) {
                    true => text.replace(&placeholder, unquote(&binding.value)),
                    false => text.replace(&binding.name, &binding.value),
                };
            }
        }

        for binding in &self.bindings {
            let placeholder = placeholder(&binding.name);
            if text.contains(&placeholder) {
                text = text.replace(&placeholder, unquote(&binding.value));
            }
        }

        text
    }

    /// Substitute known variables into a condition.
    ///
    /// This is plain substring replacement: a binding named `x` also rewrites the `x` in `max`.
    pub fn substitute_condition(&self, condition: &str) -> String {
        self.bindings
            .iter()
            .fold(condition.to_string(), |text, binding| {
                text.replace(&binding.name, &binding.value)
            })
    }

    pub fn print(&self) {
        if self.is_empty() {
            return;
        }
        println!("Variables:");
        for binding in self.iter() {
            println!("\t{} = {}", binding.name, binding.value);
        }
    }
}

fn placeholder(name: &str) -> String {
    format!("{{{name}}}")
}

fn unquote(value: &str) -> &str {
    value.trim_matches('"')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{SourceUnit, StatementKind};
    use pretty_assertions::assert_eq;

    fn call(code: &str) -> InvocationExpression {
        let (unit, _) = SourceUnit::from_str(&format!("class A {{ void M() {{ {code} }} }}"));
        match &unit.methods[0].body[0].kind {
            StatementKind::Call(call) => call.clone(),
            _ => panic!("`{code}` is not a call"),
        }
    }

    #[test]
    fn overwrite_keeps_position() {
        let mut env = VariableEnvironment::new();
        env.declare("x", "1");
        env.declare("y", "2");
        env.declare("x", "3");

        let bindings: Vec<(&str, &str)> = env
            .iter()
            .map(|b| (b.name.as_str(), b.value.as_str()))
            .collect();
        assert_eq!(bindings, vec![("x", "3"), ("y", "2")]);
        assert_eq!(env.get("x"), Some("3"));
        assert_eq!(env.get("z"), None);
        assert_eq!(env.len(), 2);
    }

    #[test]
    fn substitute_identifier_argument() {
        let mut env = VariableEnvironment::new();
        env.declare("x", "7");
        assert_eq!(env.substitute_call(&call("Test(x);")), "Test(7)");
    }

    #[test]
    fn substitute_keeps_quotes_outside_placeholders() {
        let mut env = VariableEnvironment::new();
        env.declare("name", "\"Bob\"");
        assert_eq!(env.substitute_call(&call("Greet(name);")), "Greet(\"Bob\")");
    }

    #[test]
    fn substitute_placeholder_unquoted() {
        let mut env = VariableEnvironment::new();
        env.declare("message", "\"vlakas\"");
        assert_eq!(
            env.substitute_call(&call("Hix($\"Hello {message}\", message);")),
            "Hix($\"Hello vlakas\", message)"
        );
    }

    #[test]
    fn placeholders_of_all_bindings_are_replaced() {
        let mut env = VariableEnvironment::new();
        env.declare("count", "3");
        env.declare("unused", "\"u\"");
        assert_eq!(
            env.substitute_call(&call("Console.WriteLine($\"{count} {unused}\");")),
            "Console.WriteLine($\"3 u\")"
        );
    }

    #[test]
    fn non_identifier_arguments_are_left_alone() {
        let mut env = VariableEnvironment::new();
        env.declare("x", "7");
        assert_eq!(env.substitute_call(&call("Test(x + 1);")), "Test(x + 1)");
    }

    #[test]
    fn condition_substitution_is_plain_replacement() {
        let mut env = VariableEnvironment::new();
        env.declare("x", "7");
        assert_eq!(env.substitute_condition("x > 5"), "7 > 5");
        assert_eq!(env.substitute_condition("max > x"), "ma7 > 7");
    }
}
