//! Turns statements into flowchart nodes and edges.

use tracing::debug;

use crate::ast::{
    Declarator, ExpressionKind, IfStatement, InvocationExpression, Statement, StatementKind,
    VariableDeclaration,
};

use super::environment::VariableEnvironment;
use super::evaluator::{evaluate_binary, evaluate_condition};
use super::graph::{FlowchartDocument, NId, Shape};

/// Allocator for node ids. Shared by every method of a run.
#[derive(Debug, Clone)]
pub struct Cursor {
    next_nid: NId,
}

impl Cursor {
    pub fn new(start: NId) -> Self {
        Self { next_nid: start }
    }

    /// Take the next id.
    pub fn reserve(&mut self) -> NId {
        let nid = self.next_nid;
        self.next_nid += 1;
        nid
    }

    /// The id the next call to [Cursor::reserve] returns.
    pub fn peek(&self) -> NId {
        self.next_nid
    }
}

/// Builds the flowchart document while keeping track of variable values.
#[derive(Debug)]
pub struct Synthesizer {
    document: FlowchartDocument,
    environment: VariableEnvironment,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Synthesizer {
    pub fn new() -> Self {
        Self {
            document: FlowchartDocument::new(),
            environment: VariableEnvironment::new(),
        }
    }

    pub fn document_mut(&mut self) -> &mut FlowchartDocument {
        &mut self.document
    }

    pub fn finish(self) -> (FlowchartDocument, VariableEnvironment) {
        (self.document, self.environment)
    }

    /// Process statements in order, chaining each one to the previous tail. Returns the last
    /// tail, or `parent` if no statement produced a node.
    pub fn process_statements(
        &mut self,
        statements: &[Statement],
        cursor: &mut Cursor,
        parent: NId,
    ) -> NId {
        statements.iter().fold(parent, |parent, statement| {
            self.process_statement(statement, cursor, parent)
                .unwrap_or(parent)
        })
    }

    /// Process a single statement below `parent`. Returns the id subsequent statements should
    /// hang from, or `None` if the statement was not drawn.
    pub fn process_statement(
        &mut self,
        statement: &Statement,
        cursor: &mut Cursor,
        parent: NId,
    ) -> Option<NId> {
        match &statement.kind {
            StatementKind::VariableDeclaration(declaration) => {
                self.process_declaration(declaration, cursor, parent)
            }
            StatementKind::Call(call) => Some(self.process_call(call, cursor, parent)),
            StatementKind::If(if_statement) => {
                Some(self.process_if_statement(if_statement, cursor, parent))
            }
            StatementKind::Other => {
                let nid = cursor.reserve();
                debug!(nid, statement = statement.span.text().trim(), "Skipping statement");
                None
            }
        }
    }

    fn process_declaration(
        &mut self,
        declaration: &VariableDeclaration,
        cursor: &mut Cursor,
        parent: NId,
    ) -> Option<NId> {
        let nid = cursor.reserve();

        // Only the first declarator is drawn.
        let declarator = declaration.declarators.first()?;
        let value = Self::declared_value(declarator);
        self.environment.declare(&declarator.name, value.clone());

        let label = format!("{} = {}", declarator.name, value);
        debug!(nid, parent, label = %label, "Declaration");
        self.document.push_node(nid, label, Shape::Ellipse);
        self.document.push_edge(parent, nid, None);
        Some(nid)
    }

    /// The value stored for a declarator: the result of a binary initializer, the source text
    /// of any other initializer, or `null`.
    fn declared_value(declarator: &Declarator) -> String {
        match &declarator.initializer {
            Some(init) => match &init.kind {
                ExpressionKind::Binary(binary) => evaluate_binary(binary).to_string(),
                _ => init.text().to_string(),
            },
            None => "null".to_string(),
        }
    }

    fn process_call(
        &mut self,
        call: &InvocationExpression,
        cursor: &mut Cursor,
        parent: NId,
    ) -> NId {
        let nid = cursor.reserve();
        let label = self.environment.substitute_call(call);

        debug!(nid, parent, label = %label, "Call");
        self.document.push_node(nid, label, Shape::Box);
        self.document.push_edge(parent, nid, None);
        nid
    }

    fn process_if_statement(
        &mut self,
        if_statement: &IfStatement,
        cursor: &mut Cursor,
        parent: NId,
    ) -> NId {
        let diamond = cursor.reserve();
        let raw_condition = if_statement.condition.text();
        let condition = self.environment.substitute_condition(raw_condition);

        self.document.push_node(diamond, &condition, Shape::Diamond);
        self.document
            .push_edge(parent, diamond, Some(raw_condition.to_string()));

        let taken = evaluate_condition(&condition);
        debug!(nid = diamond, parent, condition = %condition, taken, "Condition");

        let branch = match taken {
            true => Some(&if_statement.then_branch),
            false => if_statement.else_branch.as_ref(),
        };

        let tail = match branch {
            Some(statements) => self.process_statements(statements, cursor, diamond),
            None => diamond,
        };

        // Ids reserved inside the branch stay taken, the cursor only moves forward.
        tail
    }
}
