//!  Trait for traversing the syntax tree.

use super::{
    Argument, Expression, ExpressionKind, IfStatement, InvocationExpression, LambdaBody,
    MethodDeclaration, Statement, StatementKind, VariableDeclaration,
};

/// Trait allowing for traversal of an immutable [super::SourceUnit].
///
/// The `do_visit_*` methods walk the children of a node. Implementors override `visit_*` and
/// call back into `do_visit_*` to keep descending.
pub trait Visitor {
    fn do_visit_method(&mut self, method: &MethodDeclaration) {
        for statement in &method.body {
            self.visit_statement(statement);
        }
    }

    fn do_visit_statement(&mut self, statement: &Statement) {
        match &statement.kind {
            StatementKind::VariableDeclaration(declaration) => {
                self.visit_variable_declaration(declaration);
            }
            StatementKind::Call(call) => {
                self.visit_call(call);
            }
            StatementKind::If(if_statement) => {
                self.visit_if_statement(if_statement);
            }
            StatementKind::Other => {}
        }
    }

    fn do_visit_variable_declaration(&mut self, declaration: &VariableDeclaration) {
        for declarator in &declaration.declarators {
            if let Some(init) = &declarator.initializer {
                self.visit_expression(init);
            }
        }
    }

    fn do_visit_if_statement(&mut self, if_statement: &IfStatement) {
        self.visit_expression(&if_statement.condition);
        for statement in &if_statement.then_branch {
            self.visit_statement(statement);
        }
        for statement in if_statement.else_branch.iter().flatten() {
            self.visit_statement(statement);
        }
    }

    fn do_visit_invocation(&mut self, call: &InvocationExpression) {
        self.visit_expression(&call.callee);
        self.visit_arguments(&call.arguments);
    }

    fn do_visit_expression(&mut self, expression: &Expression) {
        match &expression.kind {
            ExpressionKind::Binary(expr) => {
                self.visit_expression(&expr.left);
                self.visit_expression(&expr.right);
            }
            ExpressionKind::Unary(expr) => self.visit_expression(&expr.operand),
            ExpressionKind::Parenthesized(inner) => self.visit_expression(inner),
            ExpressionKind::Invocation(call) => self.do_visit_invocation(call),
            ExpressionKind::MemberAccess(expr) => self.visit_expression(&expr.target),
            ExpressionKind::ElementAccess(expr) => {
                self.visit_expression(&expr.target);
                self.visit_arguments(&expr.arguments);
            }
            ExpressionKind::Assignment(expr) => {
                self.visit_expression(&expr.target);
                self.visit_expression(&expr.value);
            }
            ExpressionKind::Conditional(expr) => {
                self.visit_expression(&expr.condition);
                self.visit_expression(&expr.when_true);
                self.visit_expression(&expr.when_false);
            }
            ExpressionKind::Cast(expr) => self.visit_expression(&expr.expression),
            ExpressionKind::ObjectCreation(expr) => self.visit_arguments(&expr.arguments),
            ExpressionKind::Lambda(lambda) => match &lambda.body {
                LambdaBody::Expression(body) => self.visit_expression(body),
                LambdaBody::Block(statements) => {
                    for statement in statements {
                        self.visit_statement(statement);
                    }
                }
            },
            ExpressionKind::Number(_)
            | ExpressionKind::Str(_)
            | ExpressionKind::Char(_)
            | ExpressionKind::Bool(_)
            | ExpressionKind::Null
            | ExpressionKind::Identifier(_)
            | ExpressionKind::Other => {}
        }
    }

    fn visit_method(&mut self, method: &MethodDeclaration) {
        self.do_visit_method(method);
    }

    fn visit_statement(&mut self, statement: &Statement) {
        self.do_visit_statement(statement);
    }

    fn visit_variable_declaration(&mut self, declaration: &VariableDeclaration) {
        self.do_visit_variable_declaration(declaration);
    }

    fn visit_call(&mut self, call: &InvocationExpression) {
        self.do_visit_invocation(call);
    }

    fn visit_if_statement(&mut self, if_statement: &IfStatement) {
        self.do_visit_if_statement(if_statement);
    }

    fn visit_arguments(&mut self, arguments: &[Argument]) {
        for argument in arguments {
            self.visit_expression(&argument.expression);
        }
    }

    fn visit_expression(&mut self, expression: &Expression) {
        self.do_visit_expression(expression);
    }
}
