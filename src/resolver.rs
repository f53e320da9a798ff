// ABOUTME: Static resolution pass computing lexical distances for the evaluator

use crate::ast::{Expr, NodeId, Stmt};
use crate::error::VeldError;
use crate::token::Token;
use std::collections::HashMap;

/// What kind of function body we are currently inside, for diagnosing
/// illegal `return`, `this`, and `super` uses.
#[derive(Debug, Clone, Copy, PartialEq)]
enum FunctionType {
    None,
    Function,
    Method,
    StaticMethod,
    Initializer,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Walks the AST keeping a stack of scopes (`name -> initialized?`) and
/// records, per resolvable expression, how many scopes up its binding lives.
/// Names that never match a local scope are left for the globals chain.
pub struct Resolver {
    scopes: Vec<HashMap<String, bool>>,
    locals: HashMap<NodeId, usize>,
    errors: Vec<VeldError>,
    current_function: FunctionType,
    current_class: ClassType,
}

impl Resolver {
    pub fn new() -> Self {
        Resolver {
            scopes: Vec::new(),
            locals: HashMap::new(),
            errors: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    pub fn resolve(mut self, statements: &[Stmt]) -> Result<HashMap<NodeId, usize>, Vec<VeldError>> {
        self.resolve_stmts(statements);
        if self.errors.is_empty() {
            Ok(self.locals)
        } else {
            Err(self.errors)
        }
    }

    fn resolve_stmts(&mut self, statements: &[Stmt]) {
        for statement in statements {
            self.resolve_stmt(statement);
        }
    }

    fn resolve_stmt(&mut self, statement: &Stmt) {
        match statement {
            Stmt::Expression { expr } | Stmt::Print { expr } => self.resolve_expr(expr),
            Stmt::Var { name, initializer } => {
                self.declare(name);
                if let Some(init) = initializer {
                    self.resolve_expr(init);
                }
                self.define(name);
            }
            Stmt::Block { statements } => {
                self.begin_scope();
                self.resolve_stmts(statements);
                self.end_scope();
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Stmt::While { condition, body, .. } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }
            Stmt::For {
                initializer,
                condition,
                increment,
                body,
                ..
            } => {
                // The initializer's variable lives in a scope wrapping the loop
                self.begin_scope();
                if let Some(init) = initializer {
                    self.resolve_stmt(init);
                }
                if let Some(condition) = condition {
                    self.resolve_expr(condition);
                }
                if let Some(increment) = increment {
                    self.resolve_expr(increment);
                }
                self.resolve_stmt(body);
                self.end_scope();
            }
            Stmt::Function { name, function } => {
                // Defined eagerly so the function can recurse into itself
                self.declare(name);
                self.define(name);
                if let Expr::Function { params, body } = function {
                    self.resolve_function(params, body, FunctionType::Function);
                }
            }
            Stmt::Class {
                name,
                superclass,
                methods,
                class_methods,
                class_fields,
                instance_fields,
            } => self.resolve_class(
                name,
                superclass.as_ref(),
                methods,
                class_methods,
                class_fields,
                instance_fields,
            ),
            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.error(keyword, "Can't return from top-level code.");
                }
                if let Some(value) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.error(keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expr(value);
                }
            }
            Stmt::Break { .. } | Stmt::Continue { .. } => {}
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[(Token, Expr)],
        class_methods: &[(Token, Expr)],
        class_fields: &[(Token, Expr)],
        instance_fields: &[(Token, Expr)],
    ) {
        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name);
        self.define(name);

        if let Some(superclass_expr) = superclass {
            if let Expr::Variable { name: super_name, .. } = superclass_expr {
                if super_name.lexeme == name.lexeme {
                    self.error(super_name, "A class can't inherit from itself.");
                }
            }
            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass_expr);
        }

        // Field initializers run outside the method scopes (statics at
        // declaration, instance fields per construction), so they are
        // resolved before the synthetic 'super'/'this' scopes are pushed
        // and may not mention either keyword.
        let saved_class = self.current_class;
        self.current_class = ClassType::None;
        for (_, initializer) in class_fields.iter().chain(instance_fields) {
            self.resolve_expr(initializer);
        }
        self.current_class = saved_class;

        if superclass.is_some() {
            self.begin_scope();
            self.scope_mut().insert("super".to_string(), true);
        }

        // Static methods see 'super' scope layout but never bind 'this'
        for (_, function) in class_methods {
            if let Expr::Function { params, body } = function {
                self.resolve_function(params, body, FunctionType::StaticMethod);
            }
        }

        self.begin_scope();
        self.scope_mut().insert("this".to_string(), true);

        for (method_name, function) in methods {
            let declaration = if method_name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            if let Expr::Function { params, body } = function {
                self.resolve_function(params, body, declaration);
            }
        }

        self.end_scope();
        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    fn resolve_expr(&mut self, expression: &Expr) {
        match expression {
            Expr::Literal { .. } => {}
            Expr::Variable { id, name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        self.error(name, "Can't read local variable in its own initializer.");
                    }
                }
                self.resolve_local(*id, name);
            }
            Expr::Assign { id, name, value } => {
                self.resolve_expr(value);
                self.resolve_local(*id, name);
            }
            Expr::Unary { operand, .. } => self.resolve_expr(operand),
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::Grouping { inner } => self.resolve_expr(inner),
            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }
            Expr::Get { object, .. } => self.resolve_expr(object),
            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }
            Expr::This { id, keyword } => {
                match self.current_class {
                    ClassType::None => {
                        self.error(keyword, "Can't use 'this' outside of a class.");
                        return;
                    }
                    _ if self.current_function == FunctionType::StaticMethod => {
                        self.error(keyword, "Can't use 'this' in a static method.");
                        return;
                    }
                    _ => {}
                }
                self.resolve_local(*id, keyword);
            }
            Expr::Super { id, keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        self.error(keyword, "Can't use 'super' outside of a class.");
                        return;
                    }
                    ClassType::Class => {
                        self.error(keyword, "Can't use 'super' in a class with no superclass.");
                        return;
                    }
                    ClassType::Subclass => {}
                }
                if self.current_function == FunctionType::StaticMethod {
                    self.error(keyword, "Can't use 'super' in a static method.");
                    return;
                }
                self.resolve_local(*id, keyword);
            }
            Expr::List { elements, .. } => {
                for element in elements {
                    self.resolve_expr(element);
                }
            }
            Expr::Dict { entries, .. } => {
                for (key, value) in entries {
                    self.resolve_expr(key);
                    self.resolve_expr(value);
                }
            }
            Expr::Index {
                container,
                index,
                end,
                ..
            } => {
                self.resolve_expr(container);
                if let Some(index) = index {
                    self.resolve_expr(index);
                }
                if let Some(end) = end {
                    self.resolve_expr(end);
                }
            }
            Expr::SetIndex { target, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(target);
            }
            Expr::Function { params, body } => {
                self.resolve_function(params, body, FunctionType::Function);
            }
        }
    }

    fn resolve_function(&mut self, params: &[Token], body: &[Stmt], kind: FunctionType) {
        let enclosing = std::mem::replace(&mut self.current_function, kind);
        self.begin_scope();
        for param in params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(body);
        self.end_scope();
        self.current_function = enclosing;
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn scope_mut(&mut self) -> &mut HashMap<String, bool> {
        self.scopes.last_mut().expect("scope stack is empty")
    }

    /// Adds the name to the innermost scope, not yet readable. Top-level
    /// declarations are dynamic and stay out of the scope stack.
    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                self.errors.push(VeldError::parse(
                    name,
                    "Already a variable with this name in this scope.",
                ));
                return;
            }
            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    /// Finds the innermost scope holding `name` and records the hop count.
    fn resolve_local(&mut self, id: NodeId, name: &Token) {
        for (distance, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                self.locals.insert(id, distance);
                return;
            }
        }
    }

    fn error(&mut self, token: &Token, message: &str) {
        self.errors.push(VeldError::parse(token, message));
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    fn resolve_source(source: &str) -> Result<HashMap<NodeId, usize>, Vec<VeldError>> {
        let tokens = Scanner::new(source).scan_tokens().expect("scan failed");
        let mut parser = Parser::new(tokens);
        let statements = parser.parse().expect("parse failed");
        Resolver::new().resolve(&statements)
    }

    fn first_message(source: &str) -> String {
        let errors = resolve_source(source).expect_err("expected resolution error");
        errors[0].message().to_string()
    }

    #[test]
    fn test_globals_are_unannotated() {
        let locals = resolve_source("var x = 1; print x;").unwrap();
        assert!(locals.is_empty());
    }

    #[test]
    fn test_local_distances() {
        let locals = resolve_source("{ var x = 1; { print x; } print x; }").unwrap();
        // One read at distance 1 (inner block) and one at distance 0
        let mut distances: Vec<usize> = locals.values().copied().collect();
        distances.sort();
        assert_eq!(distances, vec![0, 1]);
    }

    #[test]
    fn test_closure_captures_function_scope() {
        let locals =
            resolve_source("fun outer() { var x = 1; fun inner() { return x; } }").unwrap();
        assert!(locals.values().any(|d| *d == 1));
    }

    #[test]
    fn test_read_in_own_initializer() {
        assert_eq!(
            first_message("{ var a = 1; { var a = a; } }"),
            "Can't read local variable in its own initializer."
        );
    }

    #[test]
    fn test_duplicate_declaration_in_scope() {
        assert_eq!(
            first_message("{ var a = 1; var a = 2; }"),
            "Already a variable with this name in this scope."
        );
    }

    #[test]
    fn test_this_outside_class() {
        assert_eq!(
            first_message("fun f() { return this; }"),
            "Can't use 'this' outside of a class."
        );
    }

    #[test]
    fn test_super_without_superclass() {
        assert_eq!(
            first_message("class A { m() { super.m(); } }"),
            "Can't use 'super' in a class with no superclass."
        );
    }

    #[test]
    fn test_super_outside_class() {
        assert_eq!(
            first_message("fun f() { super.m(); }"),
            "Can't use 'super' outside of a class."
        );
    }

    #[test]
    fn test_self_inheritance() {
        assert_eq!(
            first_message("class A < A {}"),
            "A class can't inherit from itself."
        );
    }

    #[test]
    fn test_return_value_from_initializer() {
        assert_eq!(
            first_message("class A { init() { return 1; } }"),
            "Can't return a value from an initializer."
        );
    }

    #[test]
    fn test_bare_return_from_initializer_is_fine() {
        assert!(resolve_source("class A { init() { return; } }").is_ok());
    }

    #[test]
    fn test_this_in_static_method() {
        assert_eq!(
            first_message("class A { class m() { return this; } }"),
            "Can't use 'this' in a static method."
        );
    }

    #[test]
    fn test_super_in_static_method() {
        assert_eq!(
            first_message("class A {} class B < A { class m() { return super.m; } }"),
            "Can't use 'super' in a static method."
        );
    }

    #[test]
    fn test_this_in_field_initializer() {
        assert_eq!(
            first_message("class A { x = this; }"),
            "Can't use 'this' outside of a class."
        );
    }

    #[test]
    fn test_method_this_resolves() {
        let locals = resolve_source("class A { m() { return this; } }").unwrap();
        // 'this' resolves one hop out of the method body scope
        assert!(locals.values().any(|d| *d == 1));
    }
}
