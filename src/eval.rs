// ABOUTME: Tree-walking evaluator executing statements against the scope chain

use crate::ast::{Expr, LiteralValue, NodeId, Stmt};
use crate::builtins;
use crate::callable::{Callable, Function};
use crate::class::Class;
use crate::config::Options;
use crate::env::Environment;
use crate::error::{RunError, VeldError};
use crate::interrupt;
use crate::methods;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;
use crate::token::{Token, TokenType};
use crate::value::{eq_value, Key, Value};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The non-value channel evaluation can take.
///
/// `break`/`continue`/`return` are control flow, not errors: loops absorb the
/// first two, function call frames absorb the third, and only `Error` ever
/// reaches the driver.
#[derive(Debug)]
pub enum Signal {
    Error(VeldError),
    Break,
    Continue,
    Return(Value),
}

impl From<VeldError> for Signal {
    fn from(error: VeldError) -> Self {
        Signal::Error(error)
    }
}

/// Integer-or-float view used by the arithmetic matrix.
#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

pub struct Interpreter {
    pub globals: Rc<Environment>,
    environment: Rc<Environment>,
    locals: HashMap<NodeId, usize>,
    next_node_id: NodeId,
    options: Options,
    interrupted: Arc<AtomicBool>,
    capture: Option<Rc<RefCell<String>>>,
}

impl Interpreter {
    pub fn new(options: Options) -> Self {
        let globals = Environment::new();
        let interpreter = Interpreter {
            environment: globals.clone(),
            globals,
            locals: HashMap::new(),
            next_node_id: 0,
            options,
            interrupted: interrupt::register(),
            capture: None,
        };
        builtins::register(&interpreter);
        interpreter
    }

    /// Flips this interpreter's cancellation token, the same way a SIGINT
    /// would. The next loop iteration boundary raises "loop interrupted".
    pub fn request_interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    /// Redirects `print` and REPL echo into a buffer; used by tests.
    pub fn capture_output(&mut self) -> Rc<RefCell<String>> {
        let buffer = Rc::new(RefCell::new(String::new()));
        self.capture = Some(buffer.clone());
        buffer
    }

    // ------------------------------------------------------------------
    // Registration surface for built-in collaborators
    // ------------------------------------------------------------------

    pub fn define_global(&self, name: &str, value: Value) {
        self.globals.define(name, value);
    }

    pub fn unsafe_mode(&self) -> bool {
        self.options.unsafe_mode
    }

    pub fn global_scope_names(&self) -> Vec<String> {
        self.globals.names()
    }

    pub fn local_scope_names(&self) -> Vec<String> {
        self.environment.names()
    }

    // ------------------------------------------------------------------
    // Drivers
    // ------------------------------------------------------------------

    /// Scan, parse, resolve, and execute a source unit.
    pub fn run(&mut self, source: &str) -> Result<(), RunError> {
        let statements = self.front_end(source)?;
        self.interpret(&statements, false).map_err(RunError::Runtime)
    }

    /// Like [`run`](Self::run), but bare top-level expression results echo
    /// back as `=> repr` lines, the way the REPL shows them.
    pub fn run_interactive(&mut self, source: &str) -> Result<(), RunError> {
        let statements = self.front_end(source)?;
        self.interpret(&statements, true).map_err(RunError::Runtime)
    }

    /// Front end only: scan, parse, resolve. Used by `--no-run`.
    pub fn check(&mut self, source: &str) -> Result<(), RunError> {
        self.front_end(source).map(|_| ())
    }

    fn front_end(&mut self, source: &str) -> Result<Vec<Stmt>, RunError> {
        let tokens = Scanner::new(source).scan_tokens().map_err(RunError::Static)?;
        let mut parser = Parser::with_start_id(tokens, self.next_node_id);
        let parsed = parser.parse();
        // Ids consumed by a failed parse stay burned; uniqueness is what matters
        self.next_node_id = parser.next_node_id();
        let statements = parsed.map_err(RunError::Static)?;
        let locals = Resolver::new()
            .resolve(&statements)
            .map_err(RunError::Static)?;
        self.locals.extend(locals);
        Ok(statements)
    }

    fn interpret(&mut self, statements: &[Stmt], interactive: bool) -> Result<(), VeldError> {
        for statement in statements {
            if interactive {
                if let Stmt::Expression { expr } = statement {
                    if !expr.is_assignment() {
                        let value = self.evaluate(expr).map_err(Self::into_error)?;
                        self.write_line(&format!("=> {}", value.repr()));
                        continue;
                    }
                }
            }
            match self.execute(statement) {
                Ok(()) => {}
                Err(Signal::Error(error)) => return Err(error),
                // Parser guards keep break/continue/return out of top level
                Err(_) => unreachable!("control-flow signal escaped to top level"),
            }
        }
        Ok(())
    }

    fn into_error(signal: Signal) -> VeldError {
        match signal {
            Signal::Error(error) => error,
            _ => unreachable!("control-flow signal escaped to top level"),
        }
    }

    fn write_line(&self, text: &str) {
        match &self.capture {
            Some(buffer) => {
                let mut buffer = buffer.borrow_mut();
                buffer.push_str(text);
                buffer.push('\n');
            }
            None => println!("{text}"),
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn execute(&mut self, statement: &Stmt) -> Result<(), Signal> {
        match statement {
            Stmt::Expression { expr } => {
                self.evaluate(expr)?;
                Ok(())
            }
            Stmt::Print { expr } => {
                let value = self.evaluate(expr)?;
                self.write_line(&value.display());
                Ok(())
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                self.environment.define(name.lexeme.clone(), value);
                Ok(())
            }
            Stmt::Block { statements } => self.execute_block(
                statements,
                Environment::with_enclosing(self.environment.clone()),
            ),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(())
                }
            }
            Stmt::While {
                keyword,
                condition,
                body,
            } => {
                loop {
                    self.check_interrupt(keyword)?;
                    if !self.evaluate(condition)?.is_truthy() {
                        break;
                    }
                    match self.execute(body) {
                        Ok(()) | Err(Signal::Continue) => {}
                        Err(Signal::Break) => break,
                        Err(other) => return Err(other),
                    }
                }
                Ok(())
            }
            Stmt::For {
                keyword,
                initializer,
                condition,
                increment,
                body,
            } => {
                let environment = Environment::with_enclosing(self.environment.clone());
                let previous = std::mem::replace(&mut self.environment, environment);
                let result = self.run_for(keyword, initializer, condition, increment, body);
                self.environment = previous;
                result
            }
            Stmt::Function { name, function } => {
                let Expr::Function { params, body } = function else {
                    unreachable!("function statement without function expression");
                };
                let function = Rc::new(Function {
                    name: Some(name.lexeme.clone()),
                    params: params.clone(),
                    body: body.clone(),
                    closure: self.environment.clone(),
                    is_initializer: false,
                });
                self.environment
                    .define(name.lexeme.clone(), Value::Function(function));
                Ok(())
            }
            Stmt::Class {
                name,
                superclass,
                methods,
                class_methods,
                class_fields,
                instance_fields,
            } => self.execute_class(
                name,
                superclass.as_ref(),
                methods,
                class_methods,
                class_fields,
                instance_fields,
            ),
            Stmt::Return { keyword: _, value } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                Err(Signal::Return(value))
            }
            Stmt::Break { .. } => Err(Signal::Break),
            Stmt::Continue { .. } => Err(Signal::Continue),
        }
    }

    fn run_for(
        &mut self,
        keyword: &Token,
        initializer: &Option<Box<Stmt>>,
        condition: &Option<Expr>,
        increment: &Option<Expr>,
        body: &Stmt,
    ) -> Result<(), Signal> {
        if let Some(initializer) = initializer {
            self.execute(initializer)?;
        }
        loop {
            self.check_interrupt(keyword)?;
            if let Some(condition) = condition {
                if !self.evaluate(condition)?.is_truthy() {
                    break;
                }
            }
            match self.execute(body) {
                // continue still runs the increment clause
                Ok(()) | Err(Signal::Continue) => {}
                Err(Signal::Break) => break,
                Err(other) => return Err(other),
            }
            if let Some(increment) = increment {
                self.evaluate(increment)?;
            }
        }
        Ok(())
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[(Token, Expr)],
        class_methods: &[(Token, Expr)],
        class_fields: &[(Token, Expr)],
        instance_fields: &[(Token, Expr)],
    ) -> Result<(), Signal> {
        let superclass_value = match superclass {
            Some(expr) => {
                let value = self.evaluate(expr)?;
                let Expr::Variable {
                    name: super_name, ..
                } = expr
                else {
                    unreachable!("superclass is always a variable expression");
                };
                match value {
                    Value::Class(class) => Some(class),
                    _ => {
                        return Err(
                            VeldError::runtime(super_name, "Superclass must be a class.").into()
                        )
                    }
                }
            }
            None => None,
        };

        self.environment.define(name.lexeme.clone(), Value::Nil);
        let declaration_env = self.environment.clone();

        // Methods close over a scope holding 'super' when there is one
        let method_env = match &superclass_value {
            Some(superclass) => {
                let environment = Environment::with_enclosing(declaration_env.clone());
                environment.define("super", Value::Class(superclass.clone()));
                environment
            }
            None => declaration_env.clone(),
        };

        let mut method_map = HashMap::new();
        for (method_name, function) in methods {
            let Expr::Function { params, body } = function else {
                unreachable!("method without function expression");
            };
            let function = Rc::new(Function {
                name: Some(method_name.lexeme.clone()),
                params: params.clone(),
                body: body.clone(),
                closure: method_env.clone(),
                is_initializer: method_name.lexeme == "init",
            });
            method_map.insert(method_name.lexeme.clone(), function);
        }

        // Static fields evaluate once, right now
        let mut statics = HashMap::new();
        for (field_name, initializer) in class_fields {
            let value = self.evaluate(initializer)?;
            statics.insert(field_name.lexeme.clone(), value);
        }
        for (method_name, function) in class_methods {
            let Expr::Function { params, body } = function else {
                unreachable!("static method without function expression");
            };
            let function = Rc::new(Function {
                name: Some(method_name.lexeme.clone()),
                params: params.clone(),
                body: body.clone(),
                closure: method_env.clone(),
                is_initializer: false,
            });
            statics.insert(method_name.lexeme.clone(), Value::Function(function));
        }

        // Instance field initializers are captured, not evaluated: each
        // construction re-runs them against the declaration environment
        let field_inits = instance_fields
            .iter()
            .map(|(field_name, initializer)| (field_name.lexeme.clone(), initializer.clone()))
            .collect();

        let class = Class::new(
            name.lexeme.clone(),
            superclass_value,
            method_map,
            statics,
            field_inits,
            declaration_env,
        );
        self.environment
            .define(name.lexeme.clone(), Value::Class(class));
        Ok(())
    }

    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<Environment>,
    ) -> Result<(), Signal> {
        let previous = std::mem::replace(&mut self.environment, environment);
        let mut result = Ok(());
        for statement in statements {
            result = self.execute(statement);
            if result.is_err() {
                break;
            }
        }
        self.environment = previous;
        result
    }

    /// Evaluates an expression against a specific environment; used for
    /// per-construction instance field initializers.
    pub fn evaluate_in(
        &mut self,
        expr: &Expr,
        environment: Rc<Environment>,
    ) -> Result<Value, Signal> {
        let previous = std::mem::replace(&mut self.environment, environment);
        let result = self.evaluate(expr);
        self.environment = previous;
        result
    }

    /// Samples and clears the cancellation token, so one Ctrl-C aborts the
    /// loops running at that moment and the next statement starts fresh.
    fn check_interrupt(&self, keyword: &Token) -> Result<(), Signal> {
        if self.interrupted.swap(false, Ordering::SeqCst) {
            return Err(VeldError::runtime(keyword, "loop interrupted").into());
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, Signal> {
        match expr {
            Expr::Literal { value } => Ok(match value {
                LiteralValue::Nil => Value::Nil,
                LiteralValue::Bool(b) => Value::Bool(*b),
                LiteralValue::Int(i) => Value::Int(*i),
                LiteralValue::Float(f) => Value::Float(*f),
                LiteralValue::Str { text, quote } => Value::str_with_quote(text.clone(), *quote),
            }),
            Expr::Variable { id, name } => self.look_up_variable(name, *id),
            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;
                match self.locals.get(id) {
                    Some(distance) => {
                        self.environment.assign_at(*distance, &name.lexeme, value.clone());
                    }
                    None => {
                        if !self.globals.assign(&name.lexeme, value.clone()) {
                            return Err(VeldError::runtime(
                                name,
                                format!("Undefined variable '{}'.", name.lexeme),
                            )
                            .into());
                        }
                    }
                }
                Ok(value)
            }
            Expr::Unary { operator, operand } => {
                let operand = self.evaluate(operand)?;
                self.unary(operator, operand)
            }
            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                self.binary(left, operator, right)
            }
            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let take_left = match operator.kind {
                    TokenType::Or => left.is_truthy(),
                    _ => !left.is_truthy(),
                };
                if take_left {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }
            Expr::Grouping { inner } => self.evaluate(inner),
            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;
                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate(argument)?);
                }
                self.call_value(callee, args, paren)
            }
            Expr::Get { object, name } => {
                let object = self.evaluate(object)?;
                self.get_property(object, name)
            }
            Expr::Set {
                object,
                name,
                value,
            } => {
                let object = self.evaluate(object)?;
                match object {
                    Value::Instance(instance) => {
                        let value = self.evaluate(value)?;
                        instance.set(&name.lexeme, value.clone());
                        Ok(value)
                    }
                    Value::Class(class) => {
                        let value = self.evaluate(value)?;
                        class
                            .statics
                            .borrow_mut()
                            .insert(name.lexeme.clone(), value.clone());
                        Ok(value)
                    }
                    _ => Err(VeldError::runtime(name, "Only instances have properties.").into()),
                }
            }
            Expr::This { id, keyword } => self.look_up_variable(keyword, *id),
            Expr::Super {
                id,
                keyword: _,
                method,
            } => {
                let distance = *self
                    .locals
                    .get(id)
                    .expect("'super' expression left unresolved");
                let Value::Class(superclass) = self.environment.get_at(distance, "super") else {
                    panic!("'super' resolved to a non-class value");
                };
                let Value::Instance(object) = self.environment.get_at(distance - 1, "this") else {
                    panic!("'this' resolved to a non-instance value");
                };
                let function = superclass.find_method(&method.lexeme).ok_or_else(|| {
                    VeldError::runtime(
                        method,
                        format!("Undefined property '{}'.", method.lexeme),
                    )
                })?;
                Ok(Value::Function(function.bind(object)))
            }
            Expr::List { elements, .. } => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.evaluate(element)?);
                }
                Ok(Value::list(items))
            }
            Expr::Dict { entries, brace } => {
                let mut dict = IndexMap::new();
                for (key_expr, value_expr) in entries {
                    let key_value = self.evaluate(key_expr)?;
                    let key = Key::from_value(&key_value).ok_or_else(|| {
                        VeldError::runtime(
                            brace,
                            format!(
                                "Only strings, numbers, booleans, and nil can be used as keys, got {}.",
                                key_value.type_name()
                            ),
                        )
                    })?;
                    let value = self.evaluate(value_expr)?;
                    dict.insert(key, value);
                }
                Ok(Value::dict(dict))
            }
            Expr::Index {
                container,
                index,
                end,
                bracket,
                is_slice,
            } => {
                let container = self.evaluate(container)?;
                if *is_slice {
                    let start = match index {
                        Some(expr) => Some(self.evaluate(expr)?),
                        None => None,
                    };
                    let stop = match end {
                        Some(expr) => Some(self.evaluate(expr)?),
                        None => None,
                    };
                    self.slice_value(container, start, stop, bracket)
                } else {
                    let index = index.as_ref().expect("plain index without index expression");
                    let index = self.evaluate(index)?;
                    self.index_value(container, index, bracket)
                }
            }
            Expr::SetIndex {
                target,
                value,
                bracket: _,
            } => self.assign_indexed(target, value),
            Expr::Function { params, body } => Ok(Value::Function(Rc::new(Function {
                name: None,
                params: params.clone(),
                body: body.clone(),
                closure: self.environment.clone(),
                is_initializer: false,
            }))),
        }
    }

    fn look_up_variable(&mut self, name: &Token, id: NodeId) -> Result<Value, Signal> {
        match self.locals.get(&id) {
            Some(distance) => Ok(self.environment.get_at(*distance, &name.lexeme)),
            None => self.globals.get(&name.lexeme).ok_or_else(|| {
                VeldError::runtime(name, format!("Undefined variable '{}'.", name.lexeme)).into()
            }),
        }
    }

    // ------------------------------------------------------------------
    // Calls and properties
    // ------------------------------------------------------------------

    fn call_value(
        &mut self,
        callee: Value,
        args: Vec<Value>,
        paren: &Token,
    ) -> Result<Value, Signal> {
        match &callee {
            Value::Function(function) => {
                self.check_arity(function.arity(), args.len(), paren)?;
                function.call(self, args, paren)
            }
            Value::Class(class) => {
                self.check_arity(class.arity(), args.len(), paren)?;
                class.call(self, args, paren)
            }
            Value::Native(native) => {
                self.check_arity(native.arity(), args.len(), paren)?;
                native.call(self, args, paren)
            }
            _ => Err(VeldError::runtime(paren, "Can only call functions and classes.").into()),
        }
    }

    fn check_arity(&self, arity: i32, got: usize, paren: &Token) -> Result<(), Signal> {
        if arity >= 0 && got != arity as usize {
            return Err(VeldError::runtime(
                paren,
                format!("Expected {arity} arguments but got {got}."),
            )
            .into());
        }
        Ok(())
    }

    fn get_property(&mut self, object: Value, name: &Token) -> Result<Value, Signal> {
        match &object {
            Value::Instance(instance) => instance.get(&name.lexeme).ok_or_else(|| {
                VeldError::runtime(name, format!("Undefined property '{}'.", name.lexeme)).into()
            }),
            Value::Class(class) => class.find_static(&name.lexeme).ok_or_else(|| {
                VeldError::runtime(name, format!("Undefined property '{}'.", name.lexeme)).into()
            }),
            Value::List(_)
            | Value::Buffer(_)
            | Value::Dict(_)
            | Value::Set(_)
            | Value::Queue(_)
            | Value::Stack(_)
            | Value::Str(_) => methods::lookup(&object, &name.lexeme).ok_or_else(|| {
                VeldError::runtime(name, format!("Undefined property '{}'.", name.lexeme)).into()
            }),
            _ => Err(VeldError::runtime(name, "Only instances have properties.").into()),
        }
    }

    // ------------------------------------------------------------------
    // Indexing
    // ------------------------------------------------------------------

    fn require_index(&self, index: &Value, bracket: &Token) -> Result<i64, Signal> {
        match index {
            Value::Int(i) => Ok(*i),
            _ => Err(VeldError::runtime(bracket, "Index must be an integer.").into()),
        }
    }

    fn index_value(
        &mut self,
        container: Value,
        index: Value,
        bracket: &Token,
    ) -> Result<Value, Signal> {
        match &container {
            Value::List(items) => {
                let i = self.require_index(&index, bracket)?;
                let items = items.borrow();
                if i < 0 || i as usize >= items.len() {
                    return Err(VeldError::runtime(bracket, "List index out of range.").into());
                }
                Ok(items[i as usize].clone())
            }
            Value::Buffer(bytes) => {
                let i = self.require_index(&index, bracket)?;
                let bytes = bytes.borrow();
                if i < 0 || i as usize >= bytes.len() {
                    return Err(VeldError::runtime(bracket, "Buffer index out of range.").into());
                }
                Ok(Value::Int(bytes[i as usize] as i64))
            }
            Value::Str(s) => {
                let i = self.require_index(&index, bracket)?;
                if i < 0 {
                    return Err(VeldError::runtime(bracket, "String index out of range.").into());
                }
                match s.text.chars().nth(i as usize) {
                    Some(ch) => Ok(Value::single_char(ch)),
                    None => Err(VeldError::runtime(bracket, "String index out of range.").into()),
                }
            }
            Value::Dict(entries) => {
                let key = Key::from_value(&index).ok_or_else(|| {
                    VeldError::runtime(
                        bracket,
                        format!(
                            "Only strings, numbers, booleans, and nil can be used as keys, got {}.",
                            index.type_name()
                        ),
                    )
                })?;
                Ok(entries.borrow().get(&key).cloned().unwrap_or(Value::Nil))
            }
            _ => Err(VeldError::runtime(
                bracket,
                "Can only index into dictionaries, lists, and strings.",
            )
            .into()),
        }
    }

    fn slice_value(
        &mut self,
        container: Value,
        start: Option<Value>,
        stop: Option<Value>,
        bracket: &Token,
    ) -> Result<Value, Signal> {
        let start = match start {
            Some(value) => self.require_index(&value, bracket)?,
            None => 0,
        };
        if start < 0 {
            return Err(VeldError::runtime(bracket, "Slice indices must be non-negative.").into());
        }

        // The end bound clamps into range; start past the end yields empty
        let bounds = |len: usize| -> (usize, usize) {
            let stop_raw = match &stop {
                Some(Value::Int(i)) => *i,
                _ => len as i64,
            };
            let end = stop_raw.clamp(0, len as i64) as usize;
            ((start as usize).min(len), end)
        };
        if let Some(value) = &stop {
            if !matches!(value, Value::Int(_)) {
                return Err(VeldError::runtime(bracket, "Index must be an integer.").into());
            }
        }

        match &container {
            Value::List(items) => {
                let items = items.borrow();
                let (lo, hi) = bounds(items.len());
                if lo >= hi {
                    return Ok(Value::list(Vec::new()));
                }
                Ok(Value::list(items[lo..hi].to_vec()))
            }
            Value::Buffer(bytes) => {
                let bytes = bytes.borrow();
                let (lo, hi) = bounds(bytes.len());
                if lo >= hi {
                    return Ok(Value::buffer(Vec::new()));
                }
                Ok(Value::buffer(bytes[lo..hi].to_vec()))
            }
            Value::Str(s) => {
                let len = s.text.chars().count();
                let (lo, hi) = bounds(len);
                if lo >= hi {
                    return Ok(Value::str_with_quote(String::new(), s.quote));
                }
                let text: String = s.text.chars().skip(lo).take(hi - lo).collect();
                Ok(Value::str_with_quote(text, s.quote))
            }
            Value::Dict(_) => {
                Err(VeldError::runtime(bracket, "Cannot slice a dictionary.").into())
            }
            _ => Err(VeldError::runtime(
                bracket,
                "Can only index into dictionaries, lists, and strings.",
            )
            .into()),
        }
    }

    /// `a[i][j] = v`: unwrap the Index chain, evaluate the base container and
    /// the index values left to right, descend through all but the last hop,
    /// then write at the final one.
    fn assign_indexed(&mut self, target: &Expr, value: &Expr) -> Result<Value, Signal> {
        let mut chain: Vec<(&Expr, &Token)> = Vec::new();
        let mut base: &Expr = target;
        while let Expr::Index {
            container,
            index,
            bracket,
            is_slice: false,
            ..
        } = base
        {
            let index = index.as_deref().expect("plain index without index expression");
            chain.push((index, bracket));
            base = container.as_ref();
        }
        chain.reverse();

        let mut current = self.evaluate(base)?;
        let mut indices = Vec::with_capacity(chain.len());
        for (index_expr, bracket) in &chain {
            indices.push((self.evaluate(index_expr)?, *bracket));
        }
        let value = self.evaluate(value)?;

        let (last, rest) = indices.split_last().expect("SetIndex without index chain");
        for (index, bracket) in rest {
            current = self.index_value(current, index.clone(), bracket)?;
        }
        let (last_index, last_bracket) = last;
        self.index_set(current, last_index.clone(), value.clone(), last_bracket)?;
        Ok(value)
    }

    fn index_set(
        &mut self,
        container: Value,
        index: Value,
        value: Value,
        bracket: &Token,
    ) -> Result<(), Signal> {
        match &container {
            Value::List(items) => {
                let i = self.require_index(&index, bracket)?;
                let mut items = items.borrow_mut();
                if i < 0 || i as usize >= items.len() {
                    return Err(VeldError::runtime(bracket, "List index out of range.").into());
                }
                items[i as usize] = value;
                Ok(())
            }
            Value::Buffer(bytes) => {
                let i = self.require_index(&index, bracket)?;
                let byte = match value {
                    Value::Int(b) if (0..=255).contains(&b) => b as u8,
                    _ => {
                        return Err(VeldError::runtime(
                            bracket,
                            "Buffer elements must be integers between 0 and 255.",
                        )
                        .into())
                    }
                };
                let mut bytes = bytes.borrow_mut();
                if i < 0 || i as usize >= bytes.len() {
                    return Err(VeldError::runtime(bracket, "Buffer index out of range.").into());
                }
                bytes[i as usize] = byte;
                Ok(())
            }
            Value::Dict(entries) => {
                let key = Key::from_value(&index).ok_or_else(|| {
                    VeldError::runtime(
                        bracket,
                        format!(
                            "Only strings, numbers, booleans, and nil can be used as keys, got {}.",
                            index.type_name()
                        ),
                    )
                })?;
                entries.borrow_mut().insert(key, value);
                Ok(())
            }
            _ => Err(VeldError::runtime(
                bracket,
                "Can only assign into dictionaries, lists, and buffers.",
            )
            .into()),
        }
    }

    // ------------------------------------------------------------------
    // Operators
    // ------------------------------------------------------------------

    fn unary(&mut self, operator: &Token, operand: Value) -> Result<Value, Signal> {
        match operator.kind {
            // Negating a non-number yields NaN rather than erroring
            TokenType::Minus => Ok(match operand {
                Value::Int(i) => Value::Int(i.wrapping_neg()),
                Value::Float(f) => Value::Float(-f),
                Value::Bool(b) => Value::Int(-(b as i64)),
                Value::Nil => Value::Int(0),
                _ => Value::Float(f64::NAN),
            }),
            TokenType::Bang => Ok(Value::Bool(!operand.is_truthy())),
            TokenType::Tilde => match int_operand(&operand) {
                Some(i) => Ok(Value::Int(!i)),
                None => Err(VeldError::runtime(operator, "Operand must be a number.").into()),
            },
            _ => unreachable!("invalid unary operator"),
        }
    }

    fn binary(&mut self, left: Value, operator: &Token, right: Value) -> Result<Value, Signal> {
        match operator.kind {
            TokenType::Plus => self.add(left, operator, right),
            TokenType::Minus => match (arith_num(&left), arith_num(&right)) {
                (Some(a), Some(b)) => Ok(num_binary(a, b, operator.kind)),
                _ => Err(self.op_error(operator, "Operands must be numbers.")),
            },
            TokenType::Star => self.multiply(left, operator, right),
            TokenType::Slash => match (arith_num(&left), arith_num(&right)) {
                (Some(Num::Int(a)), Some(Num::Int(b))) => {
                    if b == 0 {
                        return Err(self.op_error(operator, "Division by zero."));
                    }
                    if a.wrapping_rem(b) == 0 {
                        Ok(Value::Int(a.wrapping_div(b)))
                    } else {
                        Ok(Value::Float(a as f64 / b as f64))
                    }
                }
                // Float division follows IEEE-754: ±Inf or NaN on zero
                (Some(a), Some(b)) => Ok(Value::Float(as_f64(a) / as_f64(b))),
                _ => Err(self.op_error(operator, "Operands must be numbers.")),
            },
            TokenType::Percent => match (arith_num(&left), arith_num(&right)) {
                (Some(Num::Int(a)), Some(Num::Int(b))) => {
                    if b == 0 {
                        return Err(self.op_error(operator, "Division by zero."));
                    }
                    Ok(Value::Int(a.wrapping_rem(b)))
                }
                (Some(a), Some(b)) => Ok(Value::Float(as_f64(a) % as_f64(b))),
                _ => Err(self.op_error(operator, "Operands must be numbers.")),
            },
            TokenType::StarStar => match (arith_num(&left), arith_num(&right)) {
                (Some(Num::Int(a)), Some(Num::Int(b))) if b >= 0 => {
                    let result = u32::try_from(b)
                        .ok()
                        .and_then(|exponent| a.checked_pow(exponent));
                    match result {
                        Some(i) => Ok(Value::Int(i)),
                        // Overflowing powers spill into float
                        None => Ok(Value::Float((a as f64).powf(b as f64))),
                    }
                }
                (Some(a), Some(b)) => Ok(Value::Float(as_f64(a).powf(as_f64(b)))),
                _ => Err(self.op_error(operator, "Operands must be numbers.")),
            },
            TokenType::LessLess
            | TokenType::GreaterGreater
            | TokenType::Amp
            | TokenType::Pipe
            | TokenType::Caret => match (int_operand(&left), int_operand(&right)) {
                (Some(a), Some(b)) => self.int_binary(a, b, operator),
                _ => Err(self.op_error(operator, "Operands must be numbers.")),
            },
            TokenType::Less | TokenType::LessEqual | TokenType::Greater | TokenType::GreaterEqual => {
                self.compare(left, operator, right)
            }
            TokenType::EqualEqual => Ok(Value::Bool(eq_value(&left, &right))),
            TokenType::BangEqual => Ok(Value::Bool(!eq_value(&left, &right))),
            _ => unreachable!("invalid binary operator"),
        }
    }

    fn add(&mut self, left: Value, operator: &Token, right: Value) -> Result<Value, Signal> {
        match (&left, &right) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::str_with_quote(
                format!("{}{}", a.text, b.text),
                a.quote,
            )),
            // Numbers, bools, and nil coerce to their printable form next to
            // a string: "x" + 3 is "x3", nil + "x" is "nilx"
            (Value::Str(a), b @ (Value::Int(_) | Value::Float(_) | Value::Bool(_) | Value::Nil)) => {
                Ok(Value::str_with_quote(
                    format!("{}{}", a.text, b.display()),
                    a.quote,
                ))
            }
            (a @ (Value::Int(_) | Value::Float(_) | Value::Bool(_) | Value::Nil), Value::Str(b)) => {
                Ok(Value::str_with_quote(
                    format!("{}{}", a.display(), b.text),
                    b.quote,
                ))
            }
            (Value::List(a), Value::List(b)) => {
                let mut items = a.borrow().clone();
                items.extend(b.borrow().iter().cloned());
                Ok(Value::list(items))
            }
            _ => match (arith_num(&left), arith_num(&right)) {
                (Some(a), Some(b)) => Ok(num_binary(a, b, TokenType::Plus)),
                _ => Err(self.op_error(operator, "Operands must be two numbers or two strings.")),
            },
        }
    }

    fn multiply(&mut self, left: Value, operator: &Token, right: Value) -> Result<Value, Signal> {
        if let Some(repeated) = repeat_value(&left, &right) {
            return Ok(repeated);
        }
        match (arith_num(&left), arith_num(&right)) {
            (Some(a), Some(b)) => Ok(num_binary(a, b, TokenType::Star)),
            _ => Err(self.op_error(operator, "Operands must be numbers.")),
        }
    }

    fn int_binary(&self, a: i64, b: i64, operator: &Token) -> Result<Value, Signal> {
        let result = match operator.kind {
            TokenType::Amp => a & b,
            TokenType::Pipe => a | b,
            TokenType::Caret => a ^ b,
            TokenType::LessLess => {
                if b < 0 {
                    return Err(self.op_error(operator, "Negative shift amount."));
                }
                if b >= 64 {
                    0
                } else {
                    ((a as u64) << b) as i64
                }
            }
            TokenType::GreaterGreater => {
                if b < 0 {
                    return Err(self.op_error(operator, "Negative shift amount."));
                }
                if b >= 64 {
                    if a < 0 {
                        -1
                    } else {
                        0
                    }
                } else {
                    a >> b
                }
            }
            _ => unreachable!("invalid integer operator"),
        };
        Ok(Value::Int(result))
    }

    fn compare(&mut self, left: Value, operator: &Token, right: Value) -> Result<Value, Signal> {
        if let (Value::Str(a), Value::Str(b)) = (&left, &right) {
            let result = match operator.kind {
                TokenType::Less => a.text < b.text,
                TokenType::LessEqual => a.text <= b.text,
                TokenType::Greater => a.text > b.text,
                _ => a.text >= b.text,
            };
            return Ok(Value::Bool(result));
        }

        match (strict_num(&left), strict_num(&right)) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => Ok(Value::Bool(match operator.kind {
                TokenType::Less => a < b,
                TokenType::LessEqual => a <= b,
                TokenType::Greater => a > b,
                _ => a >= b,
            })),
            // NaN comparisons are false either way
            (Some(a), Some(b)) => {
                let (a, b) = (as_f64(a), as_f64(b));
                Ok(Value::Bool(match operator.kind {
                    TokenType::Less => a < b,
                    TokenType::LessEqual => a <= b,
                    TokenType::Greater => a > b,
                    _ => a >= b,
                }))
            }
            _ => Err(self.op_error(operator, "Operands must be two numbers or two strings.")),
        }
    }

    fn op_error(&self, operator: &Token, message: &str) -> Signal {
        VeldError::runtime(operator, message).into()
    }
}

/// `string * n` / `list * n` repetition, in either operand order.
/// Non-positive counts yield an empty result.
fn repeat_value(left: &Value, right: &Value) -> Option<Value> {
    fn repeat_count(value: &Value) -> Option<i64> {
        match value {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    let (sequence, n) = match (left, right) {
        (Value::Str(_), other) | (Value::List(_), other) => (left, repeat_count(other)?),
        (other, Value::Str(_)) | (other, Value::List(_)) => (right, repeat_count(other)?),
        _ => return None,
    };

    match sequence {
        Value::Str(s) => {
            let text = if n <= 0 {
                String::new()
            } else {
                s.text.repeat(n as usize)
            };
            Some(Value::str_with_quote(text, s.quote))
        }
        Value::List(items) => {
            let mut result = Vec::new();
            if n > 0 {
                let items = items.borrow();
                result.reserve(items.len() * n as usize);
                for _ in 0..n {
                    result.extend(items.iter().cloned());
                }
            }
            Some(Value::list(result))
        }
        _ => None,
    }
}

/// Numeric view for arithmetic: bools count as ints, nil as zero.
fn arith_num(value: &Value) -> Option<Num> {
    match value {
        Value::Int(i) => Some(Num::Int(*i)),
        Value::Float(f) => Some(Num::Float(*f)),
        Value::Bool(b) => Some(Num::Int(*b as i64)),
        Value::Nil => Some(Num::Int(0)),
        _ => None,
    }
}

/// Numeric view for comparisons: nil does not order.
fn strict_num(value: &Value) -> Option<Num> {
    match value {
        Value::Int(i) => Some(Num::Int(*i)),
        Value::Float(f) => Some(Num::Float(*f)),
        Value::Bool(b) => Some(Num::Int(*b as i64)),
        _ => None,
    }
}

/// Integer view for bitwise and shift operators: floats truncate.
fn int_operand(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Float(f) => Some(*f as i64),
        Value::Bool(b) => Some(*b as i64),
        _ => None,
    }
}

fn as_f64(n: Num) -> f64 {
    match n {
        Num::Int(i) => i as f64,
        Num::Float(f) => f,
    }
}

/// `+ - *` over the int/float promotion rules. Int arithmetic wraps.
fn num_binary(a: Num, b: Num, op: TokenType) -> Value {
    match (a, b) {
        (Num::Int(a), Num::Int(b)) => Value::Int(match op {
            TokenType::Plus => a.wrapping_add(b),
            TokenType::Minus => a.wrapping_sub(b),
            TokenType::Star => a.wrapping_mul(b),
            _ => unreachable!("num_binary only handles + - *"),
        }),
        (a, b) => {
            let (a, b) = (as_f64(a), as_f64(b));
            Value::Float(match op {
                TokenType::Plus => a + b,
                TokenType::Minus => a - b,
                TokenType::Star => a * b,
                _ => unreachable!("num_binary only handles + - *"),
            })
        }
    }
}
