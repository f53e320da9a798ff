// ABOUTME: Callable contract plus user-function and native-function values

use crate::ast::Stmt;
use crate::class::Instance;
use crate::env::Environment;
use crate::error::{NativeError, VeldError};
use crate::eval::{Interpreter, Signal};
use crate::token::Token;
use crate::value::Value;
use std::fmt;
use std::rc::Rc;

/// Anything invocable with `callee(args)`.
///
/// Arity `-1` means variadic with no upper bound; anything else requires an
/// exact match, checked by the evaluator before `call` runs.
pub trait Callable {
    fn arity(&self) -> i32;
    fn call(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
        paren: &Token,
    ) -> Result<Value, Signal>;
    fn display_name(&self) -> String;
}

/// A user-defined function bundled with its captured environment.
#[derive(Debug)]
pub struct Function {
    pub name: Option<String>,
    pub params: Vec<Token>,
    pub body: Rc<Vec<Stmt>>,
    pub closure: Rc<Environment>,
    pub is_initializer: bool,
}

impl Function {
    /// Rebinds the function to an instance by wrapping the closure in a
    /// one-entry scope holding `this`.
    pub fn bind(&self, instance: Rc<Instance>) -> Rc<Function> {
        let environment = Environment::with_enclosing(self.closure.clone());
        environment.define("this", Value::Instance(instance));
        Rc::new(Function {
            name: self.name.clone(),
            params: self.params.clone(),
            body: self.body.clone(),
            closure: environment,
            is_initializer: self.is_initializer,
        })
    }
}

impl Callable for Function {
    fn arity(&self) -> i32 {
        self.params.len() as i32
    }

    fn call(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
        _paren: &Token,
    ) -> Result<Value, Signal> {
        let environment = Environment::with_enclosing(self.closure.clone());
        for (param, arg) in self.params.iter().zip(args) {
            environment.define(param.lexeme.clone(), arg);
        }

        match interpreter.execute_block(&self.body, environment) {
            Ok(()) => {}
            Err(Signal::Return(value)) => {
                if self.is_initializer {
                    return Ok(self.closure.get_at(0, "this"));
                }
                return Ok(value);
            }
            Err(other) => return Err(other),
        }

        if self.is_initializer {
            return Ok(self.closure.get_at(0, "this"));
        }
        Ok(Value::Nil)
    }

    fn display_name(&self) -> String {
        match &self.name {
            Some(name) => format!("<fn {name}>"),
            None => "<fn>".to_string(),
        }
    }
}

type NativeImpl = dyn Fn(&mut Interpreter, &[Value]) -> Result<Value, NativeError>;

/// An opaque callable supplied by the built-in registration surface.
pub struct NativeFunction {
    pub name: String,
    pub arity: i32,
    func: Box<NativeImpl>,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<String>,
        arity: i32,
        func: impl Fn(&mut Interpreter, &[Value]) -> Result<Value, NativeError> + 'static,
    ) -> Rc<Self> {
        Rc::new(NativeFunction {
            name: name.into(),
            arity,
            func: Box::new(func),
        })
    }

    /// Convenience wrapper producing a `Value` directly.
    pub fn value(
        name: impl Into<String>,
        arity: i32,
        func: impl Fn(&mut Interpreter, &[Value]) -> Result<Value, NativeError> + 'static,
    ) -> Value {
        Value::Native(Self::new(name, arity, func))
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

impl Callable for NativeFunction {
    fn arity(&self) -> i32 {
        self.arity
    }

    fn call(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
        paren: &Token,
    ) -> Result<Value, Signal> {
        (self.func)(interpreter, &args)
            .map_err(|e| Signal::Error(VeldError::runtime(paren, e.0)))
    }

    fn display_name(&self) -> String {
        format!("<native fn {}>", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_display_name() {
        let named = Function {
            name: Some("add".to_string()),
            params: vec![],
            body: Rc::new(vec![]),
            closure: Environment::new(),
            is_initializer: false,
        };
        assert_eq!(named.display_name(), "<fn add>");

        let anonymous = Function {
            name: None,
            params: vec![],
            body: Rc::new(vec![]),
            closure: Environment::new(),
            is_initializer: false,
        };
        assert_eq!(anonymous.display_name(), "<fn>");
    }

    #[test]
    fn test_native_display_name() {
        let native = NativeFunction::new("clock", 0, |_, _| Ok(Value::Nil));
        assert_eq!(native.display_name(), "<native fn clock>");
        assert_eq!(native.arity(), 0);
    }
}
