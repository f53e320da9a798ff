// ABOUTME: Class and instance values with method lookup and construction

use crate::ast::Expr;
use crate::callable::{Callable, Function};
use crate::env::Environment;
use crate::eval::{Interpreter, Signal};
use crate::token::Token;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A class value: methods, static properties, and the per-instance field
/// initializer expressions captured at declaration.
#[derive(Debug)]
pub struct Class {
    pub name: String,
    pub superclass: Option<Rc<Class>>,
    pub methods: HashMap<String, Rc<Function>>,
    /// Static fields and static methods; mutable so `C.x = v` works and so
    /// built-in namespaces can be assembled incrementally.
    pub statics: RefCell<HashMap<String, Value>>,
    /// Instance field initializers, re-evaluated at every construction.
    pub field_inits: Vec<(String, Expr)>,
    /// The environment the class declaration was evaluated in; field
    /// initializers run against it so they observe enclosing variables as of
    /// construction time.
    pub field_env: Rc<Environment>,
}

impl Class {
    pub fn new(
        name: String,
        superclass: Option<Rc<Class>>,
        methods: HashMap<String, Rc<Function>>,
        statics: HashMap<String, Value>,
        field_inits: Vec<(String, Expr)>,
        field_env: Rc<Environment>,
    ) -> Rc<Self> {
        Rc::new(Class {
            name,
            superclass,
            methods,
            statics: RefCell::new(statics),
            field_inits,
            field_env,
        })
    }

    /// A class with no instance behavior, used to group built-ins such as
    /// `Math.sqrt` behind a single global name.
    pub fn namespace(name: &str, statics: HashMap<String, Value>) -> Rc<Self> {
        Class::new(
            name.to_string(),
            None,
            HashMap::new(),
            statics,
            Vec::new(),
            Environment::new(),
        )
    }

    /// Method lookup, cascading to the superclass on miss.
    pub fn find_method(&self, name: &str) -> Option<Rc<Function>> {
        if let Some(method) = self.methods.get(name) {
            return Some(method.clone());
        }
        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_method(name))
    }

    /// Static property lookup, cascading to the superclass on miss.
    pub fn find_static(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.statics.borrow().get(name) {
            return Some(value.clone());
        }
        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_static(name))
    }

    /// Seeds a fresh instance's fields, superclass initializers first so a
    /// subclass initializer can override an inherited field.
    fn initialize_fields(
        &self,
        interpreter: &mut Interpreter,
        instance: &Rc<Instance>,
    ) -> Result<(), Signal> {
        if let Some(superclass) = &self.superclass {
            superclass.initialize_fields(interpreter, instance)?;
        }
        for (name, initializer) in &self.field_inits {
            let value = interpreter.evaluate_in(initializer, self.field_env.clone())?;
            instance.fields.borrow_mut().insert(name.clone(), value);
        }
        Ok(())
    }
}

impl Callable for Rc<Class> {
    /// A class's effective arity is its initializer's.
    fn arity(&self) -> i32 {
        self.find_method("init")
            .map(|init| init.arity())
            .unwrap_or(0)
    }

    fn call(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
        paren: &Token,
    ) -> Result<Value, Signal> {
        let instance = Instance::new(self.clone());
        self.initialize_fields(interpreter, &instance)?;
        if let Some(init) = self.find_method("init") {
            init.bind(instance.clone()).call(interpreter, args, paren)?;
        }
        Ok(Value::Instance(instance))
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }
}

/// An instance: a class backreference plus its own mutable field map.
#[derive(Debug)]
pub struct Instance {
    pub class: Rc<Class>,
    pub fields: RefCell<HashMap<String, Value>>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Rc<Self> {
        Rc::new(Instance {
            class,
            fields: RefCell::new(HashMap::new()),
        })
    }

    /// Property lookup: own fields shadow methods; methods come back bound.
    pub fn get(self: &Rc<Self>, name: &str) -> Option<Value> {
        if let Some(value) = self.fields.borrow().get(name) {
            return Some(value.clone());
        }
        self.class
            .find_method(name)
            .map(|method| Value::Function(method.bind(self.clone())))
    }

    pub fn set(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_class(name: &str, superclass: Option<Rc<Class>>) -> Rc<Class> {
        Class::new(
            name.to_string(),
            superclass,
            HashMap::new(),
            HashMap::new(),
            Vec::new(),
            Environment::new(),
        )
    }

    #[test]
    fn test_static_lookup_climbs_chain() {
        let base = empty_class("Base", None);
        base.statics
            .borrow_mut()
            .insert("answer".to_string(), Value::Int(42));
        let derived = empty_class("Derived", Some(base));

        assert_eq!(derived.find_static("answer"), Some(Value::Int(42)));
        assert_eq!(derived.find_static("missing"), None);
    }

    #[test]
    fn test_instance_fields_shadow_methods() {
        let class = empty_class("Thing", None);
        let instance = Instance::new(class);
        instance.set("x", Value::Int(7));
        assert_eq!(instance.get("x"), Some(Value::Int(7)));
        assert_eq!(instance.get("missing"), None);
    }

    #[test]
    fn test_namespace_has_no_init() {
        let ns = Class::namespace("Math", HashMap::new());
        assert_eq!(ns.arity(), 0);
        assert!(ns.find_method("init").is_none());
    }
}
