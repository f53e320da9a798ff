// ABOUTME: Environment module for managing variable bindings and scopes

use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug)]
pub struct Environment {
    values: RefCell<HashMap<String, Value>>,
    enclosing: Option<Rc<Environment>>,
}

impl Environment {
    /// Creates a new root environment with no parent
    pub fn new() -> Rc<Self> {
        Rc::new(Environment {
            values: RefCell::new(HashMap::new()),
            enclosing: None,
        })
    }

    /// Creates a new child environment enclosed by a parent
    pub fn with_enclosing(enclosing: Rc<Environment>) -> Rc<Self> {
        Rc::new(Environment {
            values: RefCell::new(HashMap::new()),
            enclosing: Some(enclosing),
        })
    }

    /// Defines a binding in THIS scope; re-definition replaces
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.values.borrow_mut().insert(name.into(), value);
    }

    /// Looks up a name in this scope and parent scopes outward
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.values.borrow().get(name) {
            return Some(value.clone());
        }
        if let Some(ref enclosing) = self.enclosing {
            return enclosing.get(name);
        }
        None
    }

    /// Writes to the closest scope already holding `name`.
    /// Returns false when no scope holds it.
    pub fn assign(&self, name: &str, value: Value) -> bool {
        if self.values.borrow().contains_key(name) {
            self.values.borrow_mut().insert(name.to_string(), value);
            return true;
        }
        if let Some(ref enclosing) = self.enclosing {
            return enclosing.assign(name, value);
        }
        false
    }

    /// Reads `name` exactly `distance` scopes up the chain.
    ///
    /// The distance comes from the resolver; a miss here means the resolver
    /// and the evaluator disagree about scope shape, which is a bug, so this
    /// panics rather than surfacing a user error.
    pub fn get_at(self: &Rc<Self>, distance: usize, name: &str) -> Value {
        self.ancestor(distance)
            .values
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("resolved variable '{name}' missing at distance {distance}"))
    }

    /// Writes `name` exactly `distance` scopes up the chain.
    pub fn assign_at(self: &Rc<Self>, distance: usize, name: &str, value: Value) {
        let scope = self.ancestor(distance);
        let mut values = scope.values.borrow_mut();
        if !values.contains_key(name) {
            panic!("resolved variable '{name}' missing at distance {distance}");
        }
        values.insert(name.to_string(), value);
    }

    fn ancestor(self: &Rc<Self>, distance: usize) -> Rc<Environment> {
        let mut environment = Rc::clone(self);
        for _ in 0..distance {
            let next = environment
                .enclosing
                .clone()
                .unwrap_or_else(|| panic!("scope chain shorter than resolved distance {distance}"));
            environment = next;
        }
        environment
    }

    /// Names bound in THIS scope, sorted. Used by the `globals()` and
    /// `locals()` built-ins.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.values.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}
