use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{Result, anyhow};

use crate::callable::Callable;
use crate::types::{CallArgs, Value};

// What a name can be bound to.
#[derive(Clone)]
pub enum Binding {
    Function(Rc<dyn Callable>),
    Value(Value),
}

/// A mutable name-to-binding mapping, shared by handle.
///
/// Functions capture a clone of their namespace and dispatch recursive calls
/// through `call`, so they always see the current binding for a name. That
/// indirection is what lets an instrumentation scope intercept recursion by
/// rebinding names.
#[derive(Clone, Default)]
pub struct Namespace {
    bindings: Rc<RefCell<HashMap<String, Binding>>>,
}

impl Namespace {
    pub fn new() -> Self {
        Namespace::default()
    }

    pub fn bind(&self, name: &str, callable: Rc<dyn Callable>) {
        self.bindings
            .borrow_mut()
            .insert(name.to_string(), Binding::Function(callable));
    }

    pub fn bind_value(&self, name: &str, value: Value) {
        self.bindings
            .borrow_mut()
            .insert(name.to_string(), Binding::Value(value));
    }

    pub fn get(&self, name: &str) -> Option<Binding> {
        self.bindings.borrow().get(name).cloned()
    }

    /// The function bound to `name`, if the name is bound to one.
    pub fn get_function(&self, name: &str) -> Option<Rc<dyn Callable>> {
        match self.get(name) {
            Some(Binding::Function(callable)) => Some(callable),
            _ => None,
        }
    }

    /// Invoke the function currently bound to `name`. The binding is looked
    /// up per call, then the map borrow is released before invoking so the
    /// callee may consult the namespace itself.
    pub fn call(&self, name: &str, args: &CallArgs) -> Result<Value> {
        let callable = self
            .get_function(name)
            .ok_or_else(|| anyhow!("'{}' is not bound to a function", name))?;
        callable.invoke(args)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }
}
