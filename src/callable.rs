use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use anyhow::Result;

use crate::types::{CallArgs, Value};

/// A named function the recorder can intercept. Implementations capture
/// whatever they need (including a `Namespace` handle for recursion) and
/// surface failures through the `Result`.
pub trait Callable {
    fn name(&self) -> &str;

    fn invoke(&self, args: &CallArgs) -> Result<Value>;

    /// Capability probe: callables that can drop memoized state return
    /// themselves here. The recorder treats any such callable as memoized
    /// and switches to equality-based call identity for it.
    fn as_resettable(&self) -> Option<&dyn Resettable> {
        None
    }
}

/// A parameterless cache reset, exposed by memoizing wrappers.
pub trait Resettable {
    fn reset(&self);
}

// Adapts a plain closure into a Callable.
pub struct FnCallable<F> {
    name: String,
    function: F,
}

impl<F> FnCallable<F>
where
    F: Fn(&CallArgs) -> Result<Value>,
{
    pub fn new(name: &str, function: F) -> Self {
        FnCallable {
            name: name.to_string(),
            function,
        }
    }
}

impl<F> Callable for FnCallable<F>
where
    F: Fn(&CallArgs) -> Result<Value>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, args: &CallArgs) -> Result<Value> {
        (self.function)(args)
    }
}

/// Caches results by the canonical argument text. Errors are not cached.
pub struct Memoized {
    inner: Rc<dyn Callable>,
    cache: RefCell<HashMap<String, Value>>,
}

impl Memoized {
    pub fn new(inner: Rc<dyn Callable>) -> Self {
        Memoized {
            inner,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.borrow().len()
    }
}

impl Callable for Memoized {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn invoke(&self, args: &CallArgs) -> Result<Value> {
        let key = args.key();
        // The borrow must end before invoking: recursive calls re-enter
        // this cache.
        let hit = self.cache.borrow().get(&key).cloned();
        if let Some(value) = hit {
            return Ok(value);
        }
        let value = self.inner.invoke(args)?;
        self.cache.borrow_mut().insert(key, value.clone());
        Ok(value)
    }

    fn as_resettable(&self) -> Option<&dyn Resettable> {
        Some(self)
    }
}

impl Resettable for Memoized {
    fn reset(&self) {
        self.cache.borrow_mut().clear();
    }
}
