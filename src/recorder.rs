use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

use anyhow::Result;

use crate::callable::Callable;
use crate::graph::CallGraph;
use crate::types::{CallArgs, RecorderOptions, Value};

/// Records function calls into a `CallGraph`.
///
/// Cloning a `Recorder` yields another handle to the same graph and call
/// stack, so one recorder can sit behind any number of wrapped functions.
/// Single-threaded by design; all instrumented calls must share one logical
/// call stack.
#[derive(Clone)]
pub struct Recorder {
    inner: Rc<RecorderInner>,
}

struct RecorderInner {
    graph: RefCell<CallGraph>,
    options: RecorderOptions,
    next_call_idx: Cell<u64>,
    callers: RefCell<Vec<String>>,
}

impl Recorder {
    pub fn new() -> Self {
        Recorder::with_options(RecorderOptions::default())
    }

    pub fn with_options(options: RecorderOptions) -> Self {
        let graph = CallGraph::new(options.graph_attrs.clone());
        Recorder {
            inner: Rc::new(RecorderInner {
                graph: RefCell::new(graph),
                options,
                next_call_idx: Cell::new(0),
                callers: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Wrap `target` with instrumentation that records every call to it.
    ///
    /// The wrapper keeps the target's calling convention: arguments, the
    /// return value, and any error pass through unchanged. A failed call
    /// still unwinds the stack but records no node or edge.
    pub fn wrap(&self, target: Rc<dyn Callable>) -> Rc<dyn Callable> {
        Rc::new(Recorded {
            recorder: self.clone(),
            target,
        })
    }

    /// Low-level protocol behind `wrap`: push the call, hand back a scope
    /// whose `report` records the finished call and whose drop pops the
    /// stack on every exit path.
    ///
    /// ```ignore
    /// let scope = recorder.record(target.as_ref(), &args);
    /// let result = target.invoke(&args)?;
    /// scope.report(&result);
    /// ```
    pub fn record<'r>(&'r self, target: &dyn Callable, args: &CallArgs) -> CallScope<'r> {
        let caller_id = self.inner.callers.borrow().last().cloned();
        let call_id = self.next_call_id(target, args);
        self.inner.callers.borrow_mut().push(call_id.clone());
        CallScope {
            recorder: self,
            caller_id,
            call_id,
            name: target.name().to_string(),
            args: args.clone(),
        }
    }

    // Identity policy: equality key when configured or when the callable
    // can reset a cache, otherwise the next counter value. The first
    // sequential call gets id "1".
    fn next_call_id(&self, target: &dyn Callable, args: &CallArgs) -> String {
        if self.inner.options.equal || target.as_resettable().is_some() {
            return format!("{}{}", target.name(), args.key());
        }
        let idx = self.inner.next_call_idx.get() + 1;
        self.inner.next_call_idx.set(idx);
        idx.to_string()
    }

    fn finish(&self, scope: &CallScope, result: &Value) {
        let options = &self.inner.options;
        let stringify = options.stringify;
        let mut graph = self.inner.graph.borrow_mut();

        let mut label = format!("{}({})", scope.name, scope.args.render(stringify));
        if !(options.label_returns && scope.caller_id.is_some()) {
            label.push_str(&format!(" \u{21a6} {}", stringify(result)));
        }
        graph.upsert_node(&scope.call_id, label);

        match &scope.caller_id {
            Some(caller_id) => {
                if options.label_returns {
                    graph.add_edge(caller_id, &scope.call_id, Some(stringify(result)), true);
                } else {
                    graph.add_edge(caller_id, &scope.call_id, None, false);
                }
            }
            None => graph.mark_root(&scope.call_id),
        }
    }

    pub fn graph(&self) -> Ref<'_, CallGraph> {
        self.inner.graph.borrow()
    }

    pub fn options(&self) -> &RecorderOptions {
        &self.inner.options
    }

    /// Number of recorded calls currently in flight.
    pub fn stack_depth(&self) -> usize {
        self.inner.callers.borrow().len()
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Recorder::new()
    }
}

/// One in-flight recorded call. Popping the stack happens on drop, so the
/// push is undone whether the call returns, errors, or the caller skips
/// `report` (allowed, but then nothing is recorded).
pub struct CallScope<'r> {
    recorder: &'r Recorder,
    caller_id: Option<String>,
    call_id: String,
    name: String,
    args: CallArgs,
}

impl CallScope<'_> {
    /// Finalize the call: write the node label and the caller edge, then
    /// pop the stack. Single-use.
    pub fn report(self, result: &Value) {
        self.recorder.finish(&self, result);
        // Drop pops.
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }
}

impl Drop for CallScope<'_> {
    fn drop(&mut self) {
        self.recorder.inner.callers.borrow_mut().pop();
    }
}

// The wrapper `Recorder::wrap` returns.
struct Recorded {
    recorder: Recorder,
    target: Rc<dyn Callable>,
}

impl Callable for Recorded {
    fn name(&self) -> &str {
        self.target.name()
    }

    fn invoke(&self, args: &CallArgs) -> Result<Value> {
        let scope = self.recorder.record(self.target.as_ref(), args);
        let result = self.target.invoke(args)?;
        scope.report(&result);
        Ok(result)
    }

    // Wrapping must not hide the memoization capability, or re-wrapping
    // would silently fall back to sequential identities.
    fn as_resettable(&self) -> Option<&dyn crate::callable::Resettable> {
        self.target.as_resettable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callable::{FnCallable, Memoized};
    use anyhow::anyhow;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn adder(name: &str) -> Rc<dyn Callable> {
        Rc::new(FnCallable::new(name, |args: &CallArgs| {
            let total: i64 = args.positional.iter().filter_map(Value::as_i64).sum();
            Ok(json!(total))
        }))
    }

    #[test]
    fn sequential_identities_are_distinct_per_call() {
        let recorder = Recorder::new();
        let wrapped = recorder.wrap(adder("f"));
        let args = CallArgs::positional(vec![json!(2), json!(3)]);
        for _ in 0..3 {
            wrapped.invoke(&args).unwrap();
        }
        let graph = recorder.graph();
        assert_eq!(graph.node_count(), 3);
        for id in ["1", "2", "3"] {
            assert!(graph.contains_node(id));
        }
    }

    #[test]
    fn equal_mode_collapses_identical_calls() {
        let recorder = Recorder::with_options(RecorderOptions {
            equal: true,
            ..RecorderOptions::default()
        });
        let wrapped = recorder.wrap(adder("f"));
        let args = CallArgs::positional(vec![json!(2), json!(3)]);
        wrapped.invoke(&args).unwrap();
        wrapped.invoke(&args).unwrap();
        let graph = recorder.graph();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.node_label("f(2, 3)[]"), Some("f(2, 3) \u{21a6} 5"));
    }

    #[test]
    fn memoized_targets_get_equality_identities_without_equal_mode() {
        let recorder = Recorder::new();
        let wrapped = recorder.wrap(Rc::new(Memoized::new(adder("f"))));
        let args = CallArgs::positional(vec![json!(1)]);
        wrapped.invoke(&args).unwrap();
        wrapped.invoke(&args).unwrap();
        assert_eq!(recorder.graph().node_count(), 1);
    }

    #[test]
    fn nested_calls_draw_a_caller_edge_and_labels_carry_returns() {
        let recorder = Recorder::new();
        let inner = recorder.wrap(adder("inner"));
        let callee = inner.clone();
        let outer = recorder.wrap(Rc::new(FnCallable::new("outer", move |_args: &CallArgs| {
            callee.invoke(&CallArgs::positional(vec![json!(7)]))
        })));

        outer.invoke(&CallArgs::default()).unwrap();

        let graph = recorder.graph();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edges(), vec![("1".to_string(), "2".to_string(), None)]);
        assert_eq!(graph.node_label("1"), Some("outer() \u{21a6} 7"));
        assert_eq!(graph.node_label("2"), Some("inner(7) \u{21a6} 7"));
        assert!(graph.is_root("1"));
        assert!(!graph.is_root("2"));
    }

    #[test]
    fn label_returns_moves_the_result_onto_a_back_edge() {
        let recorder = Recorder::with_options(RecorderOptions {
            label_returns: true,
            ..RecorderOptions::default()
        });
        let inner = recorder.wrap(adder("inner"));
        let callee = inner.clone();
        let outer = recorder.wrap(Rc::new(FnCallable::new("outer", move |_args: &CallArgs| {
            callee.invoke(&CallArgs::positional(vec![json!(7)]))
        })));

        outer.invoke(&CallArgs::default()).unwrap();

        let graph = recorder.graph();
        // Non-root call loses the suffix; its return value labels the edge.
        assert_eq!(graph.node_label("2"), Some("inner(7)"));
        assert_eq!(
            graph.edges(),
            vec![("1".to_string(), "2".to_string(), Some("7".to_string()))]
        );
        // Root calls keep their suffix: there is no incoming edge to carry it.
        assert_eq!(graph.node_label("1"), Some("outer() \u{21a6} 7"));
    }

    #[test]
    fn stack_unwinds_and_nothing_is_recorded_when_the_call_fails() {
        let recorder = Recorder::new();
        let failing = recorder.wrap(Rc::new(FnCallable::new("boom", |_args: &CallArgs| {
            Err(anyhow!("broken"))
        })));
        let callee = failing.clone();
        let outer = recorder.wrap(Rc::new(FnCallable::new("outer", move |_args: &CallArgs| {
            callee.invoke(&CallArgs::default())
        })));

        let err = outer.invoke(&CallArgs::default()).unwrap_err();
        assert_eq!(err.to_string(), "broken");
        assert_eq!(recorder.stack_depth(), 0);
        assert_eq!(recorder.graph().node_count(), 0);
        assert_eq!(recorder.graph().edge_count(), 0);
    }

    #[test]
    fn keyword_arguments_render_after_positional() {
        let recorder = Recorder::new();
        let wrapped = recorder.wrap(Rc::new(FnCallable::new("mix", |_args: &CallArgs| {
            Ok(json!(null))
        })));
        let args = CallArgs::positional(vec![json!(1)]).push_keyword("flag", json!(true));
        wrapped.invoke(&args).unwrap();
        assert_eq!(
            recorder.graph().node_label("1"),
            Some("mix(1, flag=true) \u{21a6} null")
        );
    }

    #[test]
    fn unreported_scope_still_pops_and_records_nothing() {
        let recorder = Recorder::new();
        let target = adder("f");
        {
            let _scope = recorder.record(target.as_ref(), &CallArgs::default());
            assert_eq!(recorder.stack_depth(), 1);
        }
        assert_eq!(recorder.stack_depth(), 0);
        assert_eq!(recorder.graph().node_count(), 0);
    }

    #[test]
    fn graph_attrs_pass_through_to_the_graph() {
        let mut graph_attrs = BTreeMap::new();
        graph_attrs.insert("rankdir".to_string(), "LR".to_string());
        let recorder = Recorder::with_options(RecorderOptions {
            graph_attrs,
            ..RecorderOptions::default()
        });
        assert_eq!(
            recorder.graph().graph_attrs().get("rankdir"),
            Some(&"LR".to_string())
        );
    }
}
