use std::rc::Rc;

use crate::callable::Callable;
use crate::namespace::{Binding, Namespace};
use crate::recorder::Recorder;
use crate::types::RecorderOptions;

/// Temporarily replaces named functions in a namespace with recording
/// wrappers. Restoration runs on drop, so the originals come back on every
/// exit path, including when the instrumented code fails mid-scope.
pub struct InstrumentScope {
    recorder: Recorder,
    namespace: Namespace,
    saved: Vec<(String, Rc<dyn Callable>)>,
}

impl InstrumentScope {
    /// Wrap and rebind every requested name that is currently bound to a
    /// function. Names that are absent, or bound to plain values, are
    /// skipped; asking to instrument an unresolved identifier is not an
    /// error.
    pub fn enter<'n>(
        names: impl IntoIterator<Item = &'n str>,
        recorder: Option<Recorder>,
        namespace: &Namespace,
    ) -> Self {
        let recorder = recorder.unwrap_or_default();
        let mut saved: Vec<(String, Rc<dyn Callable>)> = Vec::new();
        for name in names {
            // A name can appear more than once (`f(1); f(2)` mentions f
            // twice); wrapping it again would save the first wrapper as the
            // original and leak it past restoration.
            if saved.iter().any(|(seen, _)| seen == name) {
                continue;
            }
            let Some(original) = namespace.get_function(name) else {
                continue;
            };
            namespace.bind(name, recorder.wrap(original.clone()));
            saved.push((name.to_string(), original));
        }
        InstrumentScope {
            recorder,
            namespace: namespace.clone(),
            saved,
        }
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }
}

impl Drop for InstrumentScope {
    fn drop(&mut self) {
        for (name, original) in self.saved.drain(..) {
            self.namespace.bind(&name, original);
        }
    }
}

/// Permanently wrap one function with a private recorder, returning the
/// wrapper together with the recorder so the graph can be rendered later.
pub fn instrument(
    target: Rc<dyn Callable>,
    options: RecorderOptions,
) -> (Rc<dyn Callable>, Recorder) {
    let recorder = Recorder::with_options(options);
    let wrapped = recorder.wrap(target);
    (wrapped, recorder)
}

/// Permanently wrap one function with a shared recorder, so calls from
/// several instrumented functions land in one graph.
pub fn instrument_with(target: Rc<dyn Callable>, recorder: &Recorder) -> Rc<dyn Callable> {
    recorder.wrap(target)
}

/// Reset the memoization state of every named binding that exposes a cache
/// reset. Run before instrumenting, so earlier calls' cached results do not
/// swallow the calls the recorder is meant to see.
pub fn clear_caches<'n>(namespace: &Namespace, names: impl IntoIterator<Item = &'n str>) {
    for name in names {
        if let Some(Binding::Function(callable)) = namespace.get(name) {
            if let Some(resettable) = callable.as_resettable() {
                resettable.reset();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callable::{FnCallable, Memoized};
    use crate::types::CallArgs;
    use anyhow::anyhow;
    use serde_json::json;

    fn unit_fn(name: &str) -> Rc<dyn Callable> {
        Rc::new(FnCallable::new(name, |_| Ok(json!(1))))
    }

    #[test]
    fn scope_swaps_in_wrappers_and_restores_originals() {
        let ns = Namespace::new();
        let original = unit_fn("f");
        ns.bind("f", original.clone());

        {
            let scope = InstrumentScope::enter(["f"], None, &ns);
            let bound = ns.get_function("f").unwrap();
            assert!(!Rc::ptr_eq(&bound, &original));
            ns.call("f", &CallArgs::default()).unwrap();
            assert_eq!(scope.recorder().graph().node_count(), 1);
        }

        let restored = ns.get_function("f").unwrap();
        assert!(Rc::ptr_eq(&restored, &original));
    }

    #[test]
    fn scope_restores_even_when_no_calls_were_made() {
        let ns = Namespace::new();
        let original = unit_fn("f");
        ns.bind("f", original.clone());
        drop(InstrumentScope::enter(["f"], None, &ns));
        assert!(Rc::ptr_eq(&ns.get_function("f").unwrap(), &original));
    }

    #[test]
    fn scope_restores_after_instrumented_code_fails() {
        let ns = Namespace::new();
        let original: Rc<dyn Callable> =
            Rc::new(FnCallable::new("boom", |_| Err(anyhow!("broken"))));
        ns.bind("boom", original.clone());

        let recorder = {
            let scope = InstrumentScope::enter(["boom"], None, &ns);
            assert!(ns.call("boom", &CallArgs::default()).is_err());
            scope.recorder().clone()
        };

        assert!(Rc::ptr_eq(&ns.get_function("boom").unwrap(), &original));
        assert_eq!(recorder.stack_depth(), 0);
        assert_eq!(recorder.graph().node_count(), 0);
    }

    #[test]
    fn repeated_names_are_wrapped_once_and_restored() {
        let ns = Namespace::new();
        let original = unit_fn("f");
        ns.bind("f", original.clone());

        {
            let scope = InstrumentScope::enter(["f", "f"], None, &ns);
            ns.call("f", &CallArgs::default()).unwrap();
            ns.call("f", &CallArgs::default()).unwrap();
            // One wrapper, so sequential calls get ids "1" and "2"
            assert_eq!(scope.recorder().graph().node_count(), 2);
        }

        assert!(Rc::ptr_eq(&ns.get_function("f").unwrap(), &original));
    }

    #[test]
    fn absent_names_and_value_bindings_are_skipped() {
        let ns = Namespace::new();
        ns.bind_value("limit", json!(10));
        let scope = InstrumentScope::enter(["limit", "missing"], None, &ns);
        assert!(ns.get_function("limit").is_none());
        assert!(!ns.contains("missing"));
        drop(scope);
        assert!(matches!(ns.get("limit"), Some(Binding::Value(_))));
    }

    #[test]
    fn shared_recorder_collects_calls_from_several_functions() {
        let recorder = Recorder::new();
        let f = instrument_with(unit_fn("f"), &recorder);
        let g = instrument_with(unit_fn("g"), &recorder);
        f.invoke(&CallArgs::default()).unwrap();
        g.invoke(&CallArgs::default()).unwrap();
        assert_eq!(recorder.graph().node_count(), 2);
    }

    #[test]
    fn private_recorder_exposes_the_graph() {
        let (wrapped, recorder) = instrument(unit_fn("f"), RecorderOptions::default());
        wrapped.invoke(&CallArgs::default()).unwrap();
        assert_eq!(recorder.graph().node_count(), 1);
    }

    #[test]
    fn clear_caches_resets_only_resettable_bindings() {
        let ns = Namespace::new();
        let memo = Rc::new(Memoized::new(unit_fn("f")));
        ns.bind("f", memo.clone());
        ns.bind("g", unit_fn("g"));
        ns.bind_value("limit", json!(10));

        ns.call("f", &CallArgs::default()).unwrap();
        assert_eq!(memo.cache_len(), 1);

        clear_caches(&ns, ["f", "g", "limit", "missing"]);
        assert_eq!(memo.cache_len(), 0);
    }
}
