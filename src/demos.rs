use std::rc::Rc;

use anyhow::{Result, anyhow};
use serde_json::json;

use crate::callable::{FnCallable, Memoized};
use crate::namespace::Namespace;
use crate::types::{CallArgs, Value};

/// Demo function names available in `demo_namespace`.
pub const DEMOS: &[&str] = &["nchoosek", "lev", "fib"];

/// A namespace with the sample recursive programs: memoized binomial
/// coefficients, memoized edit distance, and plain (uncached) Fibonacci.
/// Each function recurses through the namespace so instrumentation sees
/// every inner call.
pub fn demo_namespace() -> Namespace {
    let ns = Namespace::new();

    let handle = ns.clone();
    let nchoosek = FnCallable::new("nchoosek", move |args: &CallArgs| {
        let n = arg_i64("nchoosek", args, 0)?;
        let k = arg_i64("nchoosek", args, 1)?;
        if k == 0 || n == k {
            return Ok(json!(1));
        }
        let left = handle.call("nchoosek", &pair(n - 1, k - 1))?;
        let right = handle.call("nchoosek", &pair(n - 1, k))?;
        Ok(json!(as_i64(&left)? + as_i64(&right)?))
    });
    ns.bind("nchoosek", Rc::new(Memoized::new(Rc::new(nchoosek))));

    let handle = ns.clone();
    let lev = FnCallable::new("lev", move |args: &CallArgs| {
        let a = arg_str("lev", args, 0)?;
        let b = arg_str("lev", args, 1)?;
        if a.is_empty() || b.is_empty() {
            return Ok(json!((a.chars().count() + b.chars().count()) as i64));
        }
        let (ra, rb) = (rest(&a), rest(&b));
        let substitute = as_i64(&handle.call("lev", &words(&ra, &rb))?)?
            + if a.chars().next() == b.chars().next() {
                0
            } else {
                1
            };
        let insert = as_i64(&handle.call("lev", &words(&a, &rb))?)? + 1;
        let delete = as_i64(&handle.call("lev", &words(&ra, &b))?)? + 1;
        Ok(json!(substitute.min(insert).min(delete)))
    });
    ns.bind("lev", Rc::new(Memoized::new(Rc::new(lev))));

    let handle = ns.clone();
    let fib = FnCallable::new("fib", move |args: &CallArgs| {
        let n = arg_i64("fib", args, 0)?;
        if n < 2 {
            return Ok(json!(n));
        }
        let a = handle.call("fib", &CallArgs::positional(vec![json!(n - 1)]))?;
        let b = handle.call("fib", &CallArgs::positional(vec![json!(n - 2)]))?;
        Ok(json!(as_i64(&a)? + as_i64(&b)?))
    });
    ns.bind("fib", Rc::new(fib));

    ns
}

/// Parse command-line argument text into call values: valid JSON is taken
/// as-is ("3" is a number, "true" a bool), anything else becomes a string.
pub fn parse_args(raw: &[String]) -> CallArgs {
    let values = raw
        .iter()
        .map(|text| serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone())))
        .collect();
    CallArgs::positional(values)
}

fn pair(a: i64, b: i64) -> CallArgs {
    CallArgs::positional(vec![json!(a), json!(b)])
}

fn words(a: &str, b: &str) -> CallArgs {
    CallArgs::positional(vec![json!(a), json!(b)])
}

fn rest(word: &str) -> String {
    word.chars().skip(1).collect()
}

fn arg_i64(name: &str, args: &CallArgs, index: usize) -> Result<i64> {
    args.pos(index)
        .and_then(Value::as_i64)
        .ok_or_else(|| anyhow!("{}: argument {} must be an integer", name, index))
}

fn arg_str(name: &str, args: &CallArgs, index: usize) -> Result<String> {
    args.pos(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("{}: argument {} must be a string", name, index))
}

fn as_i64(value: &Value) -> Result<i64> {
    value
        .as_i64()
        .ok_or_else(|| anyhow!("expected an integer result, got {}", value))
}
