//! Record the dynamic call structure of instrumented functions and render
//! it as a directed graph.
//!
//! A [`Recorder`] wraps named functions ([`Callable`]) with instrumentation
//! that tracks a caller/callee stack and emits one graph node per call
//! identity. Repeated calls to memoized functions (anything exposing
//! [`Resettable`]) collapse into a single node. An [`InstrumentScope`]
//! applies the wrapping to a set of names in a [`Namespace`] and restores
//! the originals when it goes out of scope.

pub mod callable;
pub mod demos;
pub mod formatters;
pub mod graph;
pub mod instrument;
pub mod namespace;
pub mod recorder;
pub mod types;

pub use callable::{Callable, FnCallable, Memoized, Resettable};
pub use graph::CallGraph;
pub use instrument::{InstrumentScope, clear_caches, instrument, instrument_with};
pub use namespace::{Binding, Namespace};
pub use recorder::{CallScope, Recorder};
pub use types::{CallArgs, RecorderOptions, Stringify, Value};
