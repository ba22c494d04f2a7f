use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use structopt::StructOpt;

use callgraph::demos::{DEMOS, demo_namespace, parse_args};
use callgraph::formatters::{format_graph_as_dot, format_graph_as_json};
use callgraph::graph::CallGraph;
use callgraph::instrument::{InstrumentScope, clear_caches};
use callgraph::recorder::Recorder;
use callgraph::types::RecorderOptions;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "callgraph",
    about = "Record a recursive demo call and visualize its dynamic call graph"
)]
struct Opt {
    /// Demo function to run (nchoosek, lev, fib)
    demo: String,

    /// Arguments for the demo, e.g. `callgraph nchoosek 5 2`
    args: Vec<String>,

    /// Output file
    #[structopt(parse(from_os_str), short, long)]
    output: Option<PathBuf>,

    /// Output format (dot or json)
    #[structopt(short, long, default_value = "dot")]
    format: String,

    /// Label edges with return values and draw arrows callee-to-caller
    #[structopt(short, long)]
    reverse: bool,

    /// Collapse every call with equal arguments into one node, not just
    /// memoized ones
    #[structopt(short, long)]
    equal: bool,

    /// Lay the graph out left-to-right
    #[structopt(short = "H", long)]
    horizontal: bool,

    /// Max width of the graph, in inches
    #[structopt(short, long)]
    width: Option<u32>,

    /// Don't clear memoization caches before running
    #[structopt(long)]
    no_clear: bool,
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    if !DEMOS.contains(&opt.demo.as_str()) {
        bail!("unknown demo '{}', expected one of {:?}", opt.demo, DEMOS);
    }

    // Build the recorder configuration from the command line
    let mut options = RecorderOptions {
        equal: opt.equal,
        label_returns: opt.reverse,
        ..RecorderOptions::default()
    };
    if opt.horizontal {
        options
            .graph_attrs
            .insert("rankdir".to_string(), "LR".to_string());
    }
    if let Some(width) = opt.width {
        options
            .graph_attrs
            .insert("size".to_string(), format!("{},", width));
    }
    let recorder = Recorder::with_options(options);

    let ns = demo_namespace();
    let args = parse_args(&opt.args);

    // Stale cached results would hide calls from the recorder
    if !opt.no_clear {
        clear_caches(&ns, DEMOS.iter().copied());
    }

    // Run the demo with its name temporarily rebound to a recording wrapper
    let result = {
        let _scope = InstrumentScope::enter([opt.demo.as_str()], Some(recorder.clone()), &ns);
        ns.call(&opt.demo, &args)
            .with_context(|| format!("demo '{}' failed", opt.demo))?
    };
    println!("{}({}) = {}", opt.demo, opt.args.join(", "), result);

    // Generate the output based on selected format
    let output = render(&recorder.graph(), &opt.format)?;

    // Write to file or stdout
    if let Some(output_path) = opt.output {
        fs::write(&output_path, output)
            .with_context(|| format!("Failed to write to file: {:?}", output_path))?;
        println!("Graph written to {:?}", output_path);
    } else {
        println!("{}", output);
    }

    Ok(())
}

fn render(graph: &CallGraph, format: &str) -> Result<String> {
    match format {
        "dot" => Ok(format_graph_as_dot(graph)),
        "json" => Ok(format_graph_as_json(graph)),
        other => bail!("unknown format '{}', expected dot or json", other),
    }
}
