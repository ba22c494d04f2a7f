use serde_json::json;

use crate::graph::CallGraph;

pub fn format_graph_as_dot(graph: &CallGraph) -> String {
    let mut output = String::from("digraph {\n");

    // Add global styling, then the recorder's pass-through attributes
    output.push_str("    node [fontname=\"Arial\"];\n");
    output.push_str("    edge [fontname=\"Arial\"];\n");
    for (key, value) in graph.graph_attrs() {
        output.push_str(&format!("    graph [{}=\"{}\"];\n", key, escape(value)));
    }
    output.push('\n');

    // Add nodes; entry points get a heavier outline
    let inner = graph.inner();
    for node_idx in inner.node_indices() {
        let node = &inner[node_idx];
        let node_id = node_idx.index();

        if node.root {
            output.push_str(&format!(
                "    {} [label=\"{}\", penwidth=3];\n",
                node_id,
                escape(&node.label)
            ));
        } else {
            output.push_str(&format!(
                "    {} [label=\"{}\"];\n",
                node_id,
                escape(&node.label)
            ));
        }
    }

    // Add edges; return-labeled edges draw their arrow head at the caller
    for edge_idx in inner.edge_indices() {
        let (source, target) = inner.edge_endpoints(edge_idx).unwrap();
        let edge = &inner[edge_idx];

        let mut attrs = Vec::new();
        if let Some(ref label) = edge.label {
            attrs.push(format!("label=\"{}\"", escape(label)));
        }
        if edge.back {
            attrs.push("dir=back".to_string());
        }

        if attrs.is_empty() {
            output.push_str(&format!("    {} -> {};\n", source.index(), target.index()));
        } else {
            output.push_str(&format!(
                "    {} -> {} [{}];\n",
                source.index(),
                target.index(),
                attrs.join(", ")
            ));
        }
    }

    output.push_str("}\n");
    output
}

pub fn format_graph_as_json(graph: &CallGraph) -> String {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    let inner = graph.inner();
    for node_idx in inner.node_indices() {
        nodes.push(json!(&inner[node_idx]));
    }

    for edge_idx in inner.edge_indices() {
        let (source, target) = inner.edge_endpoints(edge_idx).unwrap();
        let edge = &inner[edge_idx];
        edges.push(json!({
            "from": inner[source].id,
            "to": inner[target].id,
            "label": edge.label,
            "back": edge.back,
        }));
    }

    let result = json!({
        "graph_attrs": graph.graph_attrs(),
        "nodes": nodes,
        "edges": edges,
    });

    serde_json::to_string_pretty(&result).unwrap_or_default()
}

// Escape label text for a double-quoted DOT string
fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
