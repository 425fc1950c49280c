// Call-graph export: Graphviz DOT, JSON, or a human-readable dump on
// stdout. Export is a side channel next to instrumentation, for inspecting
// what the builder saw.

use crate::api::dto::GraphDto;
use crate::domain::callgraph::CallGraph;
use crate::ports::GraphExporter;
use anyhow::{Context, Result};
use std::path::Path;

pub struct DotExporter;

impl GraphExporter for DotExporter {
    fn export(&self, graph: &CallGraph, path: &Path) -> Result<()> {
        let mut out = vec!["digraph CallGraph {".to_string()];
        for node in graph.nodes() {
            for callee in &node.callees {
                out.push(format!("  \"{}\" -> \"{}\";", node.name, callee));
            }
        }
        out.push("}".to_string());
        out.push(String::new());
        std::fs::write(path, out.join("\n"))
            .with_context(|| format!("Could not write call graph to {}", path.display()))
    }
}

pub struct JsonExporter;

impl GraphExporter for JsonExporter {
    fn export(&self, graph: &CallGraph, path: &Path) -> Result<()> {
        let dto = GraphDto::from(graph);
        let json = serde_json::to_string_pretty(&dto)?;
        std::fs::write(path, json)
            .with_context(|| format!("Could not write call graph to {}", path.display()))
    }
}

/// Dispatch on the destination: `-` dumps to stdout, `.json` selects the
/// DTO form, anything else the DOT form.
pub fn export_call_graph(graph: &CallGraph, dest: &str) -> Result<()> {
    if dest == "-" {
        graph.dump();
        return Ok(());
    }
    let path = Path::new(dest);
    if path.extension().map(|e| e == "json").unwrap_or(false) {
        JsonExporter.export(graph, path)
    } else {
        DotExporter.export(graph, path)
    }
}
