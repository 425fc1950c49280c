use std::path::Path;

use crate::domain::callgraph::CallGraph;
use crate::domain::rewrite::RewriteBuffer;
use crate::infrastructure::parser::ParsedUnit;

/// Builds the per-translation-unit call graph.
pub trait CallGraphBuilder {
    fn build_call_graph(&self, unit: &ParsedUnit) -> CallGraph;
}

/// Plans the textual insertions of one instrumentation mode. Planning never
/// touches the filesystem; a failure here means nothing gets written.
pub trait RewritePlanner {
    fn plan(&self, unit: &ParsedUnit, graph: &CallGraph) -> anyhow::Result<RewriteBuffer>;
}

/// Writes a call graph to an external representation.
pub trait GraphExporter {
    fn export(&self, graph: &CallGraph, path: &Path) -> anyhow::Result<()>;
}
