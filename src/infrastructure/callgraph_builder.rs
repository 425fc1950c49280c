// Builds the per-translation-unit call graph: direct calls between
// functions defined in the main file. Unresolved callees, indirect calls
// and nameless declarations are skipped silently; graph construction never
// fails a run.

use crate::domain::callgraph::CallGraph;
use crate::infrastructure::parser::{self, ParsedUnit};
use crate::ports::CallGraphBuilder;
use std::collections::HashSet;

pub struct AstCallGraphBuilder;

impl CallGraphBuilder for AstCallGraphBuilder {
    fn build_call_graph(&self, unit: &ParsedUnit) -> CallGraph {
        let mut graph = CallGraph::new();
        let defs = parser::function_definitions(unit.root());

        // Definitions first, so calls to functions defined later resolve.
        let mut defined: HashSet<&str> = HashSet::new();
        for def in &defs {
            if let Some(name) = parser::function_name(*def, &unit.source) {
                if name.is_empty() {
                    continue;
                }
                graph.add_node(name);
                defined.insert(name);
            }
        }

        for def in &defs {
            let Some(caller) = parser::function_name(*def, &unit.source) else {
                continue;
            };
            let Some(body) = parser::function_body(*def) else {
                continue;
            };
            parser::walk(body, &mut |node| {
                if node.kind() != "call_expression" {
                    return;
                }
                if let Some(callee) = parser::direct_callee(node, &unit.source) {
                    if defined.contains(callee) {
                        graph.add_edge(caller, callee);
                    }
                }
            });
        }

        graph
    }
}
