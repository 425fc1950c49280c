// Time-mode rewrite planner. For every non-leaf function defined in the
// main file: accumulator arrays before the definition, an entry block after
// the opening brace, an exit block before each return, and pre/post probes
// around every call whose callee is defined in the unit. The report
// function and its helpers are appended at end of file.

use crate::domain::callgraph::CallGraph;
use crate::domain::rewrite::RewriteBuffer;
use crate::domain::source::SourceText;
use crate::domain::timing_codegen as codegen;
use crate::infrastructure::parser::{self, ParsedUnit};
use crate::ports::RewritePlanner;
use anyhow::Result;
use std::collections::HashSet;
use tree_sitter::Node;

pub struct TimePlanner {
    pub total_time_threshold: f64,
    pub parent_time_threshold: f64,
}

impl Default for TimePlanner {
    fn default() -> Self {
        Self {
            total_time_threshold: codegen::DEFAULT_TOTAL_TIME_THRESHOLD,
            parent_time_threshold: codegen::DEFAULT_PARENT_TIME_THRESHOLD,
        }
    }
}

impl RewritePlanner for TimePlanner {
    fn plan(&self, unit: &ParsedUnit, graph: &CallGraph) -> Result<RewriteBuffer> {
        let mut edits = RewriteBuffer::new();
        let text = SourceText::new(&unit.source);

        let prelude_at = text.after_last_preproc_line();
        let mut prelude = codegen::prelude(&unit.includes);
        if prelude_at > 0 {
            prelude = format!("\n{}", prelude);
        }
        edits.insert(prelude_at, prelude);

        let mut declared: Vec<String> = Vec::new();
        let mut declared_set: HashSet<String> = HashSet::new();

        for def in parser::function_definitions(unit.root()) {
            let Some(name) = parser::function_name(def, &unit.source) else {
                continue;
            };
            let Some(node) = graph.node(name) else {
                continue;
            };
            // Leaves have no children to attribute time to; their callers
            // still time them at the call sites.
            if node.callees.is_empty() {
                continue;
            }
            let Some(body) = parser::function_body(def) else {
                continue;
            };

            if declared_set.insert(name.to_string()) {
                declared.push(name.to_string());
                edits.insert(def.start_byte(), codegen::array_decls(name, &node.callees));
            }

            edits.insert(body.start_byte() + 1, codegen::entry_block(&node.callees));
            instrument_body(body, name, &node.callees, graph, unit, &text, &mut edits);
        }

        edits.insert(
            unit.source.len(),
            codegen::report_tail(
                graph,
                &declared,
                self.total_time_threshold,
                self.parent_time_threshold,
            ),
        );
        Ok(edits)
    }
}

/// Walks one function body. Children are visited before the node itself so
/// that inner calls are annotated before the calls that contain them, which
/// fixes the relative order of probes sharing an insertion point.
fn instrument_body(
    node: Node,
    func: &str,
    callees: &[String],
    graph: &CallGraph,
    unit: &ParsedUnit,
    text: &SourceText,
    edits: &mut RewriteBuffer,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        instrument_body(child, func, callees, graph, unit, text, edits);
    }

    match node.kind() {
        "return_statement" => {
            let indent = text.indent_at(node.start_byte());
            edits.insert(
                node.start_byte(),
                codegen::exit_block(func, callees, indent),
            );
        }
        "call_expression" => {
            let Some(callee) = parser::direct_callee(node, &unit.source) else {
                return;
            };
            if !graph.contains(callee) {
                return;
            }
            let stmt_start = text.statement_start_before(node.start_byte());
            let indent = text.indent_at(node.start_byte());
            edits.insert(stmt_start, codegen::call_pre(callee, indent));
            edits.insert(node.end_byte(), codegen::call_post(callee, indent));
        }
        _ => {}
    }
}
