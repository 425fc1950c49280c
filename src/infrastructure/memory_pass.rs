// Memory-mode rewrite planner. Emits the profiler runtime after the last
// preprocessor line, a descriptor + `__mem_init` for every eligible
// parameter and local, a `__mem_record` before the statement enclosing each
// array subscript / pointer dereference / struct member access on an
// instrumented identifier, and analysis + print calls at every function
// exit. All of it is gated on the optional target-function set.

use crate::domain::memory_codegen as codegen;
use crate::domain::rewrite::RewriteBuffer;
use crate::domain::source::SourceText;
use crate::infrastructure::parser::{self, ParsedUnit};
use crate::ports::RewritePlanner;
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use tree_sitter::Node;

use crate::domain::callgraph::CallGraph;

pub struct MemoryPlanner {
    target_functions: HashSet<String>,
}

impl MemoryPlanner {
    /// An empty target list means "instrument every function".
    pub fn new(target_funcs: &[String]) -> Self {
        Self {
            target_functions: target_funcs
                .iter()
                .filter(|f| !f.is_empty())
                .cloned()
                .collect(),
        }
    }

    fn targeted(&self, func: &str) -> bool {
        self.target_functions.is_empty() || self.target_functions.contains(func)
    }
}

impl RewritePlanner for MemoryPlanner {
    fn plan(&self, unit: &ParsedUnit, _graph: &CallGraph) -> Result<RewriteBuffer> {
        let mut edits = RewriteBuffer::new();
        let text = SourceText::new(&unit.source);
        let registry = StructRegistry::collect(unit);

        let runtime_at = text.after_last_preproc_line();
        let runtime = codegen::runtime(&unit.includes);
        let runtime = if runtime_at > 0 {
            format!("\n{}", runtime)
        } else {
            runtime
        };
        edits.insert(runtime_at, runtime);

        for def in parser::function_definitions(unit.root()) {
            let Some(func) = parser::function_name(def, &unit.source) else {
                continue;
            };
            if !self.targeted(func) {
                continue;
            }
            let Some(body) = parser::function_body(def) else {
                continue;
            };

            // Descriptors are per function scope: the same identifier in two
            // functions gets two descriptors, since base addresses differ.
            let mut vars: Vec<String> = Vec::new();
            plan_parameters(def, body, func, &registry, unit, &mut vars, &mut edits);
            plan_locals(body, func, &registry, unit, &text, &mut vars, &mut edits);
            plan_accesses(body, &vars, unit, &text, &mut edits);
            plan_exits(body, &vars, &text, &mut edits);
        }

        Ok(edits)
    }
}

// ============================================================================
// Variable eligibility
// ============================================================================

/// How an eligible variable exposes its storage.
#[derive(Debug, Clone, Copy, PartialEq)]
enum VarClass {
    /// Arrays and pointers: the variable itself is the base address.
    Indirect,
    /// Structs with at least one array or pointer field: take `&var`.
    Aggregate,
}

impl VarClass {
    fn addr_expr(self, name: &str) -> String {
        match self {
            VarClass::Indirect => name.to_string(),
            VarClass::Aggregate => format!("&{}", name),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum AliasKind {
    /// typedef of a struct; the flag says whether it has indirect fields.
    Struct(bool),
    /// typedef of a pointer or array type.
    Indirect,
}

/// Struct tags and typedef aliases seen in the unit, with the one fact the
/// eligibility test needs: does the type contain an array or pointer?
#[derive(Default)]
struct StructRegistry {
    tags: HashMap<String, bool>,
    aliases: HashMap<String, AliasKind>,
}

impl StructRegistry {
    fn collect(unit: &ParsedUnit) -> Self {
        let mut registry = Self::default();
        parser::walk(unit.root(), &mut |node| match node.kind() {
            "struct_specifier" => {
                if let (Some(name), Some(body)) = (
                    node.child_by_field_name("name"),
                    node.child_by_field_name("body"),
                ) {
                    registry
                        .tags
                        .insert(unit.text(name).to_string(), has_indirect_field(body));
                }
            }
            "type_definition" => {
                let Some(ty) = node.child_by_field_name("type") else {
                    return;
                };
                let mut cursor = node.walk();
                for decl in node.children_by_field_name("declarator", &mut cursor) {
                    let Some((alias, indirect)) = alias_of_declarator(decl) else {
                        continue;
                    };
                    let alias = unit.text(alias).to_string();
                    if indirect {
                        registry.aliases.insert(alias, AliasKind::Indirect);
                    } else if ty.kind() == "struct_specifier" {
                        let flag = ty
                            .child_by_field_name("body")
                            .map(has_indirect_field)
                            .or_else(|| {
                                ty.child_by_field_name("name")
                                    .and_then(|n| registry.tags.get(unit.text(n)).copied())
                            });
                        if let Some(flag) = flag {
                            registry.aliases.insert(alias, AliasKind::Struct(flag));
                        }
                    }
                }
            }
            _ => {}
        });
        registry
    }

    /// Eligibility of a variable whose declarator carries no indirection of
    /// its own: structs qualify through their fields, aliases through what
    /// they name.
    fn class_of_plain_type(&self, ty: Node, source: &str) -> Option<VarClass> {
        match ty.kind() {
            "struct_specifier" => {
                let flag = ty
                    .child_by_field_name("body")
                    .map(has_indirect_field)
                    .or_else(|| {
                        ty.child_by_field_name("name")
                            .and_then(|n| {
                                self.tags
                                    .get(n.utf8_text(source.as_bytes()).unwrap_or(""))
                                    .copied()
                            })
                    })
                    .unwrap_or(false);
                flag.then_some(VarClass::Aggregate)
            }
            "type_identifier" => {
                let name = ty.utf8_text(source.as_bytes()).unwrap_or("");
                match self.aliases.get(name)? {
                    AliasKind::Struct(true) => Some(VarClass::Aggregate),
                    AliasKind::Struct(false) => None,
                    AliasKind::Indirect => Some(VarClass::Indirect),
                }
            }
            _ => None,
        }
    }
}

/// True when a struct body declares at least one array or pointer field.
fn has_indirect_field(body: Node) -> bool {
    let mut found = false;
    parser::walk(body, &mut |node| {
        if matches!(node.kind(), "pointer_declarator" | "array_declarator") {
            found = true;
        }
    });
    found
}

/// Alias name and indirection of one typedef declarator.
fn alias_of_declarator(decl: Node) -> Option<(Node, bool)> {
    let mut node = decl;
    let mut indirect = false;
    loop {
        match node.kind() {
            "type_identifier" => return Some((node, indirect)),
            "pointer_declarator" | "array_declarator" => {
                indirect = true;
                node = node.child_by_field_name("declarator")?;
            }
            "parenthesized_declarator" => node = node.named_child(0)?,
            _ => return None,
        }
    }
}

/// Resolve a declarator to (name, class), or None when the variable is not
/// worth a descriptor: scalars, scalar structs, and anything function-ish.
fn classify(
    ty: Option<Node>,
    declarator: Node,
    registry: &StructRegistry,
    source: &str,
) -> Option<(String, VarClass)> {
    let mut node = declarator;
    if node.kind() == "init_declarator" {
        node = node.child_by_field_name("declarator")?;
    }

    let mut has_indirection = false;
    loop {
        match node.kind() {
            "identifier" => break,
            "array_declarator" | "pointer_declarator" => {
                has_indirection = true;
                node = node.child_by_field_name("declarator")?;
            }
            "parenthesized_declarator" => node = node.named_child(0)?,
            // Function declarators (and pointers to them) are not data.
            _ => return None,
        }
    }

    let name = node.utf8_text(source.as_bytes()).ok()?.to_string();
    if name.is_empty() {
        return None;
    }
    if has_indirection {
        return Some((name, VarClass::Indirect));
    }
    let class = registry.class_of_plain_type(ty?, source)?;
    Some((name, class))
}

/// Const-qualified variables never get descriptors.
fn is_const(decl: Node, source: &str) -> bool {
    let mut cursor = decl.walk();
    for child in decl.children(&mut cursor) {
        if child.kind() == "type_qualifier"
            && child.utf8_text(source.as_bytes()).unwrap_or("") == "const"
        {
            return true;
        }
    }
    false
}

// ============================================================================
// Descriptor emission
// ============================================================================

fn plan_parameters(
    def: Node,
    body: Node,
    func: &str,
    registry: &StructRegistry,
    unit: &ParsedUnit,
    vars: &mut Vec<String>,
    edits: &mut RewriteBuffer,
) {
    let Some(params) = parameter_list(def) else {
        return;
    };

    let mut code = String::new();
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        if param.kind() != "parameter_declaration" || is_const(param, &unit.source) {
            continue;
        }
        let Some(declarator) = param.child_by_field_name("declarator") else {
            continue;
        };
        let ty = param.child_by_field_name("type");
        let Some((name, class)) = classify(ty, declarator, registry, &unit.source) else {
            continue;
        };
        if vars.iter().any(|v| *v == name) {
            continue;
        }
        for line in codegen::descriptor_init(&name, func, &class.addr_expr(&name)) {
            code.push_str("\n    ");
            code.push_str(&line);
        }
        vars.push(name);
    }

    if !code.is_empty() {
        edits.insert(body.start_byte() + 1, code);
    }
}

fn parameter_list(def: Node) -> Option<Node> {
    let mut node = def.child_by_field_name("declarator")?;
    loop {
        match node.kind() {
            "function_declarator" => return node.child_by_field_name("parameters"),
            "pointer_declarator" => node = node.child_by_field_name("declarator")?,
            "parenthesized_declarator" => node = node.named_child(0)?,
            _ => return None,
        }
    }
}

fn plan_locals(
    body: Node,
    func: &str,
    registry: &StructRegistry,
    unit: &ParsedUnit,
    text: &SourceText,
    vars: &mut Vec<String>,
    edits: &mut RewriteBuffer,
) {
    parser::walk(body, &mut |node| {
        if node.kind() != "declaration" {
            return;
        }
        // A for-init declaration sits inside the loop header, where a
        // spliced statement would not parse.
        if node
            .parent()
            .map(|p| p.kind() == "for_statement")
            .unwrap_or(false)
        {
            return;
        }
        if is_const(node, &unit.source) {
            return;
        }

        let ty = node.child_by_field_name("type");
        let indent = text.indent_at(node.start_byte());
        let mut code = String::new();
        let mut cursor = node.walk();
        for declarator in node.children_by_field_name("declarator", &mut cursor) {
            let Some((name, class)) = classify(ty, declarator, registry, &unit.source) else {
                continue;
            };
            if vars.iter().any(|v| *v == name) {
                continue;
            }
            for line in codegen::descriptor_init(&name, func, &class.addr_expr(&name)) {
                code.push('\n');
                code.push_str(indent);
                code.push_str(&line);
            }
            vars.push(name);
        }
        if !code.is_empty() {
            edits.insert(node.end_byte(), code);
        }
    });
}

// ============================================================================
// Access recorders
// ============================================================================

fn plan_accesses(
    body: Node,
    vars: &[String],
    unit: &ParsedUnit,
    text: &SourceText,
    edits: &mut RewriteBuffer,
) {
    if vars.is_empty() {
        return;
    }
    parser::walk(body, &mut |node| {
        let target = match node.kind() {
            "subscript_expression" | "field_expression" => node
                .child_by_field_name("argument")
                .map(parser::strip_parens)
                .filter(|base| base.kind() == "identifier")
                .map(|base| (base, unit.text(node).to_string(), true)),
            "pointer_expression" => {
                let op = node
                    .child_by_field_name("operator")
                    .or_else(|| node.child(0))
                    .map(|o| unit.text(o))
                    .unwrap_or("");
                if op != "*" {
                    None
                } else {
                    node.child_by_field_name("argument").and_then(|arg| {
                        resolve_pointer_base(arg)
                            .map(|base| (base, unit.text(arg).to_string(), false))
                    })
                }
            }
            _ => None,
        };

        let Some((base, access_expr, take_address)) = target else {
            return;
        };
        let name = unit.text(base);
        if !vars.iter().any(|v| v == name) {
            return;
        }

        let anchor = statement_anchor(node);
        let at = anchor.start_byte();
        let indent = text.indent_at(at);
        edits.insert(
            at,
            format!(
                "{}\n{}",
                codegen::record_call(name, &access_expr, take_address),
                indent
            ),
        );
    });
}

/// Base identifier of a dereference: strip parentheses and casts, then
/// follow the left operand of pointer arithmetic. `*(p + i)` resolves to
/// `p`; bases that are not plain identifiers resolve to nothing.
fn resolve_pointer_base(arg: Node) -> Option<Node> {
    let mut node = parser::strip_parens(arg);
    loop {
        match node.kind() {
            "identifier" => return Some(node),
            "binary_expression" => {
                node = parser::strip_parens(node.child_by_field_name("left")?);
            }
            _ => return None,
        }
    }
}

/// The smallest enclosing statement-like ancestor: the node whose start is
/// a syntactically valid insertion point for a probe that must run right
/// before the access. Assignments anchor themselves; otherwise the walk
/// stops at a statement hanging off a block or control-flow construct, so
/// probes land inside loop bodies and re-run on every iteration.
fn statement_anchor(start: Node) -> Node {
    let mut node = start;
    loop {
        if node.kind() == "assignment_expression" {
            return node;
        }
        let Some(parent) = node.parent() else {
            return node;
        };
        match parent.kind() {
            "compound_statement" | "case_statement" | "labeled_statement" => return node,
            "if_statement" | "for_statement" | "while_statement" | "do_statement"
            | "switch_statement"
                if node.kind().ends_with("_statement") =>
            {
                return node;
            }
            _ => node = parent,
        }
    }
}

// ============================================================================
// Analysis emission
// ============================================================================

fn plan_exits(body: Node, vars: &[String], text: &SourceText, edits: &mut RewriteBuffer) {
    if vars.is_empty() {
        return;
    }

    // Before every return, however deeply nested.
    parser::walk(body, &mut |node| {
        if node.kind() != "return_statement" {
            return;
        }
        let indent = text.indent_at(node.start_byte());
        let mut code = String::new();
        for line in codegen::analysis_calls(vars) {
            code.push_str(&line);
            code.push('\n');
            code.push_str(indent);
        }
        edits.insert(node.start_byte(), code);
    });

    // Void functions and fall-through exits: after the last statement when
    // the body does not end in a return.
    let mut last: Option<Node> = None;
    let mut cursor = body.walk();
    for child in body.named_children(&mut cursor) {
        if child.kind() != "comment" {
            last = Some(child);
        }
    }
    let Some(last) = last else {
        return;
    };
    if last.kind() == "return_statement" {
        return;
    }
    let indent = text.indent_at(last.start_byte());
    let mut code = String::new();
    for line in codegen::analysis_calls(vars) {
        code.push('\n');
        code.push_str(indent);
        code.push_str(&line);
    }
    edits.insert(last.end_byte(), code);
}
