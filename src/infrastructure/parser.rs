// C parser adapter built on tree-sitter. Everything that touches the
// grammar lives here; the planners only see nodes and byte offsets.

use anyhow::{anyhow, Context, Result};
use tree_sitter::{Node, Parser, Tree};

pub struct CParser {
    parser: Parser,
}

impl CParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(tree_sitter_c::language())
            .context("Failed to load the C grammar")?;
        Ok(Self { parser })
    }

    /// Parse one translation unit's main file. tree-sitter works on the
    /// un-preprocessed text, so preprocessor lines stay visible as nodes
    /// and every span is a byte offset into the original source.
    pub fn parse(&mut self, source: String, file_name: String) -> Result<ParsedUnit> {
        let tree = self
            .parser
            .parse(&source, None)
            .ok_or_else(|| anyhow!("Parser produced no tree for {}", file_name))?;
        let includes = collect_includes(tree.root_node(), &source);
        Ok(ParsedUnit {
            source,
            file_name,
            tree,
            includes,
        })
    }
}

/// A parsed main file: source text, syntax tree, and the `#include` list
/// the code generators consult to avoid duplicate directives.
pub struct ParsedUnit {
    pub source: String,
    pub file_name: String,
    pub tree: Tree,
    pub includes: Vec<String>,
}

impl ParsedUnit {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn text(&self, node: Node) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    pub fn has_errors(&self) -> bool {
        self.root().has_error()
    }

    /// Byte offset of the first syntax error or missing token, for
    /// diagnostics.
    pub fn first_error_offset(&self) -> Option<usize> {
        let mut first: Option<usize> = None;
        walk(self.root(), &mut |node| {
            if node.is_error() || node.is_missing() {
                first = Some(first.map_or(node.start_byte(), |f| f.min(node.start_byte())));
            }
        });
        first
    }
}

/// Header names included anywhere in the main file, in source order.
/// `<stdio.h>` and `"stdio.h"` both collect as `stdio.h`.
fn collect_includes(root: Node, source: &str) -> Vec<String> {
    let mut includes = Vec::new();
    walk(root, &mut |node| {
        if node.kind() != "preproc_include" {
            return;
        }
        if let Some(path) = node.child_by_field_name("path") {
            let raw = path.utf8_text(source.as_bytes()).unwrap_or("");
            let name = raw.trim_matches(|c| c == '<' || c == '>' || c == '"');
            if !name.is_empty() {
                includes.push(name.to_string());
            }
        }
    });
    includes
}

/// Pre-order walk over every node of the subtree.
pub fn walk<'t>(node: Node<'t>, visit: &mut dyn FnMut(Node<'t>)) {
    visit(node);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, visit);
    }
}

/// Every function definition in the unit, in source order. Declarations
/// without bodies are not function definitions and never show up here.
pub fn function_definitions(root: Node) -> Vec<Node> {
    let mut defs = Vec::new();
    walk(root, &mut |node| {
        if node.kind() == "function_definition" {
            defs.push(node);
        }
    });
    defs
}

/// Name of a function definition, reached through its declarator chain.
/// Returns None for declarators the grammar could not shape (error
/// recovery), which callers treat as "skip silently".
pub fn function_name<'s>(def: Node, source: &'s str) -> Option<&'s str> {
    let mut node = def.child_by_field_name("declarator")?;
    loop {
        match node.kind() {
            "function_declarator" => {
                let inner = node.child_by_field_name("declarator")?;
                return if inner.kind() == "identifier" {
                    inner.utf8_text(source.as_bytes()).ok()
                } else {
                    None
                };
            }
            "pointer_declarator" => node = node.child_by_field_name("declarator")?,
            "parenthesized_declarator" => node = node.named_child(0)?,
            _ => return None,
        }
    }
}

/// Body (compound statement) of a function definition.
pub fn function_body(def: Node) -> Option<Node> {
    def.child_by_field_name("body")
}

/// Strip parentheses and cast layers around an expression.
pub fn strip_parens(mut node: Node) -> Node {
    loop {
        match node.kind() {
            "parenthesized_expression" => match node.named_child(0) {
                Some(inner) => node = inner,
                None => return node,
            },
            "cast_expression" => match node.child_by_field_name("value") {
                Some(inner) => node = inner,
                None => return node,
            },
            _ => return node,
        }
    }
}

/// Direct callee name of a call expression. Calls through function
/// pointers or member expressions have no direct callee and return None.
pub fn direct_callee<'s>(call: Node, source: &'s str) -> Option<&'s str> {
    let func = strip_parens(call.child_by_field_name("function")?);
    if func.kind() == "identifier" {
        func.utf8_text(source.as_bytes()).ok()
    } else {
        None
    }
}
