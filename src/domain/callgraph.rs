// Call graph structures for Probecraft.
// Represents caller/callee relationships between functions defined in one
// translation unit's main file.

use std::collections::HashMap;

/// A node in the call graph: one function defined in the main file.
#[derive(Debug)]
pub struct CallGraphNode {
    pub name: String,
    /// Functions this one calls directly. Unique, insertion order preserved.
    pub callees: Vec<String>,
    /// Functions that call this one. Unique, insertion order preserved.
    pub callers: Vec<String>,
}

/// The call graph of a single translation unit.
///
/// Nodes live in an arena `Vec` indexed by name, and adjacency lists store
/// names rather than handles, so cycles (recursion, mutual recursion) carry
/// no ownership hazards.
#[derive(Debug, Default)]
pub struct CallGraph {
    nodes: Vec<CallGraphNode>,
    index: HashMap<String, usize>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the node if it does not exist yet.
    pub fn add_node(&mut self, name: &str) {
        if !self.index.contains_key(name) {
            self.index.insert(name.to_string(), self.nodes.len());
            self.nodes.push(CallGraphNode {
                name: name.to_string(),
                callees: Vec::new(),
                callers: Vec::new(),
            });
        }
    }

    /// Record a direct call from `caller` to `callee`. Both nodes are
    /// created on demand; a repeated (caller, callee) pair is recorded once.
    pub fn add_edge(&mut self, caller: &str, callee: &str) {
        self.add_node(caller);
        self.add_node(callee);

        let caller_idx = self.index[caller];
        let node = &mut self.nodes[caller_idx];
        if !node.callees.iter().any(|c| c == callee) {
            node.callees.push(callee.to_string());
        }

        let callee_idx = self.index[callee];
        let node = &mut self.nodes[callee_idx];
        if !node.callers.iter().any(|c| c == caller) {
            node.callers.push(caller.to_string());
        }
    }

    pub fn node(&self, name: &str) -> Option<&CallGraphNode> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Nodes in insertion (definition) order.
    pub fn nodes(&self) -> impl Iterator<Item = &CallGraphNode> {
        self.nodes.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Functions nothing in the translation unit calls.
    pub fn roots(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| n.callers.is_empty())
            .map(|n| n.name.as_str())
            .collect()
    }

    /// A leaf calls no other function in the translation unit.
    pub fn is_leaf(&self, name: &str) -> bool {
        self.node(name).map(|n| n.callees.is_empty()).unwrap_or(false)
    }

    pub fn is_root(&self, name: &str) -> bool {
        self.node(name).map(|n| n.callers.is_empty()).unwrap_or(false)
    }

    pub fn callers(&self, name: &str) -> &[String] {
        self.node(name).map(|n| n.callers.as_slice()).unwrap_or(&[])
    }

    /// Print the graph structure, one block per function.
    pub fn dump(&self) {
        println!("Call Graph Structure:");
        println!("==================");
        for node in &self.nodes {
            println!();
            println!("Function: {}", node.name);
            print!("  Calls:");
            for callee in &node.callees {
                print!(" {}", callee);
            }
            println!();
            print!("  Called by:");
            for caller in &node.callers {
                print!(" {}", caller);
            }
            println!();
        }
        println!("==================");
    }
}
