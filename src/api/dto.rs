use serde::{Deserialize, Serialize};

use crate::domain::callgraph::CallGraph;

#[derive(Debug, Serialize, Deserialize)]
pub struct GraphDto {
    pub nodes: Vec<NodeDto>,
    pub edges: Vec<EdgeDto>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodeDto {
    pub name: String,
    pub is_root: bool,
    pub is_leaf: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EdgeDto {
    pub from: String,
    pub to: String,
}

impl From<&CallGraph> for GraphDto {
    fn from(graph: &CallGraph) -> Self {
        let nodes = graph
            .nodes()
            .map(|n| NodeDto {
                name: n.name.clone(),
                is_root: n.callers.is_empty(),
                is_leaf: n.callees.is_empty(),
            })
            .collect();

        let mut edges = Vec::new();
        for node in graph.nodes() {
            for callee in &node.callees {
                edges.push(EdgeDto {
                    from: node.name.clone(),
                    to: callee.clone(),
                });
            }
        }

        GraphDto { nodes, edges }
    }
}
