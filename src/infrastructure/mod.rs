pub mod callgraph_builder;
pub mod exporter;
pub mod memory_pass;
pub mod parser;
pub mod timing_pass;

pub use callgraph_builder::AstCallGraphBuilder;
pub use exporter::{export_call_graph, DotExporter, JsonExporter};
pub use memory_pass::MemoryPlanner;
pub use parser::{CParser, ParsedUnit};
pub use timing_pass::TimePlanner;
