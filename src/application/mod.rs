// Use-case wiring: one translation unit in, one instrumented file out.

use crate::domain::callgraph::CallGraph;
use crate::domain::source::SourceText;
use crate::infrastructure::parser::CParser;
use crate::ports::{CallGraphBuilder, RewritePlanner};
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Which instrumentation the run performs. Exactly one per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Time,
    Memory,
}

impl Mode {
    /// Prefix of the default output file name, next to the input.
    pub fn output_prefix(self) -> &'static str {
        match self {
            Mode::Time => "instrumented_",
            Mode::Memory => "mem_prof_",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Mode::Time => "Time Instrumentation",
            Mode::Memory => "Memory Access Instrumentation",
        }
    }
}

pub struct InstrumentUsecase<'a> {
    pub graph_builder: &'a dyn CallGraphBuilder,
    pub planner: &'a dyn RewritePlanner,
}

/// What one successful run produced.
pub struct InstrumentOutcome {
    pub output_path: PathBuf,
    pub graph: CallGraph,
}

impl InstrumentUsecase<'_> {
    /// Instrument one translation unit and write the rewritten source.
    /// The output file is created only after planning has succeeded, so a
    /// failing run never leaves a partial file behind.
    pub fn run(
        &self,
        input: &Path,
        output: Option<&Path>,
        mode: Mode,
    ) -> Result<InstrumentOutcome> {
        let source = fs::read_to_string(input)
            .with_context(|| format!("Could not read input file {}", input.display()))?;

        let mut parser = CParser::new()?;
        let unit = parser.parse(source, input.display().to_string())?;
        if unit.has_errors() {
            let text = SourceText::new(&unit.source);
            let (line, col) = text.line_col(unit.first_error_offset().unwrap_or(0));
            bail!(
                "{}:{}:{}: syntax error; refusing to instrument",
                input.display(),
                line,
                col
            );
        }

        let graph = self.graph_builder.build_call_graph(&unit);
        let edits = self.planner.plan(&unit, &graph)?;
        let rewritten = edits.apply(&unit.source);

        let output_path = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_output_path(input, mode));
        fs::write(&output_path, rewritten)
            .with_context(|| format!("Could not create output file {}", output_path.display()))?;

        Ok(InstrumentOutcome { output_path, graph })
    }
}

/// `instrumented_<input>` or `mem_prof_<input>`, in the input's directory.
pub fn default_output_path(input: &Path, mode: Mode) -> PathBuf {
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{}{}", mode.output_prefix(), file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{AstCallGraphBuilder, MemoryPlanner, TimePlanner};
    use tempfile::tempdir;

    #[test]
    fn default_output_names_follow_the_mode() {
        let input = Path::new("/work/kernel.c");
        assert_eq!(
            default_output_path(input, Mode::Time),
            PathBuf::from("/work/instrumented_kernel.c")
        );
        assert_eq!(
            default_output_path(input, Mode::Memory),
            PathBuf::from("/work/mem_prof_kernel.c")
        );
    }

    #[test]
    fn time_run_writes_next_to_the_input() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("kernel.c");
        std::fs::write(&input, "void work(){}\nint main(){ work(); return 0; }\n").unwrap();

        let planner = TimePlanner::default();
        let usecase = InstrumentUsecase {
            graph_builder: &AstCallGraphBuilder,
            planner: &planner,
        };
        let outcome = usecase.run(&input, None, Mode::Time).unwrap();

        assert_eq!(outcome.output_path, dir.path().join("instrumented_kernel.c"));
        let written = std::fs::read_to_string(&outcome.output_path).unwrap();
        assert!(written.contains("__time_main[24]"));
        assert_eq!(outcome.graph.roots(), vec!["main"]);
    }

    #[test]
    fn syntax_errors_leave_no_output_file() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("broken.c");
        std::fs::write(&input, "void f( {\n").unwrap();

        let planner = MemoryPlanner::new(&[]);
        let usecase = InstrumentUsecase {
            graph_builder: &AstCallGraphBuilder,
            planner: &planner,
        };
        assert!(usecase.run(&input, None, Mode::Memory).is_err());
        assert!(!dir.path().join("mem_prof_broken.c").exists());
    }

    #[test]
    fn explicit_output_path_wins() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("kernel.c");
        let output = dir.path().join("custom.c");
        std::fs::write(&input, "void f(void){ int a[2]; a[0]=1; }\n").unwrap();

        let planner = MemoryPlanner::new(&[]);
        let usecase = InstrumentUsecase {
            graph_builder: &AstCallGraphBuilder,
            planner: &planner,
        };
        let outcome = usecase.run(&input, Some(&output), Mode::Memory).unwrap();
        assert_eq!(outcome.output_path, output);
        assert!(output.exists());
    }
}
