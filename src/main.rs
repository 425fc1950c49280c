// Command-line entry point for Probecraft.

use clap::Parser;
use probecraft::application::{InstrumentUsecase, Mode};
use probecraft::infrastructure::{export_call_graph, AstCallGraphBuilder, MemoryPlanner, TimePlanner};
use probecraft::ports::RewritePlanner;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about = "MT-3000 source code instrumentation tool", long_about = None)]
struct Cli {
    /// Input C source files
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Enable time instrumentation
    #[arg(long = "time-inst")]
    time_inst: bool,

    /// Enable memory access instrumentation
    #[arg(long = "memory-inst")]
    memory_inst: bool,

    /// Threshold for total execution time percentage (default: 20%)
    #[arg(long = "total-time-threshold", default_value_t = 20.0)]
    total_time_threshold: f64,

    /// Threshold for parent function time percentage (default: 40%)
    #[arg(long = "parent-time-threshold", default_value_t = 40.0)]
    parent_time_threshold: f64,

    /// Restrict memory instrumentation to these functions
    #[arg(long = "target-funcs", value_delimiter = ',')]
    target_funcs: Vec<String>,

    /// Output file (single input only)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Write the call graph ("-" for stdout, .json for JSON, DOT otherwise)
    #[arg(long = "dump-call-graph")]
    dump_call_graph: Option<String>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            use clap::error::ErrorKind;
            let ok = matches!(
                err.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            );
            let _ = err.print();
            return ExitCode::from(if ok { 0 } else { 1 });
        }
    };

    // Exactly one mode per run.
    if cli.time_inst == cli.memory_inst {
        eprintln!("Error: select exactly one of --time-inst or --memory-inst");
        return ExitCode::from(1);
    }
    if cli.inputs.len() > 1 {
        if cli.output.is_some() {
            eprintln!("Error: -o is only valid with a single input file");
            return ExitCode::from(1);
        }
        if cli.dump_call_graph.as_deref().map(|d| d != "-").unwrap_or(false) {
            eprintln!("Error: --dump-call-graph <file> is only valid with a single input file");
            return ExitCode::from(1);
        }
    }

    let mode = if cli.time_inst { Mode::Time } else { Mode::Memory };

    println!("MT-3000 Source Code Instrumentation Tool");
    println!("======================================");
    println!("Mode: {}", mode.describe());
    if mode == Mode::Memory && !cli.target_funcs.is_empty() {
        println!("Target Functions:");
        for func in &cli.target_funcs {
            println!("  - {}", func);
        }
    } else {
        println!("Target: All Functions");
    }
    println!("======================================");

    let planner: Box<dyn RewritePlanner> = match mode {
        Mode::Time => Box::new(TimePlanner {
            total_time_threshold: cli.total_time_threshold,
            parent_time_threshold: cli.parent_time_threshold,
        }),
        Mode::Memory => Box::new(MemoryPlanner::new(&cli.target_funcs)),
    };
    let usecase = InstrumentUsecase {
        graph_builder: &AstCallGraphBuilder,
        planner: planner.as_ref(),
    };

    let mut failed = false;
    for input in &cli.inputs {
        match usecase.run(input, cli.output.as_deref(), mode) {
            Ok(outcome) => {
                println!(
                    "Successfully generated instrumented file: {}",
                    outcome.output_path.display()
                );
                if let Some(dest) = &cli.dump_call_graph {
                    if let Err(err) = export_call_graph(&outcome.graph, dest) {
                        eprintln!("[WARN] {}: {:#}", input.display(), err);
                    }
                }
            }
            Err(err) => {
                eprintln!("[ERROR] {}: {:#}", input.display(), err);
                failed = true;
            }
        }
    }

    ExitCode::from(if failed { 1 } else { 0 })
}
