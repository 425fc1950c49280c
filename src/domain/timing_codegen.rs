// Timing-mode code generation: every C fragment the time planner injects,
// one function per snippet so the naming discipline stays in one place.
//
// Emitted symbols per instrumented function F with callees G:
//   __time_F[N], __time_F_G[N]      per-thread accumulator arrays
//   __time_G_tmp                    per-invocation child-time accumulator
//   __tid, __start_time, __end_time, __call_start_G, __call_end_G
//   total_F, total_F_G, total_program_time   report-local aggregates

use crate::domain::callgraph::CallGraph;
use crate::domain::NUM_THREADS;

pub const CLK_FREQ: &str = "4150000000UL";
pub const DEFAULT_TOTAL_TIME_THRESHOLD: f64 = 20.0;
pub const DEFAULT_PARENT_TIME_THRESHOLD: f64 = 40.0;

/// Cycle-conversion macros and the includes they need, emitted once per
/// translation unit. Headers the file already includes are not repeated.
pub fn prelude(includes: &[String]) -> String {
    let mut s = String::new();
    if !includes.iter().any(|i| i == "limits.h") {
        s.push_str("#include <limits.h>\n");
    }
    if !includes.iter().any(|i| i == "hthread_device.h") {
        s.push_str("#include \"hthread_device.h\"\n");
    }
    s.push_str("\n#ifndef CLK_FREQ\n");
    s.push_str(&format!("#define CLK_FREQ {}\n", CLK_FREQ));
    s.push_str("#define CYCLES_TO_NS(cycles) ((cycles) * 1000000000UL / CLK_FREQ)\n");
    s.push_str("#define CYCLES_TO_US(cycles) ((cycles) * 1000000UL / CLK_FREQ)\n");
    s.push_str("#define CYCLES_TO_MS(cycles) ((cycles) * 1000UL / CLK_FREQ)\n");
    s.push_str("#endif\n\n");
    s
}

/// Per-function accumulator array plus one per-call-site array for every
/// distinct callee, placed before the function definition.
pub fn array_decls(func: &str, callees: &[String]) -> String {
    let mut s = format!(
        "static unsigned long __time_{}[{}] = {{0}};\n",
        func, NUM_THREADS
    );
    for callee in callees {
        s.push_str(&format!(
            "static unsigned long __time_{}_{}[{}] = {{0}};\n",
            func, callee, NUM_THREADS
        ));
    }
    s
}

/// Entry block, spliced right after the function's opening brace. The
/// declarations stay in function scope so the exit blocks can see them.
pub fn entry_block(callees: &[String]) -> String {
    let mut s = String::from("\n    int __tid = get_thread_id();");
    for callee in callees {
        s.push_str(&format!(
            "\n    unsigned long __time_{}_tmp = 0;",
            callee
        ));
    }
    s.push_str("\n    unsigned long __start_time = get_clk();");
    s
}

/// Exit block, spliced immediately before a `return`. One braced block, so
/// several returns in one scope do not redeclare `__end_time`. The
/// per-function accumulator ends up exclusive: total elapsed minus the
/// children's share, which is latched to the per-call-site arrays here.
pub fn exit_block(func: &str, callees: &[String], indent: &str) -> String {
    let mut s = String::from("{ unsigned long __end_time = get_clk();\n");
    s.push_str(&format!(
        "{}  __time_{}[__tid] += __end_time - __start_time;\n",
        indent, func
    ));
    if callees.is_empty() {
        s.push_str(&format!("{}}}\n{}", indent, indent));
        return s;
    }
    s.push_str(&format!("{}  unsigned long __children_time = 0;\n", indent));
    for callee in callees {
        s.push_str(&format!(
            "{}  __time_{}_{}[__tid] = __time_{}_tmp;\n",
            indent, func, callee, callee
        ));
        s.push_str(&format!(
            "{}  __children_time += __time_{}_tmp;\n",
            indent, callee
        ));
    }
    s.push_str(&format!(
        "{}  __time_{}[__tid] -= __children_time; }}\n{}",
        indent, func, indent
    ));
    s
}

/// Pre-call timestamp, placed at the start of the statement containing the
/// call. Names are per-callee, not per-site: repeated calls overwrite the
/// timestamp and accumulate into the shared tmp.
pub fn call_pre(callee: &str, indent: &str) -> String {
    format!(
        "unsigned long __call_start_{} = get_clk();\n{}",
        callee, indent
    )
}

/// Post-call capture, spliced right after the call's final token. The
/// fragment opens with `;` and leaves its last statement unterminated so
/// the statement's original terminator closes it.
pub fn call_post(callee: &str, indent: &str) -> String {
    format!(
        ";\n{ind}unsigned long __call_end_{g} = get_clk();\n{ind}__time_{g}_tmp += __call_end_{g} - __call_start_{g}",
        ind = indent,
        g = callee
    )
}

/// Everything appended at end of file: the helpers and the report function.
pub fn report_tail(
    graph: &CallGraph,
    declared: &[String],
    total_threshold: f64,
    parent_threshold: f64,
) -> String {
    let mut s = String::from("\n");
    s.push_str(&combine_thread_times());
    s.push_str(&wait_for_threads());
    s.push_str(&print_timing_results(
        graph,
        declared,
        total_threshold,
        parent_threshold,
    ));
    s
}

/// Folds per-thread cycle counts with `max`: under SPMD execution the
/// slowest thread is the function's wall time. Idle slots stay zero and
/// are skipped.
fn combine_thread_times() -> String {
    format!(
        "static inline void __combine_thread_times(unsigned long time_array[{n}], unsigned long* total_time) {{\n\
         \x20   *total_time = 0;\n\
         \x20   for (int i = 0; i < {n}; i++) {{\n\
         \x20       if (time_array[i] == 0) continue;\n\
         \x20       if (time_array[i] > *total_time) *total_time = time_array[i];\n\
         \x20   }}\n\
         }}\n\n",
        n = NUM_THREADS
    )
}

/// Thread 0 busy-waits three seconds before reading the tables; the device
/// has no barrier primitive at this layer, and three seconds outlasts any
/// probed region.
fn wait_for_threads() -> String {
    String::from(
        "static inline void __wait_for_threads() {\n\
         \x20   if (get_thread_id() == 0) {\n\
         \x20       const unsigned long start_wait = get_clk();\n\
         \x20       while ((get_clk() - start_wait) < (3UL * CLK_FREQ)) {}\n\
         \x20       hthread_printf(\"\\nProcessing timing results...\\n\");\n\
         \x20   }\n\
         }\n\n",
    )
}

fn print_timing_results(
    graph: &CallGraph,
    declared: &[String],
    total_threshold: f64,
    parent_threshold: f64,
) -> String {
    let is_declared = |name: &str| declared.iter().any(|d| d == name);

    let mut s = String::from("void __print_timing_results() {\n");
    s.push_str("    __wait_for_threads();\n");
    s.push_str("    if (get_thread_id() != 0) return;\n\n");
    s.push_str("    unsigned long total_program_time = 0;\n");

    // One aggregate per instrumented function, one per call-site array.
    for func in declared {
        s.push_str(&format!("    unsigned long total_{} = 0;\n", func));
        s.push_str(&format!(
            "    __combine_thread_times(__time_{}, &total_{});\n",
            func, func
        ));
        if let Some(node) = graph.node(func) {
            for callee in &node.callees {
                s.push_str(&format!(
                    "    unsigned long total_{}_{} = 0;\n",
                    func, callee
                ));
                s.push_str(&format!(
                    "    __combine_thread_times(__time_{}_{}, &total_{}_{});\n",
                    func, callee, func, callee
                ));
            }
        }
    }

    for func in declared {
        if graph.is_root(func) {
            s.push_str(&format!("    total_program_time += total_{};\n", func));
        }
    }

    s.push_str("\n    hthread_printf(\"\\n═══════════════════════════════════════════════\\n\");\n");
    s.push_str("    hthread_printf(\"              Timing Analysis Report              \\n\");\n");
    s.push_str("    hthread_printf(\"═══════════════════════════════════════════════\\n\\n\");\n");
    s.push_str(
        "    hthread_printf(\"Total Program Time: %.2f ms\\n\\n\", CYCLES_TO_MS((double)total_program_time));\n",
    );

    // Call tree: one block per root, one branch line per callee.
    for func in declared {
        if !graph.is_root(func) {
            continue;
        }
        s.push_str(&format!("\n    hthread_printf(\"{}\\n\");\n", func));
        if let Some(node) = graph.node(func) {
            for (i, callee) in node.callees.iter().enumerate() {
                let branch = if i + 1 == node.callees.len() {
                    "└──"
                } else {
                    "├──"
                };
                s.push_str(&format!(
                    "    hthread_printf(\"{branch} {g}: %.2f ms (%.1f%%)\\n\",\n\
                     \x20       CYCLES_TO_MS((double)total_{f}_{g}),\n\
                     \x20       total_{f} > 0 ? ((double)total_{f}_{g} / (double)total_{f}) * 100.0 : 0.0);\n",
                    branch = branch,
                    f = func,
                    g = callee
                ));
            }
        }
    }

    s.push_str("\n    hthread_printf(\"\\n═══════════════════════════════════════════════\\n\");\n");
    s.push_str("    hthread_printf(\"                  Hot Functions                  \\n\");\n");
    s.push_str("    hthread_printf(\"═══════════════════════════════════════════════\\n\\n\");\n");

    // A non-root function is hot when it dominates both the program and the
    // mean of its callers.
    for func in declared {
        if graph.is_root(func) {
            continue;
        }
        let callers: Vec<&String> = graph
            .callers(func)
            .iter()
            .filter(|c| is_declared(c))
            .collect();
        if callers.is_empty() {
            continue;
        }
        s.push_str("    {\n");
        s.push_str(&format!(
            "        double percent_total = total_program_time > 0 ? ((double)total_{} / (double)total_program_time) * 100.0 : 0.0;\n",
            func
        ));
        s.push_str("        double percent_parent = 0.0;\n");
        for caller in &callers {
            s.push_str(&format!(
                "        if (total_{c} > 0) percent_parent += ((double)total_{f} / (double)total_{c}) * 100.0;\n",
                c = caller,
                f = func
            ));
        }
        s.push_str(&format!(
            "        percent_parent /= {}.0;\n",
            callers.len()
        ));
        s.push_str(&format!(
            "        if (percent_total >= {:.1} && percent_parent >= {:.1}) {{\n",
            total_threshold, parent_threshold
        ));
        s.push_str(&format!(
            "            hthread_printf(\"{}: %.1f%% of total, %.1f%% of parent\\n\", percent_total, percent_parent);\n",
            func
        ));
        s.push_str("        }\n");
        s.push_str("    }\n");
    }

    s.push_str("}\n");
    s
}
