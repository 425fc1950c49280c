// Memory-mode code generation: the profiler runtime emitted once per
// translation unit, plus the per-variable snippets the memory planner
// splices into function bodies.

use crate::domain::NUM_THREADS;

pub const MAX_PATTERNS: usize = 16;
pub const NAME_SIZE: usize = 64;
/// A stride pattern is reported when it covers at least this share of the
/// variable's accesses, in percent.
pub const PATTERN_THRESHOLD: usize = 5;
pub const TOP_PATTERNS: usize = 3;

/// The complete profiler runtime: constants, `mem_profile_t`, and the four
/// `__mem_*` helpers. Placed after the last preprocessor line of the file.
pub fn runtime(includes: &[String]) -> String {
    let mut s = base_structures(includes);
    s.push_str(&init_function());
    s.push_str(&record_function());
    s.push_str(&analysis_functions());
    s
}

fn base_structures(includes: &[String]) -> String {
    let mut s = String::new();
    if !includes.iter().any(|i| i == "stdio.h") {
        s.push_str("#include <stdio.h>\n");
    }
    if !includes.iter().any(|i| i == "string.h") {
        s.push_str("#include <string.h>\n");
    }
    if !includes.iter().any(|i| i == "hthread_device.h") {
        s.push_str("#include \"hthread_device.h\"\n");
    }

    s.push_str(&format!(
        "#ifndef MEM_PROFILER_DEFS\n\
         #define MEM_PROFILER_DEFS\n\
         #define MEM_MAX_PATTERNS {}\n\
         #define MEM_NAME_SIZE {}\n\
         #define MEM_NUM_THREADS {}\n\
         #define MEM_TOP_PATTERNS {}\n\
         #define MEM_PATTERN_THRESHOLD {}\n\n",
        MAX_PATTERNS, NAME_SIZE, NUM_THREADS, TOP_PATTERNS, PATTERN_THRESHOLD
    ));

    s.push_str(
        "typedef struct {\n\
         \x20   char var_name[MEM_NAME_SIZE];\n\
         \x20   char func_name[MEM_NAME_SIZE];\n\
         \x20   size_t base_addr;\n\
         \x20   size_t end_addr;\n\
         \x20   size_t total_accesses;\n\
         \x20   size_t patterns[MEM_MAX_PATTERNS];\n\
         \x20   size_t pattern_counts[MEM_MAX_PATTERNS];\n\
         \x20   size_t last_addr;\n\
         \x20   size_t var_size;\n\
         \x20   size_t type_size;\n\
         } mem_profile_t;\n\n\
         #endif /* MEM_PROFILER_DEFS */\n\n",
    );
    s
}

fn init_function() -> String {
    String::from(
        "static inline void __mem_init(mem_profile_t* prof,\n\
         \x20                             const char* var_name,\n\
         \x20                             const char* func_name,\n\
         \x20                             void* addr,\n\
         \x20                             size_t type_size) {\n\
         \x20   strncpy(prof->var_name, var_name, MEM_NAME_SIZE - 1);\n\
         \x20   strncpy(prof->func_name, func_name, MEM_NAME_SIZE - 1);\n\
         \x20   prof->base_addr = (size_t)addr;\n\
         \x20   prof->end_addr = prof->base_addr;\n\
         \x20   prof->total_accesses = 0;\n\
         \x20   prof->last_addr = prof->base_addr;\n\
         \x20   prof->var_size = 0;\n\
         \x20   prof->type_size = type_size;\n\
         \x20   memset(prof->patterns, -1, sizeof(prof->patterns));\n\
         \x20   memset(prof->pattern_counts, 0, sizeof(prof->pattern_counts));\n\
         }\n\n",
    )
}

fn record_function() -> String {
    String::from(
        "static inline void __mem_record(mem_profile_t* prof, void* addr) {\n\
         \x20   size_t step;\n\
         \x20   size_t curr_addr = (size_t)addr;\n\
         \n\
         \x20   if (prof->total_accesses == 0) {\n\
         \x20       prof->last_addr = curr_addr;\n\
         \x20       prof->base_addr = curr_addr;\n\
         \x20       prof->end_addr = curr_addr;\n\
         \x20   }\n\
         \x20   prof->total_accesses++;\n\
         \n\
         \x20   step = curr_addr < prof->last_addr ? (prof->last_addr - curr_addr) : (curr_addr - prof->last_addr);\n\
         \x20   step /= prof->type_size;\n\
         \x20   prof->last_addr = curr_addr;\n\
         \x20   prof->end_addr = curr_addr > prof->end_addr ? curr_addr : prof->end_addr;\n\
         \x20   prof->base_addr = curr_addr < prof->base_addr ? curr_addr : prof->base_addr;\n\
         \n\
         \x20   if (step >= 65536) return;\n\
         \n\
         \x20   for (int i = 0; i < MEM_MAX_PATTERNS; i++) {\n\
         \x20       if (prof->patterns[i] == step) {\n\
         \x20           prof->pattern_counts[i]++;\n\
         \x20           return;\n\
         \x20       } else if (prof->patterns[i] == (size_t)-1) {\n\
         \x20           prof->patterns[i] = step;\n\
         \x20           prof->pattern_counts[i] = 1;\n\
         \x20           return;\n\
         \x20       }\n\
         \x20   }\n\
         }\n\n",
    )
}

fn analysis_functions() -> String {
    String::from(
        "static inline void __mem_analyze(mem_profile_t* prof) {\n\
         \x20   int i, j;\n\
         \x20   if (prof->total_accesses == 0) return;\n\
         \n\
         \x20   prof->var_size = (prof->end_addr - prof->base_addr + prof->type_size);\n\
         \n\
         \x20   for (i = 0; i < MEM_TOP_PATTERNS && i < MEM_MAX_PATTERNS - 1; i++) {\n\
         \x20       int max_idx = i;\n\
         \x20       for (j = i + 1; j < MEM_MAX_PATTERNS; j++) {\n\
         \x20           if (prof->pattern_counts[j] > prof->pattern_counts[max_idx]) {\n\
         \x20               max_idx = j;\n\
         \x20           }\n\
         \x20       }\n\
         \x20       if (max_idx != i) {\n\
         \x20           size_t temp_count = prof->pattern_counts[i];\n\
         \x20           prof->pattern_counts[i] = prof->pattern_counts[max_idx];\n\
         \x20           prof->pattern_counts[max_idx] = temp_count;\n\
         \n\
         \x20           size_t temp_pattern = prof->patterns[i];\n\
         \x20           prof->patterns[i] = prof->patterns[max_idx];\n\
         \x20           prof->patterns[max_idx] = temp_pattern;\n\
         \x20       }\n\
         \x20   }\n\
         }\n\n\
         static inline void __mem_print_analysis(mem_profile_t* prof) {\n\
         \x20   if (prof->total_accesses == 0) return;\n\
         \n\
         \x20   char buffer[512];\n\
         \x20   int offset = 0;\n\
         \n\
         \x20   offset += snprintf(buffer + offset, sizeof(buffer) - offset,\n\
         \x20       \"[Memory Analysis] thread %d: %s in %s: elements=%zu, accesses=%zu\\n\",\n\
         \x20       get_thread_id(), prof->var_name, prof->func_name,\n\
         \x20       prof->var_size / prof->type_size, prof->total_accesses);\n\
         \n\
         \x20   for (int i = 0; i < MEM_TOP_PATTERNS && i < MEM_MAX_PATTERNS; i++) {\n\
         \x20       if (prof->pattern_counts[i] > prof->total_accesses * MEM_PATTERN_THRESHOLD / 100) {\n\
         \x20           offset += snprintf(buffer + offset, sizeof(buffer) - offset,\n\
         \x20               \"  Pattern %d: step=%zu (%.1f%%)\\n\",\n\
         \x20               i + 1, prof->patterns[i],\n\
         \x20               (float)prof->pattern_counts[i] * 100 / prof->total_accesses);\n\
         \x20       }\n\
         \x20   }\n\
         \n\
         \x20   hthread_printf(\"%s\", buffer);\n\
         }\n\n",
    )
}

/// Name of the descriptor emitted for a variable.
pub fn descriptor_name(var: &str) -> String {
    format!("__{}_prof", var)
}

/// Descriptor declaration plus its `__mem_init` call, as two lines without
/// indentation; the planner mirrors the surrounding indentation in.
/// `sizeof(v[0])` recovers the element size uniformly, so `addr_expr` must
/// index like a pointer: the variable itself for arrays and pointers, its
/// address for structs.
pub fn descriptor_init(var: &str, func: &str, addr_expr: &str) -> [String; 2] {
    [
        format!("mem_profile_t __{}_prof;", var),
        format!(
            "__mem_init(&__{v}_prof, \"{v}\", \"{f}\", (void*){a}, sizeof({v}[0]));",
            v = var,
            f = func,
            a = addr_expr
        ),
    ]
}

/// One recorder call. Subscripts and member accesses record the address of
/// the accessed lvalue; dereferences record the pointer value itself.
pub fn record_call(var: &str, access_expr: &str, take_address: bool) -> String {
    if take_address {
        format!(
            "__mem_record(&__{}_prof, (void*)&({}));",
            var, access_expr
        )
    } else {
        format!("__mem_record(&__{}_prof, (void*)({}));", var, access_expr)
    }
}

/// Analysis plus print for every instrumented variable of the function, in
/// descriptor-emission order.
pub fn analysis_calls(vars: &[String]) -> Vec<String> {
    let mut lines = Vec::with_capacity(vars.len() * 2);
    for var in vars {
        lines.push(format!("__mem_analyze(&__{}_prof);", var));
        lines.push(format!("__mem_print_analysis(&__{}_prof);", var));
    }
    lines
}
