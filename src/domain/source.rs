// Byte-level helpers over the original source text: line/column mapping,
// indentation mirroring, and the two insertion-point scans the planners
// rely on.

/// Read-only view of one translation unit's main-file text.
pub struct SourceText<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> SourceText<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { text, line_starts }
    }

    pub fn as_str(&self) -> &'a str {
        self.text
    }

    /// 1-based (line, column) of a byte offset.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.text.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        (line + 1, offset - self.line_starts[line] + 1)
    }

    /// Leading whitespace of the line containing `offset`, up to `offset`.
    pub fn indent_at(&self, offset: usize) -> &'a str {
        let offset = offset.min(self.text.len());
        let line_start = self.text[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line = &self.text[line_start..offset];
        let indent_len = line
            .bytes()
            .take_while(|b| *b == b' ' || *b == b'\t')
            .count();
        &line[..indent_len]
    }

    /// Scan backward from `offset` to the nearest `;`, `{`, `}` or newline,
    /// then forward over whitespace: where the statement containing
    /// `offset` begins. Keeps pre-statement probes out of composite
    /// expressions.
    pub fn statement_start_before(&self, offset: usize) -> usize {
        let bytes = self.text.as_bytes();
        let offset = offset.min(bytes.len());
        let mut i = offset;
        while i > 0 {
            match bytes[i - 1] {
                b';' | b'{' | b'}' | b'\n' => break,
                _ => i -= 1,
            }
        }
        while i < offset && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        i
    }

    /// Byte offset just past the last top-level `#include`/`#define` line,
    /// or 0 when the file has none. The emitted runtime lands here so that
    /// it sees the same headers the rest of the file sees.
    pub fn after_last_preproc_line(&self) -> usize {
        let mut end = 0;
        let mut pos = 0;
        for line in self.text.split_inclusive('\n') {
            let trimmed = line.trim_start();
            if trimmed.starts_with("#include") || trimmed.starts_with("#define") {
                end = pos + line.len();
            }
            pos += line.len();
        }
        end
    }
}
