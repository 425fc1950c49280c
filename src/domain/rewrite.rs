// Textual rewrite buffer: insertions keyed on byte offsets of the original
// source, applied in one pass.

/// A single pending insertion.
#[derive(Debug)]
struct Insertion {
    offset: usize,
    seq: usize,
    text: String,
}

/// Collects insertions during planning and splices them into the source
/// afterwards. The original text is never modified or deleted, so stripping
/// every injected fragment from the output reproduces the input.
///
/// Insertions at the same offset appear in the order they were planned,
/// which makes traversal order the tie-breaker for adjacent probes.
#[derive(Debug, Default)]
pub struct RewriteBuffer {
    insertions: Vec<Insertion>,
}

impl RewriteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, offset: usize, text: impl Into<String>) {
        let seq = self.insertions.len();
        self.insertions.push(Insertion {
            offset,
            seq,
            text: text.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.insertions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insertions.is_empty()
    }

    /// Splice all insertions into `source` and return the rewritten text.
    pub fn apply(&self, source: &str) -> String {
        let mut order: Vec<&Insertion> = self.insertions.iter().collect();
        order.sort_by_key(|i| (i.offset, i.seq));

        let extra: usize = order.iter().map(|i| i.text.len()).sum();
        let mut out = String::with_capacity(source.len() + extra);
        let mut cursor = 0;
        for ins in order {
            let at = ins.offset.min(source.len());
            out.push_str(&source[cursor..at]);
            out.push_str(&ins.text);
            cursor = at;
        }
        out.push_str(&source[cursor..]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserts_at_offsets() {
        let mut buf = RewriteBuffer::new();
        buf.insert(0, "A");
        buf.insert(3, "B");
        assert_eq!(buf.apply("xyz"), "AxyzB");
    }

    #[test]
    fn same_offset_keeps_planning_order() {
        let mut buf = RewriteBuffer::new();
        buf.insert(1, "first");
        buf.insert(1, "second");
        assert_eq!(buf.apply("ab"), "afirstsecondb");
    }

    #[test]
    fn unsorted_offsets_are_applied_in_position_order() {
        let mut buf = RewriteBuffer::new();
        buf.insert(5, "tail ");
        buf.insert(0, "head ");
        assert_eq!(buf.apply("01234rest"), "head 01234tail rest");
    }

    #[test]
    fn offset_past_end_clamps_to_end() {
        let mut buf = RewriteBuffer::new();
        buf.insert(100, "!");
        assert_eq!(buf.apply("ab"), "ab!");
    }

    #[test]
    fn empty_buffer_returns_source_verbatim() {
        let buf = RewriteBuffer::new();
        assert_eq!(buf.apply("unchanged"), "unchanged");
    }
}
