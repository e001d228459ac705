//! Diagnostic dump layer.
//!
//! A [`Dump`] mirrors one pack or unpack walk as a flat list of per-field
//! entries in walk order. The field-access path carried by each entry encodes
//! the hierarchy, so the flat list renders as a tree without any of the
//! borrow gymnastics an owned tree would need. Dumps are created and
//! discarded within a single top-level call; they are never persisted.

use crate::value::Value;

/// One field visited during a pack/unpack walk
#[derive(Debug, Clone)]
pub struct DumpEntry {
    /// Field-access path, e.g. `.hdr.len` or `.items[2]`; empty at the root
    pub path: String,
    /// Type hint of the transform that handled the field
    pub kind: String,
    /// Rendered value, or `<incomplete>` if the walk failed inside the field
    pub value: String,
    /// Byte offset at which the field started
    pub offset: usize,
    /// Raw bytes the field produced or consumed
    pub bytes: Vec<u8>,
    /// False if the walk failed before the field finished
    pub complete: bool,
}

/// A structured trace of one pack/unpack walk
#[derive(Debug, Clone, Default)]
pub struct Dump {
    entries: Vec<DumpEntry>,
}

impl Dump {
    /// Creates an empty dump
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens an entry for a field about to be processed; returns its slot
    pub(crate) fn begin(&mut self, path: String, kind: &str, offset: usize) -> usize {
        self.entries.push(DumpEntry {
            path,
            kind: kind.to_string(),
            value: "<incomplete>".to_string(),
            offset,
            bytes: Vec::new(),
            complete: false,
        });
        self.entries.len() - 1
    }

    /// Completes a previously opened entry
    pub(crate) fn finish(&mut self, slot: usize, value: &Value, bytes: &[u8]) {
        let entry = &mut self.entries[slot];
        entry.value = value.to_string();
        entry.bytes = bytes.to_vec();
        entry.complete = true;
    }

    /// Appends an already-complete entry (used for bit-field ranges, which
    /// share the bytes of their store window)
    pub(crate) fn note(
        &mut self,
        path: String,
        kind: &str,
        offset: usize,
        bytes: &[u8],
        value: &Value,
    ) {
        self.entries.push(DumpEntry {
            path,
            kind: kind.to_string(),
            value: value.to_string(),
            offset,
            bytes: bytes.to_vec(),
            complete: true,
        });
    }

    /// The recorded entries, in walk order
    pub fn entries(&self) -> &[DumpEntry] {
        &self.entries
    }

    /// Looks up the first entry with the given access path
    pub fn entry(&self, path: &str) -> Option<&DumpEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// Renders the dump as a bordered table for error messages
    pub fn render(&self) -> String {
        const HEADERS: [&str; 5] = ["Offset", "Access", "Value", "Memory", "Format"];

        let rows: Vec<[String; 5]> = self
            .entries
            .iter()
            .map(|e| {
                [
                    e.offset.to_string(),
                    if e.path.is_empty() {
                        "(top)".to_string()
                    } else {
                        e.path.clone()
                    },
                    e.value.clone(),
                    hex_snippet(&e.bytes),
                    e.kind.clone(),
                ]
            })
            .collect();

        let mut widths = HEADERS.map(str::len);
        for row in &rows {
            for (w, cell) in widths.iter_mut().zip(row.iter()) {
                *w = (*w).max(cell.len());
            }
        }

        let mut out = String::new();
        let rule = |out: &mut String| {
            for w in widths {
                out.push('+');
                out.push_str(&"-".repeat(w + 2));
            }
            out.push_str("+\n");
        };
        let line = |out: &mut String, cells: &[String; 5]| {
            for (w, cell) in widths.iter().zip(cells.iter()) {
                out.push_str("| ");
                out.push_str(cell);
                out.push_str(&" ".repeat(w - cell.len() + 1));
            }
            out.push_str("|\n");
        };

        rule(&mut out);
        line(&mut out, &HEADERS.map(str::to_string));
        rule(&mut out);
        for row in &rows {
            line(&mut out, row);
        }
        rule(&mut out);
        out
    }
}

impl std::fmt::Display for Dump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

/// Hex rendering of a byte snippet, truncated past twelve bytes
fn hex_snippet(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().take(12).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{:02x}", b));
    }
    if bytes.len() > 12 {
        out.push_str(&format!(" ...(+{})", bytes.len() - 12));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_finish_roundtrip() {
        let mut dump = Dump::new();
        let slot = dump.begin(".a".to_string(), "u16 (big-endian)", 0);
        dump.finish(slot, &Value::UInt(1), &[0x00, 0x01]);

        let entry = dump.entry(".a").unwrap();
        assert!(entry.complete);
        assert_eq!(entry.value, "1");
        assert_eq!(entry.bytes, vec![0x00, 0x01]);
    }

    #[test]
    fn test_incomplete_entry_marked() {
        let mut dump = Dump::new();
        dump.begin(".b".to_string(), "u32 (little-endian)", 2);
        let entry = dump.entry(".b").unwrap();
        assert!(!entry.complete);
        assert_eq!(entry.value, "<incomplete>");
    }

    #[test]
    fn test_render_contains_columns() {
        let mut dump = Dump::new();
        let slot = dump.begin(String::new(), "struct Point (big-endian)", 0);
        dump.note(
            ".x".to_string(),
            "u16 (big-endian)",
            0,
            &[0x00, 0x01],
            &Value::UInt(1),
        );
        dump.finish(slot, &Value::UInt(1), &[0x00, 0x01]);

        let table = dump.render();
        assert!(table.contains("Access"));
        assert!(table.contains("(top)"));
        assert!(table.contains(".x"));
        assert!(table.contains("00 01"));
    }

    #[test]
    fn test_hex_snippet_truncates() {
        let bytes: Vec<u8> = (0..20).collect();
        let s = hex_snippet(&bytes);
        assert!(s.contains("...(+8)"));
    }
}
