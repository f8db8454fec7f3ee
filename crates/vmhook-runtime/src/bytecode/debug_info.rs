//! Per-procedure line program
//!
//! Maps instruction offsets to `(file, line)` pairs. Entries are kept sorted
//! by start offset; an offset resolves to the last entry starting at or
//! before it.

use std::fmt;
use std::rc::Rc;
use vmhook_config::FilenameMatch;

/// Shared filename handle
///
/// Hosts that intern filenames hand out clones of a single handle per file,
/// so identity comparison is enough. Hosts that do not intern need the
/// content tier (see [`FilenameMatch`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileName(Rc<str>);

impl FileName {
    pub fn new(name: &str) -> Self {
        Self(Rc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when both handles point at the same allocation
    pub fn same_handle(&self, other: &FileName) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Compare handles first, then text unless `mode` is identity-only
    pub fn matches(&self, other: &FileName, mode: FilenameMatch) -> bool {
        if self.same_handle(other) {
            return true;
        }
        match mode {
            FilenameMatch::Identity => false,
            FilenameMatch::Content => self.0 == other.0,
        }
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolved source position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: FileName,
    /// 1-based line number
    pub line: u32,
}

impl SourceLocation {
    pub fn new(file: FileName, line: u32) -> Self {
        Self { file, line }
    }

    /// Same line in the same file under the given filename comparison
    pub fn matches(&self, other: &SourceLocation, mode: FilenameMatch) -> bool {
        self.line == other.line && self.file.matches(&other.file, mode)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One line-program row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEntry {
    /// First instruction offset covered by this row
    pub start: usize,
    /// `None` when the compiler recorded no filename
    pub file: Option<FileName>,
    /// 0 means no line information
    pub line: u32,
}

/// Offset-to-location table for one procedure
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugInfo {
    entries: Vec<LineEntry>,
}

impl DebugInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row, keeping rows sorted by start offset. A row with the same
    /// start as an existing one replaces it.
    pub fn add(&mut self, start: usize, file: Option<FileName>, line: u32) {
        let pos = self.entries.partition_point(|e| e.start < start);
        let entry = LineEntry { start, file, line };
        match self.entries.get_mut(pos) {
            Some(existing) if existing.start == start => *existing = entry,
            _ => self.entries.insert(pos, entry),
        }
    }

    pub fn entries(&self) -> &[LineEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Filename and line for `offset`, or `None` if either is unknown
    pub fn resolve(&self, offset: usize) -> Option<SourceLocation> {
        let idx = self.entries.partition_point(|e| e.start <= offset);
        let entry = self.entries.get(idx.checked_sub(1)?)?;
        if entry.line == 0 {
            return None;
        }
        let file = entry.file.clone()?;
        Some(SourceLocation::new(file, entry.line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> DebugInfo {
        let file = FileName::new("app.rb");
        let mut info = DebugInfo::new();
        info.add(0, Some(file.clone()), 1);
        info.add(3, Some(file.clone()), 2);
        info.add(6, Some(file), 0);
        info.add(8, None, 9);
        info
    }

    #[test]
    fn test_resolve_uses_last_row_at_or_before() {
        let info = table();
        assert_eq!(info.resolve(0).map(|l| l.line), Some(1));
        assert_eq!(info.resolve(2).map(|l| l.line), Some(1));
        assert_eq!(info.resolve(3).map(|l| l.line), Some(2));
        assert_eq!(info.resolve(5).map(|l| l.line), Some(2));
    }

    #[test]
    fn test_line_zero_is_unknown() {
        assert_eq!(table().resolve(7), None);
    }

    #[test]
    fn test_missing_file_is_unknown() {
        assert_eq!(table().resolve(8), None);
    }

    #[test]
    fn test_before_first_row_is_unknown() {
        let mut info = DebugInfo::new();
        info.add(4, Some(FileName::new("a.rb")), 3);
        assert_eq!(info.resolve(0), None);
        assert_eq!(DebugInfo::new().resolve(0), None);
    }

    #[test]
    fn test_out_of_order_rows_are_sorted() {
        let file = FileName::new("a.rb");
        let mut info = DebugInfo::new();
        info.add(5, Some(file.clone()), 7);
        info.add(0, Some(file.clone()), 6);
        info.add(5, Some(file), 8);
        let starts: Vec<usize> = info.entries().iter().map(|e| e.start).collect();
        assert_eq!(starts, vec![0, 5]);
        assert_eq!(info.resolve(5).map(|l| l.line), Some(8));
    }

    #[test]
    fn test_filename_tiers() {
        let a = FileName::new("main.rb");
        let b = FileName::new("main.rb");
        assert!(a.matches(&a.clone(), FilenameMatch::Identity));
        assert!(!a.matches(&b, FilenameMatch::Identity));
        assert!(a.matches(&b, FilenameMatch::Content));
        assert!(!a.matches(&FileName::new("other.rb"), FilenameMatch::Content));
    }

    #[test]
    fn test_location_display() {
        let loc = SourceLocation::new(FileName::new("lib/x.rb"), 12);
        assert_eq!(loc.to_string(), "lib/x.rb:12");
    }
}
