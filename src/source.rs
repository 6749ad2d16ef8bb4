use crate::token::Span;

/// All the source files of a compilation unit, laid out back to back in a
/// single buffer. A [`Span`] indexes into this buffer directly.
#[derive(Debug, Default)]
pub struct SourceMap {
    text: String,
    files: Vec<SourceFile>,
}

#[derive(Debug)]
struct SourceFile {
    name: Box<str>,
    lo: usize,
    hi: usize,
}

/// A resolved position; both `row` and `column` are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location<'a> {
    pub file: &'a str,
    pub row: usize,
    pub column: usize,
}

impl SourceMap {
    /// Appends a file, returning its base offset.
    pub fn add(&mut self, name: &str, contents: &str) -> usize {
        let lo = self.text.len();
        self.text.push_str(contents);
        let hi = self.text.len();
        self.files.push(SourceFile {
            name: name.into(),
            lo,
            hi,
        });
        lo
    }

    /// The concatenated text of every file.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn file_text(&self, index: usize) -> &str {
        let file = &self.files[index];
        &self.text[file.lo..file.hi]
    }

    pub fn file_base(&self, index: usize) -> usize {
        self.files[index].lo
    }

    /// A span of length zero at the very end of the input.
    pub fn eof_span(&self) -> Span {
        Span::new_of_length(self.text.len(), 0)
    }

    fn file_of(&self, offset: usize) -> Option<&SourceFile> {
        self.files
            .iter()
            .find(|file| offset >= file.lo && offset < file.hi)
            .or_else(|| self.files.last())
    }

    /// Computes the row and column of the span start by scanning the owning
    /// file for line breaks.
    pub fn locate(&self, span: Span) -> Location<'_> {
        let Some(file) = self.file_of(span.lo) else {
            return Location {
                file: "<unknown>",
                row: 1,
                column: 1,
            };
        };
        let offset = span.lo.clamp(file.lo, file.hi);
        let before = &self.text[file.lo..offset];
        let row = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count() + 1;
        Location {
            file: &file.name,
            row,
            column,
        }
    }

    /// Returns the full text of the line `span` starts in, without the line
    /// terminator.
    pub fn line_of(&self, span: Span) -> &str {
        let Some(file) = self.file_of(span.lo) else {
            return "";
        };
        let contents = &self.text[file.lo..file.hi];
        let offset = span.lo.clamp(file.lo, file.hi) - file.lo;
        let start = contents[..offset].rfind('\n').map_or(0, |i| i + 1);
        let end = contents[offset..]
            .find('\n')
            .map_or(contents.len(), |i| offset + i);
        contents[start..end].trim_end_matches('\r')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn locate_across_files() {
        let mut map = SourceMap::default();
        map.add("prelude.acorn", "fn a() -> void\n");
        let base = map.add("main.acorn", "fn b() -> void {\n    return\n}\n");

        let at = |lo: usize| map.locate(Span::new_of_length(lo, 1));
        assert_eq!(
            at(3),
            Location {
                file: "prelude.acorn",
                row: 1,
                column: 4
            }
        );
        assert_eq!(
            at(base + 21),
            Location {
                file: "main.acorn",
                row: 2,
                column: 5
            }
        );
        assert_eq!(map.line_of(Span::new_of_length(base + 21, 6)), "    return");
    }

    #[test]
    fn eof_is_located_in_last_file() {
        let mut map = SourceMap::default();
        map.add("a.acorn", "x\ny");
        let location = map.locate(map.eof_span());
        assert_eq!((location.file, location.row, location.column), ("a.acorn", 2, 2));
    }
}
