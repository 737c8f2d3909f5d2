use std::ops::Range;

/// Markers that open a new top-level entry when they start a line.
const ENTRY_MARKERS: [&str; 2] = ["(Bind ", "(Term "];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScanError {
    pub offset: usize,
    pub reason: &'static str,
}

impl ScanError {
    fn new(offset: usize, reason: &'static str) -> Self {
        Self { offset, reason }
    }
}

/// A keyed field (`Cond:`, `dest:`, ...) found at the top depth of a span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Field {
    pub key: &'static str,
    pub value: Range<usize>,
}

#[derive(Debug, Default)]
pub(crate) struct Fields(Vec<Field>);

impl Fields {
    pub fn get(&self, key: &str) -> Option<Range<usize>> {
        self.0.iter().find(|f| f.key == key).map(|f| f.value.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|f| f.key == key)
    }
}

/// Structural scanner over the raw dump.
///
/// All ranges are absolute byte offsets into the source buffer. Only ASCII
/// delimiters are inspected, so every range boundary produced here is a valid
/// UTF-8 char boundary.
pub(crate) struct Scanner<'a> {
    src: &'a str,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src }
    }

    pub fn slice(&self, range: Range<usize>) -> &'a str {
        &self.src[range]
    }

    pub fn byte(&self, pos: usize) -> Option<u8> {
        self.src.as_bytes().get(pos).copied()
    }

    pub fn trim(&self, range: Range<usize>) -> Range<usize> {
        let bytes = self.src.as_bytes();
        let mut start = range.start;
        let mut end = range.end;
        while start < end && bytes[start].is_ascii_whitespace() {
            start += 1;
        }
        while end > start && bytes[end - 1].is_ascii_whitespace() {
            end -= 1;
        }
        start..end
    }

    /// Index of the `)` closing the `(` at `open`.
    pub fn matching_paren(&self, open: usize, end: usize) -> Option<usize> {
        let bytes = self.src.as_bytes();
        let mut depth = 0usize;
        for (i, &b) in bytes.iter().enumerate().take(end).skip(open) {
            match b {
                b'(' => depth += 1,
                b')' => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Like [`Scanner::matching_paren`] but for a top-level entry: a line that
    /// starts another entry while the parentheses are still open ends the
    /// search. `Err` carries the offset where the truncated entry stops.
    pub fn entry_span(&self, open: usize) -> Result<usize, usize> {
        let bytes = self.src.as_bytes();
        let mut depth = 0usize;
        let mut i = open;
        while i < bytes.len() {
            match bytes[i] {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(i);
                    }
                }
                b'\n' => {
                    let rest = self.src[i + 1..].trim_start_matches([' ', '\t', '\r']);
                    if ENTRY_MARKERS.iter().any(|m| rest.starts_with(m)) {
                        return Err(i);
                    }
                }
                _ => {}
            }
            i += 1;
        }
        Err(bytes.len())
    }

    /// Splits `range` at `sep` bytes that sit at parenthesis depth zero
    /// relative to the range itself. Every piece is trimmed and must be
    /// non-empty.
    pub fn split_top_level(
        &self,
        range: Range<usize>,
        sep: u8,
    ) -> Result<Vec<Range<usize>>, ScanError> {
        let bytes = self.src.as_bytes();
        let mut pieces = Vec::new();
        let mut depth = 0usize;
        let mut piece_start = range.start;
        for i in range.clone() {
            match bytes[i] {
                b'(' => depth += 1,
                b')' => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or(ScanError::new(i, "unexpected `)`"))?;
                }
                b if b == sep && depth == 0 => {
                    pieces.push(self.non_empty_piece(piece_start..i)?);
                    piece_start = i + 1;
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err(ScanError::new(range.start, "unbalanced parentheses"));
        }
        if self.trim(range.clone()).is_empty() {
            return Ok(pieces);
        }
        pieces.push(self.non_empty_piece(piece_start..range.end)?);
        Ok(pieces)
    }

    fn non_empty_piece(&self, range: Range<usize>) -> Result<Range<usize>, ScanError> {
        let piece = self.trim(range.clone());
        if piece.is_empty() {
            Err(ScanError::new(range.start, "empty list element"))
        } else {
            Ok(piece)
        }
    }

    /// Reads the leading word of `range` and returns it with the remainder.
    pub fn word(&self, range: Range<usize>) -> (Range<usize>, Range<usize>) {
        let range = self.trim(range);
        let bytes = self.src.as_bytes();
        let mut end = range.start;
        while end < range.end
            && !bytes[end].is_ascii_whitespace()
            && !matches!(bytes[end], b'(' | b')')
        {
            end += 1;
        }
        (range.start..end, end..range.end)
    }

    /// Locates `keys` at depth zero of `range`; each field runs from its key
    /// to the next recognised key (or the end of the range). Sub-fields are
    /// not comma-delimited, so the next key is the only terminator.
    pub fn keyed_fields(
        &self,
        range: Range<usize>,
        keys: &[&'static str],
    ) -> Result<Fields, ScanError> {
        let bytes = self.src.as_bytes();
        let mut starts: Vec<(usize, &'static str)> = Vec::new();
        let mut depth = 0usize;
        let mut i = range.start;
        while i < range.end {
            match bytes[i] {
                b'(' => depth += 1,
                b')' => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or(ScanError::new(i, "unexpected `)`"))?;
                }
                _ if depth == 0 && self.at_word_boundary(range.start, i) => {
                    if let Some(key) = keys
                        .iter()
                        .find(|k| self.src[i..range.end].starts_with(**k))
                    {
                        if starts.iter().any(|(_, k)| k == key) {
                            return Err(ScanError::new(i, "duplicate field"));
                        }
                        starts.push((i, *key));
                        i += key.len();
                        continue;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        if depth != 0 {
            return Err(ScanError::new(range.start, "unbalanced parentheses"));
        }

        let first = starts.first().map_or(range.end, |(pos, _)| *pos);
        if !self.trim(range.start..first).is_empty() {
            return Err(ScanError::new(range.start, "unexpected text before field"));
        }

        let mut fields = Vec::with_capacity(starts.len());
        for (idx, (pos, key)) in starts.iter().enumerate() {
            let value_end = starts.get(idx + 1).map_or(range.end, |(next, _)| *next);
            fields.push(Field {
                key: *key,
                value: self.trim(pos + key.len()..value_end),
            });
        }
        Ok(Fields(fields))
    }

    fn at_word_boundary(&self, start: usize, pos: usize) -> bool {
        pos == start || {
            let prev = self.src.as_bytes()[pos - 1];
            prev.is_ascii_whitespace() || prev == b')'
        }
    }
}
