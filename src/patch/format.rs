//! The patch file format.
//!
//! One patch describes one file:
//!
//! ```text
//! --- a/src/Main.java          (/dev/null when the file is added)
//! +++ b/src/Main.java          (/dev/null when the file is deleted)
//! @@ -12,4 +12,5 @@
//!  context
//! -removed
//! +added
//! \ No newline at end of file
//! ```
//!
//! Paths holding a quote, a backslash or a control character (a tab would
//! otherwise read as the start of a timestamp) are written C-quoted, as git
//! does: `--- "a/odd\tname.txt"`.
//!
//! Structure lines always end in `\n`. Content lines keep their bytes,
//! including a trailing `\r`, so CRLF files survive a round trip. A line
//! without a final newline is followed by the `\ No newline at end of file`
//! marker.
//!
//! Files that are not valid UTF-8 are stored whole as a binary literal: the
//! same two header lines, then `GIT binary literal <len>` and the new
//! content in hex, 32 bytes per line.

use std::fmt::Write as _;

pub const DEV_NULL: &str = "/dev/null";
pub const NO_NEWLINE: &str = "\\ No newline at end of file";
const BINARY_PREFIX: &str = "GIT binary literal ";
const HEX_CHUNK: usize = 32;

// ---------------------------------------------------------------------------
// Lines
// ---------------------------------------------------------------------------

/// One line of a text file. `text` excludes the `\n`; `newline` records
/// whether the `\n` was there (only the last line of a file can lack it).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Line {
    pub text: String,
    pub newline: bool,
}

impl Line {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            newline: true,
        }
    }
}

/// Split file content into lines. Empty content has no lines.
#[must_use]
pub fn split_lines(content: &str) -> Vec<Line> {
    content
        .split_inclusive('\n')
        .map(|chunk| match chunk.strip_suffix('\n') {
            Some(text) => Line {
                text: text.to_owned(),
                newline: true,
            },
            None => Line {
                text: chunk.to_owned(),
                newline: false,
            },
        })
        .collect()
}

/// Inverse of [`split_lines`].
#[must_use]
pub fn join_lines(lines: &[Line]) -> String {
    let mut out = String::with_capacity(lines.iter().map(|l| l.text.len() + 1).sum());
    for line in lines {
        out.push_str(&line.text);
        if line.newline {
            out.push('\n');
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Patch model
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchKind {
    Add,
    Delete,
    Modify,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind {
    Context,
    Remove,
    Add,
}

impl LineKind {
    const fn prefix(self) -> char {
        match self {
            Self::Context => ' ',
            Self::Remove => '-',
            Self::Add => '+',
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HunkLine {
    pub kind: LineKind,
    pub line: Line,
}

/// A contiguous change. Starts are 1-based; a zero-length range's start is
/// the number of the line before it (0 at the top of the file).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_len: usize,
    pub new_start: usize,
    pub new_len: usize,
    pub lines: Vec<HunkLine>,
}

impl Hunk {
    /// Lines the hunk expects to find (context and removals).
    pub fn old_side(&self) -> impl Iterator<Item = &Line> {
        self.lines
            .iter()
            .filter(|l| l.kind != LineKind::Add)
            .map(|l| &l.line)
    }

    /// Lines the hunk leaves behind (context and additions).
    pub fn new_side(&self) -> impl Iterator<Item = &Line> {
        self.lines
            .iter()
            .filter(|l| l.kind != LineKind::Remove)
            .map(|l| &l.line)
    }

    /// 0-based index in the old file where the hunk's first old-side line
    /// sits.
    #[must_use]
    pub const fn old_index(&self) -> usize {
        if self.old_len == 0 {
            self.old_start
        } else {
            self.old_start.saturating_sub(1)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatchBody {
    Text(Vec<Hunk>),
    /// Full new content (empty for a delete).
    Binary(Vec<u8>),
}

/// Everything needed to turn one old file into one new file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilePatch {
    /// Slash-separated path relative to the tree root.
    pub path: String,
    pub kind: PatchKind,
    pub body: PatchBody,
}

impl FilePatch {
    /// Number of hunks, counting a binary body as one.
    #[must_use]
    pub fn hunk_count(&self) -> usize {
        match &self.body {
            PatchBody::Text(hunks) => hunks.len(),
            PatchBody::Binary(_) => 1,
        }
    }

    /// Same header, different hunks. Used for reject files.
    #[must_use]
    pub fn with_hunks(&self, hunks: Vec<Hunk>) -> Self {
        Self {
            path: self.path.clone(),
            kind: self.kind,
            body: PatchBody::Text(hunks),
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Serialize a patch.
#[must_use]
pub fn render(patch: &FilePatch) -> String {
    let mut out = String::new();
    let old = match patch.kind {
        PatchKind::Add => DEV_NULL.to_owned(),
        _ => header_name("a/", &patch.path),
    };
    let new = match patch.kind {
        PatchKind::Delete => DEV_NULL.to_owned(),
        _ => header_name("b/", &patch.path),
    };
    let _ = writeln!(out, "--- {old}");
    let _ = writeln!(out, "+++ {new}");

    match &patch.body {
        PatchBody::Text(hunks) => {
            for hunk in hunks {
                let _ = writeln!(
                    out,
                    "@@ -{},{} +{},{} @@",
                    hunk.old_start, hunk.old_len, hunk.new_start, hunk.new_len
                );
                for l in &hunk.lines {
                    out.push(l.kind.prefix());
                    out.push_str(&l.line.text);
                    out.push('\n');
                    if !l.line.newline {
                        out.push_str(NO_NEWLINE);
                        out.push('\n');
                    }
                }
            }
        }
        PatchBody::Binary(data) => {
            let _ = writeln!(out, "{BINARY_PREFIX}{}", data.len());
            for chunk in data.chunks(HEX_CHUNK) {
                out.push_str(&hex::encode(chunk));
                out.push('\n');
            }
        }
    }
    out
}

const fn needs_quoting(c: char) -> bool {
    c == '"' || c == '\\' || c.is_ascii_control()
}

fn header_name(side: &str, path: &str) -> String {
    let full = format!("{side}{path}");
    if !full.chars().any(needs_quoting) {
        return full;
    }
    let mut out = String::with_capacity(full.len() + 2);
    out.push('"');
    for c in full.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c if c.is_ascii_control() => {
                let _ = write!(out, "\\{:03o}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Decode a C-quoted header path. Octal escapes are raw bytes, so git's
/// escaped UTF-8 decodes too. Anything after the closing quote is dropped.
fn unquote(value: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(value.len());
    let mut chars = value.strip_prefix('"')?.chars();
    loop {
        match chars.next()? {
            '"' => break,
            '\\' => {
                let c = chars.next()?;
                let byte = match c {
                    't' => b'\t',
                    'n' => b'\n',
                    'r' => b'\r',
                    '"' => b'"',
                    '\\' => b'\\',
                    'a' => 0x07,
                    'b' => 0x08,
                    'f' => 0x0c,
                    'v' => 0x0b,
                    '0'..='3' => {
                        let mut n = c.to_digit(8)?;
                        for _ in 0..2 {
                            n = n * 8 + chars.next()?.to_digit(8)?;
                        }
                        u8::try_from(n).ok()?
                    }
                    _ => return None,
                };
                bytes.push(byte);
            }
            c => bytes.extend_from_slice(c.encode_utf8(&mut [0; 4]).as_bytes()),
        }
    }
    String::from_utf8(bytes).ok()
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// A patch file that does not follow the format.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// 1-based line in the patch file.
    pub line: usize,
    pub message: String,
}

fn err(line: usize, message: impl Into<String>) -> ParseError {
    ParseError {
        line,
        message: message.into(),
    }
}

/// Parse one patch file.
///
/// # Errors
/// Returns [`ParseError`] for malformed headers or hunks, and for paths that
/// are absolute or contain `.`/`..` segments.
pub fn parse(input: &str) -> Result<FilePatch, ParseError> {
    let mut lines: Vec<&str> = input.split('\n').collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }

    let old = header_path(lines.first().copied(), "--- ", 1)?;
    let new = header_path(lines.get(1).copied(), "+++ ", 2)?;
    let (kind, path) = match (old.as_deref(), new.as_deref()) {
        (None, None) => return Err(err(2, "both sides are /dev/null")),
        (None, Some(p)) => (PatchKind::Add, strip_side(p, "b/")),
        (Some(p), None) => (PatchKind::Delete, strip_side(p, "a/")),
        (Some(_), Some(p)) => (PatchKind::Modify, strip_side(p, "b/")),
    };
    check_path(path)?;

    let rest = &lines[2..];
    let body = match rest.first() {
        Some(first) if first.starts_with(BINARY_PREFIX) => {
            PatchBody::Binary(parse_binary(first, &rest[1..])?)
        }
        _ => PatchBody::Text(parse_hunks(rest)?),
    };
    Ok(FilePatch {
        path: path.to_owned(),
        kind,
        body,
    })
}

fn header_path(line: Option<&str>, prefix: &str, no: usize) -> Result<Option<String>, ParseError> {
    let line = line.ok_or_else(|| err(no, format!("missing '{}' header", prefix.trim_end())))?;
    let value = line
        .strip_prefix(prefix)
        .ok_or_else(|| err(no, format!("expected '{}' header", prefix.trim_end())))?
        .trim_end_matches('\r');
    if value.starts_with('"') {
        return unquote(value)
            .map(Some)
            .ok_or_else(|| err(no, "malformed quoted path"));
    }
    // Tools append a tab-separated timestamp.
    let value = value.split('\t').next().unwrap_or_default();
    Ok((value != DEV_NULL).then(|| value.to_owned()))
}

fn strip_side<'a>(path: &'a str, side: &str) -> &'a str {
    path.strip_prefix(side).unwrap_or(path)
}

fn check_path(path: &str) -> Result<(), ParseError> {
    if path.is_empty()
        || path.starts_with('/')
        || path
            .split('/')
            .any(|s| s.is_empty() || s == "." || s == "..")
    {
        return Err(err(2, format!("unsafe path '{path}'")));
    }
    Ok(())
}

fn parse_binary(header: &str, rest: &[&str]) -> Result<Vec<u8>, ParseError> {
    let len: usize = header[BINARY_PREFIX.len()..]
        .trim()
        .parse()
        .map_err(|_| err(3, "invalid binary literal length"))?;
    let mut data = Vec::with_capacity(len);
    for (i, line) in rest.iter().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let chunk = hex::decode(line).map_err(|e| err(i + 4, format!("invalid hex: {e}")))?;
        data.extend_from_slice(&chunk);
    }
    if data.len() != len {
        return Err(err(
            3,
            format!("binary literal declares {len} bytes, found {}", data.len()),
        ));
    }
    Ok(data)
}

fn parse_hunks(lines: &[&str]) -> Result<Vec<Hunk>, ParseError> {
    let mut hunks = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let no = i + 3;
        let header = lines[i];
        if header.is_empty() {
            i += 1;
            continue;
        }
        let (old_start, old_len, new_start, new_len) =
            parse_hunk_header(header).ok_or_else(|| err(no, format!("expected hunk header, found '{header}'")))?;
        i += 1;

        let mut body = Vec::new();
        let (mut old_seen, mut new_seen) = (0, 0);
        while old_seen < old_len || new_seen < new_len {
            let Some(raw) = lines.get(i) else {
                return Err(err(i + 3, "hunk ends early"));
            };
            let (kind, text) = match raw.chars().next() {
                Some(' ') => (LineKind::Context, &raw[1..]),
                Some('-') => (LineKind::Remove, &raw[1..]),
                Some('+') => (LineKind::Add, &raw[1..]),
                // Editors strip the trailing space of an empty context line.
                None => (LineKind::Context, ""),
                Some(_) => return Err(err(i + 3, format!("unexpected line '{raw}' in hunk"))),
            };
            match kind {
                LineKind::Context => {
                    old_seen += 1;
                    new_seen += 1;
                }
                LineKind::Remove => old_seen += 1,
                LineKind::Add => new_seen += 1,
            }
            if old_seen > old_len || new_seen > new_len {
                return Err(err(i + 3, "hunk is longer than its header says"));
            }
            body.push(HunkLine {
                kind,
                line: Line::new(text),
            });
            i += 1;
            if lines.get(i).is_some_and(|l| l.starts_with('\\')) {
                if let Some(last) = body.last_mut() {
                    last.line.newline = false;
                }
                i += 1;
            }
        }
        hunks.push(Hunk {
            old_start,
            old_len,
            new_start,
            new_len,
            lines: body,
        });
    }
    Ok(hunks)
}

/// `@@ -a[,b] +c[,d] @@[ section]`
fn parse_hunk_header(line: &str) -> Option<(usize, usize, usize, usize)> {
    let rest = line.strip_prefix("@@ -")?;
    let end = rest.find(" @@")?;
    let (old, new) = rest[..end].split_once(" +")?;
    let (old_start, old_len) = parse_range(old)?;
    let (new_start, new_len) = parse_range(new)?;
    Some((old_start, old_len, new_start, new_len))
}

fn parse_range(range: &str) -> Option<(usize, usize)> {
    match range.split_once(',') {
        Some((start, len)) => Some((start.parse().ok()?, len.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}
