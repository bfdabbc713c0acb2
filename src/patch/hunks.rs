//! Computing hunks between two texts and placing them onto a third.
//!
//! Placement follows the classic `patch` rules:
//! - a hunk is first tried where its header says, shifted by however far
//!   earlier hunks in the same file landed from their recorded positions;
//! - with a nonzero offset budget, positions are searched outward from there,
//!   nearest first, trying the later position before the earlier one at each
//!   distance;
//! - with a nonzero fuzz budget, if no position matches, up to `fuzz` context
//!   lines are dropped from each end of the hunk and the search repeats.
//!
//! Hunks never overlap: each one must start at or after the end of the
//! previous placed hunk.

use similar::{Algorithm, DiffTag};

use super::format::{Hunk, HunkLine, Line, LineKind};

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// Hunks turning `old` into `new`, with `context` lines of context around
/// each change. Equal inputs produce no hunks.
#[must_use]
pub fn diff_lines(old: &[Line], new: &[Line], context: usize) -> Vec<Hunk> {
    let ops = similar::capture_diff_slices(Algorithm::Myers, old, new);
    similar::group_diff_ops(ops, context)
        .into_iter()
        .filter_map(|group| {
            let first = group.first()?;
            let last = group.last()?;
            let old_range = first.old_range().start..last.old_range().end;
            let new_range = first.new_range().start..last.new_range().end;

            let mut lines = Vec::new();
            for op in &group {
                let (tag, o, n) = op.as_tag_tuple();
                match tag {
                    DiffTag::Equal => lines.extend(old[o].iter().map(|l| hunk_line(LineKind::Context, l))),
                    DiffTag::Delete => lines.extend(old[o].iter().map(|l| hunk_line(LineKind::Remove, l))),
                    DiffTag::Insert => lines.extend(new[n].iter().map(|l| hunk_line(LineKind::Add, l))),
                    DiffTag::Replace => {
                        lines.extend(old[o].iter().map(|l| hunk_line(LineKind::Remove, l)));
                        lines.extend(new[n].iter().map(|l| hunk_line(LineKind::Add, l)));
                    }
                }
            }
            Some(Hunk {
                old_start: header_start(old_range.start, old_range.len()),
                old_len: old_range.len(),
                new_start: header_start(new_range.start, new_range.len()),
                new_len: new_range.len(),
                lines,
            })
        })
        .collect()
}

fn hunk_line(kind: LineKind, line: &Line) -> HunkLine {
    HunkLine {
        kind,
        line: line.clone(),
    }
}

const fn header_start(index: usize, len: usize) -> usize {
    if len == 0 { index } else { index + 1 }
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// How far a hunk may stray from its recorded position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tolerance {
    /// Largest line offset to search.
    pub max_offset: usize,
    /// Most context lines dropped from each end.
    pub max_fuzz: usize,
}

impl Tolerance {
    /// Hunks must match exactly where recorded.
    pub const EXACT: Self = Self {
        max_offset: 0,
        max_fuzz: 0,
    };
}

/// Result of applying a file's hunks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Applied {
    pub lines: Vec<Line>,
    /// Hunks that found no position, in their original order.
    pub rejected: Vec<Hunk>,
    /// Hunks placed away from their recorded line or with context dropped.
    pub adjusted: usize,
}

struct Placement {
    at: usize,
    front: usize,
    back: usize,
}

/// Apply `hunks` (sorted by position) to `original`. Placed hunks take
/// effect even when others are rejected.
#[must_use]
pub fn apply_hunks(original: &[Line], hunks: &[Hunk], tolerance: Tolerance) -> Applied {
    let mut out = Vec::with_capacity(original.len());
    let mut rejected = Vec::new();
    let mut adjusted = 0;
    let mut cursor = 0;
    let mut drift: isize = 0;

    for hunk in hunks {
        let Some(p) = locate(original, cursor, drift, hunk, tolerance) else {
            rejected.push(hunk.clone());
            continue;
        };
        if p.front > 0 || p.back > 0 || p.at != hunk.old_index() {
            adjusted += 1;
        }

        out.extend_from_slice(&original[cursor..p.at]);
        let mut pos = p.at;
        let end = hunk.lines.len() - p.back;
        for hl in &hunk.lines[p.front..end] {
            match hl.kind {
                LineKind::Context => {
                    out.push(original[pos].clone());
                    pos += 1;
                }
                LineKind::Remove => pos += 1,
                LineKind::Add => out.push(hl.line.clone()),
            }
        }
        cursor = pos;
        drift = offset(p.at, hunk.old_index() + p.front);
    }

    out.extend_from_slice(&original[cursor..]);
    Applied {
        lines: out,
        rejected,
        adjusted,
    }
}

#[allow(clippy::cast_possible_wrap)]
const fn offset(actual: usize, expected: usize) -> isize {
    actual as isize - expected as isize
}

fn locate(original: &[Line], cursor: usize, drift: isize, hunk: &Hunk, tolerance: Tolerance) -> Option<Placement> {
    let leading = hunk
        .lines
        .iter()
        .take_while(|l| l.kind == LineKind::Context)
        .count();
    let trailing = hunk
        .lines
        .iter()
        .rev()
        .take_while(|l| l.kind == LineKind::Context)
        .count();
    let has_old_side = hunk.old_side().next().is_some();

    for fuzz in 0..=tolerance.max_fuzz {
        let front = fuzz.min(leading);
        let back = fuzz.min(trailing).min(hunk.lines.len() - front);
        if fuzz > 0 && front == 0 && back == 0 {
            break;
        }
        let trimmed = &hunk.lines[front..hunk.lines.len() - back];
        let pattern: Vec<&Line> = trimmed
            .iter()
            .filter(|l| l.kind != LineKind::Add)
            .map(|l| &l.line)
            .collect();
        // Dropping all context would let the hunk land anywhere.
        if has_old_side && pattern.is_empty() {
            break;
        }

        let expected = hunk.old_index() + front;
        let Some(want) = expected.checked_add_signed(drift) else {
            continue;
        };
        if let Some(at) = search(original, cursor, want, &pattern, tolerance.max_offset) {
            return Some(Placement { at, front, back });
        }
    }
    None
}

fn search(original: &[Line], cursor: usize, want: usize, pattern: &[&Line], max_offset: usize) -> Option<usize> {
    let fits = |at: usize| {
        at >= cursor
            && at + pattern.len() <= original.len()
            && pattern.iter().zip(&original[at..]).all(|(p, o)| *p == o)
    };
    for distance in 0..=max_offset {
        let later = want + distance;
        if fits(later) {
            return Some(later);
        }
        if distance > 0
            && let Some(earlier) = want.checked_sub(distance)
            && fits(earlier)
        {
            return Some(earlier);
        }
        if later > original.len() && want.saturating_sub(distance) <= cursor {
            break;
        }
    }
    None
}
