//! Pairwise textual diff between two file revisions.
//!
//! Myers shortest-edit-script diff, run over lines first and refined at
//! character level inside small replaced regions. The output is a flat run
//! list of `(op, text)` tuples; concatenating the `Equal` and `Delete` runs
//! reproduces the left input, `Equal` and `Insert` the right.
//!
//! Only the return shape is contract — callers render or transport the runs,
//! they never re-derive positions from them.

use std::fmt;

// ---------------------------------------------------------------------------
// DiffOp
// ---------------------------------------------------------------------------

/// The kind of a diff run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiffOp {
    /// Text present in both inputs.
    Equal,
    /// Text present only in the right (newer) input.
    Insert,
    /// Text present only in the left (older) input.
    Delete,
}

impl fmt::Display for DiffOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "equal"),
            Self::Insert => write!(f, "insert"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// A single diff run: the operation and the text it covers.
pub type DiffRun = (DiffOp, String);

/// Replace blocks up to this many characters per side get character-level
/// refinement; larger blocks stay as whole-line runs.
const CHAR_REFINE_LIMIT: usize = 512;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Diff `before` against `after`, returning merged `(op, text)` runs.
#[must_use]
pub fn diff_text(before: &str, after: &str) -> Vec<DiffRun> {
    if before == after {
        if before.is_empty() {
            return Vec::new();
        }
        return vec![(DiffOp::Equal, before.to_owned())];
    }

    let a: Vec<&str> = split_lines(before);
    let b: Vec<&str> = split_lines(after);
    let runs = merge_runs(myers(&a, &b));
    refine_replacements(runs)
}

// ---------------------------------------------------------------------------
// Tokenization
// ---------------------------------------------------------------------------

/// Split into lines, keeping terminators so runs concatenate losslessly.
fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

// ---------------------------------------------------------------------------
// Myers shortest edit script
// ---------------------------------------------------------------------------

/// One op per token of the shortest edit script turning `a` into `b`.
fn myers<T: PartialEq + AsText>(a: &[T], b: &[T]) -> Vec<DiffRun> {
    let n = a.len();
    let m = b.len();
    if n == 0 {
        return b.iter().map(|t| (DiffOp::Insert, t.text().to_owned())).collect();
    }
    if m == 0 {
        return a.iter().map(|t| (DiffOp::Delete, t.text().to_owned())).collect();
    }

    let max = n + m;
    let offset = max as isize;
    // v[k + offset] = furthest x on diagonal k
    let mut v = vec![0usize; 2 * max + 1];
    let mut trace: Vec<Vec<usize>> = Vec::new();

    let mut found_d = max;
    'outer: for d in 0..=max {
        trace.push(v.clone());
        let d_i = d as isize;
        let mut k = -d_i;
        while k <= d_i {
            let idx = (k + offset) as usize;
            let mut x = if k == -d_i || (k != d_i && v[idx - 1] < v[idx + 1]) {
                v[idx + 1]
            } else {
                v[idx - 1] + 1
            };
            let mut y = (x as isize - k) as usize;
            while x < n && y < m && a[x] == b[y] {
                x += 1;
                y += 1;
            }
            v[idx] = x;
            if x >= n && y >= m {
                found_d = d;
                break 'outer;
            }
            k += 2;
        }
    }

    // Backtrack from (n, m) through the recorded V states. Signed
    // coordinates: the final prev_y of the d = 0 round is -1.
    let mut ops: Vec<DiffRun> = Vec::new();
    let mut x = n as isize;
    let mut y = m as isize;
    for d in (0..=found_d).rev() {
        let v = &trace[d];
        let d_i = d as isize;
        let k = x - y;
        let prev_k = if k == -d_i
            || (k != d_i && v[(k - 1 + offset) as usize] < v[(k + 1 + offset) as usize])
        {
            k + 1
        } else {
            k - 1
        };
        let prev_x = v[(prev_k + offset) as usize] as isize;
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            x -= 1;
            y -= 1;
            ops.push((DiffOp::Equal, a[x as usize].text().to_owned()));
        }
        if d > 0 {
            if x == prev_x {
                ops.push((DiffOp::Insert, b[prev_y as usize].text().to_owned()));
            } else {
                ops.push((DiffOp::Delete, a[prev_x as usize].text().to_owned()));
            }
        }
        x = prev_x;
        y = prev_y;
    }
    ops.reverse();
    ops
}

/// Token text extraction, so one Myers works for line and char tokens.
trait AsText {
    fn text(&self) -> &str;
}

impl AsText for &str {
    fn text(&self) -> &str {
        self
    }
}

/// A single character token, carrying its slice of the original string.
#[derive(PartialEq)]
struct CharTok<'a>(&'a str);

impl AsText for CharTok<'_> {
    fn text(&self) -> &str {
        self.0
    }
}

fn char_tokens(s: &str) -> Vec<CharTok<'_>> {
    let mut toks = Vec::with_capacity(s.len());
    let mut iter = s.char_indices().peekable();
    while let Some((start, _)) = iter.next() {
        let end = iter.peek().map_or(s.len(), |&(i, _)| i);
        toks.push(CharTok(&s[start..end]));
    }
    toks
}

// ---------------------------------------------------------------------------
// Run merging and refinement
// ---------------------------------------------------------------------------

/// Merge adjacent runs with the same op into one.
fn merge_runs(ops: Vec<DiffRun>) -> Vec<DiffRun> {
    let mut merged: Vec<DiffRun> = Vec::new();
    for (op, text) in ops {
        match merged.last_mut() {
            Some((last_op, last_text)) if *last_op == op => last_text.push_str(&text),
            _ => merged.push((op, text)),
        }
    }
    merged
}

/// Re-diff small Delete+Insert pairs at character level.
///
/// A replaced region shows up as a Delete run directly followed by an
/// Insert run. When both sides are small the character-level script reads
/// far better than two whole-line blocks.
fn refine_replacements(runs: Vec<DiffRun>) -> Vec<DiffRun> {
    let mut out: Vec<DiffRun> = Vec::new();
    let mut iter = runs.into_iter().peekable();
    while let Some(run) = iter.next() {
        let refinable = run.0 == DiffOp::Delete
            && run.1.len() <= CHAR_REFINE_LIMIT
            && iter
                .peek()
                .is_some_and(|next| next.0 == DiffOp::Insert && next.1.len() <= CHAR_REFINE_LIMIT);
        if refinable {
            // Guarded by the peek above.
            let Some((_, inserted)) = iter.next() else {
                out.push(run);
                continue;
            };
            let refined = merge_runs(myers(&char_tokens(&run.1), &char_tokens(&inserted)));
            out.extend(refined);
        } else {
            out.push(run);
        }
    }
    merge_runs(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Rebuild both sides from the runs; they must match the inputs exactly.
    fn assert_lossless(before: &str, after: &str, runs: &[DiffRun]) {
        let mut left = String::new();
        let mut right = String::new();
        for (op, text) in runs {
            match op {
                DiffOp::Equal => {
                    left.push_str(text);
                    right.push_str(text);
                }
                DiffOp::Delete => left.push_str(text),
                DiffOp::Insert => right.push_str(text),
            }
        }
        assert_eq!(left, before, "runs must reproduce the left input");
        assert_eq!(right, after, "runs must reproduce the right input");
    }

    #[test]
    fn identical_inputs_one_equal_run() {
        let runs = diff_text("a\nb\n", "a\nb\n");
        assert_eq!(runs, vec![(DiffOp::Equal, "a\nb\n".to_owned())]);
    }

    #[test]
    fn empty_inputs() {
        assert!(diff_text("", "").is_empty());
        assert_eq!(diff_text("", "x"), vec![(DiffOp::Insert, "x".to_owned())]);
        assert_eq!(diff_text("x", ""), vec![(DiffOp::Delete, "x".to_owned())]);
    }

    #[test]
    fn pure_insertion() {
        let runs = diff_text("a\nc\n", "a\nb\nc\n");
        assert_lossless("a\nc\n", "a\nb\nc\n", &runs);
        assert!(runs.contains(&(DiffOp::Insert, "b\n".to_owned())), "runs: {runs:?}");
    }

    #[test]
    fn pure_deletion() {
        let runs = diff_text("a\nb\nc\n", "a\nc\n");
        assert_lossless("a\nb\nc\n", "a\nc\n", &runs);
        assert!(runs.contains(&(DiffOp::Delete, "b\n".to_owned())), "runs: {runs:?}");
    }

    #[test]
    fn replacement_refines_to_characters() {
        let runs = diff_text("hello world\n", "hello there\n");
        assert_lossless("hello world\n", "hello there\n", &runs);
        // The common "hello " prefix must survive as an Equal run after
        // character refinement, not be swallowed by a whole-line replace.
        assert!(
            runs.iter()
                .any(|(op, text)| *op == DiffOp::Equal && text.starts_with("hello ")),
            "runs: {runs:?}"
        );
    }

    #[test]
    fn large_replacement_stays_line_level() {
        let before = "x\n".repeat(600);
        let after = "y\n".repeat(600);
        let runs = diff_text(&before, &after);
        assert_lossless(&before, &after, &runs);
        assert_eq!(runs.len(), 2);
    }

    #[test]
    fn multiline_mixed_edit() {
        let before = "one\ntwo\nthree\nfour\n";
        let after = "one\n2\nthree\nfive\n";
        let runs = diff_text(before, after);
        assert_lossless(before, after, &runs);
    }

    #[test]
    fn no_trailing_newline() {
        let runs = diff_text("a\nb", "a\nc");
        assert_lossless("a\nb", "a\nc", &runs);
    }

    #[test]
    fn unicode_refinement_respects_char_boundaries() {
        let runs = diff_text("naïve\n", "naive\n");
        assert_lossless("naïve\n", "naive\n", &runs);
    }
}
