//! State representation and the diff engine (Ratcliff/Obershelp-style LCS
//! opcodes, matching Python `difflib.SequenceMatcher.get_opcodes()`
//! semantics without the `autojunk` popularity heuristic).
//!
//! Diffs are intentionally redundant: every opcode carries both the index
//! range it covers and the literal text involved, so a receiver can apply a
//! diff without looking anything up in the state it's applied to, other
//! than `equal` ranges (which must be sliced out of the base string).

use std::collections::HashMap;
use std::time::Instant;

use crate::core::error::DiffError;

/// A single state value plus its protocol-assigned number.
#[derive(Debug, Clone)]
pub struct State {
    /// The string content of this state.
    pub string: String,
    /// The monotonically increasing number assigned to this state.
    pub num: u64,
    /// When this state was first sent, used by the sender for the
    /// reference-state staleness window. `None` for states that were never
    /// sent locally (e.g. a receiver's applied states, or the implicit
    /// initial state 0).
    pub time_sent: Option<Instant>,
}

impl State {
    /// The implicit initial state every endpoint starts with: the empty
    /// string at state number 0.
    pub fn initial() -> Self {
        Self {
            string: String::new(),
            num: 0,
            time_sent: None,
        }
    }
}

/// One diff opcode. Indices address Unicode scalar values (`char`
/// positions), matching Python `str` slicing semantics in the reference
/// implementation this protocol is modeled on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opcode {
    /// `a[i1..i2]` equals `b[j1..j2]`; copy it from the base state verbatim.
    Equal { i1: usize, i2: usize, j1: usize, j2: usize },
    /// `a[i1..i2]` was removed.
    Delete { i1: usize, i2: usize, text: String },
    /// `text` was inserted at `b[j1..j2]`.
    Insert { j1: usize, j2: usize, text: String },
    /// `a[i1..i2]` was replaced by `new_text` (`b[j1..j2]`).
    Replace {
        i1: usize,
        i2: usize,
        j1: usize,
        j2: usize,
        old_text: String,
        new_text: String,
    },
}

/// Compute the opcode sequence that transforms `a` into `b`.
pub fn generate_patch(a: &str, b: &str) -> Vec<Opcode> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    get_opcodes(&a, &b)
}

/// Reconstruct the result of applying `diff` to `base`.
pub fn apply(diff: &[Opcode], base: &str) -> Result<String, DiffError> {
    let base: Vec<char> = base.chars().collect();
    let mut out = String::new();
    for op in diff {
        match *op {
            Opcode::Equal { i1, i2, .. } => {
                let slice = slice_chars(&base, i1, i2)?;
                out.extend(slice);
            }
            Opcode::Delete { i1, i2, .. } => {
                // Nothing emitted; just validate the range makes sense.
                slice_chars(&base, i1, i2)?;
            }
            Opcode::Insert { ref text, .. } => {
                out.push_str(text);
            }
            Opcode::Replace {
                i1, i2, ref new_text, ..
            } => {
                slice_chars(&base, i1, i2)?;
                out.push_str(new_text);
            }
        }
    }
    Ok(out)
}

fn slice_chars(chars: &[char], i1: usize, i2: usize) -> Result<&[char], DiffError> {
    if i1 > i2 || i2 > chars.len() {
        return Err(DiffError::MalformedDiff(format!(
            "inconsistent indices {i1}..{i2} for a state of length {}",
            chars.len()
        )));
    }
    Ok(&chars[i1..i2])
}

// --- Ratcliff/Obershelp longest-match + opcode derivation -----------------

fn build_b2j(b: &[char]) -> HashMap<char, Vec<usize>> {
    let mut map: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, &c) in b.iter().enumerate() {
        map.entry(c).or_default().push(j);
    }
    map
}

fn find_longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
    b2j: &HashMap<char, Vec<usize>>,
) -> (usize, usize, usize) {
    let (mut besti, mut bestj, mut bestsize) = (alo, blo, 0usize);
    let mut j2len: HashMap<usize, usize> = HashMap::new();
    for i in alo..ahi {
        let mut newj2len: HashMap<usize, usize> = HashMap::new();
        if let Some(js) = b2j.get(&a[i]) {
            for &j in js {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let prev = j.checked_sub(1).and_then(|jm1| j2len.get(&jm1).copied()).unwrap_or(0);
                let k = prev + 1;
                newj2len.insert(j, k);
                if k > bestsize {
                    besti = i + 1 - k;
                    bestj = j + 1 - k;
                    bestsize = k;
                }
            }
        }
        j2len = newj2len;
    }
    (besti, bestj, bestsize)
}

fn get_matching_blocks(
    a: &[char],
    b: &[char],
    b2j: &HashMap<char, Vec<usize>>,
) -> Vec<(usize, usize, usize)> {
    let (la, lb) = (a.len(), b.len());
    let mut queue = vec![(0usize, la, 0usize, lb)];
    let mut raw = Vec::new();
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = find_longest_match(a, b, alo, ahi, blo, bhi, b2j);
        if k > 0 {
            raw.push((i, j, k));
            if alo < i && blo < j {
                queue.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                queue.push((i + k, ahi, j + k, bhi));
            }
        }
    }
    raw.sort_unstable();

    // Merge adjacent blocks that abut in both sequences.
    let mut merged = Vec::new();
    let (mut i1, mut j1, mut k1) = (0usize, 0usize, 0usize);
    for (i2, j2, k2) in raw {
        if i1 + k1 == i2 && j1 + k1 == j2 {
            k1 += k2;
        } else {
            if k1 > 0 {
                merged.push((i1, j1, k1));
            }
            i1 = i2;
            j1 = j2;
            k1 = k2;
        }
    }
    if k1 > 0 {
        merged.push((i1, j1, k1));
    }
    merged.push((la, lb, 0));
    merged
}

fn get_opcodes(a: &[char], b: &[char]) -> Vec<Opcode> {
    let b2j = build_b2j(b);
    let blocks = get_matching_blocks(a, b, &b2j);

    let mut opcodes = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);
    for (ai, bj, size) in blocks {
        if i < ai && j < bj {
            opcodes.push(Opcode::Replace {
                i1: i,
                i2: ai,
                j1: j,
                j2: bj,
                old_text: a[i..ai].iter().collect(),
                new_text: b[j..bj].iter().collect(),
            });
        } else if i < ai {
            opcodes.push(Opcode::Delete {
                i1: i,
                i2: ai,
                text: a[i..ai].iter().collect(),
            });
        } else if j < bj {
            opcodes.push(Opcode::Insert {
                j1: j,
                j2: bj,
                text: b[j..bj].iter().collect(),
            });
        }
        i = ai + size;
        j = bj + size;
        if size > 0 {
            opcodes.push(Opcode::Equal {
                i1: ai,
                i2: ai + size,
                j1: bj,
                j2: bj + size,
            });
        }
    }
    opcodes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(a: &str, b: &str) {
        let diff = generate_patch(a, b);
        let result = apply(&diff, a).unwrap();
        assert_eq!(result, b, "roundtrip failed for {a:?} -> {b:?}: {diff:?}");
    }

    #[test]
    fn empty_to_string() {
        roundtrip("", "abc");
    }

    #[test]
    fn string_to_empty() {
        roundtrip("abc", "");
    }

    #[test]
    fn identical_strings_is_pure_equal() {
        let diff = generate_patch("hello", "hello");
        assert!(diff.iter().all(|op| matches!(op, Opcode::Equal { .. })));
        roundtrip("hello", "hello");
    }

    #[test]
    fn single_insertion() {
        roundtrip("ac", "abc");
    }

    #[test]
    fn single_deletion() {
        roundtrip("abc", "ac");
    }

    #[test]
    fn replace_in_middle() {
        roundtrip("the cat sat", "the dog sat");
    }

    #[test]
    fn unicode_scalar_values() {
        roundtrip("caf\u{e9}", "caf\u{e9}s");
        roundtrip("\u{1f600}abc", "abc\u{1f600}");
    }

    #[test]
    fn many_small_edits_roundtrip() {
        let pairs = [
            ("", ""),
            ("a", "b"),
            ("abcdef", "abXYdef"),
            ("mississippi", "ississippi"),
            ("kitten", "sitting"),
            ("terminal session", "terminal sessions"),
            ("line one\nline two", "line one\nline TWO"),
        ];
        for (a, b) in pairs {
            roundtrip(a, b);
        }
    }

    #[test]
    fn apply_rejects_out_of_range_equal() {
        let diff = vec![Opcode::Equal { i1: 0, i2: 5, j1: 0, j2: 5 }];
        assert!(apply(&diff, "ab").is_err());
    }
}
