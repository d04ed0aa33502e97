//! Longest-matching-block sequence diff.
//!
//! Produces the same opcodes as Python's `difflib.SequenceMatcher` with junk
//! detection disabled: recursively take the longest common run (earliest in
//! `a`, then earliest in `b`, on ties) and describe the gaps between runs.
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpTag {
    Equal,
    Replace,
    Delete,
    Insert,
}

/// `a[a_start..a_end]` relates to `b[b_start..b_end]` as described by `tag`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub tag: OpTag,
    pub a_start: usize,
    pub a_end: usize,
    pub b_start: usize,
    pub b_end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Block {
    a: usize,
    b: usize,
    size: usize,
}

struct Matcher<'a, T> {
    a: &'a [T],
    b2j: HashMap<&'a T, Vec<usize>>,
}

impl<'a, T: Eq + Hash> Matcher<'a, T> {
    fn new(a: &'a [T], b: &'a [T]) -> Self {
        let mut b2j: HashMap<&T, Vec<usize>> = HashMap::new();
        for (j, item) in b.iter().enumerate() {
            b2j.entry(item).or_default().push(j);
        }
        Matcher { a, b2j }
    }

    fn longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> Block {
        let mut best = Block {
            a: alo,
            b: blo,
            size: 0,
        };
        // j2len[j] = length of the match ending at a[i - 1], b[j]
        let mut j2len: HashMap<usize, usize> = HashMap::new();
        for i in alo..ahi {
            let mut next_j2len = HashMap::new();
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| j2len.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next_j2len.insert(j, k);
                    if k > best.size {
                        best = Block {
                            a: i + 1 - k,
                            b: j + 1 - k,
                            size: k,
                        };
                    }
                }
            }
            j2len = next_j2len;
        }
        best
    }

    fn matching_blocks(&self, la: usize, lb: usize) -> Vec<Block> {
        let mut queue = vec![(0, la, 0, lb)];
        let mut blocks = Vec::new();
        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let block = self.longest_match(alo, ahi, blo, bhi);
            if block.size == 0 {
                continue;
            }
            blocks.push(block);
            if alo < block.a && blo < block.b {
                queue.push((alo, block.a, blo, block.b));
            }
            if block.a + block.size < ahi && block.b + block.size < bhi {
                queue.push((block.a + block.size, ahi, block.b + block.size, bhi));
            }
        }
        blocks.sort();

        let mut collapsed: Vec<Block> = Vec::with_capacity(blocks.len() + 1);
        for block in blocks {
            match collapsed.last_mut() {
                Some(last) if last.a + last.size == block.a && last.b + last.size == block.b => {
                    last.size += block.size;
                }
                _ => collapsed.push(block),
            }
        }
        collapsed.push(Block {
            a: la,
            b: lb,
            size: 0,
        });
        collapsed
    }
}

pub fn opcodes<T: Eq + Hash>(a: &[T], b: &[T]) -> Vec<Opcode> {
    let matcher = Matcher::new(a, b);
    let mut codes = Vec::new();
    let (mut i, mut j) = (0, 0);
    for block in matcher.matching_blocks(a.len(), b.len()) {
        let tag = match (i < block.a, j < block.b) {
            (true, true) => Some(OpTag::Replace),
            (true, false) => Some(OpTag::Delete),
            (false, true) => Some(OpTag::Insert),
            (false, false) => None,
        };
        if let Some(tag) = tag {
            codes.push(Opcode {
                tag,
                a_start: i,
                a_end: block.a,
                b_start: j,
                b_end: block.b,
            });
        }
        i = block.a + block.size;
        j = block.b + block.size;
        if block.size > 0 {
            codes.push(Opcode {
                tag: OpTag::Equal,
                a_start: block.a,
                a_end: i,
                b_start: block.b,
                b_end: j,
            });
        }
    }
    codes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(a: &str, b: &str) -> Vec<(OpTag, usize, usize, usize, usize)> {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        opcodes(&a, &b)
            .into_iter()
            .map(|op| (op.tag, op.a_start, op.a_end, op.b_start, op.b_end))
            .collect()
    }

    #[test]
    fn identical_sequences_are_one_equal_block() {
        assert_eq!(tags("abc", "abc"), vec![(OpTag::Equal, 0, 3, 0, 3)]);
    }

    #[test]
    fn empty_inputs() {
        assert!(tags("", "").is_empty());
        assert_eq!(tags("ab", ""), vec![(OpTag::Delete, 0, 2, 0, 0)]);
        assert_eq!(tags("", "ab"), vec![(OpTag::Insert, 0, 0, 0, 2)]);
    }

    #[test]
    fn single_replacement() {
        assert_eq!(
            tags("abcd", "abxd"),
            vec![
                (OpTag::Equal, 0, 2, 0, 2),
                (OpTag::Replace, 2, 3, 2, 3),
                (OpTag::Equal, 3, 4, 3, 4),
            ]
        );
    }

    #[test]
    fn delete_and_insert() {
        assert_eq!(
            tags("abcd", "acde"),
            vec![
                (OpTag::Equal, 0, 1, 0, 1),
                (OpTag::Delete, 1, 2, 1, 1),
                (OpTag::Equal, 2, 4, 1, 3),
                (OpTag::Insert, 4, 4, 3, 4),
            ]
        );
    }

    // difflib.SequenceMatcher(None, "qabxcd", "abycdf", autojunk=False).get_opcodes()
    #[test]
    fn matches_difflib_reference() {
        assert_eq!(
            tags("qabxcd", "abycdf"),
            vec![
                (OpTag::Delete, 0, 1, 0, 0),
                (OpTag::Equal, 1, 3, 0, 2),
                (OpTag::Replace, 3, 4, 2, 3),
                (OpTag::Equal, 4, 6, 3, 5),
                (OpTag::Insert, 6, 6, 5, 6),
            ]
        );
    }

    #[test]
    fn unequal_replace_when_nothing_matches() {
        assert_eq!(tags("ab", "xyz"), vec![(OpTag::Replace, 0, 2, 0, 3)]);
    }
}
