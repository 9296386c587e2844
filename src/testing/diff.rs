//! Line diffs for state mismatches.

use std::fmt::Debug;

/// Pretty-printed line diff of two values: unchanged lines are prefixed
/// with two spaces, removed lines with `- ` and added lines with `+ `.
pub fn state_diff<T: Debug>(expected: &T, actual: &T) -> Vec<String> {
    let expected = format!("{:#?}", expected);
    let actual = format!("{:#?}", actual);
    line_diff(&expected, &actual)
}

pub(crate) fn line_diff(old: &str, new: &str) -> Vec<String> {
    let old: Vec<&str> = old.lines().collect();
    let new: Vec<&str> = new.lines().collect();

    // lcs[i][j] = length of the longest common subsequence of old[i..], new[j..]
    let mut lcs = vec![vec![0usize; new.len() + 1]; old.len() + 1];
    for i in (0..old.len()).rev() {
        for j in (0..new.len()).rev() {
            lcs[i][j] = if old[i] == new[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut lines = Vec::with_capacity(old.len().max(new.len()));
    let (mut i, mut j) = (0, 0);
    while i < old.len() && j < new.len() {
        if old[i] == new[j] {
            lines.push(format!("  {}", old[i]));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            lines.push(format!("- {}", old[i]));
            i += 1;
        } else {
            lines.push(format!("+ {}", new[j]));
            j += 1;
        }
    }
    lines.extend(old[i..].iter().map(|line| format!("- {}", line)));
    lines.extend(new[j..].iter().map(|line| format!("+ {}", line)));
    lines
}
