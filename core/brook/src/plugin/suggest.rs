//! "Did you mean?" hints for mistyped plugin names.

use std::collections::HashMap;

/// Names farther than this are not suggested.
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Computes the Damerau-Levenshtein distance between two strings.
///
/// The allowed operations are the insertion, deletion or substitution of a single character,
/// and the transposition of two adjacent characters.
pub fn distance_with_adjacent_transposition(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    let mut last_row_of: HashMap<char, usize> = HashMap::new();
    let mut d: Vec<Vec<usize>> = vec![vec![0; b_len + 2]; a_len + 2];

    let max_dist = a_len + b_len;
    d[0][0] = max_dist;
    for i in 0..=a_len {
        d[i + 1][0] = max_dist;
        d[i + 1][1] = i;
    }
    for j in 0..=b_len {
        d[0][j + 1] = max_dist;
        d[1][j + 1] = j;
    }

    for i in 1..=a_len {
        let mut last_match_col = 0;
        for j in 1..=b_len {
            let k = last_row_of.get(&b_chars[j - 1]).copied().unwrap_or(0);
            let l = last_match_col;
            let cost = if a_chars[i - 1] == b_chars[j - 1] {
                last_match_col = j;
                0
            } else {
                1
            };
            let substitution = d[i][j] + cost;
            let insertion = d[i + 1][j] + 1;
            let deletion = d[i][j + 1] + 1;
            let transposition = d[k][l] + (i - k - 1) + 1 + (j - l - 1);
            d[i + 1][j + 1] = substitution.min(insertion).min(deletion).min(transposition);
        }
        last_row_of.insert(a_chars[i - 1], i);
    }
    d[a_len + 1][b_len + 1]
}

/// Returns the candidate that is the closest to `name`, if it is close enough.
pub fn closest<'a>(name: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    candidates
        .into_iter()
        .map(|c| (c, distance_with_adjacent_transposition(name, c)))
        .filter(|(_, dist)| *dist < MAX_SUGGESTION_DISTANCE)
        .min_by_key(|(_, dist)| *dist)
        .map(|(c, _)| c)
}
