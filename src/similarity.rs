//! Keyboard-distance search for the registered command closest to a typo.
//!
//! Scores are "lower is closer". A key's coordinates on the grid are
//! `(index / 10, index % 3)`, which is not the physical qwerty geometry.

const SCORE_LIMIT: f64 = 50.0;
const COLUMNS_PER_KEY: usize = 10;
const ROWS_PER_KEY: usize = 3;

#[rustfmt::skip]
const KEYMAP: [Option<char>; 30] = [
    Some('q'), Some('w'), Some('e'), Some('r'), Some('t'),
    Some('y'), Some('u'), Some('i'), Some('o'), Some('p'),
    Some('a'), Some('s'), Some('d'), Some('f'), Some('g'),
    Some('h'), Some('j'), Some('k'), Some('l'), None,
    Some('z'), Some('x'), Some('c'), Some('v'), Some('b'),
    Some('n'), Some('m'), Some('_'), Some('-'), None,
];

fn max_distance() -> f64 {
    ((COLUMNS_PER_KEY + ROWS_PER_KEY) as f64).sqrt()
}

fn key_position(key: char) -> (f64, f64) {
    match KEYMAP.iter().position(|k| *k == Some(key)) {
        Some(i) => (
            i as f64 / COLUMNS_PER_KEY as f64,
            (i % ROWS_PER_KEY) as f64,
        ),
        None => (COLUMNS_PER_KEY as f64, ROWS_PER_KEY as f64),
    }
}

fn key_distance(from: char, to: char) -> f64 {
    let (fx, fy) = key_position(from);
    let (tx, ty) = key_position(to);
    ((tx - fx).powi(2) + (ty - fy).powi(2)).sqrt()
}

/// Score of `candidate` against an already sanitized input.
pub fn score(input: &str, candidate: &str) -> f64 {
    let input_len = input.chars().count() as f64;
    let candidate_len = candidate.chars().count() as f64;
    let length_penalty = (input_len - candidate_len).abs() / 2.0;
    if input.contains(candidate) {
        return length_penalty;
    }

    let mut total = length_penalty + max_distance();
    for (a, b) in input.chars().zip(candidate.chars()) {
        let distance = key_distance(a, b);
        if distance == 0.0 {
            total -= 1.0;
        } else {
            total += distance;
        }
    }
    if input.chars().all(|c| candidate.contains(c)) {
        total -= max_distance();
    }
    total
}

fn sanitize(input: &str) -> String {
    input
        .to_lowercase()
        .trim_matches(|c: char| !c.is_ascii_lowercase())
        .trim()
        .to_string()
}

/// Closest candidate to `input`, if any scores under the limit.
///
/// Candidates are compared in lexicographic order and the first minimum
/// wins. Inputs shorter than three characters never get a suggestion.
pub fn find_similar<'a, I>(input: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    if input.chars().count() < 3 {
        return None;
    }
    let input = sanitize(input);
    let mut sorted: Vec<&str> = candidates.into_iter().collect();
    sorted.sort_unstable();

    let mut best: Option<(f64, &str)> = None;
    for candidate in sorted {
        let candidate_score = score(&input, candidate);
        if best.map_or(true, |(s, _)| candidate_score < s) {
            best = Some((candidate_score, candidate));
            if candidate_score == 0.0 {
                break;
            }
        }
    }
    best.filter(|(s, _)| *s < SCORE_LIMIT)
        .map(|(_, name)| name.to_string())
}
