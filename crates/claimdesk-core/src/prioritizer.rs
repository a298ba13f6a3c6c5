//! Text Prioritizer: compacts a long claim document into a character budget.
//!
//! Plain truncation loses facts that sit late in a document (the workshop
//! invoice and parts table usually come last), while pure relevance sorting
//! destroys the reading order the model needs. The prioritizer does both:
//!
//! 1. Lines are scored and the best ones are taken first, up to 80% of the
//!    budget.
//! 2. The remaining budget is filled with the other lines in document order.
//! 3. If anything had to be left out, a truncation marker is appended.
//!
//! The output never exceeds `max_chars` characters.

use crate::text::{char_len, truncate_chars};

/// Identity, date, invoice, part-code and mileage markers (EN/DE/TR).
///
/// Matched as case-insensitive substrings, one point each.
pub const PRIORITY_KEYWORDS: &[&str] = &[
    "ize",
    "vin",
    "plaka",
    "plate",
    "fahrgestell",
    "zul.",
    "delivery",
    "leistungsdatum",
    "werkstattrechnung",
    "rechnung",
    "complaint",
    "failure",
    "operation",
    "position",
    "rt",
    "km",
    "warranty",
];

/// Appended when lines had to be dropped.
pub const TRUNCATION_MARKER: &str =
    "[... DOCUMENT TRUNCATED TO FIT THE BUDGET. ANALYSE ONLY THE VISIBLE PART ...]";

/// Share of the budget reserved for the highest-scoring lines.
const PRIORITY_SHARE_NUM: usize = 4;
const PRIORITY_SHARE_DEN: usize = 5;

/// A non-empty document line with its relevance score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredLine<'a> {
    /// Position among the non-empty lines of the document
    pub index: usize,
    pub text: &'a str,
    pub score: u32,
}

impl ScoredLine<'_> {
    /// Characters consumed in the output, including the line separator.
    fn cost(&self) -> usize {
        char_len(self.text) + 1
    }
}

/// Score one line: +1 per priority keyword, +1 if it carries a digit.
pub fn score_line(line: &str) -> u32 {
    let lower = line.to_lowercase();
    let keyword_hits = PRIORITY_KEYWORDS
        .iter()
        .filter(|keyword| lower.contains(*keyword))
        .count() as u32;

    let digit_bonus = u32::from(line.chars().any(|c| c.is_ascii_digit()));
    keyword_hits + digit_bonus
}

/// Split a document into trimmed, non-empty, scored lines.
pub fn scored_lines(raw_text: &str) -> Vec<ScoredLine<'_>> {
    raw_text
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, text)| ScoredLine {
            index,
            text,
            score: score_line(text),
        })
        .collect()
}

/// Compact `raw_text` into at most `max_chars` characters.
pub fn prioritize(raw_text: &str, max_chars: usize) -> String {
    let lines = scored_lines(raw_text);
    if lines.is_empty() || max_chars == 0 {
        return String::new();
    }

    // Stable sort keeps document order among equal scores.
    let mut ranked: Vec<&ScoredLine<'_>> = lines.iter().collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));

    let priority_budget = max_chars * PRIORITY_SHARE_NUM / PRIORITY_SHARE_DEN;
    let mut included = vec![false; lines.len()];
    let mut selected: Vec<&ScoredLine<'_>> = Vec::new();
    let mut total = 0usize;

    for line in ranked {
        if total + line.cost() > priority_budget {
            continue;
        }
        included[line.index] = true;
        total += line.cost();
        selected.push(line);
    }

    for line in &lines {
        if included[line.index] {
            continue;
        }
        if total + line.cost() > max_chars {
            break;
        }
        included[line.index] = true;
        total += line.cost();
        selected.push(line);
    }

    if included.iter().all(|&i| i) {
        return join_lines(&selected);
    }

    // `total` already counts one separator per line, which covers the
    // newline in front of the marker.
    let marker_len = char_len(TRUNCATION_MARKER);
    while total + marker_len > max_chars {
        match selected.pop() {
            Some(line) => total -= line.cost(),
            None => break,
        }
    }

    if selected.is_empty() {
        return truncate_chars(TRUNCATION_MARKER, max_chars).to_string();
    }

    let mut compact = join_lines(&selected);
    compact.push('\n');
    compact.push_str(TRUNCATION_MARKER);
    compact
}

fn join_lines(lines: &[&ScoredLine<'_>]) -> String {
    lines
        .iter()
        .map(|line| line.text)
        .collect::<Vec<_>>()
        .join("\n")
}
