//! Rule Selector: picks the smallest relevant subset of a rule family.
//!
//! A rule repository can hold an entire binder. Only rules that plausibly
//! apply to the document should consume prompt budget.

use serde::Serialize;
use std::collections::HashSet;

use super::book::{Rule, RuleBook};
use crate::text::{char_len, truncate_chars, words};

/// Heading of a warranty rule block in the prompt.
pub const WARRANTY_LABEL: &str = "Rule version";

/// Heading of a contract package block in the prompt.
pub const PACKAGE_LABEL: &str = "Package";

/// Separator between consecutive rule blocks.
pub const RULE_SEPARATOR: &str = "\n\n";

/// Coverage-duration vocabulary (EN/DE/TR), matched as whole words.
pub const COVERAGE_MARKERS: &[&str] = &[
    "month",
    "months",
    "year",
    "years",
    "ay",
    "yıl",
    "monat",
    "monate",
    "jahr",
    "jahre",
    "km",
    "warranty",
    "garanti",
    "garantie",
    "gewährleistung",
    "powertrain",
    "coverage",
    "kapsam",
];

const KEYWORD_WEIGHT: u32 = 2;
const MARKER_WEIGHT: u32 = 1;

/// A rule chosen for the prompt, with its text already cut to the per-rule
/// limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedRule {
    pub version: String,
    pub text: String,
    pub keywords: Vec<String>,
    pub score: u32,
}

impl SelectedRule {
    /// Prompt block for this rule: heading, text and keyword line.
    pub fn render(&self, label: &str) -> String {
        let mut block = format!("{}: {}\n{}", label, self.version, self.text);
        if !self.keywords.is_empty() {
            block.push_str("\nKeywords: ");
            block.push_str(&self.keywords.join(", "));
        }
        block
    }

    /// Characters the block spends on everything but the rule text.
    fn framing_chars(&self, label: &str) -> usize {
        char_len(&self.render(label)) - char_len(&self.text)
    }

    /// Shrink the block so it renders within `limit` characters.
    ///
    /// Trailing keywords are dropped first when the framing alone is over
    /// the limit; the text gets whatever is left.
    fn fit(mut self, label: &str, limit: usize) -> Self {
        while !self.keywords.is_empty() && self.framing_chars(label) > limit {
            self.keywords.pop();
        }
        let allowance = limit.saturating_sub(self.framing_chars(label));
        self.text = truncate_chars(&self.text, allowance).to_string();
        self
    }
}

/// Render a family of rules as the prompt section body.
pub fn render_rules(rules: &[SelectedRule], label: &str) -> String {
    rules
        .iter()
        .map(|rule| rule.render(label))
        .collect::<Vec<_>>()
        .join(RULE_SEPARATOR)
}

/// Selected rules for both families, ready for the prompt builder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectedRules {
    pub warranty: Vec<SelectedRule>,
    pub contracts: Vec<SelectedRule>,
}

impl SelectedRules {
    /// Select from both families under a shared character budget.
    ///
    /// When contract packages exist the budget is split evenly between the
    /// two families; each family's share is then divided by `max_rules`.
    /// The per-rule share bounds the whole rendered block, separator
    /// included, not just the rule text.
    pub fn select(
        book: &RuleBook,
        document: &str,
        rules_char_limit: usize,
        max_rules: usize,
    ) -> Self {
        let family_limit = if book.contracts.is_empty() {
            rules_char_limit
        } else {
            rules_char_limit / 2
        };
        let per_rule = family_limit / max_rules.max(1);
        let block_limit = per_rule.saturating_sub(char_len(RULE_SEPARATOR));

        let fit_family = |rules: &[Rule], label: &str| -> Vec<SelectedRule> {
            select_rules(rules, document, max_rules, block_limit)
                .into_iter()
                .map(|rule| rule.fit(label, block_limit))
                .collect()
        };

        Self {
            warranty: fit_family(&book.warranty, WARRANTY_LABEL),
            contracts: fit_family(&book.contracts, PACKAGE_LABEL),
        }
    }

    /// Rendered size of every selected block, separators included.
    pub fn total_chars(&self) -> usize {
        let family = |rules: &[SelectedRule], label: &str| -> usize {
            rules
                .iter()
                .map(|r| char_len(&r.render(label)) + char_len(RULE_SEPARATOR))
                .sum::<usize>()
        };
        family(&self.warranty, WARRANTY_LABEL) + family(&self.contracts, PACKAGE_LABEL)
    }
}

/// Score a rule against a document.
///
/// `document_lower` and `document_words` are precomputed once per
/// selection.
fn score_rule(rule: &Rule, document_lower: &str, document_words: &HashSet<String>) -> u32 {
    let keyword_hits = rule
        .keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty() && document_lower.contains(k.as_str()))
        .count() as u32;

    let rule_words: HashSet<String> = words(&rule.text).collect();
    let marker_hits = COVERAGE_MARKERS
        .iter()
        .filter(|m| rule_words.contains(**m) && document_words.contains(**m))
        .count() as u32;

    keyword_hits * KEYWORD_WEIGHT + marker_hits * MARKER_WEIGHT
}

/// Select at most `max_rules` rules relevant to `document`.
///
/// Rules are ranked by score with ties kept in input order, so when nothing
/// scores the result is simply the first `max_rules` rules. The result is
/// never empty when `rules` is non-empty and `max_rules > 0`.
pub fn select_rules(
    rules: &[Rule],
    document: &str,
    max_rules: usize,
    max_chars_per_rule: usize,
) -> Vec<SelectedRule> {
    let document_lower = document.to_lowercase();
    let document_words: HashSet<String> = words(document).collect();

    let mut scored: Vec<(u32, &Rule)> = rules
        .iter()
        .map(|rule| (score_rule(rule, &document_lower, &document_words), rule))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    scored
        .into_iter()
        .take(max_rules)
        .map(|(score, rule)| SelectedRule {
            version: rule.version.clone(),
            text: truncate_chars(&rule.text, max_chars_per_rule).to_string(),
            keywords: rule.keywords.clone(),
            score,
        })
        .collect()
}
