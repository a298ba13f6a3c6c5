//! Business rules: loading, defaults and per-document selection.

mod book;
mod selector;

pub use book::{DefaultRuleSet, Rule, RuleBook, RuleBookError};
pub use selector::{
    render_rules, select_rules, SelectedRule, SelectedRules, COVERAGE_MARKERS, PACKAGE_LABEL,
    RULE_SEPARATOR, WARRANTY_LABEL,
};
