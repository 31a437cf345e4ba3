//! Rule-based query expansion with domain synonyms.

use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::error::ConfigError;

/// Built-in water-polo table, in application order.
const DEFAULT_RULES: &[(&str, &str)] = &[
    ("durée.*exclusion", "exclusion secondes temps"),
    ("combien.*joueur", "joueur équipe nombre"),
    ("penalty|pénalty", "penalty pénalty 5 mètres"),
    ("gardien", "gardien but bonnet rouge"),
    ("temps.*jeu", "période minute temps durée"),
    ("faute", "faute ordinaire exclusion"),
];

/// A compiled, case-insensitive pattern and the terms it adds.
#[derive(Debug, Clone)]
pub struct ExpansionRule {
    pattern: Regex,
    addition: String,
}

impl ExpansionRule {
    pub fn new(pattern: &str, addition: &str) -> Result<Self, ConfigError> {
        let compiled = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| ConfigError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self {
            pattern: compiled,
            addition: addition.to_string(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn addition(&self) -> &str {
        &self.addition
    }
}

#[derive(Deserialize)]
struct RawRule {
    pattern: String,
    addition: String,
}

/// Ordered, immutable expansion table. Every matching rule contributes once.
#[derive(Debug, Clone)]
pub struct QueryExpander {
    rules: Vec<ExpansionRule>,
}

impl QueryExpander {
    pub fn new(rules: Vec<ExpansionRule>) -> Self {
        Self { rules }
    }

    /// The built-in table.
    pub fn with_default_rules() -> Result<Self, ConfigError> {
        let rules = DEFAULT_RULES
            .iter()
            .map(|(pattern, addition)| ExpansionRule::new(pattern, addition))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    /// Parse a JSON array of `{"pattern": ..., "addition": ...}` objects.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: Vec<RawRule> = serde_json::from_str(json).map_err(|e| ConfigError::Unreadable {
            path: "<expansions>".to_string(),
            message: e.to_string(),
        })?;
        let rules = raw
            .iter()
            .map(|r| ExpansionRule::new(&r.pattern, &r.addition))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&json)
    }

    pub fn rules(&self) -> &[ExpansionRule] {
        &self.rules
    }

    /// Return `question` followed by the addition of every rule whose
    /// pattern matches it. The input is never modified.
    pub fn expand(&self, question: &str) -> String {
        let mut expanded = question.to_string();
        for rule in &self.rules {
            if rule.pattern.is_match(question) {
                expanded.push(' ');
                expanded.push_str(&rule.addition);
            }
        }
        expanded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_expander() -> QueryExpander {
        QueryExpander::with_default_rules().unwrap()
    }

    #[test]
    fn test_exclusion_duration_question() {
        let expander = default_expander();
        let question = "Quelle est la durée d'une exclusion ?";
        let expanded = expander.expand(question);
        assert!(expanded.starts_with(question));
        assert!(expanded.contains("exclusion secondes temps"));
    }

    #[test]
    fn test_no_match_returns_question_unchanged() {
        let expander = default_expander();
        assert_eq!(expander.expand("Où se place l'arbitre ?"), "Où se place l'arbitre ?");
    }

    #[test]
    fn test_case_insensitive() {
        let expander = default_expander();
        let expanded = expander.expand("LE GARDIEN peut-il sortir ?");
        assert!(expanded.ends_with(" gardien but bonnet rouge"));
    }

    #[test]
    fn test_rule_contributes_once_despite_repeated_matches() {
        let expander = default_expander();
        let expanded = expander.expand("faute, faute et encore faute");
        assert_eq!(expanded.matches("faute ordinaire exclusion").count(), 1);
    }

    #[test]
    fn test_multiple_rules_apply_in_table_order() {
        let expander = default_expander();
        let expanded = expander.expand("Le gardien commet une faute sur penalty");
        assert_eq!(
            expanded,
            "Le gardien commet une faute sur penalty \
             penalty pénalty 5 mètres \
             gardien but bonnet rouge \
             faute ordinaire exclusion"
        );
    }

    #[test]
    fn test_accented_alternative_matches() {
        let expander = default_expander();
        assert!(expander.expand("Un PÉNALTY ?").contains("5 mètres"));
    }

    #[test]
    fn test_patterns_match_unanchored() {
        let expander = default_expander();
        // "temps.*jeu" spans words in the middle of the question
        let expanded = expander.expand("Quel est le temps de jeu effectif ?");
        assert!(expanded.contains("période minute temps durée"));
    }

    #[test]
    fn test_from_json_custom_table() {
        let expander = QueryExpander::from_json(
            r#"[{"pattern": "hors.?jeu", "addition": "position attaquant"}]"#,
        )
        .unwrap();
        assert_eq!(expander.rules().len(), 1);
        assert_eq!(expander.expand("Hors-jeu ?"), "Hors-jeu ? position attaquant");
    }

    #[test]
    fn test_from_json_rejects_invalid_pattern() {
        let err = QueryExpander::from_json(r#"[{"pattern": "(", "addition": "x"}]"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn test_built_in_patterns_compile() {
        assert!(QueryExpander::with_default_rules().is_ok());
    }

    #[test]
    fn test_default_table_order() {
        let expander = default_expander();
        let patterns: Vec<&str> = expander.rules().iter().map(|r| r.pattern()).collect();
        assert_eq!(patterns.first(), Some(&"durée.*exclusion"));
        assert_eq!(patterns.last(), Some(&"faute"));
        assert_eq!(patterns.len(), 6);
    }
}
