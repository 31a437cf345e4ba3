//! Rule and definition corpora read from JSON files, for seeding the
//! local index.

use std::path::Path;

use anyhow::{Context, Result};

use crate::models::{DefinitionDocument, RuleDocument};

/// Heading markers, checked in order against title then content.
const CATEGORY_MARKERS: &[(&str, &str)] = &[
    ("CHAMP DE JEU", "terrain"),
    ("EQUIPES ET REMPLACANTS", "equipes"),
    ("DUREE DU MATCH", "temps"),
    ("DEBUT DU MATCH", "debut"),
    ("BUT MARQUE", "scoring"),
    ("FAUTE", "fautes"),
    ("EXCLUSION", "exclusions"),
    ("PENALTY", "penalties"),
    ("ARBITRES", "arbitrage"),
    ("PROCEDURES", "procedures"),
];

const COMMON_KEYWORDS: &[&str] = &[
    "faute", "exclusion", "but", "gardien", "penalty", "temps", "ballon", "arbitre", "joueur",
    "équipe", "ligne", "zone",
];

/// Read a rules file and fill in missing categories and keywords.
pub fn load_rules(path: &Path) -> Result<Vec<RuleDocument>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read rules from {}", path.display()))?;
    let mut rules: Vec<RuleDocument> = serde_json::from_str(&data)
        .with_context(|| format!("Invalid rules JSON in {}", path.display()))?;

    for rule in &mut rules {
        enrich(rule);
    }
    Ok(rules)
}

pub fn load_definitions(path: &Path) -> Result<Vec<DefinitionDocument>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read definitions from {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("Invalid definitions JSON in {}", path.display()))
}

fn enrich(rule: &mut RuleDocument) {
    if rule.category.trim().is_empty() {
        rule.category = categorize(&rule.title, &rule.content).to_string();
    }
    if rule.keywords.is_empty() {
        rule.keywords = extract_keywords(&rule.content);
    }
}

/// Category of the first heading marker found in the title or content.
pub fn categorize(title: &str, content: &str) -> &'static str {
    CATEGORY_MARKERS
        .iter()
        .find(|(marker, _)| title.contains(marker) || content.contains(marker))
        .map(|(_, category)| *category)
        .unwrap_or("general")
}

/// Common domain terms occurring anywhere in `content` (substring match).
pub fn extract_keywords(content: &str) -> Vec<String> {
    let lower = content.to_lowercase();
    COMMON_KEYWORDS
        .iter()
        .filter(|kw| lower.contains(*kw))
        .map(|kw| kw.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_categorize_by_title_marker() {
        assert_eq!(categorize("EXCLUSION TEMPORAIRE", ""), "exclusions");
        assert_eq!(categorize("CHAMP DE JEU", "dimensions"), "terrain");
    }

    #[test]
    fn test_categorize_first_marker_wins() {
        // FAUTE is listed before EXCLUSION
        assert_eq!(categorize("FAUTES D'EXCLUSION", ""), "fautes");
    }

    #[test]
    fn test_categorize_falls_back_to_general() {
        assert_eq!(categorize("Généralités", "Le règlement s'applique."), "general");
    }

    #[test]
    fn test_extract_keywords_is_case_insensitive_substring() {
        let keywords = extract_keywords("Le GARDIEN de but peut jouer le ballon.");
        assert_eq!(keywords, vec!["but", "gardien", "ballon"]);
    }

    #[test]
    fn test_load_rules_enriches_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"article": "21.1", "title": "EXCLUSION", "content": "Le joueur est exclu 20 secondes."}},
                {{"article": "1.1", "title": "CHAMP DE JEU", "content": "Ligne de but.", "category": "custom", "keywords": ["x"]}}
            ]"#
        )
        .unwrap();

        let rules = load_rules(file.path()).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].category, "exclusions");
        assert_eq!(rules[0].keywords, vec!["joueur"]);
        assert_eq!(rules[1].category, "custom");
        assert_eq!(rules[1].keywords, vec!["x"]);
    }

    #[test]
    fn test_load_definitions() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"title": "Bonnet", "word": "bonnet", "definition": "Coiffe numérotée."}}]"#
        )
        .unwrap();
        let defs = load_definitions(file.path()).unwrap();
        assert_eq!(defs[0].word, "bonnet");
    }

    #[test]
    fn test_load_rules_reports_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = load_rules(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid rules JSON"));
    }
}
