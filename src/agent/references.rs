use crate::models::{Reference, SearchHit};

/// Canned answer when retrieval finds nothing.
pub const NO_RULES_MESSAGE: &str =
    "Aucune règle trouvée dans la base de données. Veuillez reformuler votre question.";

/// Citations for every retrieved hit, in retrieval order.
///
/// The list always covers the full hit set, including hits a fallback
/// answer does not narrate.
pub fn link(hits: &[SearchHit]) -> Vec<Reference> {
    hits.iter()
        .map(|hit| Reference {
            article: hit.document.article.clone(),
            title: hit.document.title.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RuleDocument;

    #[test]
    fn test_link_preserves_order_and_length() {
        let hits: Vec<SearchHit> = (1..=5)
            .map(|i| SearchHit {
                document: RuleDocument {
                    article: format!("{i}.1"),
                    title: format!("Titre {i}"),
                    content: String::new(),
                    category: String::new(),
                    keywords: Vec::new(),
                    indexed_at: None,
                },
                relevance_score: 10.0 - i as f32,
                highlight_snippet: None,
            })
            .collect();

        let refs = link(&hits);
        assert_eq!(refs.len(), 5);
        assert_eq!(refs[0].article, "1.1");
        assert_eq!(refs[4].title, "Titre 5");
    }

    #[test]
    fn test_link_empty() {
        assert!(link(&[]).is_empty());
    }
}
