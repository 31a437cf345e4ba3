//! Numbered, citeable context block handed to the generator.

use crate::models::SearchHit;

const ENTRY_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, Default)]
pub struct ContextAssembler {
    char_budget: Option<usize>,
}

impl ContextAssembler {
    /// `char_budget` bounds the entries and their separators in Unicode
    /// scalar values; `None` keeps everything. When entries are dropped, an
    /// omission note follows the budgeted part and is not counted in it.
    pub fn new(char_budget: Option<usize>) -> Self {
        Self { char_budget }
    }

    /// One `[n] Article <article>: <title>\n<content>` entry per hit, in
    /// order. Over budget, the lowest-ranked entries are dropped first and
    /// the omission is noted at the end.
    pub fn assemble(&self, hits: &[SearchHit]) -> String {
        let entries: Vec<String> = hits
            .iter()
            .enumerate()
            .map(|(i, hit)| format_entry(i + 1, hit))
            .collect();

        let Some(budget) = self.char_budget else {
            return entries.join(ENTRY_SEPARATOR);
        };

        let mut used = 0;
        let mut kept = 0;
        for entry in &entries {
            let separator = if kept == 0 { 0 } else { ENTRY_SEPARATOR.len() };
            let cost = separator + entry.chars().count();
            if used + cost > budget {
                break;
            }
            used += cost;
            kept += 1;
        }

        if kept == entries.len() {
            return entries.join(ENTRY_SEPARATOR);
        }

        if kept == 0 {
            // Even the best entry is too long: cut it rather than send nothing
            let mut block = truncate_chars(&entries[0], budget);
            block.push_str("\n[...]");
            if entries.len() > 1 {
                block.push_str(ENTRY_SEPARATOR);
                block.push_str(&omission_note(entries.len() - 1));
            }
            return block;
        }

        let mut block = entries[..kept].join(ENTRY_SEPARATOR);
        block.push_str(ENTRY_SEPARATOR);
        block.push_str(&omission_note(entries.len() - kept));
        block
    }
}

fn format_entry(n: usize, hit: &SearchHit) -> String {
    format!(
        "[{n}] Article {}: {}\n{}",
        hit.document.article, hit.document.title, hit.document.content
    )
}

fn omission_note(omitted: usize) -> String {
    format!("[{omitted} article(s) omis faute de place]")
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RuleDocument;

    fn make_hit(article: &str, title: &str, content: &str) -> SearchHit {
        SearchHit {
            document: RuleDocument {
                article: article.into(),
                title: title.into(),
                content: content.into(),
                category: String::new(),
                keywords: Vec::new(),
                indexed_at: None,
            },
            relevance_score: 1.0,
            highlight_snippet: None,
        }
    }

    fn three_hits() -> Vec<SearchHit> {
        vec![
            make_hit("21.1", "EXCLUSION", "Vingt secondes."),
            make_hit("20.1", "FAUTES", "Faute ordinaire."),
            make_hit("14.1", "PENALTY", "Tir à 5 mètres."),
        ]
    }

    #[test]
    fn test_unbounded_format() {
        let ctx = ContextAssembler::new(None).assemble(&three_hits());
        assert_eq!(
            ctx,
            "[1] Article 21.1: EXCLUSION\nVingt secondes.\n\n\
             [2] Article 20.1: FAUTES\nFaute ordinaire.\n\n\
             [3] Article 14.1: PENALTY\nTir à 5 mètres."
        );
    }

    #[test]
    fn test_no_deduplication() {
        let hits = vec![
            make_hit("1", "A", "Même texte."),
            make_hit("2", "B", "Même texte."),
        ];
        let ctx = ContextAssembler::default().assemble(&hits);
        assert_eq!(ctx.matches("Même texte.").count(), 2);
    }

    #[test]
    fn test_budget_large_enough_keeps_everything() {
        let unbounded = ContextAssembler::new(None).assemble(&three_hits());
        let bounded =
            ContextAssembler::new(Some(unbounded.chars().count())).assemble(&three_hits());
        assert_eq!(bounded, unbounded);
    }

    #[test]
    fn test_budget_drops_lowest_ranked_first() {
        let first = "[1] Article 21.1: EXCLUSION\nVingt secondes.";
        let second = "[2] Article 20.1: FAUTES\nFaute ordinaire.";
        let budget = first.chars().count() + 2 + second.chars().count();

        let ctx = ContextAssembler::new(Some(budget)).assemble(&three_hits());
        assert!(ctx.starts_with(&format!("{first}\n\n{second}")));
        assert!(!ctx.contains("Article 14.1"));
        assert!(ctx.ends_with("[1 article(s) omis faute de place]"));
    }

    #[test]
    fn test_omission_note_follows_budgeted_entries() {
        let first = "[1] Article 21.1: EXCLUSION\nVingt secondes.";
        let budget = first.chars().count() + 5;

        let ctx = ContextAssembler::new(Some(budget)).assemble(&three_hits());
        let (entries, note) = ctx.split_once("\n\n").unwrap();
        assert_eq!(entries, first);
        assert!(entries.chars().count() <= budget);
        assert_eq!(note, "[2 article(s) omis faute de place]");
    }

    #[test]
    fn test_tiny_budget_cuts_top_entry() {
        let ctx = ContextAssembler::new(Some(10)).assemble(&three_hits());
        assert!(ctx.starts_with("[1] Articl\n[...]"));
        assert!(ctx.contains("[2 article(s) omis faute de place]"));
        assert!(!ctx.contains("Article 20.1"));
    }

    #[test]
    fn test_empty_hits() {
        assert_eq!(ContextAssembler::new(Some(100)).assemble(&[]), "");
    }
}
