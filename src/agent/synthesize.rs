//! Answer generation with an extractive fallback.

use crate::agent::references;
use crate::llm::{GenerationBackend, GenerationError, GenerationParams};
use crate::models::{AnswerMode, AnswerResult, SearchHit};

#[derive(Debug, Clone, Copy)]
pub struct AnswerSynthesizer {
    params: GenerationParams,
    fallback_articles: usize,
}

impl Default for AnswerSynthesizer {
    fn default() -> Self {
        Self::new(GenerationParams::default(), 3)
    }
}

impl AnswerSynthesizer {
    pub fn new(params: GenerationParams, fallback_articles: usize) -> Self {
        Self {
            params,
            fallback_articles: fallback_articles.max(1),
        }
    }

    /// Answer `question` from `context`. `hits` must be non-empty; the
    /// caller answers the empty case itself.
    ///
    /// Never fails: any generation error yields a fallback answer built
    /// from the top hits.
    pub async fn synthesize(
        &self,
        question: &str,
        context: &str,
        hits: &[SearchHit],
        backend: &dyn GenerationBackend,
    ) -> AnswerResult {
        let prompt = build_prompt(context, question);
        let generation = backend.generate_content(&prompt, &self.params).await;
        self.conclude(question, hits, generation)
    }

    fn conclude(
        &self,
        question: &str,
        hits: &[SearchHit],
        generation: Result<String, GenerationError>,
    ) -> AnswerResult {
        let references = references::link(hits);

        let (answer, mode) = match generation {
            Ok(text) if !text.trim().is_empty() => {
                tracing::info!(
                    question,
                    references = references.len(),
                    "Agent response generated"
                );
                (text, AnswerMode::Generated)
            }
            Ok(_) => {
                tracing::warn!("Generation returned blank text, using fallback");
                (self.fallback_answer(hits), AnswerMode::Fallback)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Generation failed, using fallback");
                (self.fallback_answer(hits), AnswerMode::Fallback)
            }
        };

        if mode == AnswerMode::Fallback {
            tracing::info!(
                question,
                references = references.len(),
                "Agent response generated via fallback"
            );
        }

        AnswerResult {
            question: question.to_string(),
            answer,
            references,
            mode,
        }
    }

    /// The top hits verbatim, numbered, separated by blank lines.
    pub fn fallback_answer(&self, hits: &[SearchHit]) -> String {
        hits.iter()
            .take(self.fallback_articles)
            .enumerate()
            .map(|(i, hit)| {
                format!(
                    "{}. Article {} - {}:\n{}",
                    i + 1,
                    hit.document.article,
                    hit.document.title,
                    hit.document.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Grounded-answer prompt: context first, then the question and the rules
/// the model must follow.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Tu es un expert en règles de water-polo FINA. Tu dois répondre de manière précise \
         et détaillée aux questions sur les règles.\n\n\
         CONTEXTE - RÈGLES PERTINENTES:\n\
         {context}\n\n\
         QUESTION: {question}\n\n\
         INSTRUCTIONS:\n\
         - Fournis une réponse complète et détaillée basée UNIQUEMENT sur les règles fournies ci-dessus\n\
         - Cite TOUJOURS les articles exacts (ex: \"Selon l'Article 20.15, ...\")\n\
         - Si plusieurs articles sont pertinents, explique chacun clairement\n\
         - Utilise des exemples concrets si cela aide à la compréhension\n\
         - Structure ta réponse avec des points ou paragraphes si nécessaire\n\
         - Si les règles fournies ne contiennent pas l'information exacte, dis-le clairement\n\n\
         RÉPONSE:"
    )
}
