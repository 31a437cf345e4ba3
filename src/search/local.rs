//! Embedded rules index built on tantivy.
//!
//! Mirrors the Elasticsearch mapping closely enough that the same
//! [`QuerySpec`] ranks sensibly on both: analyzed `title`/`content`/
//! `keywords`, raw `article`/`category`, positions kept for phrases.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{
    BooleanQuery, BoostQuery, DisjunctionMaxQuery, FuzzyTermQuery, Occur, PhraseQuery, Query,
    QueryClone, TermQuery,
};
use tantivy::schema::*;
use tantivy::snippet::{Snippet, SnippetGenerator};
use tantivy::tokenizer::{
    AsciiFoldingFilter, LowerCaser, RemoveLongFilter, SimpleTokenizer, TextAnalyzer, TokenStream,
};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, Term};

use crate::models::{DefinitionDocument, RuleDocument, SearchHit};
use crate::search::{
    BackendError, Clause, FieldBoost, Fuzziness, QuerySpec, RuleField, SearchBackend,
    SearchResults,
};

const ANALYZER: &str = "rules_text";
const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Local search backend holding a rules index and a definitions index.
#[derive(Clone)]
pub struct LocalBackend {
    inner: Arc<Inner>,
}

struct Inner {
    rules_name: String,
    definitions_name: String,
    rules: RulesIndex,
    definitions: DefinitionsIndex,
}

impl LocalBackend {
    /// Open (or create) both indexes under `root`, one directory per index name.
    pub fn open_or_create(root: &Path, rules_name: &str, definitions_name: &str) -> Result<Self> {
        let rules = RulesIndex::open_or_create(&root.join(rules_name))?;
        let definitions = DefinitionsIndex::open_or_create(&root.join(definitions_name))?;
        Ok(Self {
            inner: Arc::new(Inner {
                rules_name: rules_name.to_string(),
                definitions_name: definitions_name.to_string(),
                rules,
                definitions,
            }),
        })
    }

    pub fn index_rules(&self, rules: &[RuleDocument]) -> Result<()> {
        self.inner.rules.index(rules)
    }

    pub fn index_definitions(&self, definitions: &[DefinitionDocument]) -> Result<()> {
        self.inner.definitions.index(definitions)
    }

    pub fn rule_count(&self) -> u64 {
        self.inner.rules.reader.searcher().num_docs()
    }

    pub fn definition_count(&self) -> u64 {
        self.inner.definitions.reader.searcher().num_docs()
    }
}

#[async_trait]
impl SearchBackend for LocalBackend {
    async fn search(&self, index: &str, query: &QuerySpec) -> Result<SearchResults, BackendError> {
        if index != self.inner.rules_name {
            return Err(BackendError::MissingIndex(index.to_string()));
        }
        let inner = self.inner.clone();
        let query = query.clone();
        tokio::task::spawn_blocking(move || inner.rules.search(&query))
            .await
            .map_err(|e| BackendError::Task(e.to_string()))?
    }

    async fn count(&self, index: &str) -> Result<u64, BackendError> {
        if index == self.inner.rules_name {
            Ok(self.rule_count())
        } else if index == self.inner.definitions_name {
            Ok(self.definition_count())
        } else {
            Err(BackendError::MissingIndex(index.to_string()))
        }
    }

    async fn ping(&self) -> bool {
        true
    }
}

// ─── Rules index ─────────────────────────────────────────

struct RulesIndex {
    index: Index,
    reader: IndexReader,
    analyzer: TextAnalyzer,
    f_article: Field,
    f_title: Field,
    f_content: Field,
    f_keywords: Field,
    f_category: Field,
    f_indexed_at: Field,
}

impl RulesIndex {
    fn open_or_create(index_dir: &Path) -> Result<Self> {
        let mut schema_builder = Schema::builder();
        schema_builder.add_text_field("article", STRING | STORED);
        schema_builder.add_text_field("title", analyzed_text());
        schema_builder.add_text_field("content", analyzed_text());
        schema_builder.add_text_field("keywords", analyzed_text());
        schema_builder.add_text_field("category", STRING | STORED);
        schema_builder.add_i64_field("indexed_at", NumericOptions::default() | STORED);
        let schema = schema_builder.build();

        let index = open_or_create_index(index_dir, schema)?;
        let analyzer = register_analyzer(&index);
        let schema = index.schema();

        Ok(Self {
            reader: open_reader(&index)?,
            analyzer,
            f_article: schema.get_field("article")?,
            f_title: schema.get_field("title")?,
            f_content: schema.get_field("content")?,
            f_keywords: schema.get_field("keywords")?,
            f_category: schema.get_field("category")?,
            f_indexed_at: schema.get_field("indexed_at")?,
            index,
        })
    }

    fn index(&self, rules: &[RuleDocument]) -> Result<()> {
        let mut writer: IndexWriter = self
            .index
            .writer(WRITER_HEAP_BYTES)
            .context("Failed to create index writer")?;

        let now = Utc::now();
        for rule in rules {
            let mut doc = TantivyDocument::default();
            doc.add_text(self.f_article, &rule.article);
            doc.add_text(self.f_title, &rule.title);
            doc.add_text(self.f_content, &rule.content);
            for keyword in &rule.keywords {
                doc.add_text(self.f_keywords, keyword);
            }
            doc.add_text(self.f_category, &rule.category);
            doc.add_i64(
                self.f_indexed_at,
                rule.indexed_at.unwrap_or(now).timestamp_millis(),
            );
            writer.add_document(doc)?;
        }

        writer.commit().context("Failed to commit rules")?;
        self.reader.reload().context("Failed to reload rules reader")?;
        Ok(())
    }

    fn field(&self, field: RuleField) -> Field {
        match field {
            RuleField::Article => self.f_article,
            RuleField::Title => self.f_title,
            RuleField::Content => self.f_content,
            RuleField::Keywords => self.f_keywords,
            RuleField::Category => self.f_category,
        }
    }

    /// Tokens as the index sees them. Raw fields keep the value whole.
    fn tokens(&self, field: RuleField, text: &str) -> Vec<String> {
        match field {
            RuleField::Article | RuleField::Category => vec![text.to_string()],
            RuleField::Title | RuleField::Content | RuleField::Keywords => {
                let mut analyzer = self.analyzer.clone();
                let mut stream = analyzer.token_stream(text);
                let mut tokens = Vec::new();
                while stream.advance() {
                    tokens.push(stream.token().text.clone());
                }
                tokens
            }
        }
    }

    fn search(&self, spec: &QuerySpec) -> Result<SearchResults, BackendError> {
        let searcher = self.reader.searcher();

        // TopDocs preallocates `limit` slots and rejects zero
        let limit = spec.size.min(searcher.num_docs() as usize);
        if limit == 0 {
            return Ok(SearchResults::default());
        }

        let query = self.build_query(spec);

        let (top_docs, total) = searcher
            .search(query.as_ref(), &(TopDocs::with_limit(limit), Count))
            .map_err(index_err)?;

        let mut docs = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address).map_err(index_err)?;
            docs.push((score, doc));
        }

        let snippets = match &spec.highlight {
            Some(h) => {
                let highlight_query = self.highlight_query(spec, h.field, query.as_ref(), &docs);
                let generator =
                    SnippetGenerator::create(&searcher, highlight_query.as_ref(), self.field(h.field))
                        .map_err(index_err)?;
                Some((generator, h))
            }
            None => None,
        };

        let mut hits = Vec::with_capacity(docs.len());
        for (score, doc) in docs {
            let highlight_snippet = snippets.as_ref().and_then(|(generator, h)| {
                render_snippet(&generator.snippet_from_doc(&doc), &h.pre_tag, &h.post_tag)
            });

            hits.push(SearchHit {
                document: self.to_rule(&doc),
                relevance_score: score,
                highlight_snippet,
            });
        }

        Ok(SearchResults {
            hits,
            total: total as u64,
        })
    }

    /// Snippets only see exact terms, so the hit-side spellings that a fuzzy
    /// clause matched on `field` are added to `query` as plain terms.
    fn highlight_query(
        &self,
        spec: &QuerySpec,
        field: RuleField,
        query: &dyn Query,
        docs: &[(f32, TantivyDocument)],
    ) -> Box<dyn Query> {
        let mut fuzzy: Vec<(String, u8)> = Vec::new();
        for clause in &spec.should {
            if let Clause::MultiMatch {
                query: text,
                fields,
                fuzziness: Some(f),
            } = clause
            {
                if fields.iter().any(|fb| fb.field == field) {
                    for token in self.tokens(field, text) {
                        let distance = f.distance_for(&token);
                        if distance > 0 {
                            fuzzy.push((token, distance));
                        }
                    }
                }
            }
        }
        if fuzzy.is_empty() {
            return query.box_clone();
        }

        let tantivy_field = self.field(field);
        let mut matched: Vec<String> = Vec::new();
        for (_, doc) in docs {
            for token in self.tokens(field, &first_text(doc, tantivy_field)) {
                let close = fuzzy.iter().any(|(q, d)| {
                    *q != token && edit_distance(q, &token) <= usize::from(*d)
                });
                if close && !matched.contains(&token) {
                    matched.push(token);
                }
            }
        }

        let mut should: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Should, query.box_clone())];
        for token in matched {
            should.push((
                Occur::Should,
                Box::new(TermQuery::new(
                    Term::from_field_text(tantivy_field, &token),
                    IndexRecordOption::WithFreqs,
                )),
            ));
        }
        Box::new(BooleanQuery::new(should))
    }

    fn to_rule(&self, doc: &TantivyDocument) -> RuleDocument {
        RuleDocument {
            article: first_text(doc, self.f_article),
            title: first_text(doc, self.f_title),
            content: first_text(doc, self.f_content),
            category: first_text(doc, self.f_category),
            keywords: doc
                .get_all(self.f_keywords)
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect(),
            indexed_at: doc
                .get_first(self.f_indexed_at)
                .and_then(|v| v.as_i64())
                .and_then(DateTime::<Utc>::from_timestamp_millis),
        }
    }

    // ─── Query translation ───────────────────────────────

    fn build_query(&self, spec: &QuerySpec) -> Box<dyn Query> {
        let should = spec
            .should
            .iter()
            .filter_map(|clause| self.clause_query(clause))
            .map(|q| (Occur::Should, q))
            .collect();
        Box::new(BooleanQuery::new(should))
    }

    fn clause_query(&self, clause: &Clause) -> Option<Box<dyn Query>> {
        match clause {
            Clause::MultiMatch {
                query,
                fields,
                fuzziness,
            } => self.best_field(fields, |fb| {
                self.terms_query(fb.field, query, *fuzziness)
            }),
            Clause::Phrase {
                query,
                fields,
                boost,
            } => self
                .best_field(fields, |fb| self.phrase_query(fb.field, query))
                .map(|q| boosted(q, *boost)),
            Clause::Match {
                field,
                query,
                boost,
            } => self
                .terms_query(*field, query, None)
                .map(|q| boosted(q, *boost)),
            Clause::Term { field, value } => Some(Box::new(TermQuery::new(
                Term::from_field_text(self.field(*field), value),
                IndexRecordOption::Basic,
            ))),
        }
    }

    /// Per-field queries, each weighted, scored by the best matching field.
    fn best_field<F>(&self, fields: &[FieldBoost], per_field: F) -> Option<Box<dyn Query>>
    where
        F: Fn(&FieldBoost) -> Option<Box<dyn Query>>,
    {
        let queries: Vec<Box<dyn Query>> = fields
            .iter()
            .filter_map(|fb| per_field(fb).map(|q| boosted(q, fb.boost)))
            .collect();
        if queries.is_empty() {
            None
        } else {
            Some(Box::new(DisjunctionMaxQuery::new(queries)))
        }
    }

    /// Any-term match; each term also matches within its edit distance.
    fn terms_query(
        &self,
        field: RuleField,
        text: &str,
        fuzziness: Option<Fuzziness>,
    ) -> Option<Box<dyn Query>> {
        let tokens = self.tokens(field, text);
        if tokens.is_empty() {
            return None;
        }
        let tantivy_field = self.field(field);

        let subqueries = tokens
            .iter()
            .map(|token| {
                let term = Term::from_field_text(tantivy_field, token);
                let exact: Box<dyn Query> =
                    Box::new(TermQuery::new(term.clone(), IndexRecordOption::WithFreqs));
                let distance = fuzziness.map(|f| f.distance_for(token)).unwrap_or(0);
                let q: Box<dyn Query> = if distance == 0 {
                    exact
                } else {
                    Box::new(BooleanQuery::new(vec![
                        (Occur::Should, exact),
                        (
                            Occur::Should,
                            Box::new(FuzzyTermQuery::new(term, distance, true)),
                        ),
                    ]))
                };
                (Occur::Should, q)
            })
            .collect();

        Some(Box::new(BooleanQuery::new(subqueries)))
    }

    fn phrase_query(&self, field: RuleField, text: &str) -> Option<Box<dyn Query>> {
        let tantivy_field = self.field(field);
        let mut terms: Vec<Term> = self
            .tokens(field, text)
            .iter()
            .map(|token| Term::from_field_text(tantivy_field, token))
            .collect();

        match terms.len() {
            0 => None,
            // PhraseQuery needs at least two terms
            1 => Some(Box::new(TermQuery::new(
                terms.remove(0),
                IndexRecordOption::WithFreqs,
            ))),
            _ => Some(Box::new(PhraseQuery::new(terms))),
        }
    }
}

// ─── Definitions index ───────────────────────────────────

struct DefinitionsIndex {
    index: Index,
    reader: IndexReader,
    f_title: Field,
    f_word: Field,
    f_definition: Field,
}

impl DefinitionsIndex {
    fn open_or_create(index_dir: &Path) -> Result<Self> {
        let mut schema_builder = Schema::builder();
        schema_builder.add_text_field("title", STRING | STORED);
        schema_builder.add_text_field("word", analyzed_text());
        schema_builder.add_text_field("definition", analyzed_text());
        let schema = schema_builder.build();

        let index = open_or_create_index(index_dir, schema)?;
        register_analyzer(&index);
        let schema = index.schema();

        Ok(Self {
            reader: open_reader(&index)?,
            f_title: schema.get_field("title")?,
            f_word: schema.get_field("word")?,
            f_definition: schema.get_field("definition")?,
            index,
        })
    }

    fn index(&self, definitions: &[DefinitionDocument]) -> Result<()> {
        let mut writer: IndexWriter = self
            .index
            .writer(WRITER_HEAP_BYTES)
            .context("Failed to create index writer")?;

        for def in definitions {
            let mut doc = TantivyDocument::default();
            doc.add_text(self.f_title, &def.title);
            doc.add_text(self.f_word, &def.word);
            doc.add_text(self.f_definition, &def.definition);
            writer.add_document(doc)?;
        }

        writer.commit().context("Failed to commit definitions")?;
        self.reader
            .reload()
            .context("Failed to reload definitions reader")?;
        Ok(())
    }
}

// ─── Helpers ─────────────────────────────────────────────

fn analyzed_text() -> TextOptions {
    TextOptions::default()
        .set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(ANALYZER)
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        )
        .set_stored()
}

/// Tokenizers are not persisted with the index, so this runs on every open.
fn register_analyzer(index: &Index) -> TextAnalyzer {
    let analyzer = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .filter(AsciiFoldingFilter)
        .build();
    index.tokenizers().register(ANALYZER, analyzer.clone());
    analyzer
}

fn open_or_create_index(index_dir: &Path, schema: Schema) -> Result<Index> {
    std::fs::create_dir_all(index_dir)?;
    if index_dir.join("meta.json").exists() {
        Index::open_in_dir(index_dir).context("Failed to open existing tantivy index")
    } else {
        Index::create_in_dir(index_dir, schema).context("Failed to create tantivy index")
    }
}

fn open_reader(index: &Index) -> Result<IndexReader> {
    index
        .reader_builder()
        .reload_policy(ReloadPolicy::Manual)
        .try_into()
        .context("Failed to create reader")
}

fn boosted(query: Box<dyn Query>, boost: f32) -> Box<dyn Query> {
    if (boost - 1.0).abs() < f32::EPSILON {
        query
    } else {
        Box::new(BoostQuery::new(query, boost))
    }
}

fn first_text(doc: &TantivyDocument, field: Field) -> String {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Edit distance counting an adjacent transposition as one edit, as the
/// fuzzy term queries do.
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut d = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for (i, row) in d.iter_mut().enumerate() {
        row[0] = i;
    }
    d[0] = (0..=b.len()).collect();
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            d[i][j] = (d[i - 1][j] + 1)
                .min(d[i][j - 1] + 1)
                .min(d[i - 1][j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                d[i][j] = d[i][j].min(d[i - 2][j - 2] + 1);
            }
        }
    }
    d[a.len()][b.len()]
}

fn index_err(e: tantivy::TantivyError) -> BackendError {
    BackendError::Index(e.to_string())
}

/// Re-render a snippet with caller-chosen markers. `None` when nothing in
/// the fragment was highlighted.
fn render_snippet(snippet: &Snippet, pre_tag: &str, post_tag: &str) -> Option<String> {
    if snippet.is_empty() || snippet.highlighted().is_empty() {
        return None;
    }
    let fragment = snippet.fragment();
    let mut out = String::with_capacity(fragment.len() + 16);
    let mut cursor = 0;
    for range in snippet.highlighted() {
        out.push_str(&fragment[cursor..range.start]);
        out.push_str(pre_tag);
        out.push_str(&fragment[range.clone()]);
        out.push_str(post_tag);
        cursor = range.end;
    }
    out.push_str(&fragment[cursor..]);
    Some(out)
}
