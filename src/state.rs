use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::agent::expand::QueryExpander;
use crate::agent::RulesAgent;
use crate::config::Config;
use crate::corpus;
use crate::llm::client::HttpGenerator;
use crate::llm::GenerationBackend;
use crate::search::elastic::ElasticBackend;
use crate::search::local::LocalBackend;
use crate::search::SearchBackend;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub agent: Arc<RulesAgent>,
}

impl AppState {
    /// Wire the configured backends into an agent.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let backend = build_search_backend(&config)?;

        let llm_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.llm.timeout_secs))
            .build()?;
        let generator: Arc<dyn GenerationBackend> =
            Arc::new(HttpGenerator::new(llm_client, config.llm.clone()));

        let expander = match &config.expansions_file {
            Some(path) => QueryExpander::from_file(path)?,
            None => QueryExpander::with_default_rules()?,
        };
        tracing::info!("Expansion rules loaded: {}", expander.rules().len());

        let agent = RulesAgent::new(backend, generator, expander, &config);
        Ok(Self::with_agent(config, agent))
    }

    /// State around an already-built agent.
    pub fn with_agent(config: Config, agent: RulesAgent) -> Self {
        Self {
            config,
            agent: Arc::new(agent),
        }
    }
}

fn build_search_backend(config: &Config) -> anyhow::Result<Arc<dyn SearchBackend>> {
    let search = &config.search;
    match search.backend.as_str() {
        "elasticsearch" => {
            let host = search
                .host
                .as_deref()
                .context("ELASTICSEARCH_HOST is required for the elasticsearch backend")?;
            let client = reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(5))
                .timeout(Duration::from_secs(search.timeout_secs))
                .build()?;
            tracing::info!("Search backend: elasticsearch ({host})");
            Ok(Arc::new(ElasticBackend::new(
                client,
                host,
                search.api_key.clone(),
            )))
        }
        "local" => {
            std::fs::create_dir_all(&search.data_dir)?;
            let local = LocalBackend::open_or_create(
                &search.data_dir,
                &search.rules_index,
                &search.definitions_index,
            )?;
            seed_local(&local, config)?;
            tracing::info!(
                "Search backend: local ({}, {} rules, {} definitions)",
                search.data_dir.display(),
                local.rule_count(),
                local.definition_count()
            );
            Ok(Arc::new(local))
        }
        other => anyhow::bail!("Unknown search backend: {other}"),
    }
}

/// Index the seed corpora into empty local indexes. Populated indexes are
/// left alone.
fn seed_local(local: &LocalBackend, config: &Config) -> anyhow::Result<()> {
    if let Some(path) = &config.search.seed_rules {
        if local.rule_count() == 0 {
            let rules = corpus::load_rules(path)?;
            local.index_rules(&rules)?;
            tracing::info!("Seeded {} rules from {}", rules.len(), path.display());
        }
    }
    if let Some(path) = &config.search.seed_definitions {
        if local.definition_count() == 0 {
            let definitions = corpus::load_definitions(path)?;
            local.index_definitions(&definitions)?;
            tracing::info!(
                "Seeded {} definitions from {}",
                definitions.len(),
                path.display()
            );
        }
    }
    Ok(())
}
