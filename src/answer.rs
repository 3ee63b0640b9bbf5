//! Query boundary: `answer(user_text)`.
//!
//! The flow for one question:
//!
//! 1. No page units at all: [`AnswerOutcome::EmptyKnowledgeBase`].
//! 2. Local retrieval finds nothing: [`AnswerOutcome::NoLocalEvidence`].
//!    The language model is not called.
//! 3. Catalog extraction (if enabled) finds entries: [`AnswerOutcome::Catalog`].
//! 4. Otherwise the ranked context is sent to the language model. A blank
//!    reply becomes a fixed clarification request; a failed call becomes
//!    [`AnswerOutcome::CollaboratorFailure`] with a short diagnostic.
//!
//! Rendering outcomes for a user (lists, HTML) belongs to the caller.

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

use crate::catalog::CatalogExtractor;
use crate::config::Config;
use crate::llm::{LanguageModel, DEFAULT_SYSTEM_PROMPT};
use crate::models::CatalogEntry;
use crate::search::{SearchOptions, SnippetIndex};
use crate::store::{PageSource, PageStore};

pub const EMPTY_KNOWLEDGE_BASE_MESSAGE: &str =
    "Nu am încă fișiere de cunoștințe. Rulează mai întâi ingestia cataloagelor (kiosk ingest).";

pub const NO_LOCAL_EVIDENCE_MESSAGE: &str =
    "Nu am găsit nimic relevant în cataloagele încărcate. Încearcă un cod sau o denumire de produs.";

/// Replaces a blank model reply.
pub const UNCLEAR_ANSWER_MESSAGE: &str =
    "Nu am găsit ceva clar în cataloagele încărcate. Îmi dai un cod sau o denumire mai precisă?";

const NO_CONTEXT_PLACEHOLDER: &str = "(nu am găsit fragmente locale)";

/// Result of one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// Structured entries read directly from the catalogs.
    Catalog { entries: Vec<CatalogEntry> },
    /// Free text composed by the language model from local context.
    Composed { text: String },
    NoLocalEvidence,
    EmptyKnowledgeBase,
    /// The language model call failed; `message` is safe to show.
    CollaboratorFailure { message: String },
}

impl AnswerOutcome {
    /// Fixed user-facing text for outcomes that carry none.
    pub fn fixed_message(&self) -> Option<&'static str> {
        match self {
            AnswerOutcome::NoLocalEvidence => Some(NO_LOCAL_EVIDENCE_MESSAGE),
            AnswerOutcome::EmptyKnowledgeBase => Some(EMPTY_KNOWLEDGE_BASE_MESSAGE),
            _ => None,
        }
    }
}

/// `"Întrebare: <q>\n\nContext din cataloage (fragmente relevante):\n<context>"`.
pub fn build_user_prompt(question: &str, context: &str) -> String {
    let context = if context.trim().is_empty() {
        NO_CONTEXT_PLACEHOLDER
    } else {
        context
    };
    format!(
        "Întrebare: {}\n\nContext din cataloage (fragmente relevante):\n{}",
        question, context
    )
}

/// Answers questions from persisted page units, consulting the injected
/// language model only when local extraction is not enough.
pub struct AnswerComposer<S: PageSource> {
    index: SnippetIndex<S>,
    options: SearchOptions,
    catalog: Option<CatalogExtractor>,
    model: Arc<dyn LanguageModel>,
    system_prompt: String,
}

impl<S: PageSource> AnswerComposer<S> {
    pub fn new(
        source: S,
        options: SearchOptions,
        catalog: Option<CatalogExtractor>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            index: SnippetIndex::new(source),
            options,
            catalog,
            model,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub async fn answer(&self, user_text: &str) -> Result<AnswerOutcome> {
        let question = user_text.trim();

        if !self.index.source().has_units()? {
            return Ok(AnswerOutcome::EmptyKnowledgeBase);
        }
        if question.is_empty() {
            return Ok(AnswerOutcome::NoLocalEvidence);
        }

        let results = self.index.search(question, &self.options)?;
        if results.is_empty() {
            tracing::info!(units = results.units_scanned, "no local evidence");
            return Ok(AnswerOutcome::NoLocalEvidence);
        }
        let context = results.joined();

        if let Some(extractor) = &self.catalog {
            let entries = extractor.extract(&context);
            if !entries.is_empty() {
                tracing::info!(entries = entries.len(), "answered from catalog");
                return Ok(AnswerOutcome::Catalog { entries });
            }
        }

        let prompt = build_user_prompt(question, &context);
        match self.model.complete(&self.system_prompt, &prompt).await {
            Ok(text) => {
                let text = text.trim();
                let text = if text.is_empty() {
                    UNCLEAR_ANSWER_MESSAGE.to_string()
                } else {
                    text.to_string()
                };
                Ok(AnswerOutcome::Composed { text })
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    fragments = results.fragments.len(),
                    "language model call failed"
                );
                Ok(AnswerOutcome::CollaboratorFailure {
                    message: format!("Asistentul nu poate răspunde acum: {}", e),
                })
            }
        }
    }
}

impl AnswerComposer<PageStore> {
    /// Composer over the configured text directory.
    pub fn from_config(config: &Config, model: Arc<dyn LanguageModel>) -> Self {
        let store = PageStore::new(&config.paths.text_dir, &config.paths.image_dir);
        let catalog = config
            .catalog
            .extract
            .then(|| CatalogExtractor::new(&config.catalog.default_currency));
        let composer = Self::new(store, SearchOptions::from(&config.retrieval), catalog, model);
        match &config.llm.system_prompt {
            Some(prompt) => composer.with_system_prompt(prompt.clone()),
            None => composer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrievalMode;
    use crate::llm::CollaboratorError;
    use crate::models::PageTextUnit;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records prompts and replies with a canned result.
    struct RecordingModel {
        reply: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingModel {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        async fn complete(
            &self,
            _system_prompt: &str,
            user_prompt: &str,
        ) -> Result<String, CollaboratorError> {
            self.prompts.lock().unwrap().push(user_prompt.to_string());
            match &self.reply {
                Some(text) => Ok(text.clone()),
                None => Err(CollaboratorError::Status {
                    status: 503,
                    body: "overloaded".to_string(),
                }),
            }
        }
    }

    fn corpus() -> Vec<PageTextUnit> {
        vec![
            PageTextUnit {
                slug: "unior".to_string(),
                page: 1,
                text: "Ciocan 500g Cod: C-100 Preț: 25 RON".to_string(),
            },
            PageTextUnit {
                slug: "unior".to_string(),
                page: 2,
                text: "Ciocan din oțel forjat, coadă din lemn de frasin".to_string(),
            },
        ]
    }

    fn gated() -> SearchOptions {
        SearchOptions {
            mode: RetrievalMode::Gated,
            min_overlap: 2,
            ..SearchOptions::default()
        }
    }

    fn composer(
        units: Vec<PageTextUnit>,
        options: SearchOptions,
        catalog: bool,
        model: Arc<RecordingModel>,
    ) -> AnswerComposer<Vec<PageTextUnit>> {
        let catalog = catalog.then(|| CatalogExtractor::new("RON"));
        AnswerComposer::new(units, options, catalog, model)
    }

    #[tokio::test]
    async fn empty_knowledge_base_is_reported() {
        let model = RecordingModel::replying("x");
        let outcome = composer(Vec::new(), SearchOptions::default(), true, model.clone())
            .answer("ciocan")
            .await
            .unwrap();
        assert_eq!(outcome, AnswerOutcome::EmptyKnowledgeBase);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn no_overlap_never_calls_the_model() {
        let model = RecordingModel::replying("x");
        let composer = composer(corpus(), SearchOptions::default(), true, model.clone());
        assert_eq!(
            composer.answer("bicicletă electrică").await.unwrap(),
            AnswerOutcome::NoLocalEvidence
        );
        assert_eq!(composer.answer("   ").await.unwrap(), AnswerOutcome::NoLocalEvidence);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn gated_catalog_query_is_answered_locally() {
        let model = RecordingModel::replying("x");
        let outcome = composer(corpus(), gated(), true, model.clone())
            .answer("cod ciocan")
            .await
            .unwrap();
        match outcome {
            AnswerOutcome::Catalog { entries } => {
                assert_eq!(entries.len(), 1);
                assert!(entries[0].name.contains("Ciocan"));
                assert_eq!(entries[0].price.as_deref(), Some("25 RON"));
                assert_eq!(entries[0].code.as_deref(), Some("C-100"));
            }
            other => panic!("expected catalog entries, got {other:?}"),
        }
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn model_gets_question_and_context() {
        let model = RecordingModel::replying("  Ciocanul C-100 costă 25 RON.  ");
        let outcome = composer(corpus(), SearchOptions::default(), false, model.clone())
            .answer("ciocan")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            AnswerOutcome::Composed {
                text: "Ciocanul C-100 costă 25 RON.".to_string()
            }
        );

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0]
            .starts_with("Întrebare: ciocan\n\nContext din cataloage (fragmente relevante):\n"));
        assert!(prompts[0].contains("C-100"));
        assert!(prompts[0].contains("\n\n---\n\n"));
    }

    #[tokio::test]
    async fn blank_reply_becomes_clarification() {
        let model = RecordingModel::replying(" \n");
        let outcome = composer(corpus(), SearchOptions::default(), false, model)
            .answer("frasin")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            AnswerOutcome::Composed {
                text: UNCLEAR_ANSWER_MESSAGE.to_string()
            }
        );
    }

    #[tokio::test]
    async fn failed_call_is_a_diagnostic_not_an_answer() {
        let model = RecordingModel::failing();
        let outcome = composer(corpus(), SearchOptions::default(), true, model.clone())
            .answer("frasin")
            .await
            .unwrap();
        match outcome {
            AnswerOutcome::CollaboratorFailure { message } => {
                assert!(message.contains("503"));
                assert!(!message.contains("frasin"));
            }
            other => panic!("expected a collaborator failure, got {other:?}"),
        }
        assert_eq!(model.calls(), 1);
    }

    #[test]
    fn prompt_placeholder_for_empty_context() {
        assert!(build_user_prompt("q", "").ends_with("(nu am găsit fragmente locale)"));
    }
}
