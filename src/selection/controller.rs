//! Cascade controller: the single writer of a session's selection.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::catalog::{BulbCandidate, CatalogGateway, CatalogResponse, Category};
use crate::decision::{Decision, decide, links::PartLinkResolver};
use crate::error::SelectionError;
use crate::fetch::{FetchCompletion, FetchLayer, LoadingFlags, Resolved, Settled};
use crate::selection::{FieldUpdate, FilterTuple, Stage};

/// Option list for one category, tagged with the upstream prefix that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryResult {
    pub freshness_key: String,
    pub options: CatalogResponse,
}

/// Owns a [`FilterTuple`] and keeps downstream option lists consistent with it.
///
/// Writes go through [`set_field`](Self::set_field); finished fetches come back
/// through [`apply_completion`](Self::apply_completion). Both must be called
/// from the same task.
#[derive(Debug)]
pub struct CascadeController {
    selection: FilterTuple,
    results: HashMap<Category, CategoryResult>,
    fetch: FetchLayer,
    gateway: Arc<dyn CatalogGateway>,
}

impl CascadeController {
    pub fn new(
        gateway: Arc<dyn CatalogGateway>,
        completions: mpsc::UnboundedSender<FetchCompletion>,
    ) -> Self {
        Self {
            selection: FilterTuple::default(),
            results: HashMap::new(),
            fetch: FetchLayer::new(completions),
            gateway,
        }
    }

    /// Request the year list.
    pub fn start(&mut self) {
        self.request(Category::Years);
    }

    /// Write one stage, reset everything below it and fetch the next options.
    pub fn set_field(&mut self, update: FieldUpdate) -> Result<(), SelectionError> {
        let stage = update.stage();
        let unset = update.is_unset();
        self.selection.apply(update)?;

        let next = stage.next_category();
        for category in Category::ALL.into_iter().skip(next.index()) {
            self.results.remove(&category);
            // `request` joins, supersedes or cancels the next category below.
            if category != next || unset {
                self.fetch.cancel(category);
            }
        }

        tracing::debug!(%stage, unset, "Selection changed");
        if !unset {
            self.request(next);
        }
        Ok(())
    }

    /// Reset the selection. The session cache survives, so the year list
    /// normally comes straight back from it.
    pub fn clear_all(&mut self) {
        self.selection = FilterTuple::default();
        self.results.clear();
        for category in Category::ALL.into_iter().skip(1) {
            self.fetch.cancel(category);
        }
        self.request(Category::Years);
    }

    /// Feed a finished fetch back in. Returns true if visible state changed.
    pub fn apply_completion(&mut self, completion: FetchCompletion) -> bool {
        match self.fetch.settle(completion) {
            Settled::Loaded {
                category,
                key,
                response,
            } => {
                if self.current_key(category).as_deref() != Some(key.as_str()) {
                    return false;
                }
                self.results.insert(
                    category,
                    CategoryResult {
                        freshness_key: key,
                        options: response,
                    },
                );
                true
            }
            Settled::Failed { category, .. } => {
                self.results.remove(&category);
                true
            }
            Settled::Stale => false,
        }
    }

    fn request(&mut self, category: Category) {
        let Some(query) = self.selection.query_for(category) else {
            return;
        };
        let key = query.cache_key();
        let gateway = Arc::clone(&self.gateway);

        let resolved = self.fetch.resolve(category, key.clone(), move || async move {
            gateway.query(&query).await
        });
        if let Resolved::Cached(options) = resolved {
            self.results.insert(
                category,
                CategoryResult {
                    freshness_key: key,
                    options,
                },
            );
        }
    }

    fn current_key(&self, category: Category) -> Option<String> {
        self.selection.query_for(category).map(|q| q.cache_key())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn selection(&self) -> &FilterTuple {
        &self.selection
    }

    pub fn is_ready_for_stage(&self, stage: Stage) -> bool {
        self.selection.is_ready_for_stage(stage)
    }

    /// Options for `category`, only while they match the current selection.
    pub fn options(&self, category: Category) -> Option<&CategoryResult> {
        let result = self.results.get(&category)?;
        let key = self.current_key(category)?;
        (result.freshness_key == key).then_some(result)
    }

    pub fn loading(&self) -> LoadingFlags {
        self.fetch.loading()
    }

    pub fn fetch_layer(&self) -> &FetchLayer {
        &self.fetch
    }

    /// Bulb candidates for the current selection, once loaded.
    pub fn candidates(&self) -> Option<&[BulbCandidate]> {
        match &self.options(Category::Bulbs)?.options {
            CatalogResponse::Bulbs(bulbs) => Some(bulbs),
            _ => None,
        }
    }

    /// Decision for the current selection.
    ///
    /// `None` until the position stage is set and its bulb fetch has settled.
    /// A failed bulb fetch decides as [`Decision::Empty`].
    pub fn decision(&self, links: &dyn PartLinkResolver) -> Option<Decision> {
        if !self.selection.is_set(Stage::Position) || self.fetch.is_loading(Category::Bulbs) {
            return None;
        }
        Some(decide(self.candidates().unwrap_or_default(), links))
    }
}
