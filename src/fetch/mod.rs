//! Fetch cache and cancellation layer.
//!
//! Every catalog request for a session goes through [`FetchLayer::resolve`].
//! The layer guarantees:
//!
//! - one gateway call per distinct cache key; repeats are answered from the
//!   session cache without touching loading flags
//! - at most one pending request per [`Category`]; a request for a different
//!   key cancels the previous one first
//! - a cancelled request never writes anything, even if it finishes later
//!
//! Requests run on spawned tasks and report back through an unbounded channel.
//! The owner feeds each [`FetchCompletion`] into [`FetchLayer::settle`], which
//! commits it only if its ticket is still the current one for its category.

use std::collections::HashMap;
use std::future::Future;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::catalog::{CatalogResponse, Category};
use crate::error::CatalogError;

// =============================================================================
// Loading flags
// =============================================================================

/// One loading boolean per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadingFlags {
    pub years: bool,
    pub brands: bool,
    pub models: bool,
    pub modifications: bool,
    pub positions: bool,
    pub bulbs: bool,
}

impl LoadingFlags {
    pub fn get(&self, category: Category) -> bool {
        match category {
            Category::Years => self.years,
            Category::Brands => self.brands,
            Category::Models => self.models,
            Category::Modifications => self.modifications,
            Category::Positions => self.positions,
            Category::Bulbs => self.bulbs,
        }
    }

    fn set(&mut self, category: Category, value: bool) {
        let slot = match category {
            Category::Years => &mut self.years,
            Category::Brands => &mut self.brands,
            Category::Models => &mut self.models,
            Category::Modifications => &mut self.modifications,
            Category::Positions => &mut self.positions,
            Category::Bulbs => &mut self.bulbs,
        };
        *slot = value;
    }

    pub fn any(&self) -> bool {
        Category::ALL.iter().any(|c| self.get(*c))
    }
}

// =============================================================================
// Requests & completions
// =============================================================================

/// Outcome of a finished request, sent back to the layer's owner.
#[derive(Debug)]
pub struct FetchCompletion {
    category: Category,
    key: String,
    ticket: u64,
    outcome: Result<CatalogResponse, CatalogError>,
}

impl FetchCompletion {
    pub fn category(&self) -> Category {
        self.category
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[derive(Debug)]
struct InFlight {
    key: String,
    ticket: u64,
    token: CancellationToken,
}

/// Immediate answer from [`FetchLayer::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// Served from the session cache.
    Cached(CatalogResponse),
    /// A request is running; its completion will arrive on the channel.
    Pending { ticket: u64 },
}

/// What [`FetchLayer::settle`] did with a completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled {
    /// The completion belonged to a cancelled or superseded request and was dropped.
    Stale,
    /// The result was cached and may be shown.
    Loaded {
        category: Category,
        key: String,
        response: CatalogResponse,
    },
    /// The request failed; nothing was cached.
    Failed { category: Category, key: String },
}

// =============================================================================
// Fetch layer
// =============================================================================

/// Session-scoped request cache with per-category cancellation.
#[derive(Debug)]
pub struct FetchLayer {
    cache: HashMap<String, CatalogResponse>,
    in_flight: HashMap<Category, InFlight>,
    loading: LoadingFlags,
    next_ticket: u64,
    completions: mpsc::UnboundedSender<FetchCompletion>,
}

impl FetchLayer {
    pub fn new(completions: mpsc::UnboundedSender<FetchCompletion>) -> Self {
        Self {
            cache: HashMap::new(),
            in_flight: HashMap::new(),
            loading: LoadingFlags::default(),
            next_ticket: 0,
            completions,
        }
    }

    /// Answer `key` from cache, or start `query_fn` on a new task.
    ///
    /// A pending request for the same key is joined rather than repeated. A
    /// pending request for a different key in the same category is cancelled,
    /// including when the new key is answered from cache.
    /// Must be called from within a tokio runtime.
    pub fn resolve<F, Fut>(&mut self, category: Category, key: String, query_fn: F) -> Resolved
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CatalogResponse, CatalogError>> + Send + 'static,
    {
        if let Some(pending) = self.in_flight.get(&category) {
            if pending.key == key {
                return Resolved::Pending {
                    ticket: pending.ticket,
                };
            }
        }
        if let Some(superseded) = self.in_flight.remove(&category) {
            tracing::debug!(
                %category,
                superseded = %superseded.key,
                "Cancelling superseded fetch"
            );
            superseded.token.cancel();
            self.loading.set(category, false);
        }

        if let Some(cached) = self.cache.get(&key) {
            tracing::trace!(%category, %key, "Fetch served from cache");
            return Resolved::Cached(cached.clone());
        }

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let token = CancellationToken::new();
        self.in_flight.insert(
            category,
            InFlight {
                key: key.clone(),
                ticket,
                token: token.clone(),
            },
        );
        self.loading.set(category, true);

        let tx = self.completions.clone();
        let request = query_fn();
        tracing::debug!(%category, %key, ticket, "Fetch started");
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {
                    tracing::trace!(%category, ticket, "Fetch task observed cancellation");
                }
                outcome = request => {
                    let _ = tx.send(FetchCompletion { category, key, ticket, outcome });
                }
            }
        });

        Resolved::Pending { ticket }
    }

    /// Cancel the pending request for `category`, if any, and clear its flag.
    pub fn cancel(&mut self, category: Category) {
        if let Some(pending) = self.in_flight.remove(&category) {
            tracing::debug!(%category, key = %pending.key, "Fetch cancelled");
            pending.token.cancel();
        }
        self.loading.set(category, false);
    }

    /// Commit a completion if it is still current; drop it otherwise.
    pub fn settle(&mut self, completion: FetchCompletion) -> Settled {
        let FetchCompletion {
            category,
            key,
            ticket,
            outcome,
        } = completion;

        let current = self
            .in_flight
            .get(&category)
            .is_some_and(|pending| pending.ticket == ticket);
        if !current {
            tracing::trace!(%category, %key, ticket, "Discarding stale fetch completion");
            return Settled::Stale;
        }

        self.in_flight.remove(&category);
        self.loading.set(category, false);

        match outcome {
            Ok(response) => {
                self.cache.insert(key.clone(), response.clone());
                tracing::debug!(%category, %key, rows = response.len(), "Fetch loaded");
                Settled::Loaded {
                    category,
                    key,
                    response,
                }
            }
            Err(e) => {
                tracing::warn!(%category, %key, error = %e, "Fetch failed");
                Settled::Failed { category, key }
            }
        }
    }

    pub fn loading(&self) -> LoadingFlags {
        self.loading
    }

    pub fn is_loading(&self, category: Category) -> bool {
        self.loading.get(category)
    }

    pub fn is_in_flight(&self, category: Category) -> bool {
        self.in_flight.contains_key(&category)
    }

    pub fn cached(&self, key: &str) -> Option<&CatalogResponse> {
        self.cache.get(key)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    fn layer() -> (FetchLayer, mpsc::UnboundedReceiver<FetchCompletion>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (FetchLayer::new(tx), rx)
    }

    fn brands(names: &[&str]) -> CatalogResponse {
        CatalogResponse::Brands(names.iter().map(|n| (*n).to_string()).collect())
    }

    #[tokio::test]
    async fn test_repeat_key_hits_gateway_once() {
        let (mut fetch, mut rx) = layer();
        let calls = Arc::new(AtomicUsize::new(0));

        let counting = |calls: Arc<AtomicUsize>| {
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(brands(&["BMW"])) }
            }
        };

        let first = fetch.resolve(
            Category::Brands,
            "brands|2019".into(),
            counting(Arc::clone(&calls)),
        );
        assert!(matches!(first, Resolved::Pending { .. }));
        assert!(fetch.is_loading(Category::Brands));

        let done = rx.recv().await.unwrap();
        assert!(matches!(fetch.settle(done), Settled::Loaded { .. }));
        assert!(!fetch.is_loading(Category::Brands));

        let second = fetch.resolve(
            Category::Brands,
            "brands|2019".into(),
            counting(Arc::clone(&calls)),
        );
        assert_eq!(second, Resolved::Cached(brands(&["BMW"])));
        assert!(!fetch.is_loading(Category::Brands));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_same_key_in_flight_is_joined() {
        let (mut fetch, _rx) = layer();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut tickets = Vec::new();
        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            tickets.push(fetch.resolve(Category::Models, "models|2019|BMW".into(), move || {
                calls.fetch_add(1, Ordering::SeqCst);
                futures::future::pending()
            }));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(tickets.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn test_superseded_completion_is_discarded() {
        let (mut fetch, mut rx) = layer();
        let (release_old, old_gate) = oneshot::channel::<()>();

        let old = fetch.resolve(Category::Brands, "brands|2018".into(), move || async move {
            let _ = old_gate.await;
            Ok(brands(&["STALE"]))
        });
        let Resolved::Pending { ticket: old_ticket } = old else {
            panic!("expected pending");
        };

        let new = fetch.resolve(Category::Brands, "brands|2019".into(), || async {
            Ok(brands(&["FRESH"]))
        });
        assert!(matches!(new, Resolved::Pending { .. }));
        let _ = release_old.send(());

        // The old task was cancelled; simulate it reporting anyway.
        let stale = FetchCompletion {
            category: Category::Brands,
            key: "brands|2018".into(),
            ticket: old_ticket,
            outcome: Ok(brands(&["STALE"])),
        };
        assert_eq!(fetch.settle(stale), Settled::Stale);
        assert!(fetch.cached("brands|2018").is_none());
        assert!(fetch.is_loading(Category::Brands));

        let done = rx.recv().await.unwrap();
        assert_eq!(done.key(), "brands|2019");
        match fetch.settle(done) {
            Settled::Loaded { response, .. } => assert_eq!(response, brands(&["FRESH"])),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!fetch.is_loading(Category::Brands));
    }

    #[tokio::test]
    async fn test_cache_hit_cancels_pending_request_for_other_key() {
        let (mut fetch, mut rx) = layer();
        fetch.resolve(Category::Brands, "brands|2019".into(), || async {
            Ok(brands(&["BMW"]))
        });
        let done = rx.recv().await.unwrap();
        fetch.settle(done);

        let Resolved::Pending { ticket } =
            fetch.resolve(Category::Brands, "brands|2018".into(), futures::future::pending)
        else {
            panic!("expected pending");
        };
        assert!(fetch.is_loading(Category::Brands));

        let back = fetch.resolve(Category::Brands, "brands|2019".into(), futures::future::pending);
        assert_eq!(back, Resolved::Cached(brands(&["BMW"])));
        assert!(!fetch.is_loading(Category::Brands));
        assert!(!fetch.is_in_flight(Category::Brands));

        let late = FetchCompletion {
            category: Category::Brands,
            key: "brands|2018".into(),
            ticket,
            outcome: Ok(brands(&["STALE"])),
        };
        assert_eq!(fetch.settle(late), Settled::Stale);
        assert!(fetch.cached("brands|2018").is_none());
    }

    #[tokio::test]
    async fn test_failure_clears_loading_without_caching() {
        let (mut fetch, mut rx) = layer();
        fetch.resolve(Category::Models, "models|2019|BMW".into(), || async {
            Err(CatalogError::Status { status: 503 })
        });

        let done = rx.recv().await.unwrap();
        assert!(matches!(fetch.settle(done), Settled::Failed { .. }));
        assert!(!fetch.is_loading(Category::Models));
        assert_eq!(fetch.cache_len(), 0);
    }

    #[tokio::test]
    async fn test_loading_flags_are_per_category() {
        let (mut fetch, _rx) = layer();
        fetch.resolve(Category::Positions, "positions|k".into(), futures::future::pending);

        let flags = fetch.loading();
        assert!(flags.positions);
        assert!(!flags.years && !flags.brands && !flags.models);
        assert!(!flags.modifications && !flags.bulbs);
    }

    #[tokio::test]
    async fn test_cancel_clears_flag_and_drops_late_result() {
        let (mut fetch, _rx) = layer();
        let Resolved::Pending { ticket } =
            fetch.resolve(Category::Bulbs, "bulbs|k".into(), futures::future::pending)
        else {
            panic!("expected pending");
        };

        fetch.cancel(Category::Bulbs);
        assert!(!fetch.is_loading(Category::Bulbs));
        assert!(!fetch.is_in_flight(Category::Bulbs));

        let late = FetchCompletion {
            category: Category::Bulbs,
            key: "bulbs|k".into(),
            ticket,
            outcome: Ok(CatalogResponse::Bulbs(Vec::new())),
        };
        assert_eq!(fetch.settle(late), Settled::Stale);
        assert!(fetch.cached("bulbs|k").is_none());
        assert!(!fetch.is_loading(Category::Bulbs));
    }
}
