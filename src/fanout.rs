// ============================================================================
// Fanout : fetch concurrent de tous les indicateurs
// ============================================================================
// Chaque opération tourne dans sa propre tâche tokio, limitée par un
// Semaphore (max_workers permis). Erreur, panic ou timeout d'une opération
// = placeholder pour cet indicateur uniquement. L'appelant attend que toutes
// les opérations soient terminées (join-all).
//
// CONCEPTS RUST :
// 1. JoinSet : ensemble de tâches dont on récupère les résultats au fil de l'eau
// 2. Semaphore + OwnedSemaphorePermit : pool de workers borné
// 3. tokio::time::timeout : une opération bloquée ne bloque pas le snapshot
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::api::{FetchError, Fetchers};
use crate::models::{Entry, Registry, Snapshot, Value};

pub const DEFAULT_MAX_WORKERS: usize = 10;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Paramètres de la fanout
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FanoutOptions {
    /// Nombre d'opérations simultanées
    pub max_workers: usize,

    /// Durée max d'une opération
    pub fetch_timeout: Duration,
}

impl Default for FanoutOptions {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// Exécute toutes les opérations et construit le snapshot
///
/// Le snapshot contient exactement une entrée par indicateur du registre,
/// dans l'ordre du registre.
pub async fn run(
    registry: &Registry,
    fetchers: &Fetchers,
    options: FanoutOptions,
    taken_at: DateTime<Utc>,
) -> Snapshot {
    let started = Instant::now();
    let semaphore = Arc::new(Semaphore::new(options.max_workers.max(1)));
    let mut join_set = JoinSet::new();
    let mut outcomes: HashMap<String, Result<Value, FetchError>> = HashMap::with_capacity(registry.len());

    info!(
        indicators = registry.len(),
        workers = options.max_workers,
        timeout = ?options.fetch_timeout,
        "Starting fanout"
    );

    for indicator in registry.iter() {
        let name = indicator.name.clone();

        let Some(fetcher) = fetchers.get(&name).cloned() else {
            outcomes.insert(name, Err(FetchError::NotConfigured));
            continue;
        };

        let semaphore = semaphore.clone();
        let fetch_timeout = options.fetch_timeout;

        join_set.spawn(async move {
            // Le semaphore n'est jamais fermé : acquire ne peut pas échouer
            let _permit = semaphore.acquire_owned().await.ok();
            debug!(indicator = %name, "Fetching");

            // Tâche interne : un panic devient une JoinError au lieu de
            // faire tomber la fanout
            let mut handle = tokio::spawn(async move { fetcher.fetch().await });
            let result = match tokio::time::timeout(fetch_timeout, &mut handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_error)) => {
                    error!(indicator = %name, error = %join_error, "Fetch task panicked");
                    Err(FetchError::Panicked)
                }
                Err(_) => {
                    handle.abort();
                    Err(FetchError::Timeout(fetch_timeout))
                }
            };

            (name, result)
        });
    }

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((name, result)) => {
                outcomes.insert(name, result);
            }
            // Le nom est perdu ici ; l'indicateur sera complété plus bas
            Err(e) => error!(error = %e, "Fanout worker failed"),
        }
    }

    let mut snapshot = Snapshot::new(taken_at);
    for indicator in registry.iter() {
        let shape = indicator.shape();
        let outcome = outcomes
            .remove(&indicator.name)
            .unwrap_or(Err(FetchError::Panicked));

        let entry = match outcome {
            Ok(value) if value.shape() == shape => Entry::ok(value),
            Ok(value) => {
                let e = FetchError::ShapeMismatch { expected: shape, actual: value.shape() };
                warn!(indicator = %indicator.name, error = %e, "Fetch returned wrong shape");
                Entry::failed(Value::placeholder(shape), e.to_string())
            }
            Err(e) => {
                warn!(indicator = %indicator.name, source = %indicator.source.label(), error = %e, "Fetch failed, using placeholder");
                Entry::failed(Value::placeholder(shape), e.to_string())
            }
        };
        snapshot.insert(indicator.name.clone(), entry);
    }

    info!(
        indicators = snapshot.len(),
        unavailable = snapshot.unavailable_count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Fanout completed"
    );

    snapshot
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{fetch_fn, Fetch};
    use crate::models::{Category, Indicator, Shape, Source};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn indicator(name: &str) -> Indicator {
        Indicator::new(name, Category::Risk, Source::Quote { symbol: name.to_string() })
    }

    fn registry(names: &[&str]) -> Registry {
        Registry::new(names.iter().map(|n| indicator(n)).collect()).unwrap()
    }

    fn op(value: f64) -> Arc<dyn Fetch> {
        Arc::new(fetch_fn(move || async move { Ok(Value::scalar(value)) }))
    }

    fn failing(error: FetchError) -> Arc<dyn Fetch> {
        Arc::new(fetch_fn(move || {
            let error = error.clone();
            async move { Err(error) }
        }))
    }

    #[tokio::test]
    async fn test_one_entry_per_indicator() {
        let registry = registry(&["A", "B", "C"]);
        let mut fetchers = Fetchers::new();
        fetchers.insert("A".to_string(), op(1.0));
        fetchers.insert("B".to_string(), op(2.0));
        fetchers.insert("C".to_string(), op(3.0));

        let snapshot = run(&registry, &fetchers, FanoutOptions::default(), Utc::now()).await;

        assert_eq!(snapshot.len(), 3);
        let names: Vec<&str> = snapshot.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(snapshot.value("C"), Some(&Value::scalar(3.0)));
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let registry = registry(&["A", "B"]);
        let mut fetchers = Fetchers::new();
        fetchers.insert("A".to_string(), op(5.0));
        fetchers.insert("B".to_string(), failing(FetchError::Status(503)));

        let snapshot = run(&registry, &fetchers, FanoutOptions::default(), Utc::now()).await;

        assert_eq!(snapshot.value("A"), Some(&Value::scalar(5.0)));
        assert_eq!(snapshot.value("B"), Some(&Value::Scalar(None)));
        assert_eq!(snapshot.get("B").unwrap().error.as_deref(), Some("HTTP status 503"));
        assert!(snapshot.get("A").unwrap().error.is_none());
    }

    #[tokio::test]
    async fn test_missing_fetcher_is_placeholder() {
        let registry = registry(&["A", "B"]);
        let mut fetchers = Fetchers::new();
        fetchers.insert("A".to_string(), op(1.0));

        let snapshot = run(&registry, &fetchers, FanoutOptions::default(), Utc::now()).await;

        assert_eq!(snapshot.len(), 2);
        assert_eq!(
            snapshot.get("B").unwrap().error.as_deref(),
            Some("no fetch operation registered")
        );
    }

    #[tokio::test]
    async fn test_panic_is_placeholder() {
        let registry = registry(&["A", "Boom"]);
        let mut fetchers = Fetchers::new();
        fetchers.insert("A".to_string(), op(1.0));
        fetchers.insert(
            "Boom".to_string(),
            Arc::new(fetch_fn(|| async {
                if true {
                    panic!("scraper exploded");
                }
                Ok(Value::scalar(0.0))
            })),
        );

        let snapshot = run(&registry, &fetchers, FanoutOptions::default(), Utc::now()).await;

        assert_eq!(snapshot.value("A"), Some(&Value::scalar(1.0)));
        assert_eq!(snapshot.value("Boom"), Some(&Value::Scalar(None)));
        assert_eq!(snapshot.get("Boom").unwrap().error.as_deref(), Some("fetch task panicked"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_placeholder() {
        let registry = registry(&["Fast", "Hung"]);
        let mut fetchers = Fetchers::new();
        fetchers.insert("Fast".to_string(), op(1.0));
        fetchers.insert(
            "Hung".to_string(),
            Arc::new(fetch_fn(|| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Value::scalar(0.0))
            })),
        );

        let options = FanoutOptions {
            max_workers: 10,
            fetch_timeout: Duration::from_secs(5),
        };
        let snapshot = run(&registry, &fetchers, options, Utc::now()).await;

        assert_eq!(snapshot.value("Fast"), Some(&Value::scalar(1.0)));
        assert_eq!(snapshot.value("Hung"), Some(&Value::Scalar(None)));
        assert!(snapshot.get("Hung").unwrap().error.as_deref().unwrap().starts_with("timed out"));
    }

    #[tokio::test]
    async fn test_shape_mismatch_is_placeholder() {
        let registry = Registry::new(vec![indicator("T").with_shape(Shape::Triple)]).unwrap();
        let mut fetchers = Fetchers::new();
        fetchers.insert("T".to_string(), op(1.0));

        let snapshot = run(&registry, &fetchers, FanoutOptions::default(), Utc::now()).await;

        assert_eq!(snapshot.value("T"), Some(&Value::placeholder(Shape::Triple)));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let names: Vec<String> = (0..12).map(|i| format!("I{}", i)).collect();
        let registry = Registry::new(names.iter().map(|n| indicator(n)).collect()).unwrap();

        let mut fetchers = Fetchers::new();
        for name in &names {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            fetchers.insert(
                name.clone(),
                Arc::new(fetch_fn(move || {
                    let in_flight = in_flight.clone();
                    let peak = peak.clone();
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok(Value::scalar(1.0))
                    }
                })),
            );
        }

        let options = FanoutOptions {
            max_workers: 3,
            fetch_timeout: Duration::from_secs(5),
        };
        let snapshot = run(&registry, &fetchers, options, Utc::now()).await;

        assert_eq!(snapshot.len(), 12);
        assert_eq!(snapshot.unavailable_count(), 0);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }
}
