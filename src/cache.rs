// ============================================================================
// SnapshotCache : fetch-and-cache avec TTL
// ============================================================================
// Deux états :
// - Stale : pas de snapshot, TTL expiré ou invalidation manuelle
//           → la prochaine lecture lance une fanout puis persiste
// - Fresh : le snapshot stocké a moins de `ttl` → lecture depuis le store
//
// CONCEPTS RUST :
// 1. Enum pour state machine (comme Screen dans app.rs)
// 2. tokio::sync::Mutex gardé pendant la fanout : plusieurs lectures
//    concurrentes d'un état Stale ne déclenchent qu'une seule fanout
// 3. Trait Clock : le temps est injecté (tests déterministes du TTL)
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::Fetchers;
use crate::fanout::{self, FanoutOptions};
use crate::models::{Registry, Snapshot};
use crate::store::{SnapshotStore, StoreError};

pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

// ============================================================================
// Clock
// ============================================================================

/// Source de l'heure courante
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Horloge système
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ============================================================================
// État et erreurs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Stale,
    Fresh { taken_at: DateTime<Utc> },
}

#[derive(Debug, Error)]
pub enum CacheError {
    /// Lecture ou écriture du store impossible : erreur dure, jamais
    /// masquée en placeholder
    #[error("snapshot store failure: {0}")]
    Store(#[from] StoreError),
}

/// Résultat d'une lecture
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRead {
    pub snapshot: Snapshot,

    /// true si la lecture a déclenché une fanout
    pub refreshed: bool,
}

// ============================================================================
// SnapshotCache
// ============================================================================

pub struct SnapshotCache {
    registry: Arc<Registry>,
    fetchers: Fetchers,
    store: SnapshotStore,
    options: FanoutOptions,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState>,
}

impl SnapshotCache {
    /// Crée le cache ; l'état initial vient du snapshot stocké (un
    /// redémarrage dans la fenêtre du TTL ne refetch pas, sauf si le
    /// registre a changé depuis)
    pub fn new(
        registry: Arc<Registry>,
        fetchers: Fetchers,
        store: SnapshotStore,
        options: FanoutOptions,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CacheError> {
        let state = match store.load(&registry)? {
            Some(snapshot) if matches_registry(&registry, &snapshot) => CacheState::Fresh {
                taken_at: snapshot.taken_at,
            },
            Some(_) => {
                info!("Stored snapshot does not match the registry, next read refetches");
                CacheState::Stale
            }
            None => CacheState::Stale,
        };
        debug!(?state, ttl = ?ttl, "Snapshot cache created");

        Ok(Self {
            registry,
            fetchers,
            store,
            options,
            ttl,
            clock,
            state: Mutex::new(state),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Lecture : snapshot stocké si frais, sinon fanout + persistance
    pub async fn read(&self) -> Result<CacheRead, CacheError> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();

        if let CacheState::Fresh { taken_at } = *state {
            if self.is_within_ttl(taken_at, now) {
                match self.store.load(&self.registry)? {
                    Some(snapshot) if matches_registry(&self.registry, &snapshot) => {
                        debug!(taken_at = %snapshot.taken_at, "Serving cached snapshot");
                        return Ok(CacheRead { snapshot, refreshed: false });
                    }
                    Some(_) => info!("Stored snapshot does not match the registry"),
                    None => warn!("Cache marked fresh but store is empty"),
                }
            } else {
                info!(taken_at = %taken_at, "Snapshot expired");
            }
            *state = CacheState::Stale;
        }

        let snapshot = fanout::run(&self.registry, &self.fetchers, self.options, now).await;

        // En cas d'échec l'état reste Stale
        self.store.replace(&snapshot)?;
        *state = CacheState::Fresh { taken_at: snapshot.taken_at };

        Ok(CacheRead { snapshot, refreshed: true })
    }

    /// Raccourci : le snapshot seulement
    pub async fn get(&self) -> Result<Snapshot, CacheError> {
        self.read().await.map(|read| read.snapshot)
    }

    /// Force l'état Stale (bouton "refresh")
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        if *state != CacheState::Stale {
            info!("Snapshot cache invalidated");
        }
        *state = CacheState::Stale;
    }

    /// Invalide puis relit : déclenche toujours une fanout
    pub async fn refresh(&self) -> Result<CacheRead, CacheError> {
        self.invalidate().await;
        self.read().await
    }

    /// État courant, en tenant compte de l'expiration
    pub async fn state(&self) -> CacheState {
        let state = *self.state.lock().await;
        match state {
            CacheState::Fresh { taken_at } if !self.is_within_ttl(taken_at, self.clock.now()) => {
                CacheState::Stale
            }
            other => other,
        }
    }

    /// Un snapshot daté du futur (horloge décalée) est considéré expiré
    fn is_within_ttl(&self, taken_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match now.signed_duration_since(taken_at).to_std() {
            Ok(age) => age < self.ttl,
            Err(_) => false,
        }
    }
}

/// Le snapshot a exactement une entrée par indicateur du registre
fn matches_registry(registry: &Registry, snapshot: &Snapshot) -> bool {
    snapshot.len() == registry.len() && registry.iter().all(|i| snapshot.get(&i.name).is_some())
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{fetch_fn, Fetch};
    use crate::models::{Category, Indicator, Source, Value};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Horloge manuelle
    struct ManualClock(StdMutex<DateTime<Utc>>);

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(Self(StdMutex::new(Utc.with_ymd_and_hms(2025, 7, 19, 9, 0, 0).unwrap())))
        }

        fn advance(&self, secs: i64) {
            let mut now = self.0.lock().unwrap();
            *now += chrono::Duration::seconds(secs);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn counting(calls: Arc<AtomicUsize>) -> Arc<dyn Fetch> {
        Arc::new(fetch_fn(move || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(Value::scalar(n as f64))
            }
        }))
    }

    fn cache_with(clock: Arc<ManualClock>, calls: Arc<AtomicUsize>) -> SnapshotCache {
        let registry = Registry::new(vec![Indicator::new(
            "A",
            Category::Risk,
            Source::Quote { symbol: "A".to_string() },
        )])
        .unwrap();
        let mut fetchers = Fetchers::new();
        fetchers.insert("A".to_string(), counting(calls));

        SnapshotCache::new(
            Arc::new(registry),
            fetchers,
            SnapshotStore::open_in_memory().unwrap(),
            FanoutOptions::default(),
            DEFAULT_TTL,
            clock,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_starts_stale_on_empty_store() {
        let cache = cache_with(ManualClock::new(), Arc::new(AtomicUsize::new(0)));
        assert_eq!(cache.state().await, CacheState::Stale);
    }

    #[tokio::test]
    async fn test_reads_within_ttl_fetch_once() {
        let clock = ManualClock::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = cache_with(clock.clone(), calls.clone());

        let first = cache.read().await.unwrap();
        clock.advance(1800);
        let second = cache.read().await.unwrap();

        assert!(first.refreshed);
        assert!(!second.refreshed);
        assert_eq!(first.snapshot, second.snapshot);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(cache.state().await, CacheState::Fresh { .. }));
    }

    #[tokio::test]
    async fn test_expiry_triggers_one_fanout() {
        let clock = ManualClock::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = cache_with(clock.clone(), calls.clone());

        cache.get().await.unwrap();
        clock.advance(3600);
        assert_eq!(cache.state().await, CacheState::Stale);

        let after = cache.get().await.unwrap();
        let again = cache.get().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(after.value("A"), Some(&Value::scalar(2.0)));
        assert_eq!(after, again);
    }

    #[tokio::test]
    async fn test_invalidate_forces_fanout() {
        let clock = ManualClock::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = cache_with(clock, calls.clone());

        cache.get().await.unwrap();
        let refreshed = cache.refresh().await.unwrap();

        assert!(refreshed.refreshed);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_reads_share_one_fanout() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(cache_with(ManualClock::new(), calls.clone()));

        let (a, b) = tokio::join!(cache.get(), cache.get());

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_snapshot_missing_registered_indicator_is_refetched() {
        let clock = ManualClock::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = cache_with(clock, calls.clone());

        // Snapshot stocké par une version du registre sans "A"
        let mut foreign = Snapshot::new(cache.clock.now());
        foreign.insert("Removed", crate::models::Entry::ok(Value::scalar(9.0)));
        cache.store.replace(&foreign).unwrap();
        *cache.state.lock().await = CacheState::Fresh { taken_at: foreign.taken_at };

        let read = cache.read().await.unwrap();

        assert!(read.refreshed);
        assert_eq!(read.snapshot.len(), 1);
        assert_eq!(read.snapshot.value("A"), Some(&Value::scalar(1.0)));
        assert!(read.snapshot.get("Removed").is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_future_snapshot_is_stale() {
        let clock = ManualClock::new();
        let cache = cache_with(clock.clone(), Arc::new(AtomicUsize::new(0)));
        cache.get().await.unwrap();

        clock.advance(-60);
        assert_eq!(cache.state().await, CacheState::Stale);
    }
}
