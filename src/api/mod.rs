// ============================================================================
// Module : api
// ============================================================================
// Sources de données des indicateurs : FRED, World Bank, Yahoo Finance et
// pages HTML scrapées. Chaque source est isolée derrière le trait `Fetch`
// (nom → valeur ou erreur typée).
// ============================================================================

pub mod client;    // Client HTTP partagé (User-Agent, clés d'API, URLs)
pub mod fred;      // API FRED (séries macro)
pub mod scrape;    // Extraction de nombres dans des pages HTML
pub mod worldbank; // API World Bank
pub mod yahoo;     // API Yahoo Finance (quotes)

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Registry, Shape, Source, Value};

pub use client::SourceClient;

// ============================================================================
// Enum : FetchError
// ============================================================================
// CONCEPT RUST : thiserror
// - #[error("...")] génère l'impl Display
// - Clone : l'erreur est gardée dans le snapshot (texte) et dans les logs
// ============================================================================

/// Raison de l'échec d'une opération de fetch
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("no data: {0}")]
    MissingData(String),

    #[error("missing API key for {0}")]
    MissingApiKey(&'static str),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("fetch task panicked")]
    Panicked,

    #[error("no fetch operation registered")]
    NotConfigured,

    #[error("expected {expected:?} value, got {actual:?}")]
    ShapeMismatch { expected: Shape, actual: Shape },
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FetchError::Status(status.as_u16()),
            None => FetchError::Http(err.to_string()),
        }
    }
}

// ============================================================================
// Trait : Fetch
// ============================================================================
// CONCEPT RUST : async_trait
// - Les méthodes async dans un trait utilisé en `dyn` passent par
//   #[async_trait] (Box<dyn Future> sous le capot)
// ============================================================================

/// Opération sans argument qui produit la valeur d'un indicateur
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self) -> Result<Value, FetchError>;
}

/// Table nom d'indicateur → opération de fetch
pub type Fetchers = HashMap<String, Arc<dyn Fetch>>;

/// Adapte une closure async en `Fetch`
pub struct FetchFn<F>(F);

/// Crée un `Fetch` depuis une closure (`fetch_fn(|| async { ... })`)
pub fn fetch_fn<F, Fut>(f: F) -> FetchFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, FetchError>> + Send,
{
    FetchFn(f)
}

#[async_trait]
impl<F, Fut> Fetch for FetchFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, FetchError>> + Send,
{
    async fn fetch(&self) -> Result<Value, FetchError> {
        (self.0)().await
    }
}

// ============================================================================
// SourceFetcher : Source décrite dans le registre → Fetch
// ============================================================================

/// Opération de fetch construite depuis un `Source`
pub struct SourceFetcher {
    source: Source,
    client: Arc<SourceClient>,
}

impl SourceFetcher {
    pub fn new(source: Source, client: Arc<SourceClient>) -> Self {
        Self { source, client }
    }
}

#[async_trait]
impl Fetch for SourceFetcher {
    async fn fetch(&self) -> Result<Value, FetchError> {
        fetch_source(&self.client, &self.source).await
    }
}

type SourceFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, FetchError>> + Send + 'a>>;

/// Résout une source (récursif pour `Fallback`, d'où le Box::pin)
fn fetch_source<'a>(client: &'a SourceClient, source: &'a Source) -> SourceFuture<'a> {
    Box::pin(async move {
        match source {
            Source::Fred { series } => fred::latest(client, series).await,
            Source::FredChange { series, periods } => {
                fred::percent_change(client, series, *periods).await
            }
            Source::FredRatio { numerator, denominator, scale } => {
                fred::ratio(client, numerator, denominator, *scale).await
            }
            Source::WorldBank { indicator, country } => {
                worldbank::latest(client, indicator, country).await
            }
            Source::Quote { symbol } => yahoo::quote(client, symbol).await,
            Source::QuoteHistory { symbol } => yahoo::history(client, symbol).await,
            Source::Scrape { url, pattern, selector, average } => {
                scrape::scrape_number(client, url, pattern, selector.as_deref(), *average).await
            }
            Source::Fallback { primary, secondary } => {
                match fetch_source(client, primary).await {
                    Ok(value) if !value.is_placeholder() => Ok(value),
                    Ok(_) => {
                        tracing::debug!(source = %primary.label(), "Primary source returned no data, trying fallback");
                        fetch_source(client, secondary).await
                    }
                    Err(e) => {
                        tracing::debug!(source = %primary.label(), error = %e, "Primary source failed, trying fallback");
                        fetch_source(client, secondary).await
                    }
                }
            }
        }
    })
}

/// Construit une opération de fetch par indicateur du registre
pub fn build_fetchers(registry: &Registry, client: Arc<SourceClient>) -> Fetchers {
    registry
        .iter()
        .map(|indicator| {
            let fetcher: Arc<dyn Fetch> =
                Arc::new(SourceFetcher::new(indicator.source.clone(), client.clone()));
            (indicator.name.clone(), fetcher)
        })
        .collect()
}

// ============================================================================
// Tests unitaires
// ============================================================================
