// ============================================================================
// API Client : Yahoo Finance
// ============================================================================
// Récupère le dernier prix et les clôtures récentes d'un ticker
// (^VIX, ^GSPC, ...)
//
// CONCEPTS RUST :
// 1. Serde : désérialisation JSON automatique
// 2. #[serde(rename_all = "camelCase")] : regularMarketPrice -> regular_market_price
// ============================================================================

use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{FetchError, SourceClient};
use crate::models::Value;

// ============================================================================
// Structures pour parser la réponse JSON de Yahoo Finance
// ============================================================================

/// Réponse complète de l'API Yahoo Finance
#[derive(Debug, Deserialize)]
struct YahooResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Meta,
    indicators: Indicators,
}

/// Métadonnées du ticker
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Meta {
    symbol: String,
    regular_market_price: Option<f64>,
    chart_previous_close: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

/// Seules les clôtures nous intéressent
#[derive(Debug, Deserialize)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
}

// ============================================================================
// Fonctions publiques de l'API
// ============================================================================

/// Construit l'URL du chart : 5 jours en bougies journalières
fn build_yahoo_url(base: &str, symbol: &str) -> String {
    format!("{}/{}?interval=1d&range=5d", base, symbol)
}

async fn fetch_chart(client: &SourceClient, symbol: &str) -> Result<ChartResult, FetchError> {
    let url = build_yahoo_url(&client.yahoo_base_url, symbol);
    let response: YahooResponse = client.get_json(&url).await?;
    first_result(response, symbol)
}

fn first_result(response: YahooResponse, symbol: &str) -> Result<ChartResult, FetchError> {
    if let Some(error) = response.chart.error.filter(|e| !e.is_null()) {
        warn!(symbol = %symbol, error = %error, "Yahoo Finance returned chart error");
        return Err(FetchError::MissingData(format!("Yahoo {}: {}", symbol, error)));
    }

    response
        .chart
        .result
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::MissingData(format!("Yahoo {}", symbol)))
}

/// Clôtures non nulles, dans l'ordre chronologique
fn closes(result: &ChartResult) -> Vec<f64> {
    result
        .indicators
        .quote
        .first()
        .and_then(|q| q.close.as_ref())
        .map(|closes| closes.iter().flatten().copied().collect())
        .unwrap_or_default()
}

/// Prix courant : regularMarketPrice, sinon la dernière clôture
fn current_price(result: &ChartResult) -> Option<f64> {
    result
        .meta
        .regular_market_price
        .or_else(|| closes(result).last().copied())
}

/// (clôture précédente, dernière clôture, pas de prévision)
fn close_history(result: &ChartResult) -> Option<Value> {
    let closes = closes(result);
    let last = *closes.last()?;
    let previous = closes
        .len()
        .checked_sub(2)
        .map(|i| closes[i])
        .or(result.meta.chart_previous_close);
    Some(Value::triple(previous, Some(last), None))
}

/// Prix courant du ticker
#[instrument(skip(client))]
pub async fn quote(client: &SourceClient, symbol: &str) -> Result<Value, FetchError> {
    let result = fetch_chart(client, symbol).await?;
    debug!(symbol = %result.meta.symbol, "Parsed Yahoo chart");

    current_price(&result)
        .map(Value::scalar)
        .ok_or_else(|| FetchError::MissingData(format!("Yahoo {} price", symbol)))
}

/// Deux dernières clôtures du ticker
#[instrument(skip(client))]
pub async fn history(client: &SourceClient, symbol: &str) -> Result<Value, FetchError> {
    let result = fetch_chart(client, symbol).await?;
    close_history(&result).ok_or_else(|| FetchError::MissingData(format!("Yahoo {} closes", symbol)))
}

// ============================================================================
// Tests unitaires
// ============================================================================
