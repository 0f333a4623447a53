// ============================================================================
// API Client : FRED (Federal Reserve Economic Data)
// ============================================================================
// Séries macro indexées par date (FEDFUNDS, GDP, CPIAUCSL, ...)
// On ne lit que les dernières observations (tri décroissant + limit)
// ============================================================================

use serde::Deserialize;
use tracing::{debug, instrument};

use super::{FetchError, SourceClient};
use crate::models::Value;

/// Réponse de /series/observations
#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<Observation>,
}

/// Une observation : la valeur est une chaîne, "." = donnée manquante
#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    value: String,
}

fn build_url(base: &str, series: &str, api_key: &str, limit: usize) -> String {
    format!(
        "{}/series/observations?series_id={}&api_key={}&file_type=json&sort_order=desc&limit={}",
        base, series, api_key, limit
    )
}

/// Garde les observations numériques, la plus récente en premier
fn parse_observations(response: ObservationsResponse) -> Vec<(String, f64)> {
    response
        .observations
        .into_iter()
        .filter_map(|obs| {
            let value = obs.value.trim().parse::<f64>().ok()?;
            value.is_finite().then_some((obs.date, value))
        })
        .collect()
}

/// Récupère jusqu'à `limit` observations récentes (plus récente en premier)
async fn observations(
    client: &SourceClient,
    series: &str,
    limit: usize,
) -> Result<Vec<(String, f64)>, FetchError> {
    let api_key = client.fred_api_key().ok_or(FetchError::MissingApiKey("FRED"))?;
    let url = build_url(&client.fred_base_url, series, api_key, limit);

    let response: ObservationsResponse = client.get_json(&url).await?;
    let points = parse_observations(response);
    debug!(series = %series, points = points.len(), "Parsed FRED observations");
    Ok(points)
}

/// Dernière valeur de la série
#[instrument(skip(client))]
pub async fn latest(client: &SourceClient, series: &str) -> Result<Value, FetchError> {
    // Quelques points de marge : la dernière observation est parfois "."
    let points = observations(client, series, 5).await?;
    let (_, value) = points
        .first()
        .ok_or_else(|| FetchError::MissingData(format!("FRED {}", series)))?;
    Ok(Value::scalar(*value))
}

/// Variation en % entre la dernière observation et celle `periods` plus tôt
#[instrument(skip(client))]
pub async fn percent_change(
    client: &SourceClient,
    series: &str,
    periods: usize,
) -> Result<Value, FetchError> {
    let points = observations(client, series, periods + 1).await?;
    let values: Vec<f64> = points.into_iter().map(|(_, v)| v).collect();
    change_over(&values, periods)
        .map(Value::scalar)
        .ok_or_else(|| FetchError::MissingData(format!("FRED {} ({} periods)", series, periods)))
}

/// numerator / denominator * scale, sur les dernières observations
#[instrument(skip(client))]
pub async fn ratio(
    client: &SourceClient,
    numerator: &str,
    denominator: &str,
    scale: f64,
) -> Result<Value, FetchError> {
    let top = latest(client, numerator).await?;
    let bottom = latest(client, denominator).await?;

    match (top.current(), bottom.current()) {
        (Some(top), Some(bottom)) if bottom != 0.0 => Ok(Value::scalar(top / bottom * scale)),
        _ => Err(FetchError::MissingData(format!("FRED {}/{}", numerator, denominator))),
    }
}

/// values[0] (récent) vs values[periods] (ancien), en %
fn change_over(values: &[f64], periods: usize) -> Option<f64> {
    let recent = *values.first()?;
    let old = *values.get(periods)?;
    if old == 0.0 {
        return None;
    }
    Some((recent / old - 1.0) * 100.0)
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "realtime_start": "2025-07-19",
        "count": 3,
        "observations": [
            {"realtime_start": "2025-07-19", "date": "2025-06-01", "value": "."},
            {"realtime_start": "2025-07-19", "date": "2025-05-01", "value": "4.33"},
            {"realtime_start": "2025-07-19", "date": "2025-04-01", "value": "4.33"}
        ]
    }"#;

    #[test]
    fn test_parse_skips_missing_points() {
        let response: ObservationsResponse = serde_json::from_str(SAMPLE).unwrap();
        let points = parse_observations(response);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], ("2025-05-01".to_string(), 4.33));
    }

    #[test]
    fn test_build_url() {
        let url = build_url(super::super::client::FRED_BASE_URL, "FEDFUNDS", "KEY", 5);
        assert!(url.contains("series_id=FEDFUNDS"));
        assert!(url.contains("api_key=KEY"));
        assert!(url.contains("sort_order=desc"));
        assert!(url.contains("limit=5"));
    }

    #[test]
    fn test_change_over() {
        let values = [103.0, 102.0, 101.0, 100.0];
        let change = change_over(&values, 3).unwrap();
        assert!((change - 3.0).abs() < 1e-9);
        assert!(change_over(&values, 4).is_none());
        assert!(change_over(&[1.0, 0.0], 1).is_none());
    }
}
