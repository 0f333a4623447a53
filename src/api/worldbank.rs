// ============================================================================
// API Client : World Bank
// ============================================================================
// Séries par pays (ex: NY.GDP.PCAP.CD pour USA). La réponse est un tableau
// JSON [métadonnées, points] où les points récents sont souvent null
// ============================================================================

use serde::Deserialize;
use tracing::{debug, instrument};

use super::{FetchError, SourceClient};
use crate::models::Value;

/// Un point de la série (plus récent en premier)
#[derive(Debug, Deserialize)]
struct Point {
    date: String,
    value: Option<f64>,
}

/// [meta, points] ; `points` est null quand la série est vide
type Response = (serde_json::Value, Option<Vec<Point>>);

fn build_url(base: &str, indicator: &str, country: &str) -> String {
    format!(
        "{}/country/{}/indicator/{}?format=json&per_page=60",
        base, country, indicator
    )
}

/// Dernière valeur non nulle
fn latest_point(points: &[Point]) -> Option<&Point> {
    points.iter().find(|p| p.value.map(f64::is_finite).unwrap_or(false))
}

#[instrument(skip(client))]
pub async fn latest(client: &SourceClient, indicator: &str, country: &str) -> Result<Value, FetchError> {
    let url = build_url(&client.world_bank_base_url, indicator, country);
    let (_, points): Response = client.get_json(&url).await?;
    let points = points.unwrap_or_default();

    let point = latest_point(&points)
        .ok_or_else(|| FetchError::MissingData(format!("World Bank {} ({})", indicator, country)))?;

    debug!(date = %point.date, "Found latest World Bank value");
    Ok(point.value.map(Value::scalar).unwrap_or(Value::Scalar(None)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_series_picks_first_value() {
        let body = r#"[
            {"page": 1, "pages": 1, "per_page": 60, "total": 3},
            [
                {"date": "2024", "value": null},
                {"date": "2023", "value": 82769.41},
                {"date": "2022", "value": 77246.67}
            ]
        ]"#;
        let (_, points): Response = serde_json::from_str(body).unwrap();
        let points = points.unwrap();
        let point = latest_point(&points).unwrap();
        assert_eq!(point.date, "2023");
        assert_eq!(point.value, Some(82769.41));
    }

    #[test]
    fn test_empty_series() {
        let body = r#"[{"page": 0, "pages": 0, "total": 0}, null]"#;
        let (_, points): Response = serde_json::from_str(body).unwrap();
        assert!(points.is_none());
    }

    #[test]
    fn test_error_body_is_parse_error() {
        let body = r#"[{"message": [{"id": "120", "value": "Invalid value"}]}]"#;
        assert!(serde_json::from_str::<Response>(body).is_err());
    }

    #[test]
    fn test_build_url() {
        let url = build_url("https://api.worldbank.org/v2", "NY.GDP.PCAP.CD", "USA");
        assert_eq!(
            url,
            "https://api.worldbank.org/v2/country/USA/indicator/NY.GDP.PCAP.CD?format=json&per_page=60"
        );
    }
}
