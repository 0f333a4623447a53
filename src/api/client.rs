// ============================================================================
// Client HTTP partagé
// ============================================================================
// Un seul reqwest::Client pour toutes les sources (pool de connexions
// partagé), avec User-Agent navigateur pour éviter les blocages (Yahoo,
// sites scrapés)
// ============================================================================

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use super::FetchError;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

pub const FRED_BASE_URL: &str = "https://api.stlouisfed.org/fred";
pub const WORLD_BANK_BASE_URL: &str = "https://api.worldbank.org/v2";
pub const YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Client partagé par toutes les opérations de fetch
#[derive(Debug, Clone)]
pub struct SourceClient {
    http: reqwest::Client,
    fred_api_key: Option<String>,
    pub fred_base_url: String,
    pub world_bank_base_url: String,
    pub yahoo_base_url: String,
}

impl SourceClient {
    /// Crée le client HTTP
    ///
    /// Pas de timeout ici : le timeout par opération est appliqué par la
    /// fanout (tokio::time::timeout) et couvre aussi le parsing.
    pub fn new(fred_api_key: Option<String>, user_agent: Option<&str>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent.unwrap_or(DEFAULT_USER_AGENT))
            .build()
            .context("Échec de la création du client HTTP")?;

        Ok(Self {
            http,
            fred_api_key: fred_api_key.filter(|k| !k.trim().is_empty()),
            fred_base_url: FRED_BASE_URL.to_string(),
            world_bank_base_url: WORLD_BANK_BASE_URL.to_string(),
            yahoo_base_url: YAHOO_BASE_URL.to_string(),
        })
    }

    pub fn fred_api_key(&self) -> Option<&str> {
        self.fred_api_key.as_deref()
    }

    /// GET + vérification du statut HTTP (200-299)
    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        debug!(url = %url, "Sending HTTP request");
        let response = self.http.get(url).send().await?;

        let status = response.status();
        debug!(status = %status, "Received HTTP response");

        if !status.is_success() {
            error!(url = %url, status = %status, "Source returned error status");
            return Err(FetchError::Status(status.as_u16()));
        }

        Ok(response)
    }

    /// GET + désérialisation JSON
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let response = self.get(url).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| FetchError::Parse(e.to_string()))
    }

    /// GET du corps en texte (pages HTML)
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.get(url).await?;
        Ok(response.text().await?)
    }
}
