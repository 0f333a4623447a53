// ============================================================================
// Configuration
// ============================================================================
// Fichier TOML optionnel + variables d'environnement
//
// Ordre de recherche du fichier :
// 1. $ECONMIRROR_CONFIG
// 2. ~/.config/econmirror/config.toml (dirs::config_dir)
// 3. valeurs par défaut
//
// Variables qui écrasent le fichier :
// - FRED_API_KEY
// - ECONMIRROR_WEBHOOK_URL
// ============================================================================

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::DEFAULT_TTL;
use crate::catalog;
use crate::fanout::{FanoutOptions, DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_WORKERS};
use crate::models::{Indicator, Registry};

pub const CONFIG_ENV: &str = "ECONMIRROR_CONFIG";
pub const FRED_KEY_ENV: &str = "FRED_API_KEY";
pub const WEBHOOK_ENV: &str = "ECONMIRROR_WEBHOOK_URL";

/// Section [cache]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Durée de fraîcheur du snapshot
    pub ttl_secs: u64,

    /// Fichier SQLite ; par défaut dans le répertoire de données
    pub db_path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL.as_secs(),
            db_path: None,
        }
    }
}

/// Section [fanout]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    pub max_workers: usize,
    pub fetch_timeout_secs: u64,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT.as_secs(),
        }
    }
}

/// Section [sources]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub fred_api_key: Option<String>,
    pub user_agent: Option<String>,
}

/// Section [alerts]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    pub enabled: bool,

    /// Sans webhook, les alertes vont dans les logs
    pub webhook_url: Option<String>,
}

/// Configuration complète
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub fanout: FanoutConfig,
    pub sources: SourcesConfig,
    pub alerts: AlertsConfig,

    /// Remplace le catalogue intégré s'il n'est pas vide
    pub indicators: Vec<Indicator>,
}

impl Config {
    /// Charge la config (fichier si trouvé, sinon défauts) puis applique
    /// les variables d'environnement
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_file() {
            Some(path) => Self::from_file(&path)?,
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Chemin du fichier utilisateur : ~/.config/econmirror/config.toml
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("econmirror").join("config.toml"))
    }

    fn find_file() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        Self::user_config_path().filter(|path| path.exists())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Échec de la lecture de {}", path.display()))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("Échec du parsing de {}", path.display()))?;
        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Variables d'environnement (injectées pour les tests)
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(FRED_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.sources.fred_api_key = Some(key);
        }
        if let Some(url) = lookup(WEBHOOK_ENV).filter(|u| !u.trim().is_empty()) {
            self.alerts.webhook_url = Some(url);
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn fanout_options(&self) -> FanoutOptions {
        FanoutOptions {
            max_workers: self.fanout.max_workers.max(1),
            fetch_timeout: Duration::from_secs(self.fanout.fetch_timeout_secs.max(1)),
        }
    }

    /// Base SQLite : config, sinon <data_local_dir>/econmirror/econ.db,
    /// sinon ./econ.db
    pub fn db_path(&self) -> PathBuf {
        if let Some(path) = &self.cache.db_path {
            return path.clone();
        }
        dirs::data_local_dir()
            .map(|dir| dir.join("econmirror").join("econ.db"))
            .unwrap_or_else(|| PathBuf::from("econ.db"))
    }

    /// Registre : indicateurs de la config, sinon le catalogue intégré
    pub fn registry(&self) -> Result<Registry> {
        let indicators = if self.indicators.is_empty() {
            catalog::default_indicators()
        } else {
            self.indicators.clone()
        };
        Registry::new(indicators).context("Registre d'indicateurs invalide")
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================
