// ============================================================================
// Structures : Indicator, Source, Registry
// ============================================================================
// Un indicateur = un nom unique + une source de données + des métadonnées
// d'affichage (seuil, unité, description)
//
// CONCEPTS RUST :
// 1. Enum avec données + #[serde(tag = "kind")] : la source est décrite
//    dans le fichier de config TOML
// 2. Box<Source> : enum récursif (Fallback contient deux sources)
// 3. Registry immuable : construit une fois, passé explicitement au cache
// ============================================================================

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Shape;

// ============================================================================
// Enum : Category
// ============================================================================

/// Famille d'indicateurs (regroupement dans l'UI)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Proxies de risque (volatilité, crédit, taux)
    #[default]
    Risk,
    /// Cycle de dette court terme
    ShortTermDebt,
    /// Cycle de dette long terme
    LongTermDebt,
    /// Cycles géopolitiques
    Geo,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Risk => "Risks",
            Category::ShortTermDebt => "Short-term debt",
            Category::LongTermDebt => "Long-term debt",
            Category::Geo => "Geo cycles",
        }
    }
}

// ============================================================================
// Enum : Source
// ============================================================================

/// D'où vient la valeur d'un indicateur
///
/// Chaque variant est transformé en opération de fetch par `api::build_fetchers` (via `api::SourceFetcher`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Source {
    /// Dernière observation d'une série FRED
    Fred { series: String },

    /// Variation en % sur `periods` observations (ex: inflation sur 12 mois)
    FredChange {
        series: String,
        #[serde(default = "default_change_periods")]
        periods: usize,
    },

    /// numerator / denominator * scale (ex: dette / PIB en %)
    FredRatio {
        numerator: String,
        denominator: String,
        #[serde(default = "default_ratio_scale")]
        scale: f64,
    },

    /// Dernière valeur non nulle d'une série World Bank
    WorldBank { indicator: String, country: String },

    /// Prix courant d'un ticker Yahoo Finance
    Quote { symbol: String },

    /// (clôture précédente, dernière clôture) d'un ticker Yahoo Finance
    QuoteHistory { symbol: String },

    /// Nombre extrait d'une page HTML par regex
    ///
    /// La regex porte sur le texte du premier élément qui correspond au
    /// sélecteur CSS `selector`, ou sur le texte de toute la page.
    Scrape {
        url: String,
        pattern: String,
        #[serde(default)]
        selector: Option<String>,
        /// Moyenne de tous les nombres du match au lieu du groupe 1
        #[serde(default)]
        average: bool,
    },

    /// Essaie `primary`, puis `secondary` si le premier échoue
    Fallback {
        primary: Box<Source>,
        secondary: Box<Source>,
    },
}

fn default_change_periods() -> usize {
    12
}

fn default_ratio_scale() -> f64 {
    100.0
}

impl Source {
    /// Forme de la valeur produite par cette source
    pub fn shape(&self) -> Shape {
        match self {
            Source::QuoteHistory { .. } => Shape::Triple,
            Source::Fallback { primary, .. } => primary.shape(),
            _ => Shape::Scalar,
        }
    }

    /// Nom court de la source pour les logs et l'UI
    pub fn label(&self) -> String {
        match self {
            Source::Fred { series } => format!("FRED {}", series),
            Source::FredChange { series, .. } => format!("FRED {} (change)", series),
            Source::FredRatio { numerator, denominator, .. } => {
                format!("FRED {}/{}", numerator, denominator)
            }
            Source::WorldBank { indicator, country } => {
                format!("World Bank {} ({})", indicator, country)
            }
            Source::Quote { symbol } | Source::QuoteHistory { symbol } => {
                format!("Yahoo {}", symbol)
            }
            Source::Scrape { url, .. } => format!("scrape {}", url),
            Source::Fallback { primary, secondary } => {
                format!("{} | {}", primary.label(), secondary.label())
            }
        }
    }
}

// ============================================================================
// Structure : Indicator
// ============================================================================

/// Descripteur d'un indicateur économique
///
/// Le seuil est séparé en deux champs : `threshold` (numérique, comparé aux
/// valeurs pour les alertes) et `hint` (règle en texte libre, affichée
/// seulement).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub name: String,

    #[serde(default)]
    pub category: Category,

    pub source: Source,

    /// Forme forcée ; par défaut celle de la source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Shape>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,

    #[serde(default)]
    pub unit: String,

    #[serde(default)]
    pub description: String,
}

impl Indicator {
    pub fn new(name: impl Into<String>, category: Category, source: Source) -> Self {
        Self {
            name: name.into(),
            category,
            source,
            shape: None,
            threshold: None,
            hint: None,
            unit: String::new(),
            description: String::new(),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Forme attendue de la valeur
    pub fn shape(&self) -> Shape {
        self.shape.unwrap_or_else(|| self.source.shape())
    }

    /// Texte du seuil pour l'affichage : le nombre, sinon la règle texte
    pub fn threshold_label(&self) -> String {
        match (self.threshold, &self.hint) {
            (Some(t), _) => format!("{}", t),
            (None, Some(hint)) => hint.clone(),
            (None, None) => "-".to_string(),
        }
    }
}

// ============================================================================
// Structure : Registry
// ============================================================================

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("duplicate indicator name: {0}")]
    Duplicate(String),

    #[error("indicator name must not be empty")]
    EmptyName,
}

/// Ensemble ordonné et immuable des indicateurs
#[derive(Debug, Clone, Default)]
pub struct Registry {
    indicators: Vec<Indicator>,
    index: HashMap<String, usize>,
}

impl Registry {
    /// Construit le registre en refusant les noms vides ou dupliqués
    pub fn new(indicators: Vec<Indicator>) -> Result<Self, RegistryError> {
        let mut index = HashMap::with_capacity(indicators.len());

        for (position, indicator) in indicators.iter().enumerate() {
            if indicator.name.trim().is_empty() {
                return Err(RegistryError::EmptyName);
            }
            if index.insert(indicator.name.clone(), position).is_some() {
                return Err(RegistryError::Duplicate(indicator.name.clone()));
            }
        }

        Ok(Self { indicators, index })
    }

    pub fn get(&self, name: &str) -> Option<&Indicator> {
        self.index.get(name).map(|&i| &self.indicators[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Position d'un indicateur dans l'ordre du registre
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Indicator> {
        self.indicators.iter()
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================
