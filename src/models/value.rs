// ============================================================================
// Structure : Value
// ============================================================================
// Valeur d'un indicateur : un scalaire, ou un triplet ordonné
// (précédent, actuel, prévision)
//
// CONCEPTS RUST :
// 1. Option<f64> au lieu de NaN : le placeholder est un None typé,
//    comparable avec == (NaN != NaN) et sérialisable en JSON (null)
// 2. #[serde(untagged)] : le JSON stocké est un nombre, null ou un tableau
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

/// Forme attendue de la valeur d'un indicateur
///
/// Sert à construire le bon placeholder quand le fetch échoue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    /// Un seul nombre
    #[default]
    Scalar,

    /// (précédent, actuel, prévision)
    Triple,
}

/// Valeur d'un indicateur dans un snapshot
///
/// Un slot à `None` est le marqueur "indisponible".
/// Format JSON : `4.33`, `null` ou `[4.1, 4.33, null]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(Option<f64>),
    Triple([Option<f64>; 3]),
}

impl Value {
    /// Crée un scalaire (NaN et infinis deviennent None)
    pub fn scalar(value: f64) -> Self {
        Value::Scalar(finite(value))
    }

    /// Crée un triplet (précédent, actuel, prévision)
    pub fn triple(previous: Option<f64>, current: Option<f64>, forecast: Option<f64>) -> Self {
        Value::Triple([
            previous.and_then(finite),
            current.and_then(finite),
            forecast.and_then(finite),
        ])
    }

    /// Placeholder pour une forme donnée
    pub fn placeholder(shape: Shape) -> Self {
        match shape {
            Shape::Scalar => Value::Scalar(None),
            Shape::Triple => Value::Triple([None, None, None]),
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            Value::Scalar(_) => Shape::Scalar,
            Value::Triple(_) => Shape::Triple,
        }
    }

    /// Vrai si aucune donnée n'est disponible
    pub fn is_placeholder(&self) -> bool {
        match self {
            Value::Scalar(v) => v.is_none(),
            Value::Triple(slots) => slots.iter().all(Option::is_none),
        }
    }

    /// Valeur "actuelle" : le scalaire, ou le slot du milieu du triplet
    ///
    /// C'est la valeur utilisée pour le graphique et la comparaison au seuil.
    pub fn current(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => *v,
            Value::Triple([_, current, _]) => *current,
        }
    }

    pub fn previous(&self) -> Option<f64> {
        match self {
            Value::Scalar(_) => None,
            Value::Triple([previous, _, _]) => *previous,
        }
    }

    pub fn forecast(&self) -> Option<f64> {
        match self {
            Value::Scalar(_) => None,
            Value::Triple([_, _, forecast]) => *forecast,
        }
    }

    /// Encode la valeur pour la colonne `payload`
    pub fn to_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Décode la colonne `payload`
    pub fn from_payload(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Affichage compact : "4.33", "unavailable", "4.10 → 4.33 (→ 4.50)"
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_placeholder() {
            return write!(f, "unavailable");
        }

        let slot = |v: Option<f64>| match v {
            Some(v) => format!("{:.2}", v),
            None => "n/a".to_string(),
        };

        match self {
            Value::Scalar(v) => write!(f, "{}", slot(*v)),
            Value::Triple([previous, current, forecast]) => {
                write!(f, "{} → {}", slot(*previous), slot(*current))?;
                if forecast.is_some() {
                    write!(f, " (→ {})", slot(*forecast))?;
                }
                Ok(())
            }
        }
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================
