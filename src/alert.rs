// ============================================================================
// Alertes : dépassement de seuil
// ============================================================================
// Seuls les seuils numériques sont comparés. Une règle en texte libre
// (`hint`) ou une valeur indisponible donne Indeterminate, jamais une
// comparaison.
// ============================================================================

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::models::{Indicator, Registry, Snapshot, Value};

pub const ALERT_SUBJECT: &str = "Econ Breach Alert";

/// Résultat de la comparaison valeur / seuil
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdCheck {
    /// Valeur strictement au-dessus du seuil
    Breach { value: f64, threshold: f64 },
    Within { value: f64, threshold: f64 },
    /// Pas de seuil numérique, ou pas de valeur
    Indeterminate,
}

impl ThresholdCheck {
    pub fn is_breach(&self) -> bool {
        matches!(self, ThresholdCheck::Breach { .. })
    }
}

/// Compare la valeur actuelle au seuil numérique de l'indicateur
pub fn check(indicator: &Indicator, value: &Value) -> ThresholdCheck {
    let Some(threshold) = indicator.threshold.filter(|t| t.is_finite()) else {
        return ThresholdCheck::Indeterminate;
    };
    let Some(value) = value.current() else {
        return ThresholdCheck::Indeterminate;
    };

    if value > threshold {
        ThresholdCheck::Breach { value, threshold }
    } else {
        ThresholdCheck::Within { value, threshold }
    }
}

/// Un dépassement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breach {
    pub name: String,
    pub value: f64,
    pub threshold: f64,
    pub unit: String,
}

/// Tous les dépassements du snapshot, dans l'ordre du snapshot
///
/// Les entrées absentes du registre n'ont pas de seuil : ignorées.
pub fn breaches(snapshot: &Snapshot, registry: &Registry) -> Vec<Breach> {
    snapshot
        .iter()
        .filter_map(|(name, entry)| {
            let indicator = registry.get(name)?;
            match check(indicator, &entry.value) {
                ThresholdCheck::Breach { value, threshold } => Some(Breach {
                    name: name.to_string(),
                    value,
                    threshold,
                    unit: indicator.unit.clone(),
                }),
                _ => None,
            }
        })
        .collect()
}

/// Message d'alerte prêt à envoyer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertMessage {
    pub subject: String,
    pub text: String,
}

/// Compose le message ; None s'il n'y a aucun dépassement
pub fn compose(breaches: &[Breach]) -> Option<AlertMessage> {
    if breaches.is_empty() {
        return None;
    }

    let lines: Vec<String> = breaches
        .iter()
        .map(|b| {
            let unit = if b.unit.is_empty() { String::new() } else { format!(" {}", b.unit) };
            format!("- {}: {:.2}{} (threshold {}{})", b.name, b.value, unit, b.threshold, unit)
        })
        .collect();

    Some(AlertMessage {
        subject: ALERT_SUBJECT.to_string(),
        text: format!("Flood: {} indicator(s) over threshold\n{}", breaches.len(), lines.join("\n")),
    })
}

// ============================================================================
// Envoi
// ============================================================================

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("notification endpoint returned HTTP {0}")]
    Status(u16),
}

/// Canal d'envoi des alertes
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &AlertMessage) -> Result<(), NotifyError>;
}

/// POST JSON {subject, text} vers un webhook (Slack, ntfy, ...)
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[instrument(skip(self, message), fields(url = %self.url))]
    async fn send(&self, message: &AlertMessage) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(message).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Webhook rejected alert");
            return Err(NotifyError::Status(status.as_u16()));
        }
        info!("Alert delivered to webhook");
        Ok(())
    }
}

/// Écrit l'alerte dans les logs (pas de webhook configuré)
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &AlertMessage) -> Result<(), NotifyError> {
        warn!(subject = %message.subject, text = %message.text, "Threshold breach");
        Ok(())
    }
}

/// Évalue le snapshot et envoie l'alerte s'il y a des dépassements
///
/// Retourne le nombre de dépassements signalés.
pub async fn notify_breaches(
    snapshot: &Snapshot,
    registry: &Registry,
    notifier: &dyn Notifier,
) -> Result<usize, NotifyError> {
    let found = breaches(snapshot, registry);
    let Some(message) = compose(&found) else {
        return Ok(0);
    };
    notifier.send(&message).await?;
    Ok(found.len())
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Entry, Source};
    use chrono::Utc;
    use std::sync::Mutex;

    fn vix() -> Indicator {
        Indicator::new("VIX", Category::Risk, Source::Quote { symbol: "^VIX".to_string() })
            .with_threshold(20.0)
    }

    #[test]
    fn test_numeric_threshold() {
        assert!(check(&vix(), &Value::scalar(25.0)).is_breach());
        assert_eq!(
            check(&vix(), &Value::scalar(20.0)),
            ThresholdCheck::Within { value: 20.0, threshold: 20.0 }
        );
    }

    #[test]
    fn test_textual_threshold_is_indeterminate() {
        let indicator = Indicator::new("Power", Category::Geo, Source::Quote { symbol: "X".to_string() })
            .with_hint("composite strength peak/drop");
        assert_eq!(check(&indicator, &Value::scalar(1e9)), ThresholdCheck::Indeterminate);
    }

    #[test]
    fn test_placeholder_is_indeterminate() {
        assert_eq!(check(&vix(), &Value::Scalar(None)), ThresholdCheck::Indeterminate);
        let triple = vix().with_threshold(1.0);
        assert!(check(&triple, &Value::triple(Some(0.5), Some(2.0), None)).is_breach());
    }

    fn snapshot() -> (Snapshot, Registry) {
        let registry = Registry::new(vec![
            vix().with_unit("pts"),
            Indicator::new("GDP", Category::ShortTermDebt, Source::Fred { series: "GDP".to_string() })
                .with_hint("harvest output jobs"),
        ])
        .unwrap();
        let mut snapshot = Snapshot::new(Utc::now());
        snapshot.insert("VIX", Entry::ok(Value::scalar(31.5)));
        snapshot.insert("GDP", Entry::ok(Value::scalar(30_000.0)));
        snapshot.insert("Orphan", Entry::ok(Value::scalar(99.0)));
        (snapshot, registry)
    }

    #[test]
    fn test_breaches_and_message() {
        let (snapshot, registry) = snapshot();
        let found = breaches(&snapshot, &registry);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "VIX");

        let message = compose(&found).unwrap();
        assert_eq!(message.subject, ALERT_SUBJECT);
        assert!(message.text.contains("- VIX: 31.50 pts (threshold 20 pts)"));
        assert!(compose(&[]).is_none());
    }

    struct Recorder(Mutex<Vec<AlertMessage>>);

    #[async_trait]
    impl Notifier for Recorder {
        async fn send(&self, message: &AlertMessage) -> Result<(), NotifyError> {
            self.0.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_notify_breaches_sends_once() {
        let (snapshot, registry) = snapshot();
        let recorder = Recorder(Mutex::new(Vec::new()));

        let sent = notify_breaches(&snapshot, &registry, &recorder).await.unwrap();

        assert_eq!(sent, 1);
        assert_eq!(recorder.0.lock().unwrap().len(), 1);
    }
}
