// ============================================================================
// Structure : Snapshot
// ============================================================================
// Ensemble des valeurs (ou placeholders) de tous les indicateurs à un
// instant donné
// ============================================================================

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::models::Value;

/// Une ligne du snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub value: Value,

    /// Raison de l'échec quand `value` est un placeholder issu d'une erreur
    pub error: Option<String>,
}

impl Entry {
    pub fn ok(value: Value) -> Self {
        Self { value, error: None }
    }

    pub fn failed(value: Value, error: impl Into<String>) -> Self {
        Self {
            value,
            error: Some(error.into()),
        }
    }

    pub fn is_available(&self) -> bool {
        !self.value.is_placeholder()
    }
}

/// Snapshot complet, indexé par nom d'indicateur
///
/// `order` garde l'ordre du registre pour l'affichage, `entries` garantit
/// l'unicité des noms.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    entries: BTreeMap<String, Entry>,
    order: Vec<String>,
}

impl Snapshot {
    pub fn new(taken_at: DateTime<Utc>) -> Self {
        Self {
            taken_at,
            entries: BTreeMap::new(),
            order: Vec::new(),
        }
    }

    /// Ajoute ou remplace une entrée (last-write-wins)
    pub fn insert(&mut self, name: impl Into<String>, entry: Entry) {
        let name = name.into();
        if self.entries.insert(name.clone(), entry).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.entries.get(name).map(|e| &e.value)
    }

    /// Itère dans l'ordre d'insertion
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.order
            .iter()
            .filter_map(move |name| self.entries.get(name).map(|e| (name.as_str(), e)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Nombre d'entrées sans donnée
    pub fn unavailable_count(&self) -> usize {
        self.entries.values().filter(|e| !e.is_available()).count()
    }

    /// Âge du snapshot par rapport à `now`
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.taken_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_last_write_wins() {
        let mut snapshot = Snapshot::new(Utc::now());
        snapshot.insert("A", Entry::ok(Value::scalar(1.0)));
        snapshot.insert("B", Entry::ok(Value::scalar(2.0)));
        snapshot.insert("A", Entry::ok(Value::scalar(3.0)));

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.value("A"), Some(&Value::scalar(3.0)));

        let names: Vec<&str> = snapshot.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_unavailable_count() {
        let mut snapshot = Snapshot::new(Utc::now());
        snapshot.insert("A", Entry::ok(Value::scalar(1.0)));
        snapshot.insert("B", Entry::failed(Value::Scalar(None), "timeout"));

        assert_eq!(snapshot.unavailable_count(), 1);
        assert_eq!(snapshot.get("B").unwrap().error.as_deref(), Some("timeout"));
    }
}
