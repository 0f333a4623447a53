// ============================================================================
// Structure : App
// ============================================================================
// Gère l'état global du dashboard TUI
//
// PATTERN : "Application State"
// - Tous les composants de l'UI lisent depuis App
// - Le worker thread envoie des résultats, la boucle principale les applique
//   via les méthodes de App
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::alert::{self, ThresholdCheck};
use crate::models::{Category, Indicator, Registry, Snapshot, Value};

// ============================================================================
// Enum : Screen
// ============================================================================

/// Écrans de l'application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    /// Vue principale : tableau de tous les indicateurs
    Dashboard,

    /// Détail de l'indicateur sélectionné
    Detail,
}

/// Une ligne du tableau : valeur + métadonnées du registre
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRow {
    pub name: String,
    pub category: Option<Category>,
    pub value: Value,
    pub error: Option<String>,
    pub threshold: Option<f64>,
    pub threshold_label: String,
    pub unit: String,
    pub description: String,
    pub check: ThresholdCheck,
}

impl IndicatorRow {
    fn new(name: &str, value: Value, error: Option<String>, indicator: Option<&Indicator>) -> Self {
        let check = indicator
            .map(|i| alert::check(i, &value))
            .unwrap_or(ThresholdCheck::Indeterminate);

        Self {
            name: name.to_string(),
            category: indicator.map(|i| i.category),
            threshold: indicator.and_then(|i| i.threshold),
            threshold_label: indicator.map(|i| i.threshold_label()).unwrap_or_else(|| "-".to_string()),
            unit: indicator.map(|i| i.unit.clone()).unwrap_or_default(),
            description: indicator.map(|i| i.description.clone()).unwrap_or_default(),
            value,
            error,
            check,
        }
    }

    pub fn is_available(&self) -> bool {
        !self.value.is_placeholder()
    }
}

/// Message de statut affiché dans le footer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    Info(String),
    Error(String),
}

/// État principal de l'application
pub struct App {
    /// Indique si l'application doit continuer à tourner
    pub running: bool,

    pub registry: Arc<Registry>,

    /// Dernier snapshot reçu du worker (None tant que rien n'est chargé)
    pub snapshot: Option<Snapshot>,

    /// Lignes calculées depuis le snapshot
    pub rows: Vec<IndicatorRow>,

    pub selected_index: usize,

    pub current_screen: Screen,

    /// Two-step quit : première pression de 'q' = confirmation demandée
    pub confirm_quit: bool,

    /// Fanout ou lecture du store en cours
    pub is_loading: bool,

    pub loading_message: Option<String>,

    /// Dernier statut (erreur du store, alerte envoyée, ...)
    pub status: Option<StatusMessage>,

    /// Durée de fraîcheur : au-delà, la boucle demande un rechargement
    pub ttl: Duration,
}

impl App {
    pub fn new(registry: Arc<Registry>, ttl: Duration) -> Self {
        Self {
            running: true,
            registry,
            snapshot: None,
            rows: Vec::new(),
            selected_index: 0,
            current_screen: Screen::Dashboard,
            confirm_quit: false,
            is_loading: false,
            loading_message: None,
            status: None,
            ttl,
        }
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Remplace le snapshot affiché et recalcule les lignes
    pub fn set_snapshot(&mut self, snapshot: Snapshot) {
        self.rows = snapshot
            .iter()
            .map(|(name, entry)| {
                IndicatorRow::new(name, entry.value.clone(), entry.error.clone(), self.registry.get(name))
            })
            .collect();
        self.snapshot = Some(snapshot);

        // Garde la sélection dans les bornes
        let max_index = self.rows.len().saturating_sub(1);
        self.selected_index = self.selected_index.min(max_index);
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.status = Some(StatusMessage::Error(message.into()));
    }

    pub fn set_info(&mut self, message: impl Into<String>) {
        self.status = Some(StatusMessage::Info(message.into()));
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    /// Âge du snapshot affiché
    pub fn snapshot_age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.snapshot.as_ref().map(|s| s.age(now))
    }

    /// Vrai quand le snapshot affiché a dépassé le TTL (et rien n'est en cours)
    ///
    /// Pas de rechargement automatique après une erreur du store : il faut
    /// un refresh manuel.
    pub fn needs_reload(&self, now: DateTime<Utc>) -> bool {
        if self.is_loading || matches!(self.status, Some(StatusMessage::Error(_))) {
            return false;
        }
        match self.snapshot_age(now).and_then(|age| age.to_std().ok()) {
            Some(age) => age >= self.ttl,
            None => false,
        }
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    pub fn navigate_up(&mut self) {
        self.selected_index = self.selected_index.saturating_sub(1);
    }

    pub fn navigate_down(&mut self) {
        let max_index = self.rows.len().saturating_sub(1);
        self.selected_index = (self.selected_index + 1).min(max_index);
    }

    pub fn selected_row(&self) -> Option<&IndicatorRow> {
        self.rows.get(self.selected_index)
    }

    pub fn show_detail(&mut self) {
        if self.selected_row().is_some() {
            self.current_screen = Screen::Detail;
        }
    }

    pub fn show_dashboard(&mut self) {
        self.current_screen = Screen::Dashboard;
    }

    pub fn is_on_dashboard(&self) -> bool {
        self.current_screen == Screen::Dashboard
    }

    pub fn is_on_detail(&self) -> bool {
        self.current_screen == Screen::Detail
    }

    // ========================================================================
    // Confirmation de quit
    // ========================================================================

    pub fn request_quit(&mut self) {
        self.confirm_quit = true;
    }

    pub fn cancel_quit(&mut self) {
        self.confirm_quit = false;
    }

    pub fn is_awaiting_quit_confirmation(&self) -> bool {
        self.confirm_quit
    }

    // ========================================================================
    // Chargement
    // ========================================================================

    pub fn start_loading(&mut self, message: Option<String>) {
        self.is_loading = true;
        self.loading_message = message;
    }

    pub fn stop_loading(&mut self) {
        self.is_loading = false;
        self.loading_message = None;
    }

    pub fn is_loading_data(&self) -> bool {
        self.is_loading
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================
