// ============================================================================
// EconMirror - Library
// ============================================================================
// Expose les modules publics pour le binaire et les tests d'intégration
// ============================================================================

pub mod alert;   // Seuils et notifications
pub mod api;     // Sources de données (FRED, World Bank, Yahoo, scraping)
pub mod app;     // État de l'application
pub mod cache;   // Cache TTL du snapshot
pub mod catalog; // Indicateurs par défaut
pub mod config;  // Configuration TOML + env
pub mod fanout;  // Exécution parallèle bornée des fetchs
pub mod models;  // Structures de données
pub mod store;   // Persistance SQLite
pub mod ui;      // Interface utilisateur
