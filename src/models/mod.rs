// ============================================================================
// Module : models
// ============================================================================
// Structures de données : indicateurs, valeurs, snapshots
// ============================================================================

pub mod indicator; // Descripteurs d'indicateurs + registre
pub mod snapshot;  // Snapshot des valeurs
pub mod value;     // Valeur scalaire / triplet + placeholder

// Re-export des structures principales
// On peut faire : use econmirror::models::Snapshot;
pub use indicator::{Category, Indicator, Registry, RegistryError, Source};
pub use snapshot::{Entry, Snapshot};
pub use value::{Shape, Value};
