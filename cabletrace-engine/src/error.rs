//! Erreurs du moteur : entrée invalide, store, étape en échec.

use serde::Serialize;

use crate::models::Connection;

/// Requête ou enregistrement rejeté avant tout travail
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("PP list is empty")]
    NoPatchPanels,
    #[error("IO list is empty")]
    NoOutlets,
    #[error("blank pp_serial_no at index {0}")]
    BlankSerial(usize),
    #[error("blank io_mac at index {0}")]
    BlankMac(usize),
    #[error("io_type at index {0} exceeds {max} ports", max = crate::universe::MAX_IO_PORTS)]
    PortCountTooLarge(usize),
    #[error("invalid QR code data: missing {0}")]
    MissingIdentity(&'static str),
    #[error("missing required location field: {0}")]
    MissingLocationField(&'static str),
}

/// Index d'unicité appliqués par les stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UniqueIndex {
    PpPort,
    IoPort,
    SwitchPort,
    DeviceMac,
    MappedConnection,
    PpSerial,
    IoMac,
}

impl std::fmt::Display for UniqueIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UniqueIndex::PpPort => "pp_port",
            UniqueIndex::IoPort => "io_port",
            UniqueIndex::SwitchPort => "switch_port",
            UniqueIndex::DeviceMac => "device_mac",
            UniqueIndex::MappedConnection => "mapped_connection",
            UniqueIndex::PpSerial => "pp_serial_no",
            UniqueIndex::IoMac => "io_mac",
        };
        f.write_str(name)
    }
}

/// Erreurs possibles lors des opérations sur les stores
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique index {index} violated by {key}")]
    Conflict { index: UniqueIndex, key: String },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn conflict_index(&self) -> Option<UniqueIndex> {
        match self {
            StoreError::Conflict { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Étape de l'invocation qui a produit une erreur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Pairing,
    Aggregation,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Pairing => f.write_str("pairing"),
            Stage::Aggregation => f.write_str("aggregation"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    Input(#[from] InputError),
    #[error("{stage} stage failed: {source}")]
    Store {
        stage: Stage,
        #[source]
        source: StoreError,
    },
    #[error("aggregation failed after {} committed connections: {source}", committed.len())]
    Aggregation {
        committed: Vec<Connection>,
        #[source]
        source: StoreError,
    },
}

impl EngineError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            EngineError::Input(_) => None,
            EngineError::Store { stage, .. } => Some(*stage),
            EngineError::Aggregation { .. } => Some(Stage::Aggregation),
        }
    }
}

/// Écriture d'une ligne rejetée ; le reste du lot continue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    pub stage: Stage,
    pub connection: Connection,
    pub conflict: Option<UniqueIndex>,
    pub error: String,
}

impl RowFailure {
    pub fn new(stage: Stage, connection: Connection, error: &StoreError) -> Self {
        Self {
            stage,
            connection,
            conflict: error.conflict_index(),
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_message_names_index() {
        let err = StoreError::Conflict { index: UniqueIndex::SwitchPort, key: "SW_1#3".into() };
        assert_eq!(err.to_string(), "unique index switch_port violated by SW_1#3");
        assert_eq!(err.conflict_index(), Some(UniqueIndex::SwitchPort));
    }

    #[test]
    fn test_engine_error_stage() {
        let err = EngineError::Aggregation {
            committed: vec![],
            source: StoreError::Unavailable("down".into()),
        };
        assert_eq!(err.stage(), Some(Stage::Aggregation));
        assert_eq!(EngineError::from(InputError::NoOutlets).stage(), None);
    }
}
