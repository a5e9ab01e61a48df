/**
 * STORES - Interfaces de persistance du moteur
 *
 * RÔLE :
 * Le moteur ne connaît les tables qu'à travers trois traits, un par
 * collaborateur externe :
 * - LocationStore   = `pp_location` / `io_location` (lookups par serial / MAC)
 * - ConnectionStore = `pp_connectivity` (paires brutes PP ↔ IO)
 * - MapStore        = `connectivity_map` (lignes enrichies)
 *
 * UNICITÉ :
 * Chaque insertion est vérifiée contre les index d'unicité du store
 * (`StoreError::Conflict`). C'est le store, pas l'invocation, qui garantit
 * qu'un port ou une MAC n'est consommé qu'une fois, même avec plusieurs
 * invocations concurrentes.
 *
 * IMPLÉMENTATIONS :
 * - MemoryStore   : tables en mémoire (tests, mode `memory`)
 * - JsonFileStore : mêmes tables, réécrites sur disque après chaque insertion
 */

pub mod json;
pub mod memory;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::models::{Connection, IoLocation, Location, MapRow, PpLocation};

pub use json::JsonFileStore;
pub use memory::{MemoryStore, Tables};

pub trait LocationStore: Send + Sync {
    /// Emplacements des PP demandés ; les serials inconnus sont absents de la map
    fn pp_locations(&self, serials: &[String]) -> Result<HashMap<String, Location>, StoreError>;

    /// Types des IO demandées ; les MAC inconnues sont absentes de la map
    fn io_types(&self, macs: &[String]) -> Result<HashMap<String, String>, StoreError>;

    fn pp_location(&self, serial: &str) -> Result<Option<PpLocation>, StoreError>;

    fn io_location(&self, mac: &str) -> Result<Option<IoLocation>, StoreError>;

    fn all_pp_locations(&self) -> Result<Vec<PpLocation>, StoreError>;

    fn all_io_locations(&self) -> Result<Vec<IoLocation>, StoreError>;

    fn insert_pp_location(&self, row: &PpLocation) -> Result<(), StoreError>;

    fn insert_io_location(&self, row: &IoLocation) -> Result<(), StoreError>;
}

pub trait ConnectionStore: Send + Sync {
    fn all_connections(&self) -> Result<Vec<Connection>, StoreError>;

    fn connections_for_pp(&self, serial: &str) -> Result<Vec<Connection>, StoreError>;

    fn connections_for_io(&self, mac: &str) -> Result<Vec<Connection>, StoreError>;

    /// Rejette toute connexion dont le port PP ou IO est déjà câblé
    fn insert_connection(&self, conn: &Connection) -> Result<(), StoreError>;
}

pub trait MapStore: Send + Sync {
    /// Ports switch déjà attribués, par nom de switch
    fn switch_port_usage(&self) -> Result<HashMap<String, BTreeSet<u32>>, StoreError>;

    fn device_macs(&self) -> Result<HashSet<String>, StoreError>;

    /// Rejette une seconde ligne pour la même connexion, un couple
    /// (switch_name, switch_port) ou une device_mac déjà pris
    fn insert_map_row(&self, row: &MapRow) -> Result<(), StoreError>;

    fn query_map(&self, query: &MapQuery) -> Result<Vec<MapRow>, StoreError>;
}

/// Filtre de lecture de la carte de connectivité
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapQuery {
    All,
    Switch(String),
    PatchPanel {
        pp_serial_no: String,
        ru: Option<u32>,
        pp_port: Option<u32>,
    },
    Outlet {
        io_mac: String,
        io_port: Option<u32>,
    },
}

impl MapQuery {
    pub fn matches(&self, row: &MapRow) -> bool {
        match self {
            MapQuery::All => true,
            MapQuery::Switch(name) => row.switch_name.as_deref() == Some(name.as_str()),
            MapQuery::PatchPanel { pp_serial_no, ru, pp_port } => {
                row.pp_serial_no == *pp_serial_no
                    && ru.map_or(true, |ru| row.ru == ru)
                    && pp_port.map_or(true, |p| row.pp_port == p)
            }
            MapQuery::Outlet { io_mac, io_port } => {
                row.io_mac == *io_mac && io_port.map_or(true, |p| row.io_port == p)
            }
        }
    }
}

/// Les trois stores vus par le moteur
#[derive(Clone)]
pub struct Stores {
    pub locations: Arc<dyn LocationStore>,
    pub connections: Arc<dyn ConnectionStore>,
    pub map: Arc<dyn MapStore>,
}

impl Stores {
    /// Un seul backend qui sert les trois tables
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: LocationStore + ConnectionStore + MapStore + 'static,
    {
        Self {
            locations: store.clone(),
            connections: store.clone(),
            map: store,
        }
    }
}
