/**
 * STORE FICHIER JSON - Persistance locale des quatre tables
 *
 * FONCTIONNEMENT :
 * - Un seul document JSON : { pp_location, io_location, pp_connectivity, connectivity_map }
 * - Cache en mémoire (mêmes tables et index que MemoryStore)
 * - Chaque insertion acceptée est réécrite sur disque ; si l'écriture échoue,
 *   l'insertion est annulée en mémoire pour garder cache et disque alignés
 */

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::memory::Tables;
use super::{ConnectionStore, LocationStore, MapQuery, MapStore};
use crate::error::StoreError;
use crate::models::{Connection, IoLocation, Location, MapRow, PpLocation};

pub struct JsonFileStore {
    /// Chemin du fichier de stockage JSON
    storage_path: PathBuf,
    tables: Mutex<Tables>,
}

impl JsonFileStore {
    /// Ouvre (ou crée) le fichier de stockage
    pub fn open<P: Into<PathBuf>>(storage_path: P) -> Result<Self, StoreError> {
        let path = storage_path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let store = Self {
            storage_path: path,
            tables: Mutex::new(Tables::default()),
        };
        store.load_from_disk()?;
        info!(path = %store.storage_path.display(), "json store opened");
        Ok(store)
    }

    fn load_from_disk(&self) -> Result<(), StoreError> {
        if !self.storage_path.exists() {
            let empty = serde_json::to_string_pretty(&Tables::default())?;
            fs::write(&self.storage_path, empty)?;
        }

        let content = fs::read_to_string(&self.storage_path)?;
        let mut tables: Tables = if content.trim().is_empty() {
            Tables::default()
        } else {
            serde_json::from_str(&content)?
        };
        tables.reindex();
        debug!(
            connections = tables.pp_connectivity.len(),
            map_rows = tables.connectivity_map.len(),
            "json store loaded"
        );
        *self.tables.lock() = tables;
        Ok(())
    }

    fn save_to_disk(&self, tables: &Tables) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(tables)?;
        fs::write(&self.storage_path, json)?;
        Ok(())
    }

    /// Insère via `insert`, persiste, annule via `undo` si l'écriture échoue
    fn write_through(
        &self,
        insert: impl FnOnce(&mut Tables) -> Result<(), StoreError>,
        undo: impl FnOnce(&mut Tables),
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        insert(&mut *tables)?;
        if let Err(e) = self.save_to_disk(&*tables) {
            undo(&mut *tables);
            return Err(e);
        }
        Ok(())
    }
}

impl LocationStore for JsonFileStore {
    fn pp_locations(&self, serials: &[String]) -> Result<HashMap<String, Location>, StoreError> {
        Ok(self.tables.lock().pp_locations(serials))
    }

    fn io_types(&self, macs: &[String]) -> Result<HashMap<String, String>, StoreError> {
        Ok(self.tables.lock().io_types(macs))
    }

    fn pp_location(&self, serial: &str) -> Result<Option<PpLocation>, StoreError> {
        Ok(self.tables.lock().find_pp_location(serial))
    }

    fn io_location(&self, mac: &str) -> Result<Option<IoLocation>, StoreError> {
        Ok(self.tables.lock().find_io_location(mac))
    }

    fn all_pp_locations(&self) -> Result<Vec<PpLocation>, StoreError> {
        Ok(self.tables.lock().pp_location.clone())
    }

    fn all_io_locations(&self) -> Result<Vec<IoLocation>, StoreError> {
        Ok(self.tables.lock().io_location.clone())
    }

    fn insert_pp_location(&self, row: &PpLocation) -> Result<(), StoreError> {
        self.write_through(|t| t.insert_pp_location(row), Tables::pop_pp_location)
    }

    fn insert_io_location(&self, row: &IoLocation) -> Result<(), StoreError> {
        self.write_through(|t| t.insert_io_location(row), Tables::pop_io_location)
    }
}

impl ConnectionStore for JsonFileStore {
    fn all_connections(&self) -> Result<Vec<Connection>, StoreError> {
        Ok(self.tables.lock().pp_connectivity.clone())
    }

    fn connections_for_pp(&self, serial: &str) -> Result<Vec<Connection>, StoreError> {
        Ok(self.tables.lock().connections_for_pp(serial))
    }

    fn connections_for_io(&self, mac: &str) -> Result<Vec<Connection>, StoreError> {
        Ok(self.tables.lock().connections_for_io(mac))
    }

    fn insert_connection(&self, conn: &Connection) -> Result<(), StoreError> {
        self.write_through(|t| t.insert_connection(conn), Tables::pop_connection)
    }
}

impl MapStore for JsonFileStore {
    fn switch_port_usage(&self) -> Result<HashMap<String, BTreeSet<u32>>, StoreError> {
        Ok(self.tables.lock().switch_port_usage())
    }

    fn device_macs(&self) -> Result<HashSet<String>, StoreError> {
        Ok(self.tables.lock().device_macs())
    }

    fn insert_map_row(&self, row: &MapRow) -> Result<(), StoreError> {
        self.write_through(|t| t.insert_map_row(row), Tables::pop_map_row)
    }

    fn query_map(&self, query: &MapQuery) -> Result<Vec<MapRow>, StoreError> {
        Ok(self.tables.lock().query_map(query))
    }
}
