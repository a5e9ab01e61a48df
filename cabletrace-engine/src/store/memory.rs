use std::collections::{BTreeSet, HashMap, HashSet};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{ConnectionStore, LocationStore, MapQuery, MapStore};
use crate::error::{StoreError, UniqueIndex};
use crate::models::{Connection, IoKey, IoLocation, Location, MapRow, PpKey, PpLocation};

/// Les quatre tables + leurs index d'unicité (reconstruits au chargement)
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Tables {
    #[serde(default)]
    pub pp_location: Vec<PpLocation>,
    #[serde(default)]
    pub io_location: Vec<IoLocation>,
    #[serde(default)]
    pub pp_connectivity: Vec<Connection>,
    #[serde(default)]
    pub connectivity_map: Vec<MapRow>,
    #[serde(skip)]
    index: Indexes,
}

#[derive(Debug, Default, Clone)]
struct Indexes {
    pp_serials: HashSet<String>,
    io_macs: HashSet<String>,
    pp_ports: HashSet<PpKey>,
    io_ports: HashSet<IoKey>,
    mapped: HashSet<PpKey>,
    switch_ports: HashSet<(String, u32)>,
    device_macs: HashSet<String>,
}

fn pp_key_label(key: &PpKey) -> String {
    format!("{}/{}/{}", key.0, key.1, key.2)
}

impl Tables {
    /// Recalcule les index après désérialisation
    pub fn reindex(&mut self) {
        let mut index = Indexes::default();
        for row in &self.pp_location {
            index.pp_serials.insert(row.pp_serial_no.clone());
        }
        for row in &self.io_location {
            index.io_macs.insert(row.io_mac.clone());
        }
        for conn in &self.pp_connectivity {
            index.pp_ports.insert(conn.pp_key());
            index.io_ports.insert(conn.io_key());
        }
        for row in &self.connectivity_map {
            index.mapped.insert(row.pp_key());
            if let (Some(name), Some(port)) = (&row.switch_name, row.switch_port) {
                index.switch_ports.insert((name.clone(), port));
            }
            if let Some(mac) = &row.device_mac {
                index.device_macs.insert(mac.clone());
            }
        }
        self.index = index;
    }

    pub fn insert_pp_location(&mut self, row: &PpLocation) -> Result<(), StoreError> {
        if self.index.pp_serials.contains(&row.pp_serial_no) {
            return Err(StoreError::Conflict {
                index: UniqueIndex::PpSerial,
                key: row.pp_serial_no.clone(),
            });
        }
        self.index.pp_serials.insert(row.pp_serial_no.clone());
        self.pp_location.push(row.clone());
        Ok(())
    }

    pub fn insert_io_location(&mut self, row: &IoLocation) -> Result<(), StoreError> {
        if self.index.io_macs.contains(&row.io_mac) {
            return Err(StoreError::Conflict {
                index: UniqueIndex::IoMac,
                key: row.io_mac.clone(),
            });
        }
        self.index.io_macs.insert(row.io_mac.clone());
        self.io_location.push(row.clone());
        Ok(())
    }

    pub fn insert_connection(&mut self, conn: &Connection) -> Result<(), StoreError> {
        let pp_key = conn.pp_key();
        if self.index.pp_ports.contains(&pp_key) {
            return Err(StoreError::Conflict {
                index: UniqueIndex::PpPort,
                key: pp_key_label(&pp_key),
            });
        }
        let io_key = conn.io_key();
        if self.index.io_ports.contains(&io_key) {
            return Err(StoreError::Conflict {
                index: UniqueIndex::IoPort,
                key: format!("{}/{}", io_key.0, io_key.1),
            });
        }
        self.index.pp_ports.insert(pp_key);
        self.index.io_ports.insert(io_key);
        self.pp_connectivity.push(conn.clone());
        Ok(())
    }

    pub fn insert_map_row(&mut self, row: &MapRow) -> Result<(), StoreError> {
        let pp_key = row.pp_key();
        if self.index.mapped.contains(&pp_key) {
            return Err(StoreError::Conflict {
                index: UniqueIndex::MappedConnection,
                key: pp_key_label(&pp_key),
            });
        }
        let switch_key = match (&row.switch_name, row.switch_port) {
            (Some(name), Some(port)) => Some((name.clone(), port)),
            _ => None,
        };
        if let Some(key) = &switch_key {
            if self.index.switch_ports.contains(key) {
                return Err(StoreError::Conflict {
                    index: UniqueIndex::SwitchPort,
                    key: format!("{}#{}", key.0, key.1),
                });
            }
        }
        if let Some(mac) = &row.device_mac {
            if self.index.device_macs.contains(mac) {
                return Err(StoreError::Conflict {
                    index: UniqueIndex::DeviceMac,
                    key: mac.clone(),
                });
            }
        }

        self.index.mapped.insert(pp_key);
        if let Some(key) = switch_key {
            self.index.switch_ports.insert(key);
        }
        if let Some(mac) = &row.device_mac {
            self.index.device_macs.insert(mac.clone());
        }
        self.connectivity_map.push(row.clone());
        Ok(())
    }

    /// Annule la dernière insertion d'une table (échec d'écriture disque)
    pub(crate) fn pop_pp_location(&mut self) {
        if let Some(row) = self.pp_location.pop() {
            self.index.pp_serials.remove(&row.pp_serial_no);
        }
    }

    pub(crate) fn pop_io_location(&mut self) {
        if let Some(row) = self.io_location.pop() {
            self.index.io_macs.remove(&row.io_mac);
        }
    }

    pub(crate) fn pop_connection(&mut self) {
        if let Some(conn) = self.pp_connectivity.pop() {
            self.index.pp_ports.remove(&conn.pp_key());
            self.index.io_ports.remove(&conn.io_key());
        }
    }

    pub(crate) fn pop_map_row(&mut self) {
        if let Some(row) = self.connectivity_map.pop() {
            self.index.mapped.remove(&row.pp_key());
            if let (Some(name), Some(port)) = (row.switch_name, row.switch_port) {
                self.index.switch_ports.remove(&(name, port));
            }
            if let Some(mac) = row.device_mac {
                self.index.device_macs.remove(&mac);
            }
        }
    }

    pub fn pp_locations(&self, serials: &[String]) -> HashMap<String, Location> {
        let wanted: HashSet<&str> = serials.iter().map(String::as_str).collect();
        self.pp_location
            .iter()
            .filter(|row| wanted.contains(row.pp_serial_no.as_str()))
            .map(|row| (row.pp_serial_no.clone(), row.location()))
            .collect()
    }

    pub fn io_types(&self, macs: &[String]) -> HashMap<String, String> {
        let wanted: HashSet<&str> = macs.iter().map(String::as_str).collect();
        self.io_location
            .iter()
            .filter(|row| wanted.contains(row.io_mac.as_str()))
            .map(|row| (row.io_mac.clone(), row.io_type.clone()))
            .collect()
    }

    pub fn find_pp_location(&self, serial: &str) -> Option<PpLocation> {
        self.pp_location.iter().find(|r| r.pp_serial_no == serial).cloned()
    }

    pub fn find_io_location(&self, mac: &str) -> Option<IoLocation> {
        self.io_location.iter().find(|r| r.io_mac == mac).cloned()
    }

    pub fn connections_for_pp(&self, serial: &str) -> Vec<Connection> {
        self.pp_connectivity.iter().filter(|c| c.pp_serial_no == serial).cloned().collect()
    }

    pub fn connections_for_io(&self, mac: &str) -> Vec<Connection> {
        self.pp_connectivity.iter().filter(|c| c.io_mac == mac).cloned().collect()
    }

    pub fn device_macs(&self) -> HashSet<String> {
        self.index.device_macs.clone()
    }

    pub fn switch_port_usage(&self) -> HashMap<String, BTreeSet<u32>> {
        let mut usage: HashMap<String, BTreeSet<u32>> = HashMap::new();
        for (name, port) in &self.index.switch_ports {
            usage.entry(name.clone()).or_default().insert(*port);
        }
        usage
    }

    pub fn query_map(&self, query: &MapQuery) -> Vec<MapRow> {
        self.connectivity_map
            .iter()
            .filter(|row| query.matches(row))
            .cloned()
            .collect()
    }
}

/// Backend en mémoire pour les trois stores
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tables(mut tables: Tables) -> Self {
        tables.reindex();
        Self { tables: Mutex::new(tables) }
    }

    /// Copie de l'état courant (inspection, tests)
    pub fn snapshot(&self) -> Tables {
        self.tables.lock().clone()
    }
}

impl LocationStore for MemoryStore {
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
        self.tables.lock().insert_pp_location(row)
    }

    fn insert_io_location(&self, row: &IoLocation) -> Result<(), StoreError> {
        self.tables.lock().insert_io_location(row)
    }
}

impl ConnectionStore for MemoryStore {
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
        self.tables.lock().insert_connection(conn)
    }
}

impl MapStore for MemoryStore {
    fn switch_port_usage(&self) -> Result<HashMap<String, BTreeSet<u32>>, StoreError> {
        Ok(self.tables.lock().switch_port_usage())
    }

    fn device_macs(&self) -> Result<HashSet<String>, StoreError> {
        Ok(self.tables.lock().device_macs())
    }

    fn insert_map_row(&self, row: &MapRow) -> Result<(), StoreError> {
        self.tables.lock().insert_map_row(row)
    }

    fn query_map(&self, query: &MapQuery) -> Result<Vec<MapRow>, StoreError> {
        Ok(self.tables.lock().query_map(query))
    }
}
