/*!
FaultStore - store mémoire avec pannes programmables

Délègue tout à un `MemoryStore` et permet de :
- faire échouer la N-ième insertion de connexion ou de ligne de carte
- renvoyer un conflit d'index sur les prochaines insertions de carte
- faire échouer les lookups d'emplacement (erreur de lecture en agrégation)
- relire l'ordre exact des écritures acceptées
*/

use std::collections::{BTreeSet, HashMap, HashSet};

use parking_lot::Mutex;
use tracing::debug;

use cabletrace_engine::store::{ConnectionStore, LocationStore, MapQuery, MapStore, MemoryStore, Tables};
use cabletrace_engine::{Connection, IoLocation, Location, MapRow, PpLocation, StoreError, UniqueIndex};

/// Écriture acceptée par le store, dans l'ordre d'arrivée
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteRecord {
    Connection(Connection),
    MapRow(MapRow),
}

#[derive(Debug, Default)]
struct Faults {
    connection_calls: usize,
    map_calls: usize,
    failing_connection_calls: HashSet<usize>,
    failing_map_calls: HashSet<usize>,
    map_conflicts: Vec<UniqueIndex>,
    lookups_down: bool,
}

#[derive(Debug, Default)]
pub struct FaultStore {
    inner: MemoryStore,
    faults: Mutex<Faults>,
    writes: Mutex<Vec<WriteRecord>>,
}

impl FaultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Les appels numérotés (à partir de 1) échouent en `Unavailable`
    pub fn fail_connection_inserts(&self, calls: &[usize]) -> &Self {
        self.faults.lock().failing_connection_calls.extend(calls.iter().copied());
        self
    }

    pub fn fail_map_inserts(&self, calls: &[usize]) -> &Self {
        self.faults.lock().failing_map_calls.extend(calls.iter().copied());
        self
    }

    /// Les `times` prochaines insertions de carte renvoient un conflit sur `index`
    pub fn conflict_next_map_inserts(&self, index: UniqueIndex, times: usize) -> &Self {
        self.faults.lock().map_conflicts.extend(std::iter::repeat(index).take(times));
        self
    }

    pub fn take_lookups_down(&self) -> &Self {
        self.faults.lock().lookups_down = true;
        self
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.writes.lock().clone()
    }

    pub fn snapshot(&self) -> Tables {
        self.inner.snapshot()
    }

    fn check_lookups(&self) -> Result<(), StoreError> {
        if self.faults.lock().lookups_down {
            return Err(StoreError::Unavailable("location lookups down".into()));
        }
        Ok(())
    }
}

impl LocationStore for FaultStore {
    fn pp_locations(&self, serials: &[String]) -> Result<HashMap<String, Location>, StoreError> {
        self.check_lookups()?;
        self.inner.pp_locations(serials)
    }

    fn io_types(&self, macs: &[String]) -> Result<HashMap<String, String>, StoreError> {
        self.check_lookups()?;
        self.inner.io_types(macs)
    }

    fn pp_location(&self, serial: &str) -> Result<Option<PpLocation>, StoreError> {
        self.inner.pp_location(serial)
    }

    fn io_location(&self, mac: &str) -> Result<Option<IoLocation>, StoreError> {
        self.inner.io_location(mac)
    }

    fn all_pp_locations(&self) -> Result<Vec<PpLocation>, StoreError> {
        self.inner.all_pp_locations()
    }

    fn all_io_locations(&self) -> Result<Vec<IoLocation>, StoreError> {
        self.inner.all_io_locations()
    }

    fn insert_pp_location(&self, row: &PpLocation) -> Result<(), StoreError> {
        self.inner.insert_pp_location(row)
    }

    fn insert_io_location(&self, row: &IoLocation) -> Result<(), StoreError> {
        self.inner.insert_io_location(row)
    }
}

impl ConnectionStore for FaultStore {
    fn all_connections(&self) -> Result<Vec<Connection>, StoreError> {
        self.inner.all_connections()
    }

    fn connections_for_pp(&self, serial: &str) -> Result<Vec<Connection>, StoreError> {
        self.inner.connections_for_pp(serial)
    }

    fn connections_for_io(&self, mac: &str) -> Result<Vec<Connection>, StoreError> {
        self.inner.connections_for_io(mac)
    }

    fn insert_connection(&self, conn: &Connection) -> Result<(), StoreError> {
        {
            let mut faults = self.faults.lock();
            faults.connection_calls += 1;
            if faults.failing_connection_calls.contains(&faults.connection_calls) {
                debug!(call = faults.connection_calls, "injected connection insert failure");
                return Err(StoreError::Unavailable("injected connection failure".into()));
            }
        }
        self.inner.insert_connection(conn)?;
        self.writes.lock().push(WriteRecord::Connection(conn.clone()));
        Ok(())
    }
}

impl MapStore for FaultStore {
    fn switch_port_usage(&self) -> Result<HashMap<String, BTreeSet<u32>>, StoreError> {
        self.inner.switch_port_usage()
    }

    fn device_macs(&self) -> Result<HashSet<String>, StoreError> {
        self.inner.device_macs()
    }

    fn insert_map_row(&self, row: &MapRow) -> Result<(), StoreError> {
        {
            let mut faults = self.faults.lock();
            faults.map_calls += 1;
            if faults.failing_map_calls.contains(&faults.map_calls) {
                debug!(call = faults.map_calls, "injected map insert failure");
                return Err(StoreError::Unavailable("injected map failure".into()));
            }
            if !faults.map_conflicts.is_empty() {
                let index = faults.map_conflicts.remove(0);
                debug!(call = faults.map_calls, %index, "injected map conflict");
                return Err(StoreError::Conflict { index, key: "injected".into() });
            }
        }
        self.inner.insert_map_row(row)?;
        self.writes.lock().push(WriteRecord::MapRow(row.clone()));
        Ok(())
    }

    fn query_map(&self, query: &MapQuery) -> Result<Vec<MapRow>, StoreError> {
        self.inner.query_map(query)
    }
}
