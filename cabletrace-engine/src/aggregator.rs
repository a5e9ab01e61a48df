/**
 * AGRÉGATEUR DE CARTE DE CONNECTIVITÉ
 *
 * RÔLE :
 * Transforme les connexions fraîchement créées en lignes `connectivity_map`.
 * Simule une documentation terrain partielle : ~80% des liens apparaissent
 * "terminés" (switch + équipement), ~20% seulement "planifiés".
 *
 * FONCTIONNEMENT :
 * 1. Lookups groupés : io_mac → io_type, pp_serial_no → emplacement
 * 2. Partition par emplacement du PP : central (Allen/700 Central/2),
 *    century (Allen/450 Century/2), other (tout le reste, inconnus compris)
 * 3. Par bucket : shuffle puis coupe à floor(80% × taille)
 * 4. Lignes complètes : nom de switch déterministe, port switch libre suivant,
 *    équipement tiré au poids, MAC aléatoire unique
 * 5. Une écriture par ligne ; un conflit d'index switch/MAC relance avec la
 *    valeur suivante (tentatives bornées), tout autre échec est reporté
 */

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::error::{RowFailure, Stage, StoreError, UniqueIndex};
use crate::models::{Connection, Location, MapRow, Termination};
use crate::random::{shuffle, RandomSource};
use crate::settings::SynthesisSettings;
use crate::store::{LocationStore, MapStore};
use crate::switch_name::switch_name;

/// Catégories d'équipements simulés et leur poids (total 100)
pub const DEVICE_WEIGHTS: [(&str, u32); 9] = [
    ("Computer", 35),
    ("IP Phone", 20),
    ("Security Camera", 15),
    ("Network Printer", 10),
    ("Access Point", 8),
    ("Television", 5),
    ("VoIP Phone", 3),
    ("Digital Signage", 2),
    ("Video Conference Unit", 2),
];

/// Tirage pondéré : r ∈ [0, total), première bande telle que r <= cumul
pub fn pick_device(rng: &mut dyn RandomSource) -> &'static str {
    let total: u32 = DEVICE_WEIGHTS.iter().map(|(_, w)| w).sum();
    let r = rng.unit() * f64::from(total);
    let mut cumulative = 0u32;
    for (name, weight) in DEVICE_WEIGHTS {
        cumulative += weight;
        if r <= f64::from(cumulative) {
            return name;
        }
    }
    "Computer"
}

/// Six octets hexa minuscules séparés par `:`
pub fn random_mac(rng: &mut dyn RandomSource) -> String {
    (0..6)
        .map(|_| format!("{:02x}", rng.octet()))
        .collect::<Vec<_>>()
        .join(":")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Central,
    Century,
    Other,
}

impl Bucket {
    /// Ordre de traitement et d'écriture
    pub const ORDER: [Bucket; 3] = [Bucket::Central, Bucket::Century, Bucket::Other];

    pub fn classify(location: Option<&Location>) -> Self {
        let Some(loc) = location else { return Bucket::Other };
        match (loc.site.trim(), loc.building.trim(), loc.floor.trim()) {
            ("Allen", "700 Central", "2") => Bucket::Central,
            ("Allen", "450 Century", "2") => Bucket::Century,
            _ => Bucket::Other,
        }
    }
}

/// Shuffle puis coupe : (complètes, minimales)
pub fn split_full_minimal(
    mut bucket: Vec<Connection>,
    settings: &SynthesisSettings,
    rng: &mut dyn RandomSource,
) -> (Vec<Connection>, Vec<Connection>) {
    shuffle(&mut bucket, rng);
    let full_len = settings.full_count(bucket.len());
    let minimal = bucket.split_off(full_len);
    (bucket, minimal)
}

/// Compteur de ports par switch, qui saute les ports déjà attribués
#[derive(Debug, Default, Clone)]
pub struct SwitchPortAllocator {
    used: HashMap<String, BTreeSet<u32>>,
    counters: HashMap<String, u32>,
}

impl SwitchPortAllocator {
    pub fn new(used: HashMap<String, BTreeSet<u32>>) -> Self {
        Self { used, counters: HashMap::new() }
    }

    pub fn next_port(&mut self, switch_name: &str) -> u32 {
        let used = self.used.entry(switch_name.to_string()).or_default();
        let counter = self.counters.entry(switch_name.to_string()).or_insert(1);
        let mut port = *counter;
        while used.contains(&port) {
            port += 1;
        }
        used.insert(port);
        *counter = port + 1;
        port
    }
}

/// MAC d'équipements déjà attribuées (persistées + cette exécution)
#[derive(Debug, Default, Clone)]
pub struct DeviceMacAllocator {
    used: HashSet<String>,
}

impl DeviceMacAllocator {
    pub fn new(used: HashSet<String>) -> Self {
        Self { used }
    }

    pub fn next_mac(&mut self, rng: &mut dyn RandomSource) -> String {
        loop {
            let mac = random_mac(rng);
            if self.used.insert(mac.clone()) {
                return mac;
            }
        }
    }
}

/// Registres d'unicité chargés une fois par invocation
#[derive(Debug, Default, Clone)]
pub struct MapBookkeeping {
    pub switch_ports: SwitchPortAllocator,
    pub device_macs: DeviceMacAllocator,
}

impl MapBookkeeping {
    pub fn load(map: &dyn MapStore) -> Result<Self, StoreError> {
        Ok(Self {
            switch_ports: SwitchPortAllocator::new(map.switch_port_usage()?),
            device_macs: DeviceMacAllocator::new(map.device_macs()?),
        })
    }
}

#[derive(Debug, Default)]
pub struct AggregateOutcome {
    pub rows: Vec<MapRow>,
    pub failures: Vec<RowFailure>,
}

pub struct Aggregator<'a> {
    locations: &'a dyn LocationStore,
    map: &'a dyn MapStore,
    settings: &'a SynthesisSettings,
    book: MapBookkeeping,
}

impl<'a> Aggregator<'a> {
    pub fn new(
        locations: &'a dyn LocationStore,
        map: &'a dyn MapStore,
        settings: &'a SynthesisSettings,
        book: MapBookkeeping,
    ) -> Self {
        Self { locations, map, settings, book }
    }

    /// Charge les registres depuis le MapStore puis construit l'agrégateur
    pub fn load(
        locations: &'a dyn LocationStore,
        map: &'a dyn MapStore,
        settings: &'a SynthesisSettings,
    ) -> Result<Self, StoreError> {
        let book = MapBookkeeping::load(map)?;
        Ok(Self::new(locations, map, settings, book))
    }

    /// Les erreurs de lecture (lookups) remontent ; les échecs d'écriture
    /// ligne par ligne sont collectés dans l'outcome.
    pub fn populate(
        &mut self,
        connections: &[Connection],
        rng: &mut dyn RandomSource,
    ) -> Result<AggregateOutcome, StoreError> {
        let mut outcome = AggregateOutcome::default();
        if connections.is_empty() {
            return Ok(outcome);
        }

        let io_macs: Vec<String> = connections
            .iter()
            .map(|c| c.io_mac.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let pp_serials: Vec<String> = connections
            .iter()
            .map(|c| c.pp_serial_no.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let io_types = self.locations.io_types(&io_macs)?;
        let pp_locations = self.locations.pp_locations(&pp_serials)?;

        let misses = pp_serials.iter().filter(|s| !pp_locations.contains_key(*s)).count();
        if misses > 0 {
            debug!(misses, "patch panels without location routed to other bucket");
        }

        let mut buckets: HashMap<Bucket, Vec<Connection>> = HashMap::new();
        for conn in connections {
            let bucket = Bucket::classify(pp_locations.get(&conn.pp_serial_no));
            buckets.entry(bucket).or_default().push(conn.clone());
        }

        for bucket in Bucket::ORDER {
            let members = buckets.remove(&bucket).unwrap_or_default();
            if members.is_empty() {
                continue;
            }
            let (full, minimal) = split_full_minimal(members, self.settings, rng);
            debug!(?bucket, full = full.len(), minimal = minimal.len(), "bucket split");

            for conn in &full {
                let io_type = io_types.get(&conn.io_mac).cloned();
                let location = pp_locations
                    .get(&conn.pp_serial_no)
                    .cloned()
                    .unwrap_or_else(Location::unknown);
                match self.persist_full(conn, io_type, &location, rng) {
                    Ok(row) => outcome.rows.push(row),
                    Err(failure) => outcome.failures.push(failure),
                }
            }
            for conn in &minimal {
                let io_type = io_types.get(&conn.io_mac).cloned();
                let row = MapRow::minimal(conn, io_type);
                match self.map.insert_map_row(&row) {
                    Ok(()) => outcome.rows.push(row),
                    Err(e) => {
                        warn!(connection = %conn, error = %e, "minimal map row rejected");
                        outcome.failures.push(RowFailure::new(Stage::Aggregation, conn.clone(), &e));
                    }
                }
            }
        }

        info!(
            rows = outcome.rows.len(),
            full = outcome.rows.iter().filter(|r| r.is_full()).count(),
            failures = outcome.failures.len(),
            "connectivity map populated"
        );
        Ok(outcome)
    }

    fn persist_full(
        &mut self,
        conn: &Connection,
        io_type: Option<String>,
        location: &Location,
        rng: &mut dyn RandomSource,
    ) -> Result<MapRow, RowFailure> {
        let switch = switch_name(&location.site, &location.building, &location.floor, &location.room, 1);
        let device = pick_device(rng).to_string();
        let mut switch_port = self.book.switch_ports.next_port(&switch);
        let mut device_mac = self.book.device_macs.next_mac(rng);
        let max_attempts = self.settings.max_insert_attempts.max(1);

        let mut attempt = 1;
        loop {
            let row = MapRow::full(
                conn,
                io_type.clone(),
                Termination {
                    device: device.clone(),
                    device_mac: device_mac.clone(),
                    switch_name: switch.clone(),
                    switch_port,
                },
            );
            let err = match self.map.insert_map_row(&row) {
                Ok(()) => return Ok(row),
                Err(e) => e,
            };

            match err.conflict_index() {
                Some(UniqueIndex::SwitchPort) if attempt < max_attempts => {
                    debug!(switch = %switch, port = switch_port, attempt, "switch port taken, retrying");
                    switch_port = self.book.switch_ports.next_port(&switch);
                }
                Some(UniqueIndex::DeviceMac) if attempt < max_attempts => {
                    debug!(mac = %device_mac, attempt, "device mac taken, retrying");
                    device_mac = self.book.device_macs.next_mac(rng);
                }
                _ => {
                    warn!(connection = %conn, error = %err, attempt, "full map row rejected");
                    return Err(RowFailure::new(Stage::Aggregation, conn.clone(), &err));
                }
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IoLocation, PpLocation};
    use crate::random::RngSource;
    use crate::store::{ConnectionStore, MapQuery, MemoryStore};

    /// Renvoie toujours la même valeur pour `unit()`
    struct FixedUnit(f64);

    impl RandomSource for FixedUnit {
        fn below(&mut self, _upper: usize) -> usize {
            0
        }
        fn unit(&mut self) -> f64 {
            self.0
        }
        fn octet(&mut self) -> u8 {
            0
        }
    }

    fn pp_loc(serial: &str, site: &str, building: &str, floor: &str, room: &str) -> PpLocation {
        PpLocation {
            pp_serial_no: serial.into(),
            pp_mac: format!("mac-{serial}"),
            site: site.into(),
            building: building.into(),
            floor: floor.into(),
            room: room.into(),
            rack: "R1".into(),
        }
    }

    fn conns(serial: &str, n: u32) -> Vec<Connection> {
        (1..=n)
            .map(|i| Connection {
                pp_serial_no: serial.into(),
                ru: 1,
                pp_port: i,
                io_mac: format!("{serial}-io{i}"),
                io_port: 1,
            })
            .collect()
    }

    #[test]
    fn test_device_bands() {
        assert_eq!(pick_device(&mut FixedUnit(0.0)), "Computer");
        assert_eq!(pick_device(&mut FixedUnit(0.35)), "Computer");
        assert_eq!(pick_device(&mut FixedUnit(0.36)), "IP Phone");
        assert_eq!(pick_device(&mut FixedUnit(0.70)), "Security Camera");
        assert_eq!(pick_device(&mut FixedUnit(0.80)), "Network Printer");
        assert_eq!(pick_device(&mut FixedUnit(0.88)), "Access Point");
        assert_eq!(pick_device(&mut FixedUnit(0.93)), "Television");
        assert_eq!(pick_device(&mut FixedUnit(0.96)), "VoIP Phone");
        assert_eq!(pick_device(&mut FixedUnit(0.975)), "Digital Signage");
        assert_eq!(pick_device(&mut FixedUnit(0.999)), "Video Conference Unit");
        assert_eq!(DEVICE_WEIGHTS.iter().map(|(_, w)| w).sum::<u32>(), 100);
    }

    #[test]
    fn test_random_mac_format() {
        let mac = random_mac(&mut RngSource::seeded(8));
        assert_eq!(mac.len(), 17);
        assert_eq!(mac.split(':').count(), 6);
        assert!(mac.chars().all(|c| c == ':' || c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(random_mac(&mut FixedUnit(0.0)), "00:00:00:00:00:00");
    }

    #[test]
    fn test_classify() {
        let central = pp_loc("a", "Allen", "700 Central", "2", "TC1").location();
        let century = pp_loc("b", "Allen", "450 Century", "2", "TC1").location();
        let elsewhere = pp_loc("c", "Allen", "700 Central", "3", "TC1").location();
        assert_eq!(Bucket::classify(Some(&central)), Bucket::Central);
        assert_eq!(Bucket::classify(Some(&century)), Bucket::Century);
        assert_eq!(Bucket::classify(Some(&elsewhere)), Bucket::Other);
        assert_eq!(Bucket::classify(None), Bucket::Other);
    }

    #[test]
    fn test_split_boundaries() {
        let settings = SynthesisSettings::default();
        let mut rng = RngSource::seeded(4);
        let (full, minimal) = split_full_minimal(conns("PP", 10), &settings, &mut rng);
        assert_eq!((full.len(), minimal.len()), (8, 2));
        let (full, minimal) = split_full_minimal(conns("PP", 1), &settings, &mut rng);
        assert_eq!((full.len(), minimal.len()), (0, 1));
        let (full, minimal) = split_full_minimal(vec![], &settings, &mut rng);
        assert!(full.is_empty() && minimal.is_empty());
    }

    #[test]
    fn test_switch_port_allocator_skips_used() {
        let used = HashMap::from([("SW".to_string(), BTreeSet::from([1, 2, 4]))]);
        let mut alloc = SwitchPortAllocator::new(used);
        assert_eq!(alloc.next_port("SW"), 3);
        assert_eq!(alloc.next_port("SW"), 5);
        assert_eq!(alloc.next_port("SW"), 6);
        assert_eq!(alloc.next_port("OTHER"), 1);
        assert_eq!(alloc.next_port("SW"), 7);
    }

    #[test]
    fn test_mac_allocator_avoids_existing() {
        // même graine : le premier tirage retombe sur la MAC déjà prise
        let mut rng = RngSource::seeded(12);
        let first = random_mac(&mut RngSource::seeded(12));
        let mut alloc = DeviceMacAllocator::new(HashSet::from([first.clone()]));
        let mac = alloc.next_mac(&mut rng);
        assert_ne!(mac, first);
        // la MAC tirée rejoint les MAC prises
        let again = alloc.next_mac(&mut RngSource::seeded(12));
        assert_ne!(again, first);
        assert_ne!(again, mac);
    }

    #[test]
    fn test_populate_splits_per_bucket() {
        let store = MemoryStore::new();
        store.insert_pp_location(&pp_loc("CEN", "Allen", "700 Central", "2", "TC1")).unwrap();
        store.insert_pp_location(&pp_loc("CTY", "Allen", "450 Century", "2", "IDF 2")).unwrap();
        store
            .insert_io_location(&IoLocation {
                io_type: "FP6".into(),
                io_mac: "CEN-io1".into(),
                site: "Allen".into(),
                building: "700 Central".into(),
                floor: "2".into(),
                room: "201".into(),
                additional_description: None,
            })
            .unwrap();

        let mut batch = conns("CEN", 10);
        batch.extend(conns("CTY", 5));
        batch.extend(conns("NOWHERE", 1));
        for c in &batch {
            store.insert_connection(c).unwrap();
        }

        let settings = SynthesisSettings::default();
        let mut agg = Aggregator::load(&store, &store, &settings).unwrap();
        let outcome = agg.populate(&batch, &mut RngSource::seeded(21)).unwrap();
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.rows.len(), 16);

        let central_full: Vec<_> = outcome
            .rows
            .iter()
            .filter(|r| r.pp_serial_no == "CEN" && r.is_full())
            .collect();
        assert_eq!(central_full.len(), 8);
        assert!(central_full
            .iter()
            .all(|r| r.switch_name.as_deref() == Some("NETGEAR_M_Allen_700Central_Floor2_TC1_1")));
        let mut ports: Vec<u32> = central_full.iter().filter_map(|r| r.switch_port).collect();
        ports.sort_unstable();
        assert_eq!(ports, (1..=8).collect::<Vec<_>>());

        let century_full = outcome.rows.iter().filter(|r| r.pp_serial_no == "CTY" && r.is_full()).count();
        assert_eq!(century_full, 4);
        assert!(outcome
            .rows
            .iter()
            .filter(|r| r.pp_serial_no == "CTY" && r.is_full())
            .all(|r| r.switch_name.as_deref() == Some("Cisco_Catalyst_2960_Allen_450Century_Floor2_IDF2_1")));

        let orphan = outcome.rows.iter().find(|r| r.pp_serial_no == "NOWHERE").unwrap();
        assert!(orphan.is_minimal());
        assert_eq!(orphan.io_type, None);

        // io_type résolu quand l'IO est connue
        let known = outcome.rows.iter().find(|r| r.io_mac == "CEN-io1").unwrap();
        assert_eq!(known.io_type.as_deref(), Some("FP6"));

        assert_eq!(store.query_map(&MapQuery::All).unwrap().len(), 16);
    }

    #[test]
    fn test_unknown_location_full_rows_use_placeholder_switch() {
        let store = MemoryStore::new();
        let batch = conns("GHOST", 5);
        let settings = SynthesisSettings::default();
        let mut agg = Aggregator::load(&store, &store, &settings).unwrap();
        let outcome = agg.populate(&batch, &mut RngSource::seeded(3)).unwrap();
        let full: Vec<_> = outcome.rows.iter().filter(|r| r.is_full()).collect();
        assert_eq!(full.len(), 4);
        let name = full[0].switch_name.clone().unwrap();
        assert!(name.ends_with("_unknown_unknown_Floorunknown_unknown_1"), "{name}");
    }

    #[test]
    fn test_persisted_switch_ports_and_macs_are_respected() {
        let store = MemoryStore::new();
        store.insert_pp_location(&pp_loc("CEN", "Allen", "700 Central", "2", "TC1")).unwrap();
        let switch = "NETGEAR_M_Allen_700Central_Floor2_TC1_1";
        let existing = Connection {
            pp_serial_no: "OLD".into(),
            ru: 1,
            pp_port: 1,
            io_mac: "old-io".into(),
            io_port: 1,
        };
        store
            .insert_map_row(&MapRow::full(
                &existing,
                None,
                Termination {
                    device: "Computer".into(),
                    device_mac: "de:ad:be:ef:00:01".into(),
                    switch_name: switch.into(),
                    switch_port: 1,
                },
            ))
            .unwrap();

        let batch = conns("CEN", 10);
        let settings = SynthesisSettings::default();
        let mut agg = Aggregator::load(&store, &store, &settings).unwrap();
        let outcome = agg.populate(&batch, &mut RngSource::seeded(77)).unwrap();
        let ports: BTreeSet<u32> = outcome.rows.iter().filter_map(|r| r.switch_port).collect();
        assert!(!ports.contains(&1));
        assert_eq!(ports, (2..=9).collect());
        assert!(outcome.rows.iter().all(|r| r.device_mac.as_deref() != Some("de:ad:be:ef:00:01")));
    }

    #[test]
    fn test_empty_batch_is_a_noop() {
        let store = MemoryStore::new();
        let settings = SynthesisSettings::default();
        let mut agg = Aggregator::load(&store, &store, &settings).unwrap();
        let outcome = agg.populate(&[], &mut RngSource::seeded(1)).unwrap();
        assert!(outcome.rows.is_empty() && outcome.failures.is_empty());
    }
}
