/**
 * ORCHESTRATEUR - Une invocation "auto-connect" de bout en bout
 *
 * ÉTAPES :
 * 1. Validation de la requête (échec immédiat, aucune écriture)
 * 2. Snapshot des connexions persistées + registres switch/MAC
 * 3. Univers de ports → exclusion des ports câblés → appariement
 * 4. Insertion des connexions (stage `pairing`)
 * 5. Agrégation en lignes de carte (stage `aggregation`)
 *
 * Les écritures déjà faites ne sont jamais annulées : une ligne rejetée est
 * reportée dans `failures`, une erreur de lecture en cours d'agrégation
 * remonte avec la liste des connexions déjà validées.
 */

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregator::{Aggregator, MapBookkeeping};
use crate::error::{EngineError, InputError, RowFailure, Stage};
use crate::models::{Connection, IoInfo, MapRow, PpInfo};
use crate::pairing::pair_ports;
use crate::random::RandomSource;
use crate::settings::SynthesisSettings;
use crate::store::Stores;
use crate::universe::{exclude_used, io_port_count, io_ports, pp_ports, MAX_IO_PORTS};

/// Corps de `POST /auto-connect`
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AutoConnectRequest {
    #[serde(default)]
    pub pps: Vec<PpInfo>,
    #[serde(default)]
    pub ios: Vec<IoInfo>,
}

impl AutoConnectRequest {
    pub fn validate(&self) -> Result<(), InputError> {
        if self.pps.is_empty() {
            return Err(InputError::NoPatchPanels);
        }
        if self.ios.is_empty() {
            return Err(InputError::NoOutlets);
        }
        if let Some(i) = self.pps.iter().position(|pp| pp.pp_serial_no.trim().is_empty()) {
            return Err(InputError::BlankSerial(i));
        }
        if let Some(i) = self.ios.iter().position(|io| io.io_mac.trim().is_empty()) {
            return Err(InputError::BlankMac(i));
        }
        if let Some(i) = self.ios.iter().position(|io| io_port_count(&io.io_type) > MAX_IO_PORTS) {
            return Err(InputError::PortCountTooLarge(i));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AutoConnectOutcome {
    pub run_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    pub connections: Vec<Connection>,
    pub map_rows: Vec<MapRow>,
    pub failures: Vec<RowFailure>,
}

impl AutoConnectOutcome {
    /// Aucune ligne rejetée
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct ConnectivityEngine {
    stores: Stores,
    settings: SynthesisSettings,
}

impl ConnectivityEngine {
    pub fn new(stores: Stores, settings: SynthesisSettings) -> Self {
        Self { stores, settings }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn settings(&self) -> &SynthesisSettings {
        &self.settings
    }

    pub fn auto_connect(
        &self,
        request: &AutoConnectRequest,
        rng: &mut dyn RandomSource,
    ) -> Result<AutoConnectOutcome, EngineError> {
        request.validate()?;

        let run_id = Uuid::new_v4();
        let started_at = OffsetDateTime::now_utc();
        info!(%run_id, pps = request.pps.len(), ios = request.ios.len(), "auto-connect started");

        let persisted = self
            .stores
            .connections
            .all_connections()
            .map_err(|source| EngineError::Store { stage: Stage::Pairing, source })?;
        let book = MapBookkeeping::load(self.stores.map.as_ref())
            .map_err(|source| EngineError::Store { stage: Stage::Aggregation, source })?;

        let (pp_free, io_free) = exclude_used(pp_ports(&request.pps), io_ports(&request.ios), &persisted);
        debug!(%run_id, pp_free = pp_free.len(), io_free = io_free.len(), "free ports");
        let candidates = pair_ports(pp_free, io_free, rng);

        let mut failures = Vec::new();
        let mut committed = Vec::with_capacity(candidates.len());
        for conn in candidates {
            match self.stores.connections.insert_connection(&conn) {
                Ok(()) => committed.push(conn),
                Err(e) => {
                    warn!(%run_id, connection = %conn, error = %e, "connection rejected");
                    failures.push(RowFailure::new(Stage::Pairing, conn, &e));
                }
            }
        }

        let mut aggregator = Aggregator::new(
            self.stores.locations.as_ref(),
            self.stores.map.as_ref(),
            &self.settings,
            book,
        );
        let aggregate = match aggregator.populate(&committed, rng) {
            Ok(aggregate) => aggregate,
            Err(source) => {
                warn!(%run_id, committed = committed.len(), error = %source, "aggregation aborted");
                return Err(EngineError::Aggregation { committed, source });
            }
        };
        failures.extend(aggregate.failures);

        info!(
            %run_id,
            connections = committed.len(),
            map_rows = aggregate.rows.len(),
            failures = failures.len(),
            "auto-connect finished"
        );

        Ok(AutoConnectOutcome {
            run_id,
            started_at,
            connections: committed,
            map_rows: aggregate.rows,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use crate::random::RngSource;
    use crate::store::{ConnectionStore, MapQuery, MapStore, MemoryStore};

    fn engine(store: &Arc<MemoryStore>) -> ConnectivityEngine {
        ConnectivityEngine::new(Stores::shared(store.clone()), SynthesisSettings::default())
    }

    fn request(pps: &[&str], ios: &[(&str, &str)]) -> AutoConnectRequest {
        AutoConnectRequest {
            pps: pps.iter().map(|s| PpInfo { pp_serial_no: s.to_string() }).collect(),
            ios: ios
                .iter()
                .map(|(t, m)| IoInfo { io_type: t.to_string(), io_mac: m.to_string() })
                .collect(),
        }
    }

    #[test]
    fn test_single_pp_single_port_outlet() {
        let store = Arc::new(MemoryStore::new());
        let outcome = engine(&store)
            .auto_connect(&request(&["PP-1"], &[("FP1", "io-1")]), &mut RngSource::seeded(1))
            .unwrap();

        assert!(outcome.is_complete());
        assert_eq!(outcome.connections.len(), 1);
        let conn = &outcome.connections[0];
        assert_eq!(conn.io_port, 1);
        assert!((1..=8).contains(&conn.ru) && (1..=24).contains(&conn.pp_port));

        // bucket "other" de taille 1 → 0 complète, 1 minimale
        assert_eq!(outcome.map_rows.len(), 1);
        assert!(outcome.map_rows[0].is_minimal());
        assert_eq!(store.all_connections().unwrap(), outcome.connections);
        assert_eq!(store.query_map(&MapQuery::All).unwrap().len(), 1);
    }

    #[test]
    fn test_fp2_wires_both_ports() {
        let store = Arc::new(MemoryStore::new());
        let outcome = engine(&store)
            .auto_connect(&request(&["PP-1"], &[("FP2", "io-1")]), &mut RngSource::seeded(1))
            .unwrap();

        let mut io_ports: Vec<u32> = outcome.connections.iter().map(|c| c.io_port).collect();
        io_ports.sort_unstable();
        assert_eq!(io_ports, vec![1, 2]);
        // bucket de 2 → floor(1.6) = 1 complète
        assert_eq!(outcome.map_rows.iter().filter(|r| r.is_full()).count(), 1);
        assert_eq!(outcome.map_rows.iter().filter(|r| r.is_minimal()).count(), 1);
    }

    #[test]
    fn test_fp2_with_one_port_already_wired() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_connection(&Connection {
                pp_serial_no: "PP-0".into(),
                ru: 1,
                pp_port: 1,
                io_mac: "io-1".into(),
                io_port: 2,
            })
            .unwrap();
        let outcome = engine(&store)
            .auto_connect(&request(&["PP-1"], &[("FP2", "io-1")]), &mut RngSource::seeded(1))
            .unwrap();
        assert_eq!(outcome.connections.len(), 1);
        assert_eq!(outcome.connections[0].io_port, 1);
        assert_eq!(outcome.map_rows.len(), 1);
        assert!(outcome.map_rows[0].is_minimal());
    }

    #[test]
    fn test_validation_runs_before_any_write() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        let mut rng = RngSource::seeded(1);

        let err = engine.auto_connect(&request(&[], &[("FP2", "io-1")]), &mut rng).unwrap_err();
        assert!(matches!(err, EngineError::Input(InputError::NoPatchPanels)));
        let err = engine.auto_connect(&request(&["PP-1"], &[]), &mut rng).unwrap_err();
        assert!(matches!(err, EngineError::Input(InputError::NoOutlets)));
        let err = engine
            .auto_connect(&request(&["PP-1", " "], &[("FP2", "io-1")]), &mut rng)
            .unwrap_err();
        assert!(matches!(err, EngineError::Input(InputError::BlankSerial(1))));
        let err = engine
            .auto_connect(&request(&["PP-1"], &[("FP2", "io-1"), ("FP4294967295", "io-2")]), &mut rng)
            .unwrap_err();
        assert!(matches!(err, EngineError::Input(InputError::PortCountTooLarge(1))));

        assert!(store.all_connections().unwrap().is_empty());
    }

    #[test]
    fn test_port_count_limit() {
        let over = request(&["PP-1"], &[("FP49", "io-1")]);
        assert_eq!(over.validate(), Err(InputError::PortCountTooLarge(0)));
        let huge = request(&["PP-1"], &[("FP4294967295", "io-1")]);
        assert_eq!(huge.validate(), Err(InputError::PortCountTooLarge(0)));

        let store = Arc::new(MemoryStore::new());
        let outcome = engine(&store)
            .auto_connect(&request(&["PP-1"], &[("FP48", "io-1")]), &mut RngSource::seeded(4))
            .unwrap();
        assert_eq!(outcome.connections.len(), 48);
    }

    #[test]
    fn test_blank_io_type_is_one_port() {
        let store = Arc::new(MemoryStore::new());
        let outcome = engine(&store)
            .auto_connect(&request(&["PP-1"], &[("", "io-1"), ("  ", "io-2")]), &mut RngSource::seeded(6))
            .unwrap();
        assert_eq!(outcome.connections.len(), 2);
        assert!(outcome.connections.iter().all(|c| c.io_port == 1));
    }

    #[test]
    fn test_second_run_never_reuses_ports() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        let mut rng = RngSource::seeded(9);
        let req = request(&["PP-1"], &[("FP4", "io-1"), ("FP4", "io-2")]);

        let first = engine.auto_connect(&req, &mut rng).unwrap();
        assert_eq!(first.connections.len(), 8);
        let second = engine.auto_connect(&req, &mut rng).unwrap();
        assert!(second.connections.is_empty());
        assert!(second.map_rows.is_empty());

        let third = engine
            .auto_connect(&request(&["PP-1"], &[("FP2", "io-3")]), &mut rng)
            .unwrap();
        let used: HashSet<_> = first.connections.iter().map(Connection::pp_key).collect();
        assert!(third.connections.iter().all(|c| !used.contains(&c.pp_key())));
        assert_eq!(store.all_connections().unwrap().len(), 10);
    }

    #[test]
    fn test_pp_side_is_the_limit() {
        let store = Arc::new(MemoryStore::new());
        let ios: Vec<(String, String)> = (0..100).map(|i| ("FP2".to_string(), format!("io-{i}"))).collect();
        let ios: Vec<(&str, &str)> = ios.iter().map(|(t, m)| (t.as_str(), m.as_str())).collect();
        let outcome = engine(&store)
            .auto_connect(&request(&["PP-1"], &ios), &mut RngSource::seeded(5))
            .unwrap();
        assert_eq!(outcome.connections.len(), 192);
    }

    #[test]
    fn test_same_seed_same_connections() {
        let req = request(&["PP-1", "PP-2"], &[("FP6", "io-1"), ("FP1", "io-2")]);
        let a = engine(&Arc::new(MemoryStore::new()))
            .auto_connect(&req, &mut RngSource::seeded(31))
            .unwrap();
        let b = engine(&Arc::new(MemoryStore::new()))
            .auto_connect(&req, &mut RngSource::seeded(31))
            .unwrap();
        assert_eq!(a.connections, b.connections);
        assert_ne!(a.run_id, b.run_id);
    }

    #[test]
    fn test_outcome_serializes_rfc3339() {
        let store = Arc::new(MemoryStore::new());
        let outcome = engine(&store)
            .auto_connect(&request(&["PP-1"], &[("FP1", "io-1")]), &mut RngSource::seeded(2))
            .unwrap();
        let json = serde_json::to_value(&outcome).unwrap();
        assert!(json["started_at"].as_str().unwrap().contains('T'));
        assert_eq!(json["connections"].as_array().unwrap().len(), 1);
        assert!(json["failures"].as_array().unwrap().is_empty());
    }
}
