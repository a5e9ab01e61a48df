/*!
Test Harness pour le moteur CableTrace

- Moteur branché sur un `FaultStore` partagé
- RNG seedée : chaque scénario est rejouable
- Assertions sur les invariants des tables (ports, switch, MAC, carte)
*/

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cabletrace_engine::store::{LocationStore, Stores, Tables};
use cabletrace_engine::{
    AutoConnectOutcome, AutoConnectRequest, ConnectivityEngine, DefaultRng, EngineError, IoInfo, PpInfo,
    SynthesisSettings,
};

use crate::fault_store::FaultStore;
use crate::fixtures::Floor;

/// Harness complet : store à pannes + moteur + RNG
pub struct TestHarness {
    pub store: Arc<FaultStore>,
    pub engine: ConnectivityEngine,
    rng: DefaultRng,
}

impl TestHarness {
    pub fn new(seed: u64) -> Self {
        Self::with_settings(seed, SynthesisSettings::default())
    }

    pub fn with_settings(seed: u64, settings: SynthesisSettings) -> Self {
        Self::sharing(Arc::new(FaultStore::new()), seed, settings)
    }

    /// Second moteur sur le store d'un autre harness (invocations concurrentes)
    pub fn sharing(store: Arc<FaultStore>, seed: u64, settings: SynthesisSettings) -> Self {
        init_test_logging();
        let engine = ConnectivityEngine::new(Stores::shared(store.clone()), settings);
        Self { store, engine, rng: DefaultRng::seeded(seed) }
    }

    /// Enregistre `count` PP sur un étage, serials `PREFIX-1 .. PREFIX-n`
    pub fn install_patch_panels(&self, floor: Floor, prefix: &str, count: usize) -> Result<Vec<PpInfo>> {
        let pps = crate::fixtures::pp_infos(prefix, count);
        for pp in &pps {
            self.store.insert_pp_location(&floor.pp_location(&pp.pp_serial_no))?;
        }
        Ok(pps)
    }

    pub fn install_outlets(&self, floor: Floor, ios: &[IoInfo]) -> Result<()> {
        for io in ios {
            self.store.insert_io_location(&floor.io_location(&io.io_mac, &io.io_type))?;
        }
        Ok(())
    }

    pub fn run(&mut self, pps: &[PpInfo], ios: &[IoInfo]) -> Result<AutoConnectOutcome, EngineError> {
        let request = AutoConnectRequest { pps: pps.to_vec(), ios: ios.to_vec() };
        let outcome = self.engine.auto_connect(&request, &mut self.rng)?;
        info!(
            connections = outcome.connections.len(),
            map_rows = outcome.map_rows.len(),
            failures = outcome.failures.len(),
            "harness run"
        );
        Ok(outcome)
    }

    pub fn tables(&self) -> Tables {
        self.store.snapshot()
    }

    /// Aucun port PP ni IO câblé deux fois
    pub fn assert_no_port_reuse(&self) -> Result<()> {
        let tables = self.tables();
        let mut pp = HashSet::new();
        let mut io = HashSet::new();
        for conn in &tables.pp_connectivity {
            if !pp.insert(conn.pp_key()) {
                bail!("pp port wired twice: {conn}");
            }
            if !io.insert(conn.io_key()) {
                bail!("io port wired twice: {conn}");
            }
        }
        Ok(())
    }

    /// Chaque ligne de carte est une connexion persistée, au plus une fois,
    /// avec des couples switch/port et des MAC d'équipement uniques
    pub fn assert_map_consistent(&self) -> Result<()> {
        let tables = self.tables();
        let connections: HashSet<_> = tables.pp_connectivity.iter().cloned().collect();
        let mut mapped = HashSet::new();
        let mut switch_ports = HashSet::new();
        let mut device_macs = HashSet::new();

        for row in &tables.connectivity_map {
            let conn = row.connection();
            if !connections.contains(&conn) {
                bail!("map row without connection: {conn}");
            }
            if !mapped.insert(conn.clone()) {
                bail!("connection mapped twice: {conn}");
            }
            if !row.is_full() && !row.is_minimal() {
                bail!("half-filled map row: {conn}");
            }
            if let (Some(name), Some(port)) = (&row.switch_name, row.switch_port) {
                if !switch_ports.insert((name.clone(), port)) {
                    bail!("switch port {name}#{port} used twice");
                }
            }
            if let Some(mac) = &row.device_mac {
                if !device_macs.insert(mac.clone()) {
                    bail!("device mac {mac} used twice");
                }
            }
        }
        Ok(())
    }

    /// Forme JSON de l'outcome telle que renvoyée par le kernel
    pub fn outcome_json(outcome: &AutoConnectOutcome) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(outcome)?)
    }
}

fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init()
        .ok();
}
