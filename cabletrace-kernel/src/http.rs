/**
 * API REST CABLETRACE - Serveur HTTP du kernel
 *
 * RÔLE :
 * Expose le moteur de synthèse et les tables de câblage aux outils terrain
 * (app de scan QR, dashboard de traçage).
 *
 * ROUTES :
 * - /health, /system/health              : état du process
 * - POST /auto-connect                    : une invocation du moteur
 * - /connectivity-map, /switches, /trace  : lecture de la carte
 * - /pp-location(s), /io-location(s)      : enregistrement des emplacements scannés
 * - /pp-connectivity, /io-connectivity    : liens bruts
 *
 * CODES :
 * 201 création, 207 invocation avec lignes rejetées, 400 entrée invalide,
 * 404 rien trouvé, 409 index d'unicité, 500 erreur de store.
 */

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use cabletrace_engine::switch_name::{switch_location, switch_type_from_name};
use cabletrace_engine::{
    AutoConnectOutcome, AutoConnectRequest, Connection, ConnectivityEngine, DefaultRng, EngineError,
    InputError, IoLocation, MapQuery, MapRow, PpLocation, StoreError, SynthesisSettings,
};

use crate::health::{HealthTracker, KernelHealth};
use crate::state::{new_state, Shared};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<InputError> for ApiError {
    fn from(e: InputError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict { .. } => ApiError::Conflict(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Input(input) => input.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ConnectivityEngine>,
    /// Source aléatoire partagée ; son verrou sérialise les invocations
    pub rng: Shared<DefaultRng>,
    pub health_tracker: HealthTracker,
}

impl AppState {
    pub fn new(engine: ConnectivityEngine, health_tracker: HealthTracker) -> Self {
        let rng = DefaultRng::from_seed_option(engine.settings().rng_seed);
        Self {
            engine: Arc::new(engine),
            rng: new_state(rng),
            health_tracker,
        }
    }

    pub fn settings(&self) -> &SynthesisSettings {
        self.engine.settings()
    }
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/auto-connect", post(auto_connect))
        .route("/connectivity-map", get(get_connectivity_map))
        .route("/switches", get(list_switches))
        .route("/trace/{mac}", get(get_trace))
        .route("/pp-location", post(save_pp_location))
        .route("/pp-location/{serial}", get(get_pp_location))
        .route("/pp-locations", get(list_pp_locations))
        .route("/io-location", post(save_io_location))
        .route("/io-location/{mac}", get(get_io_location))
        .route("/io-locations", get(list_io_locations))
        .route("/pp-connectivity/{serial}", get(get_pp_connectivity))
        .route("/io-connectivity/{mac}", get(get_io_connectivity))
        .with_state(app_state)
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<KernelHealth> {
    Json(app.health_tracker.get_health())
}

// POST /auto-connect
async fn auto_connect(
    State(app): State<AppState>,
    Json(request): Json<AutoConnectRequest>,
) -> Result<(StatusCode, Json<AutoConnectOutcome>), ApiError> {
    let engine = app.engine.clone();
    let rng = app.rng.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut rng = rng.lock();
        engine.auto_connect(&request, &mut *rng)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("auto-connect task failed: {e}")))?;

    match result {
        Ok(outcome) => {
            app.health_tracker.record_run(&outcome);
            let status = if outcome.is_complete() {
                StatusCode::CREATED
            } else {
                warn!(run_id = %outcome.run_id, failures = outcome.failures.len(), "auto-connect partially applied");
                StatusCode::MULTI_STATUS
            };
            Ok((status, Json(outcome)))
        }
        Err(EngineError::Input(e)) => Err(e.into()),
        Err(e) => {
            error!(error = %e, stage = ?e.stage(), "auto-connect failed");
            app.health_tracker.record_failed_run();
            Err(e.into())
        }
    }
}

/// Paramètres de `GET /connectivity-map`
#[derive(Debug, Default, Deserialize)]
pub struct MapParams {
    switch_name: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    pp_serial_no: Option<String>,
    ru: Option<u32>,
    pp_port: Option<u32>,
    io_mac: Option<String>,
    io_port: Option<u32>,
}

impl MapParams {
    /// switch_name prioritaire ; `ru` puis `pp_port` ne filtrent qu'en cascade
    fn to_query(&self) -> MapQuery {
        if let Some(name) = self.switch_name.as_ref().filter(|s| !s.is_empty()) {
            return MapQuery::Switch(name.clone());
        }
        match self.kind.as_deref() {
            Some("PP") => match &self.pp_serial_no {
                Some(serial) => MapQuery::PatchPanel {
                    pp_serial_no: serial.clone(),
                    ru: self.ru,
                    pp_port: self.ru.and(self.pp_port),
                },
                None => MapQuery::All,
            },
            Some("IO") => match &self.io_mac {
                Some(mac) => MapQuery::Outlet { io_mac: mac.clone(), io_port: self.io_port },
                None => MapQuery::All,
            },
            _ => MapQuery::All,
        }
    }
}

// GET /connectivity-map
async fn get_connectivity_map(
    State(app): State<AppState>,
    Query(params): Query<MapParams>,
) -> Result<Response, ApiError> {
    let rows = app.engine.stores().map.query_map(&params.to_query())?;
    if rows.is_empty() {
        let body = serde_json::json!({ "success": false, "message": "No connectivity information found" });
        return Ok((StatusCode::NOT_FOUND, Json(body)).into_response());
    }
    Ok(Json(serde_json::json!({ "success": true, "data": rows })).into_response())
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SwitchView {
    pub switch_name: String,
    pub switch_type: Option<String>,
    pub site: Option<String>,
    pub building: Option<String>,
    pub floor: Option<String>,
    pub active_ports: Vec<u32>,
}

// GET /switches
async fn list_switches(State(app): State<AppState>) -> Result<Json<Vec<SwitchView>>, ApiError> {
    let usage = app.engine.stores().map.switch_port_usage()?;
    let mut views: Vec<SwitchView> = usage
        .into_iter()
        .map(|(name, ports)| {
            let location = switch_location(&name);
            SwitchView {
                switch_type: switch_type_from_name(&name).map(|t| t.to_string()),
                site: location.as_ref().map(|l| l.site.clone()),
                building: location.as_ref().map(|l| l.building.clone()),
                floor: location.map(|l| l.floor),
                active_ports: ports.into_iter().collect(),
                switch_name: name,
            }
        })
        .collect();
    views.sort_by(|a, b| a.switch_name.cmp(&b.switch_name));
    Ok(Json(views))
}

#[derive(Debug, Serialize)]
pub struct TraceView {
    pub pp_connectivity: Vec<Connection>,
    pub connectivity_map: Vec<MapRow>,
}

// GET /trace/{mac}
async fn get_trace(
    State(app): State<AppState>,
    Path(mac): Path<String>,
) -> Result<Json<TraceView>, ApiError> {
    let stores = app.engine.stores();
    let pp_connectivity = stores.connections.connections_for_io(&mac)?;
    let connectivity_map = stores.map.query_map(&MapQuery::Outlet { io_mac: mac, io_port: None })?;
    Ok(Json(TraceView { pp_connectivity, connectivity_map }))
}

// POST /pp-location
async fn save_pp_location(
    State(app): State<AppState>,
    Json(row): Json<PpLocation>,
) -> Result<(StatusCode, Json<PpLocation>), ApiError> {
    row.validate()?;
    app.engine.stores().locations.insert_pp_location(&row)?;
    info!(pp_serial_no = %row.pp_serial_no, site = %row.site, room = %row.room, "pp location saved");
    Ok((StatusCode::CREATED, Json(row)))
}

// GET /pp-location/{serial}
async fn get_pp_location(
    State(app): State<AppState>,
    Path(serial): Path<String>,
) -> Result<Json<Vec<PpLocation>>, ApiError> {
    let row = app.engine.stores().locations.pp_location(&serial)?;
    Ok(Json(row.into_iter().collect()))
}

// GET /pp-locations
async fn list_pp_locations(State(app): State<AppState>) -> Result<Json<Vec<PpLocation>>, ApiError> {
    Ok(Json(app.engine.stores().locations.all_pp_locations()?))
}

// POST /io-location
async fn save_io_location(
    State(app): State<AppState>,
    Json(row): Json<IoLocation>,
) -> Result<(StatusCode, Json<IoLocation>), ApiError> {
    row.validate()?;
    app.engine.stores().locations.insert_io_location(&row)?;
    info!(io_mac = %row.io_mac, io_type = %row.io_type, "io location saved");
    Ok((StatusCode::CREATED, Json(row)))
}

// GET /io-location/{mac}
async fn get_io_location(
    State(app): State<AppState>,
    Path(mac): Path<String>,
) -> Result<Json<Vec<IoLocation>>, ApiError> {
    let row = app.engine.stores().locations.io_location(&mac)?;
    Ok(Json(row.into_iter().collect()))
}

// GET /io-locations
async fn list_io_locations(State(app): State<AppState>) -> Result<Json<Vec<IoLocation>>, ApiError> {
    Ok(Json(app.engine.stores().locations.all_io_locations()?))
}

// GET /pp-connectivity/{serial}
async fn get_pp_connectivity(
    State(app): State<AppState>,
    Path(serial): Path<String>,
) -> Result<Json<Vec<Connection>>, ApiError> {
    Ok(Json(app.engine.stores().connections.connections_for_pp(&serial)?))
}

// GET /io-connectivity/{mac}
async fn get_io_connectivity(
    State(app): State<AppState>,
    Path(mac): Path<String>,
) -> Result<Json<Vec<Connection>>, ApiError> {
    Ok(Json(app.engine.stores().connections.connections_for_io(&mac)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cabletrace_engine::{IoInfo, MemoryStore, PpInfo, Stores};

    fn app() -> AppState {
        let store = Arc::new(MemoryStore::new());
        let settings = SynthesisSettings { rng_seed: Some(11), ..SynthesisSettings::default() };
        let engine = ConnectivityEngine::new(Stores::shared(store), settings);
        AppState::new(engine, HealthTracker::new("memory"))
    }

    fn pp_location(serial: &str) -> PpLocation {
        PpLocation {
            pp_serial_no: serial.into(),
            pp_mac: format!("{serial}-mac"),
            site: "Allen".into(),
            building: "700 Central".into(),
            floor: "2".into(),
            room: "TC1".into(),
            rack: "R1".into(),
        }
    }

    fn io_location(mac: &str) -> IoLocation {
        IoLocation {
            io_type: "FP2".into(),
            io_mac: mac.into(),
            site: "Allen".into(),
            building: "700 Central".into(),
            floor: "2".into(),
            room: "214".into(),
            additional_description: Some("north wall".into()),
        }
    }

    fn request(serials: &[&str], macs: &[&str]) -> AutoConnectRequest {
        AutoConnectRequest {
            pps: serials.iter().map(|s| PpInfo { pp_serial_no: s.to_string() }).collect(),
            ios: macs
                .iter()
                .map(|m| IoInfo { io_type: "FP2".into(), io_mac: m.to_string() })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_auto_connect_created() {
        let app = app();
        let (status, Json(outcome)) = auto_connect(State(app.clone()), Json(request(&["PP-1"], &["io-1"])))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(outcome.connections.len(), 2);
        assert_eq!(outcome.map_rows.len(), 2);
        assert_eq!(app.health_tracker.get_health().connections_created, 2);
    }

    #[tokio::test]
    async fn test_auto_connect_rejects_empty_lists() {
        let err = auto_connect(State(app()), Json(request(&[], &["io-1"]))).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_auto_connect_rejects_oversized_outlet() {
        let app = app();
        let mut body = request(&["PP-1"], &["io-1"]);
        body.ios[0].io_type = "FP4294967295".into();
        let err = auto_connect(State(app.clone()), Json(body)).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(app.health_tracker.get_health().connections_created, 0);
    }

    #[tokio::test]
    async fn test_map_query_found_and_missing() {
        let app = app();
        auto_connect(State(app.clone()), Json(request(&["PP-1"], &["io-1"]))).await.unwrap();

        let params = MapParams { kind: Some("IO".into()), io_mac: Some("io-1".into()), ..Default::default() };
        let resp = get_connectivity_map(State(app.clone()), Query(params)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let params = MapParams { kind: Some("IO".into()), io_mac: Some("nope".into()), ..Default::default() };
        let resp = get_connectivity_map(State(app), Query(params)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_map_params_cascade() {
        let params = MapParams {
            kind: Some("PP".into()),
            pp_serial_no: Some("PP-1".into()),
            pp_port: Some(4),
            ..Default::default()
        };
        // pp_port sans ru est ignoré
        assert_eq!(
            params.to_query(),
            MapQuery::PatchPanel { pp_serial_no: "PP-1".into(), ru: None, pp_port: None }
        );

        let params = MapParams {
            switch_name: Some("SW".into()),
            kind: Some("PP".into()),
            pp_serial_no: Some("PP-1".into()),
            ..Default::default()
        };
        assert_eq!(params.to_query(), MapQuery::Switch("SW".into()));
        assert_eq!(MapParams { kind: Some("PP".into()), ..Default::default() }.to_query(), MapQuery::All);
    }

    #[tokio::test]
    async fn test_location_registration() {
        let app = app();
        let (status, _) = save_pp_location(State(app.clone()), Json(pp_location("PP-1"))).await.unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let err = save_pp_location(State(app.clone()), Json(pp_location("PP-1"))).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);

        let mut blank = pp_location("PP-2");
        blank.room = " ".into();
        let err = save_pp_location(State(app.clone()), Json(blank)).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

        let Json(rows) = get_pp_location(State(app.clone()), Path("PP-1".into())).await.unwrap();
        assert_eq!(rows.len(), 1);
        let Json(rows) = get_pp_location(State(app.clone()), Path("PP-9".into())).await.unwrap();
        assert!(rows.is_empty());

        let (status, _) = save_io_location(State(app.clone()), Json(io_location("io-1"))).await.unwrap();
        assert_eq!(status, StatusCode::CREATED);
        let Json(all) = list_io_locations(State(app)).await.unwrap();
        assert_eq!(all[0].additional_description.as_deref(), Some("north wall"));
    }

    #[tokio::test]
    async fn test_switches_and_trace() {
        let app = app();
        save_pp_location(State(app.clone()), Json(pp_location("PP-1"))).await.unwrap();
        let macs: Vec<String> = (0..5).map(|i| format!("io-{i}")).collect();
        let macs: Vec<&str> = macs.iter().map(String::as_str).collect();
        auto_connect(State(app.clone()), Json(request(&["PP-1"], &macs))).await.unwrap();

        // 10 liens dans le bucket central → 8 lignes complètes sur un seul switch
        let Json(switches) = list_switches(State(app.clone())).await.unwrap();
        assert_eq!(switches.len(), 1);
        let sw = &switches[0];
        assert_eq!(sw.switch_name, "NETGEAR_M_Allen_700Central_Floor2_TC1_1");
        assert_eq!(sw.switch_type.as_deref(), Some("NETGEAR_M"));
        assert_eq!(sw.building.as_deref(), Some("700Central"));
        assert_eq!(sw.active_ports, (1..=8).collect::<Vec<_>>());

        let Json(trace) = get_trace(State(app.clone()), Path("io-0".into())).await.unwrap();
        assert_eq!(trace.pp_connectivity.len(), 2);
        assert_eq!(trace.connectivity_map.len(), 2);

        let Json(conns) = get_pp_connectivity(State(app), Path("PP-1".into())).await.unwrap();
        assert_eq!(conns.len(), 10);
    }
}
