/**
 * MODÈLE DE DONNÉES - Ports, connexions, lignes de carte et emplacements
 *
 * RÔLE :
 * Types partagés par tout le moteur et par le kernel. Les noms de champs
 * suivent les colonnes des tables (`pp_connectivity`, `connectivity_map`,
 * `pp_location`, `io_location`) pour que la sérialisation JSON soit plate.
 *
 * CYCLE DE VIE :
 * - PpPort / IoPort : éphémères, recalculés à chaque invocation
 * - Connection : créée une fois par le moteur, immuable ensuite
 * - MapRow : au plus une par Connection
 */

use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// Nombre de rack-units exposés par un patch panel
pub const RACK_UNITS: u32 = 8;
/// Nombre de ports par rack-unit
pub const PORTS_PER_RU: u32 = 24;

/// Clé d'unicité d'un port PP : (serial, ru, port)
pub type PpKey = (String, u32, u32);
/// Clé d'unicité d'un port IO : (mac, port)
pub type IoKey = (String, u32);

/// Patch panel fourni par l'appelant
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PpInfo {
    pub pp_serial_no: String,
}

/// Prise murale / faceplate fournie par l'appelant
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct IoInfo {
    pub io_type: String,
    pub io_mac: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct PpPort {
    pub pp_serial_no: String,
    pub ru: u32,
    pub pp_port: u32,
}

impl PpPort {
    pub fn key(&self) -> PpKey {
        (self.pp_serial_no.clone(), self.ru, self.pp_port)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct IoPort {
    pub io_mac: String,
    pub io_port: u32,
}

impl IoPort {
    pub fn key(&self) -> IoKey {
        (self.io_mac.clone(), self.io_port)
    }
}

/// Lien brut PP ↔ IO (table `pp_connectivity`)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct Connection {
    pub pp_serial_no: String,
    pub ru: u32,
    pub pp_port: u32,
    pub io_mac: String,
    pub io_port: u32,
}

impl Connection {
    pub fn between(pp: &PpPort, io: &IoPort) -> Self {
        Self {
            pp_serial_no: pp.pp_serial_no.clone(),
            ru: pp.ru,
            pp_port: pp.pp_port,
            io_mac: io.io_mac.clone(),
            io_port: io.io_port,
        }
    }

    pub fn pp_key(&self) -> PpKey {
        (self.pp_serial_no.clone(), self.ru, self.pp_port)
    }

    pub fn io_key(&self) -> IoKey {
        (self.io_mac.clone(), self.io_port)
    }
}

impl std::fmt::Display for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} RU{} P{} -> {} P{}",
            self.pp_serial_no, self.ru, self.pp_port, self.io_mac, self.io_port
        )
    }
}

/// Métadonnées switch + équipement d'une ligne "complète"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Termination {
    pub device: String,
    pub device_mac: String,
    pub switch_name: String,
    pub switch_port: u32,
}

/// Ligne enrichie de la carte de connectivité (table `connectivity_map`)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MapRow {
    pub pp_serial_no: String,
    pub ru: u32,
    pub pp_port: u32,
    pub io_mac: String,
    pub io_port: u32,
    pub io_type: Option<String>,
    pub device: Option<String>,
    pub device_mac: Option<String>,
    pub switch_name: Option<String>,
    pub switch_port: Option<u32>,
}

impl MapRow {
    /// Ligne "planifiée" : seulement les ports et le type IO
    pub fn minimal(conn: &Connection, io_type: Option<String>) -> Self {
        Self {
            pp_serial_no: conn.pp_serial_no.clone(),
            ru: conn.ru,
            pp_port: conn.pp_port,
            io_mac: conn.io_mac.clone(),
            io_port: conn.io_port,
            io_type,
            device: None,
            device_mac: None,
            switch_name: None,
            switch_port: None,
        }
    }

    /// Ligne "terminée" : switch, port switch et équipement renseignés
    pub fn full(conn: &Connection, io_type: Option<String>, termination: Termination) -> Self {
        Self {
            device: Some(termination.device),
            device_mac: Some(termination.device_mac),
            switch_name: Some(termination.switch_name),
            switch_port: Some(termination.switch_port),
            ..Self::minimal(conn, io_type)
        }
    }

    pub fn connection(&self) -> Connection {
        Connection {
            pp_serial_no: self.pp_serial_no.clone(),
            ru: self.ru,
            pp_port: self.pp_port,
            io_mac: self.io_mac.clone(),
            io_port: self.io_port,
        }
    }

    pub fn pp_key(&self) -> PpKey {
        (self.pp_serial_no.clone(), self.ru, self.pp_port)
    }

    pub fn is_full(&self) -> bool {
        self.device.is_some()
            && self.device_mac.is_some()
            && self.switch_name.is_some()
            && self.switch_port.is_some()
    }

    pub fn is_minimal(&self) -> bool {
        self.device.is_none()
            && self.device_mac.is_none()
            && self.switch_name.is_none()
            && self.switch_port.is_none()
    }
}

/// Emplacement physique résolu pour un PP (ou une IO)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Location {
    pub site: String,
    pub building: String,
    pub floor: String,
    pub room: String,
    pub rack: Option<String>,
}

impl Location {
    /// Substitut utilisé quand le PP n'a pas d'emplacement enregistré
    pub fn unknown() -> Self {
        Self {
            site: "unknown".into(),
            building: "unknown".into(),
            floor: "unknown".into(),
            room: "unknown".into(),
            rack: None,
        }
    }
}

/// Ligne `pp_location` enregistrée au scan du QR code
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PpLocation {
    pub pp_serial_no: String,
    pub pp_mac: String,
    pub site: String,
    pub building: String,
    pub floor: String,
    pub room: String,
    pub rack: String,
}

impl PpLocation {
    pub fn location(&self) -> Location {
        Location {
            site: self.site.clone(),
            building: self.building.clone(),
            floor: self.floor.clone(),
            room: self.room.clone(),
            rack: Some(self.rack.clone()),
        }
    }

    /// Identité (QR) d'abord, puis champs saisis par le technicien
    pub fn validate(&self) -> Result<(), InputError> {
        require_identity(&self.pp_serial_no, "pp_serial_no")?;
        require_identity(&self.pp_mac, "pp_mac")?;
        require_field(&self.site, "site")?;
        require_field(&self.building, "building")?;
        require_field(&self.floor, "floor")?;
        require_field(&self.room, "room")?;
        require_field(&self.rack, "rack")
    }
}

/// Ligne `io_location` enregistrée au scan du QR code
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct IoLocation {
    pub io_type: String,
    pub io_mac: String,
    pub site: String,
    pub building: String,
    pub floor: String,
    pub room: String,
    #[serde(default)]
    pub additional_description: Option<String>,
}

impl IoLocation {
    pub fn validate(&self) -> Result<(), InputError> {
        require_identity(&self.io_type, "io_type")?;
        require_identity(&self.io_mac, "io_mac")?;
        require_field(&self.site, "site")?;
        require_field(&self.building, "building")?;
        require_field(&self.floor, "floor")?;
        require_field(&self.room, "room")
    }
}

fn require_identity(value: &str, field: &'static str) -> Result<(), InputError> {
    if value.trim().is_empty() {
        return Err(InputError::MissingIdentity(field));
    }
    Ok(())
}

fn require_field(value: &str, field: &'static str) -> Result<(), InputError> {
    if value.trim().is_empty() {
        return Err(InputError::MissingLocationField(field));
    }
    Ok(())
}
