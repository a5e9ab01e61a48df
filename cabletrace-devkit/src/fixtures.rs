//! Données de test : étages, emplacements PP / IO, listes d'entrée.

use cabletrace_engine::{IoInfo, IoLocation, PpInfo, PpLocation};

/// Un étage et sa salle technique
#[derive(Debug, Clone, Copy)]
pub struct Floor {
    pub site: &'static str,
    pub building: &'static str,
    pub floor: &'static str,
    pub room: &'static str,
}

pub const ALLEN_CENTRAL_2: Floor = Floor { site: "Allen", building: "700 Central", floor: "2", room: "TC1" };
pub const ALLEN_CENTURY_2: Floor = Floor { site: "Allen", building: "450 Century", floor: "2", room: "IDF 2" };

impl Floor {
    pub fn pp_location(&self, serial: &str) -> PpLocation {
        PpLocation {
            pp_serial_no: serial.to_string(),
            pp_mac: format!("{serial}-mac"),
            site: self.site.to_string(),
            building: self.building.to_string(),
            floor: self.floor.to_string(),
            room: self.room.to_string(),
            rack: "R1".to_string(),
        }
    }

    pub fn io_location(&self, mac: &str, io_type: &str) -> IoLocation {
        IoLocation {
            io_type: io_type.to_string(),
            io_mac: mac.to_string(),
            site: self.site.to_string(),
            building: self.building.to_string(),
            floor: self.floor.to_string(),
            room: format!("{}-office", self.floor),
            additional_description: None,
        }
    }
}

/// `PREFIX-1 .. PREFIX-n`
pub fn pp_infos(prefix: &str, count: usize) -> Vec<PpInfo> {
    (1..=count)
        .map(|i| PpInfo { pp_serial_no: format!("{prefix}-{i}") })
        .collect()
}

/// `count` prises du même type, MAC `prefix:NN`
pub fn io_infos(prefix: &str, io_type: &str, count: usize) -> Vec<IoInfo> {
    (1..=count)
        .map(|i| IoInfo { io_type: io_type.to_string(), io_mac: format!("{prefix}:{i:02}") })
        .collect()
}
