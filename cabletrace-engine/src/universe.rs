/**
 * UNIVERS DE PORTS + FILTRE D'EXCLUSION
 *
 * RÔLE :
 * Énumère tous les ports théoriquement adressables des PP et IO fournis,
 * puis retire ceux déjà consommés par une connexion persistée.
 *
 * FONCTIONNEMENT :
 * - PP : univers fixe de 8 RU × 24 ports = 192 ports, indépendant du panneau réel
 * - IO : N ports où N = premier groupe de chiffres du type ("FP6" → 6), 1 par défaut
 * - Exclusion : égalité exacte sur les clés composites, aucune normalisation
 */

use std::collections::HashSet;

use crate::models::{Connection, IoInfo, IoKey, IoPort, PpInfo, PpKey, PpPort, PORTS_PER_RU, RACK_UNITS};

/// Plus grande plaque connue (FP48). Au-delà, la requête est rejetée.
pub const MAX_IO_PORTS: u32 = 48;

/// Nombre de ports d'une IO d'après son code type.
/// Sans chiffres (ou nombre illisible) : 1 port.
pub fn io_port_count(io_type: &str) -> u32 {
    let digits: String = io_type
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return 1;
    }
    digits.parse().unwrap_or(1)
}

pub fn pp_ports(pps: &[PpInfo]) -> Vec<PpPort> {
    let mut all = Vec::with_capacity(pps.len() * (RACK_UNITS * PORTS_PER_RU) as usize);
    for pp in pps {
        for ru in 1..=RACK_UNITS {
            for pp_port in 1..=PORTS_PER_RU {
                all.push(PpPort { pp_serial_no: pp.pp_serial_no.clone(), ru, pp_port });
            }
        }
    }
    all
}

pub fn io_ports(ios: &[IoInfo]) -> Vec<IoPort> {
    let mut all = Vec::new();
    for io in ios {
        for io_port in 1..=io_port_count(&io.io_type) {
            all.push(IoPort { io_mac: io.io_mac.clone(), io_port });
        }
    }
    all
}

/// Ports déjà câblés, chargés une fois par invocation
#[derive(Debug, Default, Clone)]
pub struct UsedPorts {
    pp: HashSet<PpKey>,
    io: HashSet<IoKey>,
}

impl UsedPorts {
    pub fn from_connections(persisted: &[Connection]) -> Self {
        Self {
            pp: persisted.iter().map(Connection::pp_key).collect(),
            io: persisted.iter().map(Connection::io_key).collect(),
        }
    }

    pub fn contains_pp(&self, port: &PpPort) -> bool {
        self.pp.contains(&port.key())
    }

    pub fn contains_io(&self, port: &IoPort) -> bool {
        self.io.contains(&port.key())
    }
}

/// Retire des univers tout port présent dans les connexions persistées
pub fn exclude_used(
    pp_ports: Vec<PpPort>,
    io_ports: Vec<IoPort>,
    persisted: &[Connection],
) -> (Vec<PpPort>, Vec<IoPort>) {
    let used = UsedPorts::from_connections(persisted);
    let pp_free = pp_ports.into_iter().filter(|p| !used.contains_pp(p)).collect();
    let io_free = io_ports.into_iter().filter(|p| !used.contains_io(p)).collect();
    (pp_free, io_free)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pp(serial: &str) -> PpInfo {
        PpInfo { pp_serial_no: serial.into() }
    }

    fn io(io_type: &str, mac: &str) -> IoInfo {
        IoInfo { io_type: io_type.into(), io_mac: mac.into() }
    }

    #[test]
    fn test_io_port_count() {
        assert_eq!(io_port_count("FP6"), 6);
        assert_eq!(io_port_count("SB2"), 2);
        assert_eq!(io_port_count("FP12X4"), 12);
        assert_eq!(io_port_count("WALL"), 1);
        assert_eq!(io_port_count(""), 1);
        assert_eq!(io_port_count("FP0"), 0);
        assert_eq!(io_port_count("FP99999999999999999999"), 1);
    }

    #[test]
    fn test_pp_universe_has_192_distinct_ports() {
        let ports = pp_ports(&[pp("PP-1")]);
        assert_eq!(ports.len(), 192);
        let distinct: HashSet<_> = ports.iter().map(PpPort::key).collect();
        assert_eq!(distinct.len(), 192);
        assert!(ports.iter().all(|p| (1..=8).contains(&p.ru) && (1..=24).contains(&p.pp_port)));
    }

    #[test]
    fn test_io_universe_follows_type() {
        let ports = io_ports(&[io("FP6", "m1"), io("PLATE", "m2")]);
        assert_eq!(ports.iter().filter(|p| p.io_mac == "m1").count(), 6);
        assert_eq!(ports.iter().filter(|p| p.io_mac == "m2").count(), 1);
        assert_eq!(ports.last().map(|p| p.io_port), Some(1));
    }

    #[test]
    fn test_exclusion_removes_exact_keys_only() {
        let persisted = vec![Connection {
            pp_serial_no: "PP-1".into(),
            ru: 1,
            pp_port: 1,
            io_mac: "m1".into(),
            io_port: 2,
        }];
        let (pp_free, io_free) = exclude_used(
            pp_ports(&[pp("PP-1"), pp("pp-1")]),
            io_ports(&[io("FP2", "m1"), io("FP2", "M1")]),
            &persisted,
        );
        assert_eq!(pp_free.len(), 383);
        assert!(!pp_free.iter().any(|p| p.key() == ("PP-1".to_string(), 1, 1)));
        // pas de normalisation de casse
        assert!(pp_free.iter().any(|p| p.key() == ("pp-1".to_string(), 1, 1)));
        assert_eq!(io_free.len(), 3);
        assert!(!io_free.iter().any(|p| p.key() == ("m1".to_string(), 2)));
    }
}
