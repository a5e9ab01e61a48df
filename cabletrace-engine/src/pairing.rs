use std::collections::HashSet;

use tracing::debug;

use crate::models::{Connection, IoKey, IoPort, PpKey, PpPort};
use crate::random::{shuffle, RandomSource};

/// Appariement aléatoire PP ↔ IO sans réutilisation de port.
///
/// Les deux pools sont mélangés indépendamment puis parcourus par index
/// jusqu'à `min(|pp|, |io|)`. Une paire dont un côté a déjà servi dans cette
/// session est sautée, sans recherche de remplaçant : le résultat peut donc
/// être plus court que le minimum si les pools contenaient des doublons.
pub fn pair_ports(
    mut pp_pool: Vec<PpPort>,
    mut io_pool: Vec<IoPort>,
    rng: &mut dyn RandomSource,
) -> Vec<Connection> {
    shuffle(&mut pp_pool, rng);
    shuffle(&mut io_pool, rng);

    let total = pp_pool.len().min(io_pool.len());
    let mut used_pp: HashSet<PpKey> = HashSet::with_capacity(total);
    let mut used_io: HashSet<IoKey> = HashSet::with_capacity(total);
    let mut connections = Vec::with_capacity(total);
    let mut skipped = 0usize;

    for (pp, io) in pp_pool.iter().zip(io_pool.iter()) {
        let pp_key = pp.key();
        let io_key = io.key();
        if used_pp.contains(&pp_key) || used_io.contains(&io_key) {
            skipped += 1;
            continue;
        }
        used_pp.insert(pp_key);
        used_io.insert(io_key);
        connections.push(Connection::between(pp, io));
    }

    if skipped > 0 {
        debug!(skipped, paired = connections.len(), "pairing skipped colliding ports");
    }
    connections
}
