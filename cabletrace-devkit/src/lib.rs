/*!
# CableTrace DevKit - Fixtures et doublures pour tester le moteur

- Fixtures d'emplacements (étages Allen connus, sites quelconques)
- `FaultStore` : store mémoire qui injecte pannes et conflits d'index
- `TestHarness` : moteur + store + RNG seedée, assertions d'invariants
*/

pub mod fault_store;
pub mod fixtures;
pub mod test_utils;

pub use fault_store::{FaultStore, WriteRecord};
pub use fixtures::{Floor, ALLEN_CENTRAL_2, ALLEN_CENTURY_2};
pub use test_utils::TestHarness;
