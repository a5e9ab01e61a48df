//! État partagé entre handlers : la source aléatoire du moteur (dont le
//! verrou sérialise les invocations auto-connect) et l'horodatage du health.

use parking_lot::Mutex;
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}
