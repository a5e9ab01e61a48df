/*!
# CableTrace Engine - Synthèse de connectivité patch panel ↔ prises

Génère des liens de câblage plausibles entre ports de patch panels (PP) et
ports de prises murales (IO), sans jamais réutiliser un port déjà câblé, puis
les enrichit en carte de connectivité (switch, port switch, équipement).

- `universe`    : univers de ports (8 RU × 24 ports par PP, N ports par IO)
- `pairing`     : appariement aléatoire sans double usage
- `switch_name` : nom de switch déterministe ↔ emplacement
- `aggregator`  : répartition complètes / minimales et écriture de la carte
- `engine`      : orchestration d'une invocation auto-connect
- `store`       : traits de persistance + backends mémoire et fichier JSON
*/

pub mod aggregator;
pub mod engine;
pub mod error;
pub mod models;
pub mod pairing;
pub mod random;
pub mod settings;
pub mod store;
pub mod switch_name;
pub mod universe;

pub use engine::{AutoConnectOutcome, AutoConnectRequest, ConnectivityEngine};
pub use error::{EngineError, InputError, RowFailure, Stage, StoreError, UniqueIndex};
pub use models::{Connection, IoInfo, IoLocation, Location, MapRow, PpInfo, PpLocation};
pub use random::{DefaultRng, RandomSource, RngSource};
pub use settings::SynthesisSettings;
pub use store::{ConnectionStore, JsonFileStore, LocationStore, MapQuery, MapStore, MemoryStore, Stores};
