//! tse-core: discovery, mutation, and merge engine for tagged
//! property-tree game saves.
//!
//! The save container is decoded to a JSON-like tree by an external codec
//! subprocess; this crate works on that tree with zero schema knowledge:
//! - case-insensitive path get/set and wrapper unwrapping
//! - tagged-scalar setters with dry-run change counting
//! - heuristic entity discovery (known path, then deep structural scan)
//! - fuzzy reconciliation of exported records across saves
//! - schema-preserving merge onto a fresh baseline before re-encoding
//!
pub mod backup;
pub mod cheats;
pub mod codec;
pub mod discover;
pub mod error;
pub mod export;
pub mod field;
pub mod merge;
pub mod path;
pub mod reconcile;
pub mod unwrap;

pub use codec::SaveCodec;
pub use discover::{
    DiscoveryReport, EntityRow, ProgressObject, apply_entity_edit, discover_entities,
    find_entity_array,
};
pub use error::SaveError;
pub use export::{ExportPayload, ExportRow, ProgressEntry, export_payload, read_export, write_export};
pub use field::{retarget_enum_like, set_bool, set_enum, set_int};
pub use merge::merge;
pub use path::{Token, TreePath, get, parse_dotted, set};
pub use reconcile::reconcile;
pub use unwrap::{unwrap_node, unwrap_with_path};
