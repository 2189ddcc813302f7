//! Entity structs for the four persisted Stellium document kinds.
//!
//! Each entity maps both to a SQL table and to a JSON document in the file
//! tier; the two shapes are identical (serde round-trip). All structs derive
//! `Serialize` and `Deserialize` so either tier can hold them verbatim.

mod chart;
mod comparison;
mod export;
mod rectification;
mod reference;

pub use chart::Chart;
pub use comparison::Comparison;
pub use export::{Export, NewExport};
pub use rectification::Rectification;
pub use reference::EntityRef;
