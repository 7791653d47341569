//! Universe State Store (§4.A).

pub mod store;

pub use store::{UniverseSnapshot, UniverseState, UniverseStore};
