//! Data model types shared across the engine, API layer, and configuration snapshot.
//!
//! Configuration records (fixtures, patches, scenes, profiles, mapping tables,
//! grids/groups) are owned by the persistence collaborator; the engine only ever holds
//! an immutable snapshot of them (see [`crate::config::ConfigSnapshot`]).

pub mod fixture;
pub mod group;
pub mod mapping;
pub mod patch;
pub mod profile;
pub mod scene;
pub mod session;
pub mod source_tag;
pub mod universe;

pub use fixture::{ChannelRole, Fixture, FixtureChannel};
pub use group::{check_acyclic, Grid, Group, GroupMember, GroupMode, MasterLocation};
pub use mapping::{check_single_enabled, MapDestination, MappingRule, MappingTable, UnmappedBehavior};
pub use patch::{check_no_overlap, Patch};
pub use profile::AccessProfile;
pub use scene::{Scene, SceneFlags, TransitionType};
pub use session::ClientSession;
pub use source_tag::{SourceKind, SourceTag};
pub use universe::{PassthroughMode, ProtocolBinding, Universe};
