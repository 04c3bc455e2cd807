//! nightshade-core: save-game persistence for a first-person horror framework.
//!
//! Layers, leaf-first:
//!   storable → crypto → codec → storage → reader → token → registry → session → manager
//!
//! RULE: Only storage.rs touches document bytes on disk. Everything above it
//! works on StorableCollection trees.

pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod event;
pub mod manager;
pub mod reader;
pub mod registry;
pub mod session;
pub mod storable;
pub mod storage;
pub mod token;
pub mod types;

pub use config::SaveConfig;
pub use error::{SaveError, SaveResult};
pub use manager::{BootOutcome, PlayerState, SaveGameManager, SaveOutcome};
pub use registry::{
    DispatchReport, FacetSet, ObjectHandle, ReferenceCatalog, ReferenceDescriptor,
    RuntimeSaveable, Saveable, SaveableRegistry,
};
pub use session::SessionContext;
pub use storable::{StorableCollection, StorableValue};
