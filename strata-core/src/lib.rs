//! Strata core library: layout domain types, copy-on-write section access,
//! kind registry, configuration and persistence.
//!
//! - [`types`]: targets, sections, components, revisions
//! - [`store`]: [`SectionStore`] copy-on-write view
//! - [`mapper`]: [`ComponentTypeMapper`] / [`ReplacementProvider`] and their registry
//! - [`config`]: `~/.strata/config.yaml`
//! - [`repository`]: [`TargetRepository`] port with memory and file backends
//! - [`error`]: [`StoreError`]

pub mod config;
pub mod error;
pub mod mapper;
pub mod repository;
pub mod store;
pub mod types;

pub use config::{Config, FieldUpdateRule};
pub use error::StoreError;
pub use mapper::{ComponentTypeMapper, MapperRegistry, Replacement, ReplacementProvider};
pub use repository::{FileRepository, MemoryRepository, TargetFilter, TargetRepository};
pub use store::{SectionStore, PRIMARY_DELTA};
pub use types::{
    Component, Configuration, Layout, PluginId, Revision, Section, Settings, SyncMeta, Target,
    TargetId, SYNC_KEY,
};
