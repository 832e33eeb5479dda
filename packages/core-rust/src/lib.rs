//! Courier core: behavior descriptors, pipeline configuration, and the
//! behavior registry with its selection algebra.

pub mod config;
pub mod context;
pub mod descriptor;
pub mod registry;
pub mod types;

pub use config::PipelineConfig;
pub use context::RequestContext;
pub use descriptor::{BehaviorDescriptor, BehaviorScope, Describe};
pub use registry::{BehaviorRegistry, RegistryBuilder};
pub use types::{GroupKey, Lifetime, Priority, TypeKey};
