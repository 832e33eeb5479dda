//! Courier dispatch: routes each request to its single handler through an
//! ordered, configurable chain of cross-cutting behaviors.
//!
//! Typical flow:
//!
//! ```rust,ignore
//! let resolver = Arc::new(ServiceRegistry::new());
//! resolver.add_default::<GetUserHandler>();
//! resolver.add_default::<Audit>();
//!
//! let mediator = Mediator::builder(resolver)
//!     .handler::<GetUser, GetUserHandler>(Lifetime::Transient)
//!     .behavior(BehaviorRecord::global::<Audit>().priority(10).group("admin"))
//!     .build();
//!
//! let user = mediator.pipeline().with_group("admin").send(GetUser { id: 7 }).await?;
//! ```

pub mod behavior;
pub mod config;
pub mod error;
pub mod executor;
mod handler;
pub mod mediator;
pub mod record;
pub mod request;
pub mod resolver;
pub mod service;

#[cfg(test)]
pub(crate) mod test_support;

pub use behavior::{AnyResponse, GlobalBehavior, OpenBehavior, PipelineBehavior, PipelineConfigExt};
pub use config::MediatorConfig;
pub use error::{DispatchError, ResolveError};
pub use executor::{ErasedNext, Next};
pub use mediator::{ConfiguredSender, Mediator, MediatorBuilder};
pub use record::{BehaviorRecord, OpenBehaviorRecord};
pub use request::{Request, RequestHandler};
pub use resolver::{Instance, ServiceRegistry, ServiceResolver};
pub use service::{build_dispatch_stack, DispatchMetricsLayer, DispatchTimeoutLayer, RequestService};

pub use courier_core::{
    BehaviorDescriptor, BehaviorScope, GroupKey, Lifetime, PipelineConfig, Priority,
    RequestContext, TypeKey,
};
pub use tokio_util::sync::CancellationToken;

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
