pub mod error;
pub mod resource;
pub mod types;

pub use error::{LifecycleError, Result};
pub use resource::{
    AutoScalePolicy, AutoScaleVmGroup, AutoScaleVmProfile, Condition, Counter, LoadBalancerRule,
    NewResource, RelationalOperator, Resource, ResourceBody, ScaleAction, SslCertificate,
};
pub use types::{AccountId, DomainId, ExternalId, LifecycleState, ResourceId, ResourceKind};
