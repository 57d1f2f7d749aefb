//! Plan catalog and entitlement rules for GatheredLight.
//!
//! This crate is a pure domain core: it owns the compiled-in plan table,
//! the entitlement checks the services consult before gated writes, and
//! the webhook state transitions expressed as pure functions over a
//! profile's subscription state. Nothing in here touches the network or
//! the database, so every rule is unit-testable in isolation.

pub mod plan;
pub mod subscription;
pub mod sync;

pub use plan::{Feature, Limit, Plan, PlanCatalog, PlanDefinition, PlanLimits, ResourceKind};
pub use subscription::{STATUS_NONE, SubscriptionView};
pub use sync::SubscriptionState;
