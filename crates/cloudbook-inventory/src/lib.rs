//! cloudbook-inventory: resource catalog and per-account-region collection
//!
//! Holds the declarative catalog of resource kinds, the provider abstraction
//! (with an AWS CLI implementation) and the collector that turns provider
//! responses into table rows.

pub mod awscli;
pub mod catalog;
pub mod collector;
pub mod error;
pub mod projection;
pub mod provider;
pub mod types;

pub use awscli::AwsCliProvider;
pub use catalog::{Catalog, ProviderQuery, ResourceQuerySpec};
pub use collector::Collector;
pub use error::{InventoryError, ProviderError};
pub use projection::{ColumnSpec, Projection, ValueTransform};
pub use provider::{AssumeRoleRequest, CallerIdentity, CloudProvider};
pub use types::{
    Cell, CollectionResult, CollectionStatus, Credentials, Identity, Row, SessionCredentials,
};
