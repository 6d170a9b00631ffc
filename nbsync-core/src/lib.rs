//! Declarative reconciliation of NetBox inventory records.
//!
//! A caller names a resource type, supplies the desired fields and a target
//! state, and [`StateReconciler`] converges the remote inventory to match:
//! references are resolved to ids, the existing object is looked up by its
//! natural key, and the one create, update or delete needed is issued.

pub mod clients;
pub mod config;
pub mod error;
pub mod gateway;
pub mod model;
pub mod reconciler;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod validation;

pub use clients::{ClientConfig, MemoryGateway, NetboxClient};
pub use config::EngineOptions;
pub use error::{Error, GatewayError, Result, ValidationError};
pub use gateway::{Filter, Gateway};
pub use model::{DesiredSpec, RemoteObject, TargetState};
pub use reconciler::StateReconciler;
pub use registry::Registry;
pub use report::ReconciliationResult;
