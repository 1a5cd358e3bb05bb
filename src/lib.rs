pub mod address_plan;
pub mod as_graph;
pub mod as_graph_generators;
pub mod asn_serde;
pub mod attack;
pub mod config;
pub mod convergence;
pub mod customer_cone;
pub mod error;
pub mod executor;
pub mod lab;
pub mod policy;
pub mod route_validator;
pub mod shared;
pub mod topology;

// Re-export commonly used types at the crate root
pub use address_plan::{AddressPlan, LinkAllocator, NeighborRecord};
pub use as_graph::{ASGraph, AS, ASN};
pub use attack::{AttackOrchestrator, AttackReport};
pub use config::{ConvergenceConfig, LabConfig};
pub use convergence::{Clock, ConvergenceOracle, ConvergenceState, ManualClock, SystemClock};
pub use customer_cone::CustomerCone;
pub use error::{Error, Result};
pub use executor::{CommandExecutor, RetryPolicy, RouterExecutor};
pub use lab::{Lab, LabArtifacts};
pub use route_validator::{RouteValidator, ROA};
pub use shared::Relationships;
pub use topology::{NodeSelection, Topology};
