//! Core domain types and traits for the Maestro deployment orchestrator.
//!
//! This crate contains:
//! - The `Deployment`/`Task` entities and their invariants
//! - Deterministic ASG/launch-configuration naming (C7)
//! - The store adapter ports consumed by the rest of the core (C1)
//! - Ports for the external collaborators (cloud façade, metadata,
//!   configuration, policy services) the engine drives

pub mod application;
pub mod collaborators;
pub mod deployment;
pub mod error;
pub mod id;
pub mod naming;
pub mod store;
pub mod task;

pub use error::{Error, Result};
pub use id::ResourceId;
