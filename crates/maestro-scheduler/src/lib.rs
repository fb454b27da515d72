//! Deployment control plane (C6) and the per-deployment work queue.
//!
//! Ties the parameter pipeline (`maestro-pipeline`) and task executor
//! (`maestro-executor`) together behind a Postgres-backed work queue, using
//! `SKIP LOCKED` for distributed message claiming.

pub mod control_plane;
pub mod queue;
pub mod worker;

pub use control_plane::{BeginRequest, ControlPlane};
pub use queue::{MessageKind, QueuedMessage, WorkQueue};
pub use worker::{Collaborators, Worker};
