//! The application registry: the set of deployable applications and the
//! environments each one is known to run in. Exposed by the HTTP API's
//! `/applications` routes; not part of the deployment workflow
//! core itself, but the minimal bookkeeping that surface needs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub name: String,
    pub environments: Vec<String>,
    pub contact: Option<String>,
}
