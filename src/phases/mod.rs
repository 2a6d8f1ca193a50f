//! The three probe phases.
//!
//! Each phase reports its checks through the shared reporter and never fails
//! as a whole: errors become failed checks.

mod basic;
mod credentials;
mod pool;

pub use basic::basic_connectivity;
pub use credentials::credential_sweep;
pub use pool::pool_stress;

use std::sync::Arc;

use crate::client::Connector;
use crate::output::Output;
use crate::report::Reporter;

/// What every phase needs from the orchestrator.
pub struct PhaseContext<'a> {
    pub connector: &'a dyn Connector,
    pub reporter: Arc<dyn Reporter>,
    pub output: &'a Output,
}
