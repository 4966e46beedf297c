//! Surface exposed to the host interpreter: the process-wide runtime used by
//! instrumentation points and the `provenance` module functions.

use crate::identity;
use crate::runtime::Runtime;
use crate::stats::StatsSnapshot;
use lazy_static::lazy_static;

/// What `get_current_owner` reports when no owner is set.
pub const NO_OWNER: &str = "<none>";

lazy_static! {
    static ref RUNTIME: Runtime = Runtime::from_env();
}

/// The runtime for this process, built from the environment on first use.
pub fn runtime() -> &'static Runtime {
    &RUNTIME
}

/// `provenance.set_current_owner(email)`: scope an owner for this thread.
pub fn set_current_owner(email: &str) {
    identity::set(email);
}

/// `provenance.get_current_owner()`.
pub fn get_current_owner() -> String {
    identity::get().unwrap_or_else(|| NO_OWNER.to_string())
}

pub fn clear_current_owner() {
    identity::clear();
}

/// Called by the host at finalization. The global runtime is never dropped,
/// so this is where its statistics get reported.
pub fn shutdown() -> StatsSnapshot {
    runtime().report_stats()
}
