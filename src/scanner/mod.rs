pub mod escalation;
pub mod poll_cycle;
pub mod scheduler;

pub use escalation::AuthEscalation;
pub use poll_cycle::{
    CycleCounts, CycleReport, CycleRunner, CycleState, PollCycle, PollResult, RetryPolicy,
};
pub use scheduler::Scheduler;

use tokio::sync::watch;

/// Resolves once shutdown has been requested. A dropped sender never resolves,
/// so a lost handle cannot stop the worker by accident.
pub(crate) async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
