pub mod dockerfile_synth;
pub mod locks;
pub mod orchestrator;
pub mod reconciliation;
pub mod rollback;
#[cfg(test)]
pub mod test_support;
pub mod validator;
pub mod watcher;

pub use dockerfile_synth::DockerfileSynthesizer;
pub use locks::{DeployLocks, LockGuard};
pub use orchestrator::{DeployOutcome, DeploymentOrchestrator};
pub use reconciliation::{ReconciliationReport, Reconciler};
pub use rollback::RollbackEngine;
pub use validator::{DeploymentValidator, ValidationOutcome};
pub use watcher::ContainerWatcher;
