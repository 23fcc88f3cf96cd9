pub mod bollard_runtime;

pub use bollard_runtime::BollardContainerRuntime;
