pub mod container_runtime;
pub mod health_probe;
pub mod process_runner;
pub mod repositories;
pub mod source_fetcher;
pub mod traffic_switcher;
