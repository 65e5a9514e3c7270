pub mod clock;
pub mod config;
pub mod metrics;
pub mod phase;
pub mod plans;
pub mod runner;
pub mod scenario;
pub mod scheduler;
pub mod threshold;
pub mod worker;
pub mod workload;
