pub mod worker;

pub use worker::{run_load, TrafficOptions};
