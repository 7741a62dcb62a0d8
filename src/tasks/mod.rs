//! Background Tasks Module
//!
//! Contains the background task that drives keeper sweeps.
//!
//! # Tasks
//! - Keeper sweep: checks every registered cache at a fixed interval

mod sweep;

pub use sweep::spawn_sweep_task;
