//! I/O helpers: experiment config files and dataset persistence.

pub mod atomic;
pub mod config;
pub mod dataset_store;
