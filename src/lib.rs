// src/lib.rs — Library root for Tripwise

pub mod api;
pub mod cli;
pub mod context;
pub mod core;
pub mod infra;
pub mod intent;
pub mod judge;
pub mod provider;
pub mod session;
