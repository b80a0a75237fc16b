//! Triplog - trip logging client
//!
//! A versioned local cache and a self-refreshing bearer session in front of
//! a hosted auth and REST service.

pub mod api;
pub mod audit;
pub mod auth;
pub mod cache;
pub mod cli;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod storage;
pub mod ui;

#[cfg(test)]
mod testing;

pub use error::{ErrorKind, TriplogError, TriplogResult};
