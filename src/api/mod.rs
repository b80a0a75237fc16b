//! Remote service clients
//!
//! [`ApiTransport`] knows the base URL and API key and maps responses to
//! errors. [`ApiClient`] puts the [`RequestGate`] in front of it for
//! authenticated calls; [`RemoteAuth`] uses the transport directly.

mod auth;
mod client;
pub mod employees;
mod gate;
pub mod rest;
pub mod trips;

pub use auth::RemoteAuth;
pub use client::{ApiClient, ApiTransport};
pub use employees::{Employee, EmployeesApi};
pub use gate::RequestGate;
pub use rest::{Filter, Query, RestClient};
pub use trips::{trip_range_key, Trip, TripExpand, TripsApi};
