//! services/api/src/lib.rs
//!
//! The reading tracker API service: a PostgreSQL-backed implementation of the
//! core ports, exposed over HTTP.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;

#[cfg(test)]
mod tests;
