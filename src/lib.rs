// src/lib.rs

//! Course catalog sync library
//!
//! Fetches a university course catalog from its public JSON API, normalizes it
//! into five tables and reconciles a persisted store against it.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
