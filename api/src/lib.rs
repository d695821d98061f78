//! Wallet-signature sign-in service for Garden of Giving.
//!
//! Issues single-use challenges, verifies Ed25519 signatures over them,
//! provisions one profile per wallet address and hands out bearer sessions.

pub mod app_state;
pub mod config;
pub mod errors;
pub mod http;
pub mod infra;
pub mod metrics;
pub mod openapi;
pub mod repository;
pub mod services;
pub mod telemetry;
