//! Tailor CRM library
//!
//! This library exposes the core functionality of Tailor CRM for the
//! command-line binary and for testing.

pub mod app;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod remote;
pub mod services;
pub mod storage;
