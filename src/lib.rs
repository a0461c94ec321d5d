//! SecureChain - A tamper-evident transaction ledger with fraud-risk scoring
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`ledger`] - Hash-linked block chain, append and full-chain validation
//! - [`transaction`] - Transaction types and submission validation
//!
//! ## Fraud Scoring
//! - [`fraud`] - Rule-based heuristics, isolation-forest anomaly model, and
//!   the scorer that blends them
//!
//! ## State Management
//! - [`store`] - Transaction admission and query orchestration
//! - [`persistence`] - Database layer (SQLite)
//!
//! ## Integration
//! - [`api`] - REST API server (feature `api`)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`clock`] - Injectable time source
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod ledger;
pub mod transaction;

// ============================================================================
// Fraud Scoring
// ============================================================================
pub mod fraud;

// ============================================================================
// State Management
// ============================================================================
pub mod persistence;
pub mod store;

// ============================================================================
// Integration
// ============================================================================
#[cfg(feature = "api")]
pub mod api;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod clock;
pub mod config;
pub mod error;
