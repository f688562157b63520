//! One-way synchronization of HashiCorp Vault configuration and
//! secrets from a source cluster to a target cluster.
//!
//! A single pass reconciles secret engines, auth methods, policies
//! and AppRole roles on the target, then copies declared secret
//! values across. Reconciliation is create-if-absent; policies are
//! the exception and are re-put on every pass.
//!
//! Tests are included in the module files.

pub mod auth;
pub mod backend;
pub mod cli;
pub mod config;
pub mod emit;
pub mod error;
pub mod observer;
pub mod reconciler;
pub mod replicate;
pub mod sync;
pub mod vault;
