// ============================================================================
// Linting
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![warn(missing_docs)]                // Public items should be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Brightbox Reconcile
//!
//! Declarative lifecycle reconciliation for Brightbox Cloud IPs and API
//! clients.
//!
//! ## Overview
//!
//! Resources are declared in a YAML manifest. For each one the reconciler
//! issues create, read, update or delete calls against the Brightbox API and
//! waits for asynchronous status changes to settle.
//!
//! ## Architecture
//!
//! 1. **Lifecycle adapter**: [`lifecycle`] turns a per-kind [`Descriptor`]
//!    into the four uniform entry points.
//! 2. **Polling reconciler**: [`wait`] polls a resource until it reaches a
//!    target status or the deadline passes.
//! 3. **Mapping orchestrator**: [`resources::cloud_ip::mapping`] attaches and
//!    detaches a Cloud IP around the generic calls.
//!
//! ## Modules
//!
//! - [`api`]: `CloudApi` trait and the HTTP client
//! - [`schema`]: field tables and the `ResourceData` accessor
//! - [`diag`]: diagnostics collected during a call
//! - [`context`]: cancellation and deadlines
//! - [`resources`]: Cloud IP and API client kinds
//! - [`runtime`]: apply, refresh and destroy over a manifest
//! - [`config`]: manifest parsing and provider settings
//! - [`state`]: persisted state and its lock
//! - [`cli`]: command-line interface
//!
//! ## Example
//!
//! ```yaml
//! state:
//!   path: .bbrec/state.json
//!
//! resources:
//!   - kind: cloud_ip
//!     name: web-ip
//!     attributes:
//!       name: web
//!       target: int-ds42k
//!       port_translator:
//!         - incoming: 80
//!           outgoing: 8080
//!           protocol: tcp
//!   - kind: api_client
//!     name: deploy-bot
//!     attributes:
//!       name: deploy
//!       permissions_group: storage
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod api;
pub mod cli;
pub mod config;
pub mod context;
pub mod diag;
pub mod error;
pub mod lifecycle;
pub mod resources;
pub mod runtime;
pub mod schema;
pub mod state;
pub mod wait;

// ============================================================================
// Re-exports
// ============================================================================

pub use api::{BrightboxClient, CloudApi};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{Manifest, ManifestParser, ManifestValidator, ProviderConfig};
pub use context::{CancelHandle, OpContext};
pub use diag::{Diagnostic, Diagnostics};
pub use error::{ReconcileError, Result};
pub use lifecycle::{Descriptor, ProviderMeta};
pub use resources::ResourceKind;
pub use runtime::{Action, Outcome, Provider, RunSummary};
pub use schema::ResourceData;
pub use state::{LocalStateStore, ReconcileState, StateStore};
pub use wait::StateChangeConf;
