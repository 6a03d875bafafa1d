// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
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
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Lifecycle Engine
//!
//! A lifecycle reconciliation engine for remote resources managed through
//! eventually-consistent cloud APIs.
//!
//! ## Overview
//!
//! Remote APIs accept a request and return before the resource is usable.
//! The engine drives each resource instance through its phases:
//!
//! - Create, then wait until the remote reports it ready
//! - Read the observed configuration back
//! - On changed desired configuration: diff, apply, wait until settled
//! - Delete, then wait until the remote reports it gone
//!
//! ## Architecture
//!
//! Each concern is a small component reused by every resource kind:
//!
//! 1. **Identity**: composite handles packed and unpacked by codecs
//! 2. **Finder**: paginated, filtered lookups of the remote state
//! 3. **Waiter**: polls until a target status, failure or timeout
//! 4. **Differ**: minimal patch, tag and attribute updates
//! 5. **Controller**: phase ordering over a per-kind [`resource::ResourceKind`]
//!
//! ## Modules
//!
//! - [`identity`]: Resource handles and identifier codecs
//! - [`model`]: Attribute maps, remote state snapshots, statuses
//! - [`finder`]: Query, pagination and uniqueness rules
//! - [`waiter`]: Wait specifications and the polling loop
//! - [`differ`]: Patch, tag and attribute differs
//! - [`remote`]: Transports (HTTP, simulated) and retries
//! - [`resource`]: Per-kind collaborators
//! - [`reconciler`]: The reconcile controller
//! - [`config`]: Configuration parsing and validation
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! waits:
//!   delete_timeout_secs: 1200
//!   schedule: fibonacci
//!   poll_interval_secs: 2
//! transport:
//!   endpoint: https://api.example.com
//! retry:
//!   max_attempts: 5
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod backoff;
pub mod cli;
pub mod config;
pub mod differ;
pub mod error;
pub mod finder;
pub mod identity;
pub mod model;
pub mod reconciler;
pub mod remote;
pub mod resource;
pub mod waiter;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, EngineConfig};
pub use differ::{PatchDiffer, TagPolicy, UpdatePlan};
pub use error::{EngineError, ErrorKind, Phase, Result};
pub use finder::{Finder, Query};
pub use identity::{IdentifierCodec, ResourceHandle};
pub use model::{AttrValue, AttributeMap, LifecycleStatus, RemoteState, ResourceStatus};
pub use reconciler::{ReconcileController, ReconcileOutcome, WaitOverrides};
pub use remote::{HttpTransport, RetryPolicy, SimulatedCloud, Transport, TransportError};
pub use resource::{JsonResource, JsonResourceConfig, ResourceKind};
pub use waiter::{PollSchedule, WaitSpec, wait_for};
