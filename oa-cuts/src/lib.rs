//! Outer-approximation cut engine for MINLP.
//!
//! Builds and maintains the polyhedral relaxation of a mixed-integer
//! nonlinear program:
//!
//! - [`linearize::linear_at`] builds the affine support of a function at a
//!   point;
//! - [`Cut`]/[`CutPool`] carry the lifecycle of generated inequalities;
//! - [`center::find_center`] computes the analytic interior point the
//!   line-search schemes start from;
//! - [`RootCutGenerator`] runs the root linearization schemes RS1, RS2,
//!   RS3, GS1 and GS2;
//! - [`StoaHandler`] drives the single-tree OA loop: fix integers, solve
//!   the NLP, emit violated linearizations into the MILP.
//!
//! The NLP and MILP engines are consumed through the traits in `oa-core`.

#![warn(missing_docs)]

pub mod center;
mod cut;
pub mod linearize;
mod pool;
mod root;
mod stoa;

pub use cut::{Cut, CutInfo, CutMembership};
pub use pool::{CutPool, CutPoolSettings, CutPoolStats};
pub use root::{LinStats, RootCutGenerator};
pub use stoa::{OaCut, StoaHandler, StoaStats};
