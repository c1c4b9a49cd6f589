//! Jurisdiction inference from weak textual evidence.
//!
//! - [`signals`]: table-driven extraction of weighted [`Signal`](crate::models::Signal)s
//!   from a normalized page.
//! - [`resolver`]: aggregates signals, applies provider overrides and the
//!   tie-break policy.

pub mod resolver;
pub mod signals;
