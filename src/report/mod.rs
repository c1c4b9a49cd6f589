//! Report renderers for transparency runs.
//!
//! - [`terminal`]: summary box and colored ranking table; respects `--verbose` / `--quiet`.
//! - JSON output is the stored records themselves, serialized in `main`.

pub mod terminal;
