//! # Router Module
//!
//! Path matching and route resolution. Route templates are compiled into a
//! radix tree at startup; lookups are O(k) in the segment count with literal
//! segments taking precedence over parameters at every position.

mod core;
mod radix;

pub use core::{ParamVec, RouteMatch, Router, MAX_INLINE_PARAMS};
