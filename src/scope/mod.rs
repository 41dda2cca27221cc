//! Scope Module - symbol tables with deferred entries
//!
//! - `table`: `Scope` (name → `Slot`), `LazyCell`, `InterceptingKey`
//! - `rewrite`: post-activation conversion of raw proxies into deferred entries
//!
//! Entry lifecycle:
//! ```text
//! Slot::Proxy ──rewrite──► Slot::Deferred ──first read──► Slot::Value
//!   (activation open)        (resolves once)              (plain entry)
//! ```

mod rewrite;
mod table;

pub use rewrite::{rewrite, rewrite_owned, RewriteReport};
pub use table::{Bound, InterceptingKey, LazyCell, Scope, Slot, WeakScope};
