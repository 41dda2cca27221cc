//! Binding Module - deferred binding requests and their proxies
//!
//! - `request`: binding statements (`Statement`) and what they ask for (`BindingRequest`)
//! - `proxy`: the stand-in value (`Proxy`) with attribute chaining and single resolution
//! - `autobind`: propagation of a resolved value to every alias of a proxy
//!
//! Data flow:
//! ```text
//! Statement ──plan──► BindingRequest ──hook──► Proxy (deferred)
//!                                                │ first genuine use
//!                                                ▼
//!                                     Resolver.resolve(target, chain)
//!                                                │
//!                                      autobind::bind / unbind
//!                                                ▼
//!                                  every alias rebound to the value
//! ```

pub mod autobind;
mod proxy;
mod request;

pub use proxy::{Proxy, ProxyId, WeakProxy};
pub use request::{
    AttributeChain, BindingRequest, FromPosition, ImportName, SourceLocation, Statement,
};

