//! Concrete relay stages, in pipeline order.
//!
//! [`MessageFetcher`], [`AddressResolver`] and [`HeaderTransformer`]
//! implement [`Stage`](crate::Stage). The [`Dispatcher`] consumes the
//! resulting [`Flow`](crate::Flow) and is not a stage itself.

pub mod dispatcher;
pub mod fetcher;
pub mod resolver;
pub mod rewrite;

pub use dispatcher::*;
pub use fetcher::*;
pub use resolver::*;
pub use rewrite::*;
