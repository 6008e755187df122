#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod accountant;
mod audit;
mod errors;
mod lifecycle;
mod rewrite;
mod runtime;
mod server;
mod sink;
mod transport;

pub use accountant::{ResponseAccountant, ResponseSink};
pub use errors::{ProxyError, TransportError};
pub use lifecycle::{Middleware, ProxyServer};
pub use runtime::run;
pub use transport::UpstreamTls;
