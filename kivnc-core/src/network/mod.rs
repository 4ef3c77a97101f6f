//! Listening side: the allow-list and the dual-port acceptor.

pub mod acceptor;
pub mod allow;

pub use acceptor::{Acceptor, AcceptorConfig, PairRejection, check_pair};
pub use allow::AllowList;
