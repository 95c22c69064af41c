//! Paper-trading adapters: a simulated exchange and a synthetic feed.

mod feed;
mod gateway;

pub use feed::PaperFeed;
pub use gateway::PaperGateway;
