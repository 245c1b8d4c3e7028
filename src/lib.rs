//! Asynchronous pipelined client for the [bloomd](https://github.com/armon/bloomd)
//! probabilistic-filter daemon.
//!
//! bloomd speaks a newline-delimited text protocol over TCP and answers
//! requests strictly in arrival order. This crate exploits that guarantee
//! with a single-connection pipeline: commands are written back to back and
//! responses are matched positionally, so throughput is bounded by the
//! network rather than by round trips.
//!
//! The client buffers commands while disconnected, reconnects with linear
//! backoff, and offers `*_safe` command variants that transparently create
//! a missing filter and retry — holding later commands for that filter so
//! per-filter ordering survives the detour.
//!
//! # Examples
//!
//! ```no_run
//! use bloomd_client::{BloomClient, CreateOptions};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), bloomd_client::BloomError> {
//! let client = BloomClient::builder().host("127.0.0.1").port(8673).build();
//!
//! // Created on demand because the command is "safe".
//! client
//!     .set_safe("pageviews", "user-1", CreateOptions::new().capacity(100_000))
//!     .await?;
//! assert!(client.check("pageviews", "user-1").await?);
//!
//! for filter in client.list(None).await? {
//!     println!("{} holds {} items", filter.name, filter.size);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
pub mod codec;
mod command;
pub mod config;
mod connection;
pub mod error;
pub mod event;
pub mod filter;
mod metrics;
mod reply;

pub use client::{BloomClient, BloomClientBuilder};
pub use command::CreateOptions;
pub use config::ClientConfig;
pub use error::BloomError;
pub use event::ClientEvent;
pub use filter::FilterInfo;
pub use metrics::ClientStats;
