//! Execution primitives shared by the compound workflows.
//!
//! - `fanout::FanOut` runs independent siblings concurrently and joins them
//! - `poller::JobPoller` drives a server-side job to a terminal status

mod fanout;
mod poller;

pub use fanout::{FanOut, run_all};
pub(crate) use poller::PollBudget;
pub use poller::JobPoller;
