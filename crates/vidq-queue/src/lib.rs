#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::expect_used, clippy::unwrap_used))]

pub mod liveness;
pub mod queue;
pub mod shutdown;
pub mod types;
