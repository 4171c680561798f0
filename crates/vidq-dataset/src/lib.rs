#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::expect_used, clippy::unwrap_used))]

pub mod augment;
pub mod config;
pub mod dataset;
pub mod error;
pub mod frames;
pub mod meta;
pub mod prefetch;
pub mod tensor;
pub mod window;
