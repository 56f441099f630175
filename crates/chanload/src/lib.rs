#![doc = include_str!("../README.md")]

mod error;
mod pool;
mod random;
mod scheduler;
mod service;
mod time;
mod traffic;

pub use crate::error::*;
pub use crate::pool::*;
pub use crate::random::*;
pub use crate::scheduler::*;
pub use crate::service::*;
pub use crate::time::*;
pub use crate::traffic::*;
