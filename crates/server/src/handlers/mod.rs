//! HTTP request handlers.

pub mod capabilities;
pub mod common;
pub mod health;
pub mod isolate;
pub mod retrieve;

pub use capabilities::*;
pub use health::*;
pub use isolate::*;
pub use retrieve::*;
