//! Core data types for the flight alert bot.

pub mod alert;
pub mod catalog;
pub mod fare;
pub mod price;
pub mod route;

pub use alert::*;
pub use catalog::*;
pub use fare::*;
pub use price::*;
pub use route::*;
