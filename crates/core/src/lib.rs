#![forbid(unsafe_code)]

pub mod error;
pub mod flashcard;
pub mod mastery;
pub mod model;
pub mod questions;
pub mod shuffle;
pub mod time;

pub use error::Error;
pub use time::Clock;
