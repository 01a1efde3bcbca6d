//! Analysis module - frequency-domain loudness for the noise tracker

mod spectrum;

pub use spectrum::*;
