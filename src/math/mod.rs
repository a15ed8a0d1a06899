//! Pure numeric helpers shared by the engines.

pub mod geo;
pub mod vector;
