//! Rating scales: rating-to-PD resolution and migration matrices.

pub mod resolver;
pub mod transition;
