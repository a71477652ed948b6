pub mod loans;
pub mod ratings;
pub mod stress;
