//! Controller configuration. Built once in `main` and passed down by reference.

pub mod types;
