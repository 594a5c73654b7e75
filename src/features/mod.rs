//! Feature encoders shared by `extract_features` and `predict`.

pub mod alignment;
pub mod current;
pub mod ensemble;
pub mod sequence;
