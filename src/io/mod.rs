pub mod alignment;
pub mod bed;
pub mod current;
pub mod faidx;
pub mod signal;
pub mod store;
