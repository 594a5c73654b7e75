pub mod dna;
pub mod interp;
pub mod progress;
