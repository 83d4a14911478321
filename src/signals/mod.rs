// Signal Generation Module

pub mod generator;

pub use generator::TruePriceSignalGenerator;
