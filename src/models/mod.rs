// Data Model Module
// Value records with invariant-enforcing constructors

pub mod leverage;
pub mod quote;
pub mod regime;
pub mod signal;
pub mod stablecoin;
pub mod true_price;

pub use leverage::{CascadeDetection, CascadeDirection, LeverageState, LeverageStress};
pub use quote::VenueQuote;
pub use regime::{Regime, RegimeType, ReversionSpeed};
pub use signal::{Signal, SignalType, Target, Timeframe};
pub use stablecoin::{
    FlowClassification, FlowRatio, FlowType, PriceDirection, RegimeSignal, StablecoinState,
    USDCImpact, USDTImpact,
};
pub use true_price::TruePriceEstimate;
