// Stablecoin Flow Analysis Module
// USDT flows amplify volatility; USDC flows validate capital

pub mod analyzer;
pub mod classifier;
pub mod usdc_model;
pub mod usdt_model;

pub use analyzer::{KalmanAdjustments, StablecoinFlowAnalyzer, StablecoinFlowData};
pub use classifier::{ClassificationResult, FlowClassifier, FlowEvent, MarketImpact};
pub use usdc_model::USDCFlowModel;
pub use usdt_model::USDTFlowModel;
