// Technical indicators
//
// Pure functions over candle windows. Candles are oldest-first; every
// function validates window length and fails with InsufficientData
// rather than computing on partial data.
pub mod atr;
pub mod moving_average;
pub mod rsi;
pub mod trend;

pub use atr::calculate_atr;
pub use moving_average::calculate_sma;
pub use rsi::calculate_rsi;
pub use trend::is_trending_up;
