//! 배당 추적을 위한 도메인 모델.

mod dividend;
mod market_data;

pub use dividend::*;
pub use market_data::*;
