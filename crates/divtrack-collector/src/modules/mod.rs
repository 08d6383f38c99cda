//! 데이터 수집 모듈.

pub mod acquisition;
pub mod symbol_worker;

pub use acquisition::{AcquisitionPipeline, FetchFailure, FetchReport};
pub use symbol_worker::{Stage, SymbolError, SymbolOutcome, SymbolWorker};
