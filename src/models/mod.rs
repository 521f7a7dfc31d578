//! Shared models for bars, timeframes, swap prints, chain events and the
//! charting-library contract.

pub mod bar;
pub mod event;
pub mod rpc;
pub mod swap;
pub mod symbol;
pub mod timeframe;

pub use bar::Bar;
pub use event::{EventAttribute, SwapAttributes, TxEvent};
pub use rpc::RpcRequest;
pub use swap::{Direction, NATIVE_DENOM, NATIVE_EXPONENT, ParsedSwap, TokenContext};
pub use symbol::{
    DatafeedConfiguration, HistoryMetadata, LibrarySymbolInfo, PeriodParams, SearchSymbolResult,
    SymbolType,
};
pub use timeframe::TfKey;
