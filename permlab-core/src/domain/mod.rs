//! Domain types for PermLab

pub mod bar;
pub mod series;
pub mod trade;

pub use bar::Bar;
pub use series::{Series, SeriesError};
pub use trade::{TradeRecord, TradeSide};
