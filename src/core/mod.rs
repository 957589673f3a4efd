//! Core business logic: return calculations and the abstractions around them

pub mod align;
pub mod auth;
pub mod config;
pub mod error;
pub mod history;
pub mod instrument;
pub mod log;
pub mod portfolio;
pub mod returns;
pub mod scale;
pub mod store;
pub mod window;

// Re-export main types for cleaner imports
pub use align::{AlignOptions, AlignedPoint, SeriesInput, align_series};
pub use error::ReturnError;
pub use history::HistoryProvider;
pub use instrument::{Instrument, InstrumentKind, InstrumentSource, PORTFOLIO_ID, PriceObservation};
pub use portfolio::{PortfolioDefinition, PortfolioReturn, apply_portfolio, portfolio_return};
pub use returns::{WindowReturn, window_return};
pub use scale::{AxisScale, axis_scale};
pub use store::PriceStore;
pub use window::{Period, ReturnWindow};
