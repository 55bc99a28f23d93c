//! Trading state for perpdeck.
//!
//! - `Runtime`: capability registry holding graph, API client and wallet bridge
//! - `TradingAtoms`: wallet, provider and per-account portfolio nodes
//! - `TradingMutations`: order, position and transfer actions plus signing

pub mod atoms;
pub mod config;
pub mod mutations;
pub mod runtime;
pub mod signing;
pub mod tags;

pub use atoms::TradingAtoms;
pub use config::WidgetConfig;
pub use mutations::TradingMutations;
pub use runtime::Runtime;
pub use signing::SigningState;
