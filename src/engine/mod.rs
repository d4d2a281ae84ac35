// 8.0: the engine. owns market, pool, position and snapshot state plus the bank,
// oracle and epoch capabilities. every entry point runs against one block height
// and time; multi-step operations run in scopes that roll back as a unit.

mod config;
mod core;
mod funding;
mod liquidations;
mod positions;
mod pricing;
mod results;
mod swaps;
mod vault;

pub use config::{ConfigError, EngineConfig};
pub use core::{CreateMarketArgs, Engine};
pub use results::{EngineError, LiquidationOutcome, LiquidationRequest, MarginResp, QueryPositionResp};
