// vamm-perps: virtual AMM perpetual futures core.
// traders take leveraged positions against a constant-product reserve curve,
// margin is held in a vault module and bad debt is backed by an ecosystem fund.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: Pair, Address, Direction, Coin, Timestamp
//   2.x  math.rs: 18 dp decimal helpers, U256 square root
//   3.x  market.rs: market config + runtime state
//   4.x  amm.rs: reserve pool, swaps, limits, snapshots
//   4.5  store.rs: keyed state: markets, pools, positions, snapshots
//   5.x  position.rs: position struct, notional, PnL, margin ratio
//   6.x  funding.rs: premium fraction per funding epoch
//   7.x  liquidation.rs: eligibility, partial vs full, fee split
//   8.x  engine/: swaps, twap, positions, vault, liquidations, funding hooks
//   9.0  bank.rs: module accounts and coin transfers
//   9.1  oracle.rs: index price capability
//   9.2  epochs.rs: epoch scheduler capability + hooks
//   11.x events.rs: state transition events for audit

pub mod amm;
pub mod engine;
pub mod events;
pub mod funding;
pub mod liquidation;
pub mod market;
pub mod math;
pub mod position;
pub mod store;
pub mod types;

// capabilities
pub mod bank;
pub mod epochs;
pub mod oracle;

pub use amm::{AmmError, Pool, ReserveSnapshot, TwapCalcOption};
pub use bank::{BankError, BankKeeper, MemoryBank, PERP_EF_MODULE, VAULT_MODULE};
pub use engine::*;
pub use epochs::{EpochHooks, EpochInfo, EpochKeeper, StaticEpochs};
pub use events::*;
pub use liquidation::{LiquidateResp, LiquidationFailedReason, LiquidationKind};
pub use market::{Market, MarketConfig, MarketError};
pub use oracle::{OracleError, OracleKeeper, StaticOracle};
pub use position::{Position, PositionResp};
pub use store::State;
pub use types::*;
