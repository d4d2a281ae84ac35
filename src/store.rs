// 5.0: keyed stores. one BTreeMap per record type so iteration order is the key
// order on every node. State is Clone: a scope checkpoint is a copy of it.

use crate::amm::{Pool, ReserveSnapshot};
use crate::market::Market;
use crate::position::Position;
use crate::types::{Address, Pair, Timestamp};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    markets: BTreeMap<Pair, Market>,
    pools: BTreeMap<Pair, Pool>,
    positions: BTreeMap<(Pair, Address), Position>,
    snapshots: BTreeMap<(Pair, i64), ReserveSnapshot>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    // 5.1: markets and pools

    pub fn market(&self, pair: &Pair) -> Option<&Market> {
        self.markets.get(pair)
    }

    pub fn insert_market(&mut self, market: Market) {
        self.markets.insert(market.pair.clone(), market);
    }

    pub fn markets(&self) -> impl Iterator<Item = &Market> {
        self.markets.values()
    }

    pub fn pool(&self, pair: &Pair) -> Option<&Pool> {
        self.pools.get(pair)
    }

    pub fn insert_pool(&mut self, pool: Pool) {
        self.pools.insert(pool.pair.clone(), pool);
    }

    // 5.2: positions keyed by (pair, trader)

    pub fn position(&self, pair: &Pair, trader: &Address) -> Option<&Position> {
        self.positions.get(&(pair.clone(), trader.clone()))
    }

    pub fn insert_position(&mut self, position: Position) {
        let key = (position.pair.clone(), position.trader.clone());
        self.positions.insert(key, position);
    }

    pub fn remove_position(&mut self, pair: &Pair, trader: &Address) -> Option<Position> {
        self.positions.remove(&(pair.clone(), trader.clone()))
    }

    pub fn positions_of<'a>(&'a self, trader: &'a Address) -> impl Iterator<Item = &'a Position> + 'a {
        self.positions
            .iter()
            .filter(move |((_, owner), _)| owner == trader)
            .map(|(_, position)| position)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    // 5.3: snapshots keyed by (pair, ms). same-ms writes replace.

    pub fn insert_snapshot(&mut self, snapshot: ReserveSnapshot) {
        let key = (snapshot.pair.clone(), snapshot.timestamp_ms);
        self.snapshots.insert(key, snapshot);
    }

    /// Latest snapshot of `pair` taken at or before `at`.
    pub fn latest_snapshot(&self, pair: &Pair, at: Timestamp) -> Option<&ReserveSnapshot> {
        self.snapshots
            .range((pair.clone(), i64::MIN)..=(pair.clone(), at.as_millis()))
            .next_back()
            .map(|(_, snapshot)| snapshot)
    }

    /// Snapshots of `pair` at or before `at`, newest first.
    pub fn snapshots_desc<'a>(
        &'a self,
        pair: &Pair,
        at: Timestamp,
    ) -> impl Iterator<Item = &'a ReserveSnapshot> + 'a {
        self.snapshots
            .range((pair.clone(), i64::MIN)..=(pair.clone(), at.as_millis()))
            .rev()
            .map(|(_, snapshot)| snapshot)
    }

    pub fn snapshot_count(&self, pair: &Pair) -> usize {
        self.snapshots
            .range((pair.clone(), i64::MIN)..=(pair.clone(), i64::MAX))
            .count()
    }
}
