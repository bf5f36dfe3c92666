//! Resolution of candles that reach both bracket levels.

use backtest_config::CrossingPolicy;
use backtest_core::types::Direction;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(hash: u64, bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(hash, |h, b| (h ^ u64::from(*b)).wrapping_mul(FNV_PRIME))
}

/// Seed of a proposal's crossing generator.
///
/// Mixes the run seed with the proposal's identity so the choice does not
/// depend on replay order or worker count.
pub fn proposal_seed(run_seed: u64, symbol: &str, decision_time: i64, direction: Direction) -> u64 {
    let mut hash = fnv1a(FNV_OFFSET, symbol.as_bytes());
    hash = fnv1a(hash, &decision_time.to_le_bytes());
    hash = fnv1a(hash, &[direction as u8]);
    run_seed ^ hash
}

/// Decides whether take-profit or stop-loss wins an ambiguous candle.
#[derive(Debug, Clone)]
pub struct CrossingResolver {
    policy: CrossingPolicy,
    rng: Option<StdRng>,
}

impl CrossingResolver {
    pub fn new(policy: CrossingPolicy, seed: u64) -> Self {
        let rng = (policy == CrossingPolicy::Random).then(|| StdRng::seed_from_u64(seed));
        Self { policy, rng }
    }

    pub fn policy(&self) -> CrossingPolicy {
        self.policy
    }

    /// Check if take-profit wins a candle that reached both levels.
    pub fn take_profit_wins(&mut self) -> bool {
        match (self.policy, self.rng.as_mut()) {
            (CrossingPolicy::PreferTp, _) => true,
            (CrossingPolicy::Random, Some(rng)) => rng.gen_bool(0.5),
            _ => false,
        }
    }
}
