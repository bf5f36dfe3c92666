//! Perpetual-futures margin: leverage, funding and liquidation.

use backtest_config::MarketSettings;
use rust_decimal::Decimal;

/// Margin rules of a perpetual-futures run.
#[derive(Debug, Clone, PartialEq)]
pub struct PerpetualMargin {
    leverage: Decimal,
    funding_rate: Decimal,
    funding_interval_ms: i64,
    maintenance_margin_rate: Decimal,
}

impl PerpetualMargin {
    pub fn new(
        leverage: Decimal,
        funding_rate: Decimal,
        funding_interval_ms: i64,
        maintenance_margin_rate: Decimal,
    ) -> Self {
        Self {
            leverage: leverage.max(Decimal::ONE),
            funding_rate,
            funding_interval_ms: funding_interval_ms.max(1),
            maintenance_margin_rate,
        }
    }

    /// Margin rules for perpetual settings, `None` in spot mode.
    pub fn from_settings(market: &MarketSettings) -> Option<Self> {
        market.is_perpetual().then(|| {
            Self::new(
                market.leverage,
                market.funding_rate,
                market.funding_interval_ms,
                market.maintenance_margin_rate,
            )
        })
    }

    pub fn leverage(&self) -> Decimal {
        self.leverage
    }

    /// Equity not tied up as initial margin.
    pub fn free_margin(&self, equity: Decimal, gross_exposure: Decimal) -> Decimal {
        equity - gross_exposure / self.leverage
    }

    /// Funding boundaries crossed in `(from, to]`.
    pub fn funding_periods(&self, from: i64, to: i64) -> i64 {
        if to <= from {
            return 0;
        }
        to.div_euclid(self.funding_interval_ms) - from.div_euclid(self.funding_interval_ms)
    }

    /// Funding owed per unit of a long position over `periods` intervals.
    pub fn funding_per_unit(&self, mark: Decimal, periods: i64) -> Decimal {
        mark * self.funding_rate * Decimal::from(periods)
    }

    /// Equity below which every position is liquidated.
    pub fn maintenance_margin(&self, gross_exposure: Decimal) -> Decimal {
        gross_exposure * self.maintenance_margin_rate
    }

    /// Check if open positions must be liquidated.
    pub fn is_liquidatable(&self, equity: Decimal, gross_exposure: Decimal) -> bool {
        gross_exposure > Decimal::ZERO && equity < self.maintenance_margin(gross_exposure)
    }
}
