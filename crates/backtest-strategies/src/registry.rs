//! Strategy registry for built-in and host-registered strategies.

use crate::{
    DynamicStrategy, EnsembleConfig, EnsembleStrategy, MACrossoverConfig, MACrossoverStrategy, MomentumConfig, MomentumStrategy,
    PayloadStrategy, PeakEmaReversalConfig, PeakEmaReversalStrategy, StrategyHandle,
};
use backtest_core::{error::StrategyError, traits::StrategyConfig};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Factory building a host strategy from its `params`.
pub type DynamicFactory =
    Arc<dyn Fn(&serde_json::Value) -> Result<Arc<dyn PayloadStrategy>, StrategyError> + Send + Sync>;

/// Information about a built-in strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyInfo {
    /// Strategy token
    pub name: String,
    /// Strategy description
    pub description: String,
    /// Default parameters as JSON
    pub default_config: serde_json::Value,
}

/// Registry for available strategies.
#[derive(Clone)]
pub struct StrategyRegistry {
    builtins: BTreeMap<String, StrategyInfo>,
    dynamic: HashMap<(String, String), DynamicFactory>,
}

fn info<C: Serialize>(name: &str, description: &str, config: C) -> (String, StrategyInfo) {
    (
        name.to_string(),
        StrategyInfo {
            name: name.to_string(),
            description: description.to_string(),
            default_config: serde_json::to_value(config).unwrap_or_default(),
        },
    )
}

fn parse_params<C>(params: &serde_json::Value) -> Result<C, StrategyError>
where
    C: DeserializeOwned + Default + StrategyConfig,
{
    let config: C = if params.is_null() {
        C::default()
    } else {
        serde_json::from_value(params.clone())
            .map_err(|e| StrategyError::InvalidConfig(e.to_string()))?
    };
    config.validate()?;
    Ok(config)
}

impl StrategyRegistry {
    /// Create a new strategy registry with all built-in strategies.
    pub fn new() -> Self {
        let builtins = [
            info(
                "peak_ema_reversal",
                "Single-peak detection with EMA pullback",
                PeakEmaReversalConfig::default(),
            ),
            info(
                "ma_crossover",
                "Generates signals based on fast/slow moving average crossovers",
                MACrossoverConfig::default(),
            ),
            info(
                "momentum",
                "Follows strong trends using momentum and RSI confirmation",
                MomentumConfig::default(),
            ),
            info(
                "ensemble",
                "Ensemble of multiple strategies (first BUY wins)",
                EnsembleConfig::default(),
            ),
        ]
        .into_iter()
        .collect();

        Self {
            builtins,
            dynamic: HashMap::new(),
        }
    }

    /// List all built-in strategies.
    pub fn list(&self) -> Vec<&StrategyInfo> {
        self.builtins.values().collect()
    }

    /// Get built-in strategy info by name.
    pub fn get(&self, name: &str) -> Option<&StrategyInfo> {
        self.builtins.get(name)
    }

    /// Check if a built-in strategy exists.
    pub fn exists(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }

    /// Register a host strategy under `{module, class}`.
    pub fn register_dynamic(
        &mut self,
        module: impl Into<String>,
        class: impl Into<String>,
        factory: DynamicFactory,
    ) {
        let key = (module.into(), class.into());
        debug!(module = %key.0, class = %key.1, "Registered dynamic strategy");
        self.dynamic.insert(key, factory);
    }

    /// Check if a host strategy is registered.
    pub fn has_dynamic(&self, module: &str, class: &str) -> bool {
        self.dynamic
            .contains_key(&(module.to_string(), class.to_string()))
    }

    /// Create a built-in strategy from its parameters (`null` for defaults).
    pub fn create(
        &self,
        name: &str,
        params: &serde_json::Value,
    ) -> Result<StrategyHandle, StrategyError> {
        match name.to_ascii_lowercase().as_str() {
            "peak_ema_reversal" => Ok(StrategyHandle::PeakEmaReversal(
                PeakEmaReversalStrategy::new(parse_params(params)?),
            )),
            "ma_crossover" => Ok(StrategyHandle::MaCrossover(MACrossoverStrategy::new(
                parse_params(params)?,
            ))),
            "momentum" => Ok(StrategyHandle::Momentum(MomentumStrategy::new(
                parse_params(params)?,
            ))),
            "ensemble" => self.create_ensemble(params),
            _ => Err(StrategyError::NotFound(name.to_string())),
        }
    }

    /// Members are built-ins, resolved recursively.
    fn create_ensemble(&self, params: &serde_json::Value) -> Result<StrategyHandle, StrategyError> {
        let config: EnsembleConfig = parse_params(params)?;
        let members = config
            .strategies
            .iter()
            .map(|member| Ok((self.create(&member.name, &member.params)?, member.weight)))
            .collect::<Result<Vec<_>, StrategyError>>()?;
        debug!(members = members.len(), "Created ensemble strategy");
        Ok(StrategyHandle::Ensemble(EnsembleStrategy::new(members)))
    }

    /// Create a strategy with default configuration.
    pub fn create_default(&self, name: &str) -> Result<StrategyHandle, StrategyError> {
        self.create(name, &serde_json::Value::Null)
    }

    /// Create a host strategy registered under `{module, class}`.
    pub fn create_dynamic(
        &self,
        module: &str,
        class: &str,
        params: &serde_json::Value,
    ) -> Result<StrategyHandle, StrategyError> {
        let factory = self
            .dynamic
            .get(&(module.to_string(), class.to_string()))
            .ok_or_else(|| StrategyError::NotFound(format!("{}.{}", module, class)))?;
        let inner = factory(params)?;
        Ok(StrategyHandle::Dynamic(DynamicStrategy::new(
            module, class, inner,
        )))
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}
