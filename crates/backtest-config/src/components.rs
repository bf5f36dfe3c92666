//! Pluggable component specs and their resolution.
//!
//! A spec is one of: a number literal, an object literal, a builtin token,
//! `{builtin|name, params}` or `{module, class, params}`. Missing or empty
//! specs resolve to the component's default token.

use backtest_core::error::{ComponentError, StrategyError};
use backtest_ledger::{FeeModel, FillPolicy, SlippageModel};
use backtest_risk::{CapacityPolicy, SizingModel};
use backtest_strategies::{DynamicFactory, StrategyHandle, StrategyRegistry};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::RunConfig;

/// Raw component spec as written in a run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComponentSpec {
    Number(f64),
    Token(String),
    Builtin {
        #[serde(alias = "name")]
        builtin: String,
        #[serde(default)]
        params: Value,
    },
    Dynamic {
        module: String,
        class: String,
        #[serde(default)]
        params: Value,
    },
    Literal(Map<String, Value>),
}

impl ComponentSpec {
    /// Check if the spec asks for the default.
    pub fn is_empty(&self) -> bool {
        match self {
            ComponentSpec::Token(token) => token.trim().is_empty(),
            ComponentSpec::Literal(map) => map.is_empty(),
            _ => false,
        }
    }
}

/// A builtin component family resolvable from a [`ComponentSpec`].
///
/// Implementors deserialize from `{"type": <canonical token>, ...params}`.
pub trait Component: DeserializeOwned + Sized {
    /// Label used in errors.
    const KIND: &'static str;

    /// Token used when the spec is missing.
    const DEFAULT_TOKEN: &'static str;

    /// Canonical token for a token or one of its aliases.
    fn canonical(token: &str) -> Option<&'static str>;

    /// Instance with default parameters for a canonical token.
    fn from_canonical(token: &'static str) -> Option<Self>;

    /// Component from a bare number, when the family has one.
    fn from_number(_value: f64) -> Option<Self> {
        None
    }

    /// Canonical token for an untyped object literal, inferred from its keys.
    fn infer(_literal: &Map<String, Value>) -> Option<&'static str> {
        None
    }
}

fn decimal(value: f64) -> Option<Decimal> {
    Decimal::try_from(value).ok()
}

impl Component for FeeModel {
    const KIND: &'static str = "fee model";
    const DEFAULT_TOKEN: &'static str = "static";

    fn canonical(token: &str) -> Option<&'static str> {
        match token {
            "static" | "FEE_STATIC" => Some("static"),
            "per_symbol" | "FEE_PER_SYMBOL" => Some("per_symbol"),
            _ => None,
        }
    }

    fn from_canonical(token: &'static str) -> Option<Self> {
        match token {
            "static" => Some(FeeModel::default()),
            "per_symbol" => Some(FeeModel::standard_per_symbol()),
            _ => None,
        }
    }

    fn from_number(value: f64) -> Option<Self> {
        (value >= 0.0).then(|| decimal(value)).flatten().map(|rate| FeeModel::Static { rate })
    }

    fn infer(literal: &Map<String, Value>) -> Option<&'static str> {
        if literal.contains_key("rates") {
            Some("per_symbol")
        } else if literal.contains_key("rate") {
            Some("static")
        } else {
            None
        }
    }
}

impl Component for SlippageModel {
    const KIND: &'static str = "slippage model";
    const DEFAULT_TOKEN: &'static str = "zero";

    fn canonical(token: &str) -> Option<&'static str> {
        match token {
            "zero" | "SLIP_ZERO" => Some("zero"),
            "fixed" => Some("fixed"),
            "random" | "SLIP_RANDOM" => Some("random"),
            _ => None,
        }
    }

    fn from_canonical(token: &'static str) -> Option<Self> {
        match token {
            "zero" => Some(SlippageModel::Zero),
            "random" => Some(SlippageModel::standard_random()),
            _ => None,
        }
    }

    fn from_number(value: f64) -> Option<Self> {
        (value >= 0.0).then(|| decimal(value)).flatten().map(|rate| SlippageModel::Fixed { rate })
    }

    fn infer(literal: &Map<String, Value>) -> Option<&'static str> {
        if literal.contains_key("max") {
            Some("random")
        } else if literal.contains_key("rate") || literal.contains_key("pct") {
            Some("fixed")
        } else {
            None
        }
    }
}

impl Component for FillPolicy {
    const KIND: &'static str = "fill policy";
    const DEFAULT_TOKEN: &'static str = "aggressive_market";

    fn canonical(token: &str) -> Option<&'static str> {
        match token {
            "aggressive_market" | "AggressiveMarketPolicy" => Some("aggressive_market"),
            "vwap_depth" | "VWAPDepthPolicy" => Some("vwap_depth"),
            _ => None,
        }
    }

    fn from_canonical(token: &'static str) -> Option<Self> {
        match token {
            "aggressive_market" => Some(FillPolicy::AggressiveMarket),
            "vwap_depth" => Some(FillPolicy::VwapDepth {
                levels: 3,
                level_step: rust_decimal_macros::dec!(0.0005),
            }),
            _ => None,
        }
    }

    fn infer(literal: &Map<String, Value>) -> Option<&'static str> {
        literal.contains_key("levels").then_some("vwap_depth")
    }
}

impl Component for CapacityPolicy {
    const KIND: &'static str = "capacity policy";
    const DEFAULT_TOKEN: &'static str = "leg_capacity";

    fn canonical(token: &str) -> Option<&'static str> {
        match token {
            "leg_capacity" | "LegCapacity" => Some("leg_capacity"),
            "symbol_capacity" | "SymbolCapacity" => Some("symbol_capacity"),
            "position_capacity" | "PositionCapacity" => Some("position_capacity"),
            _ => None,
        }
    }

    fn from_canonical(token: &'static str) -> Option<Self> {
        match token {
            "leg_capacity" => Some(CapacityPolicy::LegCapacity { max_legs: 5 }),
            "symbol_capacity" => Some(CapacityPolicy::SymbolCapacity { max_symbols: 5 }),
            _ => None,
        }
    }

    fn infer(literal: &Map<String, Value>) -> Option<&'static str> {
        if literal.contains_key("max_open_positions") {
            Some("position_capacity")
        } else if literal.contains_key("max_symbols") {
            Some("symbol_capacity")
        } else if literal.contains_key("max_legs") {
            Some("leg_capacity")
        } else {
            None
        }
    }
}

impl Component for SizingModel {
    const KIND: &'static str = "sizing model";
    const DEFAULT_TOKEN: &'static str = "fixed_fraction";

    fn canonical(token: &str) -> Option<&'static str> {
        match token {
            "fixed_fraction" => Some("fixed_fraction"),
            "volatility_scaled" => Some("volatility_scaled"),
            "external" => Some("external"),
            _ => None,
        }
    }

    fn from_canonical(token: &'static str) -> Option<Self> {
        match token {
            "fixed_fraction" => Some(SizingModel::default()),
            "external" => Some(SizingModel::External),
            _ => None,
        }
    }

    fn from_number(value: f64) -> Option<Self> {
        (value > 0.0 && value <= 1.0)
            .then(|| decimal(value))
            .flatten()
            .map(|fraction| SizingModel::FixedFraction { fraction })
    }

    fn infer(literal: &Map<String, Value>) -> Option<&'static str> {
        if literal.contains_key("risk_fraction") {
            Some("volatility_scaled")
        } else if literal.contains_key("fraction") {
            Some("fixed_fraction")
        } else {
            None
        }
    }
}

fn unknown<C: Component>(name: &str) -> ComponentError {
    ComponentError::UnknownBuiltin {
        kind: C::KIND,
        name: name.to_string(),
    }
}

fn from_params<C: Component>(token: &'static str, params: Map<String, Value>) -> Result<C, ComponentError> {
    let mut object = params;
    object.insert("type".to_string(), Value::String(token.to_string()));
    serde_json::from_value(Value::Object(object)).map_err(|e| ComponentError::InvalidParams {
        kind: C::KIND,
        name: token.to_string(),
        reason: e.to_string(),
    })
}

fn from_token<C: Component>(token: &str) -> Result<C, ComponentError> {
    let canonical = C::canonical(token).ok_or_else(|| unknown::<C>(token))?;
    match C::from_canonical(canonical) {
        Some(component) => Ok(component),
        // No parameterless default for this token
        None => Err(ComponentError::InvalidParams {
            kind: C::KIND,
            name: canonical.to_string(),
            reason: "parameters are required".to_string(),
        }),
    }
}

/// Resolve a spec of one builtin component family.
pub fn resolve<C: Component>(spec: Option<&ComponentSpec>) -> Result<C, ComponentError> {
    let spec = match spec {
        Some(spec) if !spec.is_empty() => spec,
        _ => return from_token(C::DEFAULT_TOKEN),
    };

    match spec {
        ComponentSpec::Number(value) => C::from_number(*value).ok_or_else(|| ComponentError::UnsupportedSpec {
            kind: C::KIND,
            spec: value.to_string(),
        }),
        ComponentSpec::Token(token) => from_token(token.trim()),
        ComponentSpec::Builtin { builtin, params } => {
            let canonical = C::canonical(builtin).ok_or_else(|| unknown::<C>(builtin))?;
            match params {
                Value::Null => from_token(canonical),
                Value::Object(map) if map.is_empty() => from_token(canonical),
                Value::Object(map) => from_params(canonical, map.clone()),
                other => Err(ComponentError::InvalidParams {
                    kind: C::KIND,
                    name: canonical.to_string(),
                    reason: format!("params must be an object, got {}", other),
                }),
            }
        }
        ComponentSpec::Dynamic { module, class, .. } => Err(ComponentError::UnknownDynamic {
            kind: C::KIND,
            module: module.clone(),
            class: class.clone(),
        }),
        ComponentSpec::Literal(map) => {
            if let Some(Value::String(tag)) = map.get("type") {
                let canonical = C::canonical(tag).ok_or_else(|| unknown::<C>(tag))?;
                let mut params = map.clone();
                params.remove("type");
                return from_params(canonical, params);
            }
            let canonical = C::infer(map).ok_or_else(|| ComponentError::UnsupportedSpec {
                kind: C::KIND,
                spec: Value::Object(map.clone()).to_string(),
            })?;
            from_params(canonical, map.clone())
        }
    }
}

/// Every component a run needs, resolved once before phase one.
#[derive(Debug)]
pub struct ResolvedComponents {
    pub strategy: StrategyHandle,
    pub fee_model: FeeModel,
    pub slippage_model: SlippageModel,
    pub fill_policy: FillPolicy,
    pub sizing_model: SizingModel,
    pub capacity_policy: CapacityPolicy,
}

/// Resolves component specs against builtin tables and host registrations.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    strategies: StrategyRegistry,
}

impl ComponentRegistry {
    /// Registry with the builtin components only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a host strategy under `{module, class}`.
    pub fn register_strategy(
        &mut self,
        module: impl Into<String>,
        class: impl Into<String>,
        factory: DynamicFactory,
    ) {
        self.strategies.register_dynamic(module, class, factory);
    }

    /// Builtin strategies.
    pub fn strategies(&self) -> &StrategyRegistry {
        &self.strategies
    }

    /// Resolve the strategy spec.
    pub fn resolve_strategy(&self, spec: Option<&ComponentSpec>) -> Result<StrategyHandle, ComponentError> {
        const KIND: &str = "strategy";

        let to_component = |name: &str, err: StrategyError| match err {
            StrategyError::NotFound(_) => ComponentError::UnknownBuiltin {
                kind: KIND,
                name: name.to_string(),
            },
            other => ComponentError::InvalidParams {
                kind: KIND,
                name: name.to_string(),
                reason: other.to_string(),
            },
        };
        let builtin = |name: &str, params: &Value| {
            let token = strategy_token(name);
            self.strategies
                .create(token, params)
                .map_err(|e| to_component(name, e))
        };

        match spec {
            None => builtin("peak_ema_reversal", &Value::Null),
            Some(spec) if spec.is_empty() => builtin("peak_ema_reversal", &Value::Null),
            Some(ComponentSpec::Token(token)) => builtin(token.trim(), &Value::Null),
            Some(ComponentSpec::Builtin { builtin: name, params }) => builtin(name, params),
            Some(ComponentSpec::Dynamic { module, class, params }) => {
                if !self.strategies.has_dynamic(module, class) {
                    return Err(ComponentError::UnknownDynamic {
                        kind: KIND,
                        module: module.clone(),
                        class: class.clone(),
                    });
                }
                self.strategies
                    .create_dynamic(module, class, params)
                    .map_err(|e| to_component(&format!("{}.{}", module, class), e))
            }
            Some(other) => Err(ComponentError::UnsupportedSpec {
                kind: KIND,
                spec: serde_json::to_string(other).unwrap_or_default(),
            }),
        }
    }

    /// Resolve every component of a run.
    pub fn resolve(&self, config: &RunConfig) -> Result<ResolvedComponents, ComponentError> {
        let resolved = ResolvedComponents {
            strategy: self.resolve_strategy(config.strategy.as_ref())?,
            fee_model: resolve(config.fee_model.as_ref())?,
            slippage_model: resolve(config.slippage_model.as_ref())?,
            fill_policy: resolve(config.fill_policy.as_ref())?,
            sizing_model: resolve(config.sizing_model.as_ref())?,
            capacity_policy: resolve(config.capacity_policy.as_ref())?,
        };
        debug!(
            fee_model = resolved.fee_model.name(),
            slippage_model = resolved.slippage_model.name(),
            fill_policy = resolved.fill_policy.name(),
            sizing_model = resolved.sizing_model.name(),
            capacity_policy = resolved.capacity_policy.name(),
            "Resolved components"
        );
        Ok(resolved)
    }
}

/// Builtin strategy token for a name or one of its class-style aliases.
fn strategy_token(name: &str) -> &str {
    match name {
        "PeakEMAReversalStrategy" | "PeakEmaReversal" => "peak_ema_reversal",
        "MACrossoverStrategy" | "MaCrossover" => "ma_crossover",
        "MomentumStrategy" => "momentum",
        "EnsembleStrategy" => "ensemble",
        other => other,
    }
}
