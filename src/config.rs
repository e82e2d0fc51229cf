// 7.0 config.rs: exchange settings in human units. risk ratios, markets, collateral, signing domain.
// 7.1 everything is Decimal here and turns into 1e6/1e18 scaled I256 on the way into the engine.

use alloy_primitives::{Address, I256};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::crypto::OrderDomain;
use crate::margin::Collateral;
use crate::math::from_i128;
use crate::types::MarketId;

// Signing domain for off-chain orders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    pub chain_id: u64,
    // Order book contract, the EIP-712 verifying contract
    pub verifying_contract: Address,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            chain_id: 321123,
            verifying_contract: Address::with_last_byte(0x03),
        }
    }
}

/** 7.2: account wide risk settings. ratios are fractions, 0.2 = 20% */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    // Margin fraction a new order must leave behind
    pub min_allowable_margin: Decimal,
    // Below this margin fraction an account is liquidable
    pub maintenance_margin: Decimal,
    pub taker_fee: Decimal,
    // Share of a position one liquidation may close
    pub max_liquidation_ratio: Decimal,
    // How far past the block time an IOC order may expire
    pub ioc_expiration_cap_secs: u64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            min_allowable_margin: dec!(0.2),
            maintenance_margin: dec!(0.1),
            taker_fee: dec!(0.0005),
            max_liquidation_ratio: dec!(0.25),
            ioc_expiration_cap_secs: 5,
        }
    }
}

// One perpetual market. its index is its position in ExchangeConfig::markets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    // Market symbol (e.g. "ETH-PERP")
    pub symbol: String,
    pub address: Address,
    // Minimum order size and size step, in base units
    pub min_size: Decimal,
    // Price tick in quote units
    pub tick_size: Decimal,
    // Allowed distance of a fill from the oracle price
    pub max_oracle_spread: Decimal,
    // Allowed distance of a liquidation fill from the mark price
    pub max_liquidation_spread: Decimal,
}

impl MarketConfig {
    pub fn new(symbol: &str, address: Address, min_size: Decimal, tick_size: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            address,
            min_size,
            tick_size,
            max_oracle_spread: dec!(0.2),
            max_liquidation_spread: dec!(0.05),
        }
    }
}

// Accepted collateral asset. price is an initial oracle value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralConfig {
    pub symbol: String,
    pub price: Decimal,
    pub weight: Decimal,
    pub decimals: u32,
}

/** 7.3: everything needed to stand up an exchange snapshot */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    pub domain: DomainConfig,
    pub risk: RiskConfig,
    pub markets: Vec<MarketConfig>,
    pub collateral: Vec<CollateralConfig>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            domain: DomainConfig::default(),
            risk: RiskConfig::default(),
            markets: vec![
                MarketConfig::new("ETH-PERP", Address::with_last_byte(0x10), dec!(0.01), dec!(0.01)),
                MarketConfig::new("AVAX-PERP", Address::with_last_byte(0x11), dec!(0.1), dec!(0.001)),
            ],
            collateral: vec![CollateralConfig {
                symbol: "USDC".to_string(),
                price: Decimal::ONE,
                weight: Decimal::ONE,
                decimals: 6,
            }],
        }
    }
}

// Scaled engine view of RiskConfig
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskParams {
    pub min_allowable_margin: I256,
    pub maintenance_margin: I256,
    pub taker_fee: I256,
    pub max_liquidation_ratio: I256,
    pub ioc_expiration_cap: u64,
}

// Scaled engine view of MarketConfig
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketParams {
    pub id: MarketId,
    pub address: Address,
    pub min_size: I256,
    pub tick: I256,
    pub max_oracle_spread: I256,
    pub max_liquidation_spread: I256,
}

/// `value * 10^decimals`, truncated.
pub fn to_scaled(value: Decimal, decimals: u32) -> Result<I256, ConfigError> {
    let factor = 10u64
        .checked_pow(decimals)
        .map(Decimal::from)
        .ok_or(ConfigError::OutOfRange(value))?;
    value
        .checked_mul(factor)
        .and_then(|scaled| scaled.trunc().to_i128())
        .map(from_i128)
        .ok_or(ConfigError::OutOfRange(value))
}

impl ExchangeConfig {
    // Testnet preset: chain 321123, fast IOC window
    pub fn testnet() -> Self {
        let mut config = Self::default();
        config.risk.ioc_expiration_cap_secs = 10;
        config.markets.push(MarketConfig::new(
            "BTC-PERP",
            Address::with_last_byte(0x12),
            dec!(0.001),
            dec!(0.1),
        ));
        config
    }

    // Mainnet preset with tighter bands
    pub fn mainnet() -> Self {
        let mut config = Self::default();
        config.domain.chain_id = 1992;
        config.risk.max_liquidation_ratio = dec!(0.2);
        for market in &mut config.markets {
            market.max_oracle_spread = dec!(0.1);
            market.max_liquidation_spread = dec!(0.03);
        }
        config
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        let risk = &self.risk;
        // maintenance must sit strictly below the new order requirement
        if risk.maintenance_margin <= Decimal::ZERO || risk.maintenance_margin >= risk.min_allowable_margin {
            return Err(ConfigError::InvalidRisk {
                reason: "maintenance margin must be in (0, min allowable margin)".to_string(),
            });
        }
        if risk.min_allowable_margin >= Decimal::ONE {
            return Err(ConfigError::InvalidRisk {
                reason: "min allowable margin must be below 1".to_string(),
            });
        }
        if risk.taker_fee < Decimal::ZERO || risk.taker_fee > dec!(0.01) {
            return Err(ConfigError::InvalidRisk {
                reason: "taker fee must be in [0, 1%]".to_string(),
            });
        }
        if risk.max_liquidation_ratio <= Decimal::ZERO || risk.max_liquidation_ratio > Decimal::ONE {
            return Err(ConfigError::InvalidRisk {
                reason: "max liquidation ratio must be in (0, 1]".to_string(),
            });
        }
        if risk.ioc_expiration_cap_secs == 0 {
            return Err(ConfigError::InvalidRisk {
                reason: "ioc expiration cap must be positive".to_string(),
            });
        }

        if self.markets.is_empty() {
            return Err(ConfigError::InvalidMarket {
                symbol: String::new(),
                reason: "at least one market is required".to_string(),
            });
        }
        let mut addresses = BTreeSet::new();
        for market in &self.markets {
            let invalid = |reason: &str| ConfigError::InvalidMarket {
                symbol: market.symbol.clone(),
                reason: reason.to_string(),
            };
            if market.min_size <= Decimal::ZERO {
                return Err(invalid("min size must be positive"));
            }
            if market.tick_size <= Decimal::ZERO {
                return Err(invalid("tick size must be positive"));
            }
            for spread in [market.max_oracle_spread, market.max_liquidation_spread] {
                if spread <= Decimal::ZERO || spread >= Decimal::ONE {
                    return Err(invalid("spreads must be in (0, 1)"));
                }
            }
            if !addresses.insert(market.address) {
                return Err(invalid("duplicate market address"));
            }
        }

        if self.collateral.is_empty() {
            return Err(ConfigError::InvalidCollateral {
                symbol: String::new(),
                reason: "at least one collateral asset is required".to_string(),
            });
        }
        for asset in &self.collateral {
            let invalid = |reason: &str| ConfigError::InvalidCollateral {
                symbol: asset.symbol.clone(),
                reason: reason.to_string(),
            };
            if asset.weight <= Decimal::ZERO || asset.weight > Decimal::ONE {
                return Err(invalid("weight must be in (0, 1]"));
            }
            if asset.price <= Decimal::ZERO {
                return Err(invalid("price must be positive"));
            }
            if asset.decimals > 18 {
                return Err(invalid("at most 18 decimals"));
            }
        }

        Ok(())
    }

    pub fn order_domain(&self) -> OrderDomain {
        OrderDomain::new(self.domain.chain_id, self.domain.verifying_contract)
    }

    pub fn risk_params(&self) -> Result<RiskParams, ConfigError> {
        Ok(RiskParams {
            min_allowable_margin: to_scaled(self.risk.min_allowable_margin, 6)?,
            maintenance_margin: to_scaled(self.risk.maintenance_margin, 6)?,
            taker_fee: to_scaled(self.risk.taker_fee, 6)?,
            max_liquidation_ratio: to_scaled(self.risk.max_liquidation_ratio, 6)?,
            ioc_expiration_cap: self.risk.ioc_expiration_cap_secs,
        })
    }

    pub fn market_params(&self) -> Result<Vec<MarketParams>, ConfigError> {
        self.markets
            .iter()
            .enumerate()
            .map(|(index, market)| {
                Ok(MarketParams {
                    id: MarketId(index as u64),
                    address: market.address,
                    min_size: to_scaled(market.min_size, 18)?,
                    tick: to_scaled(market.tick_size, 6)?,
                    max_oracle_spread: to_scaled(market.max_oracle_spread, 6)?,
                    max_liquidation_spread: to_scaled(market.max_liquidation_spread, 6)?,
                })
            })
            .collect()
    }

    pub fn collateral_assets(&self) -> Result<Vec<Collateral>, ConfigError> {
        self.collateral
            .iter()
            .map(|asset| {
                Ok(Collateral {
                    price: to_scaled(asset.price, 6)?,
                    weight: to_scaled(asset.weight, 6)?,
                    decimals: asset.decimals,
                })
            })
            .collect()
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid risk config: {reason}")]
    InvalidRisk { reason: String },

    #[error("invalid market {symbol}: {reason}")]
    InvalidMarket { symbol: String, reason: String },

    #[error("invalid collateral {symbol}: {reason}")]
    InvalidCollateral { symbol: String, reason: String },

    #[error("{0} does not fit the fixed point range")]
    OutOfRange(Decimal),

    #[error("config parse failed: {0}")]
    Parse(String),
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> ExchangeConfig {
        match self {
            Environment::Development => ExchangeConfig::default(),
            Environment::Testnet => ExchangeConfig::testnet(),
            Environment::Mainnet => ExchangeConfig::mainnet(),
        }
    }
}
