use crate::error::{LookupError, Result};
use crate::models::record::serde_decimal;
use crate::service::decimal::check_magnitude;
use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};

/// 匹配字段对：价目表字段 <-> 用量字段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchFieldPair {
    pub price_list_field: String,
    pub usage_field: String,
}

impl MatchFieldPair {
    pub fn new(price_list_field: impl Into<String>, usage_field: impl Into<String>) -> Self {
        Self {
            price_list_field: price_list_field.into(),
            usage_field: usage_field.into(),
        }
    }

    /// 价目表与用量使用同名字段
    pub fn same(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(field.clone(), field)
    }
}

/// 层级匹配的部分命中策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PartialMatchPolicy {
    /// 所有层级都必须命中
    #[default]
    NoMatch,
    /// 返回能到达的最深层级的候选集
    BestMatch,
}

/// 匹配模式：平铺 (所有字段对同权) 或层级 (从最泛到最细)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", content = "policy", rename_all = "camelCase")]
pub enum MatchStrategy {
    #[default]
    Flat,
    Hierarchical(PartialMatchPolicy),
}

/// 字段名解析方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum KeyLookup {
    #[default]
    CaseInsensitive,
    Exact,
}

pub fn validate_match_fields(pairs: &[MatchFieldPair]) -> Result<()> {
    if pairs.is_empty() {
        return Err(LookupError::Config(
            "at least one match field pair is required".to_string(),
        ));
    }
    for (level, pair) in pairs.iter().enumerate() {
        if pair.price_list_field.trim().is_empty() || pair.usage_field.trim().is_empty() {
            return Err(LookupError::Config(format!(
                "match field pair {} must name both priceListField and usageField",
                level
            )));
        }
    }
    Ok(())
}

/// 舍入方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundingDirection {
    Up,
    Down,
    None,
}

/// 自定义舍入：覆盖默认的 2 位四舍五入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundingDirective {
    pub direction: RoundingDirection,
    #[serde(default = "default_decimal_places")]
    pub decimal_places: u32,
}

fn default_decimal_places() -> u32 {
    2
}

/// 舍入位数上限
pub const MAX_DECIMAL_PLACES: u32 = 28;

fn check_tier_value(name: &str, value: &BigDecimal) -> Result<()> {
    check_magnitude(value).map_err(|e| LookupError::Config(format!("tier {}: {}", name, e)))
}

/// 简单阶梯：整段数量按一个费率计费
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    #[serde(with = "serde_decimal")]
    pub threshold: BigDecimal,
    #[serde(with = "serde_decimal")]
    pub rate: BigDecimal,
}

/// 累进阶梯：各区间分别计费后求和，max 为空表示开放区间
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraduatedTier {
    #[serde(with = "serde_decimal")]
    pub min: BigDecimal,
    #[serde(default, with = "serde_decimal::option")]
    pub max: Option<BigDecimal>,
    #[serde(with = "serde_decimal")]
    pub rate: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CalculationMethod {
    #[default]
    Basic,
    Tiered { tiers: Vec<Tier> },
    Graduated { tiers: Vec<GraduatedTier> },
}

/// 计费配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CalculationConfig {
    pub quantity_field: String,
    #[serde(default)]
    pub price_field: Option<String>,
    #[serde(default)]
    pub cost_price_field: Option<String>,
    #[serde(default)]
    pub sell_price_field: Option<String>,
    #[serde(default)]
    pub method: CalculationMethod,
    #[serde(default)]
    pub rounding: Option<RoundingDirective>,
}

impl CalculationConfig {
    pub fn basic(quantity_field: impl Into<String>, price_field: impl Into<String>) -> Self {
        Self {
            quantity_field: quantity_field.into(),
            price_field: Some(price_field.into()),
            ..Default::default()
        }
    }

    pub fn with_method(mut self, method: CalculationMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_rounding(mut self, direction: RoundingDirection, decimal_places: u32) -> Self {
        self.rounding = Some(RoundingDirective {
            direction,
            decimal_places,
        });
        self
    }

    /// 已配置的价格字段 (主价格 / 成本价 / 售价)
    pub fn price_sources(&self) -> Vec<(PriceKind, &str)> {
        [
            (PriceKind::Price, &self.price_field),
            (PriceKind::Cost, &self.cost_price_field),
            (PriceKind::Sell, &self.sell_price_field),
        ]
        .into_iter()
        .filter_map(|(kind, field)| {
            field
                .as_deref()
                .filter(|f| !f.trim().is_empty())
                .map(|f| (kind, f))
        })
        .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.quantity_field.trim().is_empty() {
            return Err(LookupError::Config("quantityField is required".to_string()));
        }
        if self.price_sources().is_empty() {
            return Err(LookupError::Config(
                "priceField (or costPriceField/sellPriceField) is required".to_string(),
            ));
        }
        if let Some(rounding) = &self.rounding {
            if rounding.decimal_places > MAX_DECIMAL_PLACES {
                return Err(LookupError::Config(format!(
                    "rounding decimalPlaces must be at most {} (got {})",
                    MAX_DECIMAL_PLACES, rounding.decimal_places
                )));
            }
        }
        match &self.method {
            CalculationMethod::Basic => {}
            CalculationMethod::Tiered { tiers } => {
                if tiers.is_empty() {
                    return Err(LookupError::Config("tiered pricing needs at least one tier".to_string()));
                }
                for tier in tiers {
                    check_tier_value("threshold", &tier.threshold)?;
                    check_tier_value("rate", &tier.rate)?;
                }
            }
            CalculationMethod::Graduated { tiers } => {
                if tiers.is_empty() {
                    return Err(LookupError::Config(
                        "graduated pricing needs at least one tier".to_string(),
                    ));
                }
                for tier in tiers {
                    check_tier_value("min", &tier.min)?;
                    check_tier_value("rate", &tier.rate)?;
                    if let Some(max) = &tier.max {
                        check_tier_value("max", max)?;
                    }
                    if tier.min < BigDecimal::zero() {
                        return Err(LookupError::Config(format!(
                            "graduated tier min must not be negative (got {})",
                            tier.min
                        )));
                    }
                    if let Some(max) = &tier.max {
                        if *max < tier.min {
                            return Err(LookupError::Config(format!(
                                "graduated tier max {} is below min {}",
                                max, tier.min
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceKind {
    Price,
    Cost,
    Sell,
}

/// 显式映射的取值来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldSource {
    Pricelist,
    Usage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub source_field: String,
    pub target_field: String,
    pub source: FieldSource,
}

impl FieldMapping {
    pub fn new(source: FieldSource, source_field: impl Into<String>, target_field: impl Into<String>) -> Self {
        Self {
            source_field: source_field.into(),
            target_field: target_field.into(),
            source,
        }
    }
}

/// 输出字段配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputFieldConfig {
    pub include_match_pricelist_fields: bool,
    pub include_match_usage_fields: bool,
    pub include_calculation_fields: bool,
    pub price_prefix: String,
    pub usage_prefix: String,
    pub calc_prefix: String,
    pub amount_field: String,
    pub cost_amount_field: String,
    pub sell_amount_field: String,
    pub margin_field: String,
    pub mappings: Vec<FieldMapping>,
}

impl Default for OutputFieldConfig {
    fn default() -> Self {
        Self {
            include_match_pricelist_fields: true,
            include_match_usage_fields: true,
            include_calculation_fields: true,
            price_prefix: "price_".to_string(),
            usage_prefix: "usage_".to_string(),
            calc_prefix: "calc_".to_string(),
            amount_field: "calc_amount".to_string(),
            cost_amount_field: "calc_cost_amount".to_string(),
            sell_amount_field: "calc_sell_amount".to_string(),
            margin_field: "calc_margin".to_string(),
            mappings: Vec::new(),
        }
    }
}

impl OutputFieldConfig {
    pub fn validate(&self) -> Result<()> {
        for name in [
            &self.amount_field,
            &self.cost_amount_field,
            &self.sell_amount_field,
            &self.margin_field,
        ] {
            if name.trim().is_empty() {
                return Err(LookupError::Config(
                    "calculated amount field names must not be empty".to_string(),
                ));
            }
        }
        for m in &self.mappings {
            if m.source_field.trim().is_empty() || m.target_field.trim().is_empty() {
                return Err(LookupError::Config(format!(
                    "field mapping '{}' -> '{}' needs both sourceField and targetField",
                    m.source_field, m.target_field
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quantity_field_required() {
        let cfg = CalculationConfig::basic("", "price");
        assert!(matches!(cfg.validate(), Err(LookupError::Config(_))));
    }

    #[test]
    fn test_price_source_required() {
        let cfg = CalculationConfig {
            quantity_field: "qty".to_string(),
            price_field: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = CalculationConfig {
            quantity_field: "qty".to_string(),
            sell_price_field: Some("sell".to_string()),
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.price_sources(), vec![(PriceKind::Sell, "sell")]);
    }

    #[test]
    fn test_graduated_tier_bounds_checked() {
        let cfg = CalculationConfig::basic("qty", "price").with_method(CalculationMethod::Graduated {
            tiers: vec![GraduatedTier {
                min: BigDecimal::from(10),
                max: Some(BigDecimal::from(5)),
                rate: BigDecimal::from(1),
            }],
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_decimal_places_bounded() {
        let ok = CalculationConfig::basic("qty", "price")
            .with_rounding(RoundingDirection::Up, MAX_DECIMAL_PLACES);
        assert!(ok.validate().is_ok());

        let cfg: CalculationConfig = serde_json::from_value(json!({
            "quantityField": "qty",
            "priceField": "price",
            "rounding": { "direction": "up", "decimalPlaces": 4294967295u32 }
        }))
        .unwrap();
        assert!(matches!(cfg.validate(), Err(LookupError::Config(_))));
    }

    #[test]
    fn test_tier_values_bounded() {
        let cfg: CalculationConfig = serde_json::from_value(json!({
            "quantityField": "qty",
            "priceField": "price",
            "method": { "type": "tiered", "tiers": [{ "threshold": 0, "rate": "1e-999999999" }] }
        }))
        .unwrap();
        assert!(matches!(cfg.validate(), Err(LookupError::Config(_))));
    }

    #[test]
    fn test_empty_match_fields_rejected() {
        assert!(validate_match_fields(&[]).is_err());
        assert!(validate_match_fields(&[MatchFieldPair::new("sku", "")]).is_err());
        assert!(validate_match_fields(&[MatchFieldPair::same("sku")]).is_ok());
    }

    #[test]
    fn test_deserialize_camel_case_config() {
        let cfg: CalculationConfig = serde_json::from_value(json!({
            "quantityField": "qty",
            "priceField": "unitPrice",
            "method": { "type": "graduated", "tiers": [
                { "min": 0, "max": 99, "rate": 1 },
                { "min": 100, "max": null, "rate": 0.5 }
            ]},
            "rounding": { "direction": "up", "decimalPlaces": 3 }
        }))
        .unwrap();
        assert_eq!(cfg.price_field.as_deref(), Some("unitPrice"));
        assert_eq!(cfg.rounding.unwrap().direction, RoundingDirection::Up);
        assert!(matches!(cfg.method, CalculationMethod::Graduated { ref tiers } if tiers.len() == 2));
    }

    #[test]
    fn test_strategy_serde_shape() {
        let s: MatchStrategy =
            serde_json::from_value(json!({ "mode": "hierarchical", "policy": "bestMatch" })).unwrap();
        assert_eq!(s, MatchStrategy::Hierarchical(PartialMatchPolicy::BestMatch));
        let f: MatchStrategy = serde_json::from_value(json!({ "mode": "flat" })).unwrap();
        assert_eq!(f, MatchStrategy::Flat);
    }

    #[test]
    fn test_output_defaults() {
        let out: OutputFieldConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(out.price_prefix, "price_");
        assert_eq!(out.amount_field, "calc_amount");
        assert!(out.validate().is_ok());
    }
}
