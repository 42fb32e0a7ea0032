//! 计费计算：基础 / 简单阶梯 / 累进阶梯
//!
//! 缺失或非数值的数量、价格字段按 0 处理 (宽松策略，不报错)；
//! 负数量、负价格原样参与运算，不做截断。
//! 量级超限的数值 (见 `decimal::check_magnitude`) 计算失败，该条记录进入未匹配流。

use crate::error::Result;
use crate::models::{
    get_case_insensitive, get_exact, CalculationConfig, CalculationMethod, FieldValue,
    GraduatedTier, KeyLookup, PriceKind, Record, RoundingDirection, RoundingDirective, Tier,
};
use crate::service::decimal::{self, RoundingMode, ToDecimal, MONETARY_SCALE};
use bigdecimal::{BigDecimal, Zero};

/// 基础计费：数量 × 单价，保留 2 位
pub fn basic<Q: ToDecimal, P: ToDecimal>(quantity: Q, price: P) -> Result<BigDecimal> {
    let raw = decimal::multiply(quantity, price)?;
    Ok(default_round(&raw))
}

/// 简单阶梯：整段数量按选中阶梯的费率计费，保留 2 位
pub fn simple_tiered<Q: ToDecimal>(quantity: Q, tiers: &[Tier]) -> Result<BigDecimal> {
    let raw = simple_tiered_raw(&quantity.to_decimal()?, tiers);
    Ok(default_round(&raw))
}

/// 累进阶梯：各区间分段计费后求和，保留 2 位
pub fn graduated_tiered<Q: ToDecimal>(quantity: Q, tiers: &[GraduatedTier]) -> Result<BigDecimal> {
    let raw = graduated_tiered_raw(&quantity.to_decimal()?, tiers);
    Ok(default_round(&raw))
}

fn default_round(raw: &BigDecimal) -> BigDecimal {
    decimal::round_decimal(raw, MONETARY_SCALE, RoundingMode::HalfUp)
}

/// 选阶梯：阈值降序取第一个 <= 数量的；都不满足时退回阈值最低的阶梯
fn select_tier<'a>(quantity: &BigDecimal, tiers: &'a [Tier]) -> Option<&'a Tier> {
    let mut ordered: Vec<&Tier> = tiers.iter().collect();
    ordered.sort_by(|a, b| b.threshold.cmp(&a.threshold));
    ordered
        .iter()
        .find(|t| t.threshold <= *quantity)
        .or_else(|| ordered.last())
        .copied()
}

fn simple_tiered_raw(quantity: &BigDecimal, tiers: &[Tier]) -> BigDecimal {
    match select_tier(quantity, tiers) {
        Some(tier) => quantity * &tier.rate,
        None => BigDecimal::zero(),
    }
}

/// 每个阶梯计费的数量区间为 (max(已计费, min - 1), min(max, 数量)]
/// 例：150 在 [0,99]@1 + [100,∞)@0.5 下为 99×1 + 51×0.5
fn graduated_tiered_raw(quantity: &BigDecimal, tiers: &[GraduatedTier]) -> BigDecimal {
    let mut ordered: Vec<&GraduatedTier> = tiers.iter().collect();
    ordered.sort_by(|a, b| a.min.cmp(&b.min));

    let one = BigDecimal::from(1);
    let mut billed = BigDecimal::zero();
    let mut total = BigDecimal::zero();

    for tier in ordered {
        if *quantity < tier.min {
            break;
        }

        let floor = &tier.min - &one;
        let lower = if floor > billed { floor } else { billed.clone() };
        let upper = match &tier.max {
            Some(max) if max < quantity => max.clone(),
            _ => quantity.clone(),
        };

        if upper > lower {
            total += (&upper - &lower) * &tier.rate;
            billed = upper.clone();
        }

        if tier.max.is_none() || upper >= *quantity {
            break;
        }
    }

    total
}

/// 舍入：未配置时默认 2 位四舍五入；配置了方向则在原始乘积之后按方向舍入
pub fn apply_rounding(raw: &BigDecimal, rounding: Option<&RoundingDirective>) -> BigDecimal {
    match rounding {
        None => default_round(raw),
        Some(directive) => match directive.direction {
            RoundingDirection::Up => {
                decimal::round_decimal(raw, directive.decimal_places, RoundingMode::Ceiling)
            }
            RoundingDirection::Down => {
                decimal::round_decimal(raw, directive.decimal_places, RoundingMode::Floor)
            }
            RoundingDirection::None => raw.clone(),
        },
    }
}

/// 一次计算的结果
#[derive(Debug, Clone, PartialEq)]
pub struct Calculation {
    pub quantity: BigDecimal,
    /// 已配置的价格字段及其数值 (按配置顺序)
    pub prices: Vec<(PriceKind, String, BigDecimal)>,
    pub amount: Option<BigDecimal>,
    pub cost_amount: Option<BigDecimal>,
    pub sell_amount: Option<BigDecimal>,
    pub margin: Option<BigDecimal>,
}

/// 按配置对 (用量记录, 价目表条目) 计费
#[derive(Debug, Clone)]
pub struct BillingCalculator {
    config: CalculationConfig,
    key_lookup: KeyLookup,
}

impl BillingCalculator {
    pub fn new(config: CalculationConfig) -> Self {
        Self {
            config,
            key_lookup: KeyLookup::CaseInsensitive,
        }
    }

    pub fn with_key_lookup(mut self, key_lookup: KeyLookup) -> Self {
        self.key_lookup = key_lookup;
        self
    }

    fn numeric(&self, record: &Record, field: &str) -> BigDecimal {
        let value = match self.key_lookup {
            KeyLookup::CaseInsensitive => get_case_insensitive(record, field),
            KeyLookup::Exact => get_exact(record, field),
        };
        value
            .and_then(FieldValue::as_decimal)
            .unwrap_or_else(BigDecimal::zero)
    }

    pub fn calculate(&self, usage: &Record, entry: &Record) -> Result<Calculation> {
        let quantity = self.numeric(usage, &self.config.quantity_field);
        decimal::check_magnitude(&quantity)?;
        let rounding = self.config.rounding.as_ref();

        let prices: Vec<(PriceKind, String, BigDecimal)> = self
            .config
            .price_sources()
            .into_iter()
            .map(|(kind, field)| (kind, field.to_string(), self.numeric(entry, field)))
            .collect();
        for (_, _, value) in &prices {
            decimal::check_magnitude(value)?;
        }
        let price_of = |wanted: PriceKind| {
            prices
                .iter()
                .find(|(kind, _, _)| *kind == wanted)
                .map(|(_, _, value)| value)
        };

        let amount = match &self.config.method {
            CalculationMethod::Basic => price_of(PriceKind::Price)
                .map(|price| decimal::multiply(&quantity, price))
                .transpose()?,
            CalculationMethod::Tiered { tiers } => Some(simple_tiered_raw(&quantity, tiers)),
            CalculationMethod::Graduated { tiers } => Some(graduated_tiered_raw(&quantity, tiers)),
        }
        .map(|raw| apply_rounding(&raw, rounding));

        // 阶梯费率取代单价，成本价 / 售价始终按 数量 × 单价 计费
        let cost_amount = price_of(PriceKind::Cost)
            .map(|cost| decimal::multiply(&quantity, cost))
            .transpose()?
            .map(|raw| apply_rounding(&raw, rounding));
        let sell_amount = price_of(PriceKind::Sell)
            .map(|sell| decimal::multiply(&quantity, sell))
            .transpose()?
            .map(|raw| apply_rounding(&raw, rounding));

        let margin = match (&cost_amount, &sell_amount) {
            (Some(cost), Some(sell)) => Some(decimal::subtract(sell, cost)?),
            _ => None,
        };

        Ok(Calculation {
            quantity,
            prices,
            amount,
            cost_amount,
            sell_amount,
            margin,
        })
    }
}
