//! 精确十进制运算
//!
//! 所有金额计算都走 BigDecimal，入参可以是数值也可以是数字字符串
//! (调用方已持有字符串时不必先转成浮点)。

use crate::error::{LookupError, Result};
use crate::models::FieldValue;
use bigdecimal::{BigDecimal, Zero};
use std::str::FromStr;

/// 默认金额精度
pub const MONETARY_SCALE: u32 = 2;

/// 可转换为精确十进制的输入
pub trait ToDecimal {
    fn to_decimal(&self) -> Result<BigDecimal>;
}

impl ToDecimal for BigDecimal {
    fn to_decimal(&self) -> Result<BigDecimal> {
        Ok(self.clone())
    }
}

impl ToDecimal for str {
    fn to_decimal(&self) -> Result<BigDecimal> {
        BigDecimal::from_str(self.trim())
            .map_err(|e| LookupError::Calculation(format!("'{}' is not a decimal number: {}", self, e)))
    }
}

impl ToDecimal for String {
    fn to_decimal(&self) -> Result<BigDecimal> {
        self.as_str().to_decimal()
    }
}

impl ToDecimal for f64 {
    /// 取 f64 的最短十进制表示再解析，3.3 就是 3.3
    fn to_decimal(&self) -> Result<BigDecimal> {
        if !self.is_finite() {
            return Err(LookupError::Calculation(format!("{} is not a finite number", self)));
        }
        format!("{}", self).to_decimal()
    }
}

impl ToDecimal for i64 {
    fn to_decimal(&self) -> Result<BigDecimal> {
        Ok(BigDecimal::from(*self))
    }
}

impl ToDecimal for i32 {
    fn to_decimal(&self) -> Result<BigDecimal> {
        Ok(BigDecimal::from(*self))
    }
}

impl ToDecimal for FieldValue {
    fn to_decimal(&self) -> Result<BigDecimal> {
        self.as_decimal()
            .ok_or_else(|| LookupError::Calculation(format!("'{}' is not a decimal number", self)))
    }
}

impl<T: ToDecimal + ?Sized> ToDecimal for &T {
    fn to_decimal(&self) -> Result<BigDecimal> {
        (**self).to_decimal()
    }
}

/// 舍入模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingMode {
    /// 四舍五入 (.5 远离零)
    HalfUp,
    /// 向正无穷
    Ceiling,
    /// 向负无穷
    Floor,
}

pub fn multiply<A: ToDecimal, B: ToDecimal>(a: A, b: B) -> Result<BigDecimal> {
    Ok(a.to_decimal()? * b.to_decimal()?)
}

pub fn add<A: ToDecimal, B: ToDecimal>(a: A, b: B) -> Result<BigDecimal> {
    Ok(a.to_decimal()? + b.to_decimal()?)
}

pub fn subtract<A: ToDecimal, B: ToDecimal>(a: A, b: B) -> Result<BigDecimal> {
    Ok(a.to_decimal()? - b.to_decimal()?)
}

/// 除数恰为零时返回 DivisionByZero，不产生 Infinity/NaN
pub fn divide<A: ToDecimal, B: ToDecimal>(a: A, b: B) -> Result<BigDecimal> {
    let divisor = b.to_decimal()?;
    if divisor.is_zero() {
        return Err(LookupError::DivisionByZero);
    }
    Ok(a.to_decimal()? / divisor)
}

/// value 的 percent%
pub fn percentage<A: ToDecimal, B: ToDecimal>(value: A, percent: B) -> Result<BigDecimal> {
    divide(multiply(value, percent)?, BigDecimal::from(100))
}

pub fn round<A: ToDecimal>(value: A, places: u32, mode: RoundingMode) -> Result<BigDecimal> {
    Ok(round_decimal(&value.to_decimal()?, places, mode))
}

/// 按模式舍入到 places 位小数
pub fn round_decimal(value: &BigDecimal, places: u32, mode: RoundingMode) -> BigDecimal {
    let scale = places as i64;
    // with_scale 截断 (向零)
    let truncated = value.with_scale(scale);
    let unit = BigDecimal::new(1i32.into(), scale);

    match mode {
        RoundingMode::Ceiling => {
            if &truncated < value {
                truncated + unit
            } else {
                truncated
            }
        }
        RoundingMode::Floor => {
            if &truncated > value {
                truncated - unit
            } else {
                truncated
            }
        }
        RoundingMode::HalfUp => {
            let remainder = (value - &truncated).abs();
            if remainder * BigDecimal::from(2) >= unit {
                if *value < BigDecimal::zero() {
                    truncated - unit
                } else {
                    truncated + unit
                }
            } else {
                truncated
            }
        }
    }
}

/// 整数部分允许的最大位数
pub const MAX_INTEGER_DIGITS: i64 = 38;
/// 小数部分允许的最大位数
pub const MAX_FRACTION_DIGITS: i64 = 64;

/// 检查数值量级
///
/// `1e-999999999` 这类输入在舍入时会展开成天文数字位数，直接拒绝。
pub fn check_magnitude(value: &BigDecimal) -> Result<()> {
    if value.is_zero() {
        return Ok(());
    }
    let (digits, scale) = value.as_bigint_and_exponent();
    if scale > MAX_FRACTION_DIGITS {
        return Err(LookupError::Calculation(format!(
            "value has {} fractional digits (max {})",
            scale, MAX_FRACTION_DIGITS
        )));
    }
    // 按二进制位数估算十进制位数，避免对超大整数做字符串化
    let approx_digits = (digits.bits() as f64 * std::f64::consts::LOG10_2).ceil() as i64;
    if approx_digits - scale > MAX_INTEGER_DIGITS {
        return Err(LookupError::Calculation(format!(
            "value is out of range (more than {} integer digits)",
            MAX_INTEGER_DIGITS
        )));
    }
    Ok(())
}
