use bigdecimal::BigDecimal;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// 开放字段记录 (价目表条目 / 用量记录 / 输出记录)
/// IndexMap 保持字段声明顺序
pub type Record = IndexMap<String, FieldValue>;

/// 记录字段值：字符串 | 数值 | 布尔 | 空
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    #[default]
    Null,
    Bool(bool),
    /// 精确十进制，JSON 数值经文本形式转换，不经过二进制浮点
    Number(BigDecimal),
    Text(String),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        FieldValue::Text(s.into())
    }

    pub fn number(n: impl Into<BigDecimal>) -> Self {
        FieldValue::Number(n.into())
    }

    /// 非 null 即视为已定义
    pub fn is_defined(&self) -> bool {
        !matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// 数值视图：数值直接返回，字符串尝试解析，其余为 None
    pub fn as_decimal(&self) -> Option<BigDecimal> {
        match self {
            FieldValue::Number(n) => Some(n.clone()),
            FieldValue::Text(s) => BigDecimal::from_str(s.trim()).ok(),
            FieldValue::Bool(_) | FieldValue::Null => None,
        }
    }

    /// 比较规则：双方都是字符串时忽略大小写，否则严格相等
    pub fn loosely_equals(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::Text(a), FieldValue::Text(b)) => {
                a == b || a.to_lowercase() == b.to_lowercase()
            }
            _ => self == other,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Number(n) => decimal_to_json(n),
            FieldValue::Text(s) => Value::String(s.clone()),
        }
    }
}

fn decimal_to_json(n: &BigDecimal) -> Value {
    if n.with_scale(0) == *n {
        if let Ok(i) = n.with_scale(0).to_string().parse::<i64>() {
            return Value::from(i);
        }
    }
    // 经十进制文本转 f64，避免按 10^-scale 相乘引入漂移
    n.to_string()
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(n.to_string()))
}

impl From<Value> for FieldValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => {
                let text = n.to_string();
                match BigDecimal::from_str(&text) {
                    Ok(d) => FieldValue::Number(d),
                    Err(_) => FieldValue::Text(text),
                }
            }
            Value::String(s) => FieldValue::Text(s),
            // 记录是扁平的，嵌套结构保留为 JSON 文本
            other @ (Value::Array(_) | Value::Object(_)) => FieldValue::Text(other.to_string()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(BigDecimal::from(n))
    }
}

impl From<BigDecimal> for FieldValue {
    fn from(n: BigDecimal) -> Self {
        FieldValue::Number(n)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(FieldValue::from)
    }
}

/// 配置中的十进制字段：接受 JSON 数值或数字字符串，均经文本解析
pub mod serde_decimal {
    use super::decimal_to_json;
    use bigdecimal::BigDecimal;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Value;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error> {
        decimal_to_json(value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigDecimal, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        parse(&raw).map_err(D::Error::custom)
    }

    pub(crate) fn parse(raw: &Value) -> Result<BigDecimal, String> {
        let text = match raw {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.trim().to_string(),
            other => return Err(format!("expected a decimal number, got {}", other)),
        };
        BigDecimal::from_str(&text).map_err(|e| format!("invalid decimal '{}': {}", text, e))
    }

    pub mod option {
        use bigdecimal::BigDecimal;
        use serde::de::Error;
        use serde::{Deserialize, Deserializer, Serializer};
        use serde_json::Value;

        pub fn serialize<S: Serializer>(value: &Option<BigDecimal>, serializer: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => super::serialize(v, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<BigDecimal>, D::Error> {
            match Value::deserialize(deserializer)? {
                Value::Null => Ok(None),
                raw => super::parse(&raw).map(Some).map_err(D::Error::custom),
            }
        }
    }
}

/// JSON 对象 -> 记录，非对象返回 None
pub fn record_from_json(value: Value) -> Option<Record> {
    match value {
        Value::Object(map) => Some(
            map.into_iter()
                .map(|(k, v)| (k, FieldValue::from(v)))
                .collect(),
        ),
        _ => None,
    }
}

pub fn record_to_json(record: &Record) -> Value {
    Value::Object(
        record
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

/// 忽略大小写查找字段
///
/// 按字段声明顺序线性扫描，`Id` 与 `id` 同时存在时先声明者胜出。
/// 字段不存在或值为 null 都返回 None。
pub fn get_case_insensitive<'a>(record: &'a Record, key: &str) -> Option<&'a FieldValue> {
    let wanted = key.to_lowercase();
    record
        .iter()
        .find(|(name, _)| name.to_lowercase() == wanted)
        .map(|(_, v)| v)
        .filter(|v| v.is_defined())
}

/// 大小写敏感的直接查找
pub fn get_exact<'a>(record: &'a Record, key: &str) -> Option<&'a FieldValue> {
    record.get(key).filter(|v| v.is_defined())
}
