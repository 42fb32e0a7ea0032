//! CSV 导入与过滤
//!
//! 解析 CSV 文本、按声明的列类型转换、校验后分成有效 / 无效两组。
//! 不满足过滤条件的行直接丢弃，只计数。

use crate::error::{LookupError, Result};
use crate::models::{get_case_insensitive, FieldValue, Record};
use bigdecimal::{BigDecimal, Zero};
use chrono::NaiveDate;
use csv::{ReaderBuilder, Trim};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 列类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Number,
    Boolean,
    /// 按 chrono 格式解析，统一输出为 YYYY-MM-DD
    Date {
        #[serde(default = "default_date_format")]
        format: String,
    },
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

/// 解析配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParseConfig {
    pub delimiter: char,
    pub trim: bool,
    /// 空单元格记为 null
    pub empty_as_null: bool,
    pub skip_empty_rows: bool,
    /// 声明了类型的列；未声明的列按字符串处理
    pub columns: IndexMap<String, ColumnType>,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            trim: true,
            empty_as_null: true,
            skip_empty_rows: true,
            columns: IndexMap::new(),
        }
    }
}

impl ParseConfig {
    pub fn with_column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.columns.insert(name.into(), column_type);
        self
    }

    fn column_type(&self, header: &str) -> Option<&ColumnType> {
        self.columns.get(header).or_else(|| {
            self.columns
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(header))
                .map(|(_, t)| t)
        })
    }
}

/// 过滤条件 (忽略大小写比较)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ConditionOp {
    Equals { value: String },
    NotEquals { value: String },
    OneOf { values: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCondition {
    pub field: String,
    #[serde(flatten)]
    pub op: ConditionOp,
}

impl FieldCondition {
    fn accepts(&self, record: &Record) -> bool {
        let actual = get_case_insensitive(record, &self.field).map(|v| v.to_string().to_lowercase());
        match (&self.op, actual) {
            (ConditionOp::Equals { value }, Some(actual)) => actual == value.to_lowercase(),
            (ConditionOp::Equals { .. }, None) => false,
            (ConditionOp::NotEquals { value }, Some(actual)) => actual != value.to_lowercase(),
            (ConditionOp::NotEquals { .. }, None) => true,
            (ConditionOp::OneOf { values }, Some(actual)) => {
                values.iter().any(|v| v.to_lowercase() == actual)
            }
            (ConditionOp::OneOf { .. }, None) => false,
        }
    }
}

/// 过滤 / 校验配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterConfig {
    pub required_fields: Vec<String>,
    pub non_negative_fields: Vec<String>,
    pub conditions: Vec<FieldCondition>,
}

/// 无效行及其错误
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidRecord {
    /// 数据行号 (从 1 开始，不含表头)
    pub row: usize,
    pub record: Record,
    pub errors: Vec<String>,
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

fn coerce(header: &str, raw: &str, column_type: Option<&ColumnType>, errors: &mut Vec<String>) -> FieldValue {
    match column_type {
        None | Some(ColumnType::String) => FieldValue::text(raw),
        Some(ColumnType::Number) => match BigDecimal::from_str(raw) {
            Ok(n) => FieldValue::Number(n),
            Err(_) => {
                errors.push(format!("column '{}': '{}' is not a number", header, raw));
                FieldValue::text(raw)
            }
        },
        Some(ColumnType::Boolean) => match parse_bool(raw) {
            Some(b) => FieldValue::Bool(b),
            None => {
                errors.push(format!("column '{}': '{}' is not a boolean", header, raw));
                FieldValue::text(raw)
            }
        },
        Some(ColumnType::Date { format }) => match NaiveDate::parse_from_str(raw, format) {
            Ok(date) => FieldValue::text(date.format("%Y-%m-%d").to_string()),
            Err(e) => {
                errors.push(format!(
                    "column '{}': '{}' does not match date format '{}' ({})",
                    header, raw, format, e
                ));
                FieldValue::text(raw)
            }
        },
    }
}

fn validate(record: &Record, filter: &FilterConfig, errors: &mut Vec<String>) {
    for field in &filter.required_fields {
        let present = match get_case_insensitive(record, field) {
            Some(FieldValue::Text(s)) => !s.trim().is_empty(),
            Some(_) => true,
            None => false,
        };
        if !present {
            errors.push(format!("required field '{}' is missing", field));
        }
    }
    for field in &filter.non_negative_fields {
        if let Some(value) = get_case_insensitive(record, field).and_then(FieldValue::as_decimal) {
            if value < BigDecimal::zero() {
                errors.push(format!("field '{}' must not be negative (got {})", field, value));
            }
        }
    }
}

/// 导入 CSV 并过滤，返回 (有效记录, 无效记录)
pub fn import_and_filter(
    raw: &str,
    parse: &ParseConfig,
    filter: &FilterConfig,
) -> Result<(Vec<Record>, Vec<InvalidRecord>)> {
    if !parse.delimiter.is_ascii() {
        return Err(LookupError::Config(format!(
            "delimiter '{}' must be an ASCII character",
            parse.delimiter
        )));
    }
    let delimiter = parse.delimiter as u8;

    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(if parse.trim { Trim::All } else { Trim::None })
        .flexible(true)
        .from_reader(raw.as_bytes());

    let headers = rdr.headers()?.clone();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(LookupError::Import("CSV input has no header row".to_string()));
    }

    let mut valid = Vec::new();
    let mut invalid = Vec::new();
    let mut dropped = 0usize;

    for (idx, row) in rdr.records().enumerate() {
        let row_no = idx + 1;
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                invalid.push(InvalidRecord {
                    row: row_no,
                    record: Record::new(),
                    errors: vec![format!("unreadable row: {}", e)],
                });
                continue;
            }
        };

        if parse.skip_empty_rows && row.iter().all(|cell| cell.is_empty()) {
            continue;
        }

        let mut errors = Vec::new();
        let mut record = Record::new();
        for (i, header) in headers.iter().enumerate() {
            let cell = row.get(i).unwrap_or("");
            let value = if cell.is_empty() && parse.empty_as_null {
                FieldValue::Null
            } else {
                coerce(header, cell, parse.column_type(header), &mut errors)
            };
            record.insert(header.to_string(), value);
        }
        if row.len() > headers.len() {
            errors.push(format!(
                "row has {} fields but the header declares {}",
                row.len(),
                headers.len()
            ));
        }

        validate(&record, filter, &mut errors);
        if !errors.is_empty() {
            invalid.push(InvalidRecord { row: row_no, record, errors });
            continue;
        }

        if !filter.conditions.iter().all(|c| c.accepts(&record)) {
            dropped += 1;
            continue;
        }

        valid.push(record);
    }

    tracing::info!(
        "[Import] 导入完成: 有效 {}, 无效 {}, 过滤 {}",
        valid.len(),
        invalid.len(),
        dropped
    );

    Ok((valid, invalid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_types() {
        let mut errors = Vec::new();
        assert_eq!(
            coerce("qty", "1.50", Some(&ColumnType::Number), &mut errors),
            FieldValue::Number(BigDecimal::from_str("1.5").unwrap())
        );
        assert_eq!(coerce("on", "Yes", Some(&ColumnType::Boolean), &mut errors), FieldValue::Bool(true));
        assert_eq!(
            coerce(
                "day",
                "31/01/2024",
                Some(&ColumnType::Date { format: "%d/%m/%Y".to_string() }),
                &mut errors
            ),
            FieldValue::text("2024-01-31")
        );
        assert!(errors.is_empty());

        coerce("qty", "ten", Some(&ColumnType::Number), &mut errors);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_condition_ops() {
        let mut r = Record::new();
        r.insert("Region".to_string(), FieldValue::text("EU"));
        let eq = FieldCondition { field: "region".into(), op: ConditionOp::Equals { value: "eu".into() } };
        let ne = FieldCondition { field: "region".into(), op: ConditionOp::NotEquals { value: "eu".into() } };
        let one = FieldCondition {
            field: "region".into(),
            op: ConditionOp::OneOf { values: vec!["US".into(), "Eu".into()] },
        };
        assert!(eq.accepts(&r));
        assert!(!ne.accepts(&r));
        assert!(one.accepts(&r));
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        let parse = ParseConfig { delimiter: '§', ..Default::default() };
        let err = import_and_filter("a§b\n1§2\n", &parse, &FilterConfig::default()).unwrap_err();
        assert!(matches!(err, LookupError::Config(_)));
    }
}
