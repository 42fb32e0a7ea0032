//! 统一错误类型与标准错误信封
//!
//! 配置错误 / 提取错误会终止整次调用；逐条记录的匹配、计算问题不走这里，
//! 而是进入未匹配结果流 (见 `service::lookup`)。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LookupError>;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Calculation error: {0}")]
    Calculation(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// 错误大类 (用于调用方路由/告警)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Configuration,
    Extraction,
    Arithmetic,
    Data,
    System,
}

/// 标准错误信封
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub code: String,
    pub category: ErrorCategory,
    pub message: String,
    /// 出错时的配置快照
    pub context: Value,
    pub suggestions: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

impl LookupError {
    pub fn code(&self) -> &'static str {
        match self {
            LookupError::Config(_) => "E_CONFIG",
            LookupError::Extraction(_) => "E_EXTRACTION",
            LookupError::DivisionByZero => "E_DIVISION_BY_ZERO",
            LookupError::Calculation(_) => "E_CALCULATION",
            LookupError::Import(_) => "E_IMPORT",
            LookupError::Serialization(_) => "E_SERIALIZATION",
            LookupError::Internal(_) => "E_INTERNAL",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            LookupError::Config(_) => ErrorCategory::Configuration,
            LookupError::Extraction(_) => ErrorCategory::Extraction,
            LookupError::DivisionByZero | LookupError::Calculation(_) => ErrorCategory::Arithmetic,
            LookupError::Import(_) | LookupError::Serialization(_) => ErrorCategory::Data,
            LookupError::Internal(_) => ErrorCategory::System,
        }
    }

    /// 配置/提取类错误属于调用方问题
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Configuration | ErrorCategory::Extraction | ErrorCategory::Data
        )
    }

    pub fn suggestions(&self) -> Vec<String> {
        let items: &[&str] = match self {
            LookupError::Config(_) => &[
                "Check that quantityField and at least one price field are configured",
                "Check that every match field pair names both a price list field and a usage field",
            ],
            LookupError::Extraction(_) => &[
                "Verify the configured field path exists in the input object",
                "Make sure the price list and usage inputs are arrays of objects or JSON-encoded arrays",
            ],
            LookupError::DivisionByZero => &["Check divisor values in the calculation configuration"],
            LookupError::Calculation(_) => &[
                "Verify quantity and price columns contain numeric values",
            ],
            LookupError::Import(_) => &[
                "Check the CSV delimiter and header row",
                "Check the declared column types against the data",
            ],
            LookupError::Serialization(_) => &["Validate the request body is well-formed JSON"],
            LookupError::Internal(_) => &["Retry the request; report the error code if it persists"],
        };
        items.iter().map(|s| s.to_string()).collect()
    }

    /// 包装为标准错误信封
    pub fn envelope(&self, context: Value) -> ErrorEnvelope {
        ErrorEnvelope {
            code: self.code().to_string(),
            category: self.category(),
            message: self.to_string(),
            context,
            suggestions: self.suggestions(),
            occurred_at: Utc::now(),
        }
    }
}

impl From<serde_json::Error> for LookupError {
    fn from(err: serde_json::Error) -> Self {
        LookupError::Serialization(err.to_string())
    }
}

impl From<::config::ConfigError> for LookupError {
    fn from(err: ::config::ConfigError) -> Self {
        LookupError::Config(err.to_string())
    }
}

impl From<csv::Error> for LookupError {
    fn from(err: csv::Error) -> Self {
        LookupError::Import(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_carries_code_and_context() {
        let err = LookupError::Config("quantityField is required".to_string());
        let env = err.envelope(json!({ "quantityField": "" }));
        assert_eq!(env.code, "E_CONFIG");
        assert_eq!(env.category, ErrorCategory::Configuration);
        assert!(env.message.contains("quantityField"));
        assert_eq!(env.context["quantityField"], "");
        assert!(!env.suggestions.is_empty());
    }

    #[test]
    fn test_division_by_zero_is_arithmetic() {
        let err = LookupError::DivisionByZero;
        assert_eq!(err.category(), ErrorCategory::Arithmetic);
        assert!(!err.is_caller_error());
    }

    #[test]
    fn test_serde_error_converts() {
        let err: LookupError = serde_json::from_str::<Value>("{").unwrap_err().into();
        assert_eq!(err.code(), "E_SERIALIZATION");
    }
}
