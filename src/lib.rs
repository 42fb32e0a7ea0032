//! 价目表匹配与计费引擎
//!
//! 为每条用量记录在价目表中查找唯一匹配条目 (平铺或层级匹配，
//! 字段名与文本值均忽略大小写)，按基础 / 阶梯 / 累进方式用十进制计算金额，
//! 组装输出记录；无匹配、多重匹配或计算失败的记录进入未匹配结果流。
//!
//! ```ignore
//! let (matched, unmatched) = lookup_and_calculate(
//!     &price_list,
//!     &usage,
//!     &[MatchFieldPair::same("sku")],
//!     &CalculationConfig::basic("qty", "price"),
//!     &OutputFieldConfig::default(),
//!     MatchStrategy::Flat,
//! )?;
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod service;

pub use config::AppConfig;
pub use error::{ErrorEnvelope, LookupError, Result};
pub use models::{
    CalculationConfig, FieldValue, LookupOutcome, MatchFieldPair, MatchStrategy,
    OutputFieldConfig, PartialMatchPolicy, Record, UnmatchedRecord,
};
pub use service::{lookup_and_calculate, LookupService, LookupSettings};
