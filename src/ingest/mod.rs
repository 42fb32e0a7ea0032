pub mod csv_import;
pub mod extract;

pub use csv_import::{
    import_and_filter, ColumnType, ConditionOp, FieldCondition, FilterConfig, InvalidRecord,
    ParseConfig,
};
pub use extract::{extract_collection, normalize_collection};
