pub mod record;
pub mod result;
pub mod settings;

pub use record::{get_case_insensitive, get_exact, record_from_json, record_to_json, FieldValue, Record};
pub use result::{LookupOutcome, LookupStats, MatchResult, UnmatchedReason, UnmatchedRecord};
pub use settings::{
    validate_match_fields, CalculationConfig, CalculationMethod, FieldMapping, FieldSource,
    GraduatedTier, KeyLookup, MatchFieldPair, MatchStrategy, OutputFieldConfig,
    PartialMatchPolicy, PriceKind, RoundingDirection, RoundingDirective, Tier,
};
