pub mod assembler;
pub mod calculator;
pub mod decimal;
pub mod events;
pub mod lookup;
pub mod matcher;

pub use assembler::OutputAssembler;
pub use calculator::{BillingCalculator, Calculation};
pub use events::{LookupEvent, LookupEventSink, NoopEventSink, TracingEventSink};
pub use lookup::{lookup_and_calculate, LookupService, LookupSettings, DEFAULT_PARALLEL_THRESHOLD};
pub use matcher::{match_record, RecordMatcher};
