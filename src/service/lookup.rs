use crate::error::{LookupError, Result};
use crate::ingest::extract_collection;
use crate::models::{
    validate_match_fields, CalculationConfig, KeyLookup, LookupOutcome, MatchFieldPair,
    MatchStrategy, OutputFieldConfig, Record, UnmatchedRecord,
};
use crate::service::assembler::OutputAssembler;
use crate::service::calculator::BillingCalculator;
use crate::service::events::{LookupEvent, LookupEventSink, TracingEventSink};
use crate::service::matcher::RecordMatcher;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// 达到该数量的用量记录时并行处理
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 512;

/// 一次调用的完整配置 (由宿主在边界处一次性构造)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupSettings {
    pub match_fields: Vec<MatchFieldPair>,
    #[serde(default)]
    pub strategy: MatchStrategy,
    #[serde(default)]
    pub key_lookup: KeyLookup,
    pub calculation: CalculationConfig,
    #[serde(default)]
    pub output: OutputFieldConfig,
}

impl LookupSettings {
    pub fn new(
        match_fields: Vec<MatchFieldPair>,
        calculation: CalculationConfig,
        output: OutputFieldConfig,
        strategy: MatchStrategy,
    ) -> Self {
        Self {
            match_fields,
            strategy,
            key_lookup: KeyLookup::CaseInsensitive,
            calculation,
            output,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_match_fields(&self.match_fields)?;
        self.calculation.validate()?;
        self.output.validate()
    }

    /// 配置快照 (用于错误信封)
    pub fn snapshot(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

enum Disposition {
    Matched(Record),
    Unmatched(UnmatchedRecord),
}

/// 查询编排：匹配 -> 计费 -> 组装，按匹配数分流
pub struct LookupService {
    settings: LookupSettings,
    matcher: RecordMatcher,
    calculator: BillingCalculator,
    assembler: OutputAssembler,
    sink: Arc<dyn LookupEventSink>,
    parallel_threshold: usize,
}

impl LookupService {
    pub fn new(settings: LookupSettings) -> Self {
        let matcher = RecordMatcher::new(settings.match_fields.clone(), settings.strategy)
            .with_key_lookup(settings.key_lookup);
        let calculator =
            BillingCalculator::new(settings.calculation.clone()).with_key_lookup(settings.key_lookup);
        let assembler = OutputAssembler::new(
            settings.output.clone(),
            settings.match_fields.clone(),
            settings.calculation.quantity_field.clone(),
        )
        .with_key_lookup(settings.key_lookup);

        Self {
            settings,
            matcher,
            calculator,
            assembler,
            sink: Arc::new(TracingEventSink),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn LookupEventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold.max(1);
        self
    }

    fn fail(&self, err: LookupError) -> LookupError {
        self.sink.emit(LookupEvent::InvocationFailed {
            code: err.code(),
            message: err.to_string(),
        });
        err
    }

    /// 从原始输入提取价目表与用量记录后执行
    ///
    /// 价目表只提取一次，所有用量记录共享同一只读快照。
    pub fn run_raw(
        &self,
        price_input: &Value,
        price_path: Option<&str>,
        usage_input: &Value,
        usage_path: Option<&str>,
    ) -> Result<LookupOutcome> {
        let price_list = extract_collection(price_input, price_path).map_err(|e| self.fail(e))?;
        let usage = extract_collection(usage_input, usage_path).map_err(|e| self.fail(e))?;
        self.run(&price_list, &usage)
    }

    /// 处理已物化的价目表与用量集合，输出顺序与输入一致
    pub fn run(&self, price_list: &[Record], usage: &[Record]) -> Result<LookupOutcome> {
        self.settings.validate().map_err(|e| self.fail(e))?;

        self.sink.emit(LookupEvent::InvocationStarted {
            price_list_len: price_list.len(),
            usage_len: usage.len(),
        });

        let dispositions: Vec<Disposition> = if usage.len() >= self.parallel_threshold {
            usage
                .par_iter()
                .enumerate()
                .map(|(index, record)| self.process(index, record, price_list))
                .collect()
        } else {
            usage
                .iter()
                .enumerate()
                .map(|(index, record)| self.process(index, record, price_list))
                .collect()
        };

        let mut outcome = LookupOutcome::default();
        for disposition in dispositions {
            match disposition {
                Disposition::Matched(record) => outcome.matched.push(record),
                Disposition::Unmatched(record) => outcome.unmatched.push(record),
            }
        }

        self.sink.emit(LookupEvent::InvocationCompleted {
            matched: outcome.matched.len(),
            unmatched: outcome.unmatched.len(),
        });

        Ok(outcome)
    }

    fn process(&self, index: usize, usage: &Record, price_list: &[Record]) -> Disposition {
        self.sink.emit(LookupEvent::MatchAttempted { index });
        let result = self.matcher.find(usage, price_list);
        self.sink.emit(LookupEvent::MatchResolved {
            index,
            match_count: result.match_count,
            depth: result.depth,
        });

        let unmatched = match result.single() {
            Some(entry) => match self.calculator.calculate(usage, entry) {
                Ok(calc) => return Disposition::Matched(self.assembler.assemble(usage, entry, &calc)),
                Err(e) => UnmatchedRecord::calculation_failed(usage.clone(), &e.to_string(), result.depth),
            },
            None if result.match_count == 0 => UnmatchedRecord::no_match(usage.clone(), result.depth),
            None => UnmatchedRecord::multiple(usage.clone(), result.match_count, result.depth),
        };

        self.sink.emit(LookupEvent::RecordUnmatched {
            index,
            reason: unmatched.reason_code,
            match_count: unmatched.match_count,
        });
        Disposition::Unmatched(unmatched)
    }
}

/// 核心入口：返回 (已匹配输出记录, 未匹配记录)
pub fn lookup_and_calculate(
    price_list: &[Record],
    usage: &[Record],
    match_fields: &[MatchFieldPair],
    calculation: &CalculationConfig,
    output: &OutputFieldConfig,
    strategy: MatchStrategy,
) -> Result<(Vec<Record>, Vec<UnmatchedRecord>)> {
    let settings = LookupSettings::new(
        match_fields.to_vec(),
        calculation.clone(),
        output.clone(),
        strategy,
    );
    let outcome = LookupService::new(settings).run(price_list, usage)?;
    Ok((outcome.matched, outcome.unmatched))
}
