use crate::models::record::Record;
use serde::{Deserialize, Serialize};

/// 单条用量记录的匹配结果 (内部使用，不落盘)
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub matched: bool,
    pub match_count: usize,
    pub entries: Vec<Record>,
    /// 命中的层级数 (平铺模式命中时等于字段对数量)
    pub depth: usize,
}

impl MatchResult {
    pub fn from_entries(entries: Vec<Record>, depth: usize) -> Self {
        Self {
            matched: entries.len() == 1,
            match_count: entries.len(),
            entries,
            depth,
        }
    }

    pub fn none() -> Self {
        Self::from_entries(Vec::new(), 0)
    }

    /// 恰好一条时返回该条目
    pub fn single(&self) -> Option<&Record> {
        match self.entries.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

/// 未匹配原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnmatchedReason {
    NoMatch,
    MultipleMatches,
    CalculationFailed,
}

/// 未匹配 / 出错的用量记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmatchedRecord {
    pub record: Record,
    pub reason: String,
    pub reason_code: UnmatchedReason,
    pub match_count: usize,
    pub depth: usize,
}

impl UnmatchedRecord {
    pub fn no_match(record: Record, depth: usize) -> Self {
        Self {
            record,
            reason: "no matching price records found".to_string(),
            reason_code: UnmatchedReason::NoMatch,
            match_count: 0,
            depth,
        }
    }

    pub fn multiple(record: Record, count: usize, depth: usize) -> Self {
        Self {
            record,
            reason: format!("Multiple matching price records found ({})", count),
            reason_code: UnmatchedReason::MultipleMatches,
            match_count: count,
            depth,
        }
    }

    pub fn calculation_failed(record: Record, message: &str, depth: usize) -> Self {
        Self {
            record,
            reason: format!("calculation failed: {}", message),
            reason_code: UnmatchedReason::CalculationFailed,
            match_count: 1,
            depth,
        }
    }
}

/// 一次调用的两路输出：已匹配 / 未匹配，互不混合
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupOutcome {
    pub matched: Vec<Record>,
    pub unmatched: Vec<UnmatchedRecord>,
}

impl LookupOutcome {
    pub fn stats(&self) -> LookupStats {
        let count = |code: UnmatchedReason| {
            self.unmatched
                .iter()
                .filter(|u| u.reason_code == code)
                .count()
        };
        LookupStats {
            total: self.matched.len() + self.unmatched.len(),
            matched: self.matched.len(),
            unmatched: self.unmatched.len(),
            no_match: count(UnmatchedReason::NoMatch),
            multiple_matches: count(UnmatchedReason::MultipleMatches),
            calculation_failed: count(UnmatchedReason::CalculationFailed),
        }
    }
}

/// 调用统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupStats {
    pub total: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub no_match: usize,
    pub multiple_matches: usize,
    pub calculation_failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_strings() {
        let u = UnmatchedRecord::no_match(Record::new(), 0);
        assert_eq!(u.reason, "no matching price records found");
        assert_eq!(u.match_count, 0);

        let u = UnmatchedRecord::multiple(Record::new(), 2, 1);
        assert_eq!(u.reason, "Multiple matching price records found (2)");
        assert_eq!(u.reason_code, UnmatchedReason::MultipleMatches);
    }

    #[test]
    fn test_match_result_single() {
        let r = MatchResult::from_entries(vec![Record::new()], 1);
        assert!(r.matched);
        assert!(r.single().is_some());

        let r = MatchResult::from_entries(vec![Record::new(), Record::new()], 1);
        assert!(!r.matched);
        assert_eq!(r.match_count, 2);
        assert!(r.single().is_none());
    }

    #[test]
    fn test_stats_counts_by_reason() {
        let outcome = LookupOutcome {
            matched: vec![Record::new()],
            unmatched: vec![
                UnmatchedRecord::no_match(Record::new(), 0),
                UnmatchedRecord::multiple(Record::new(), 3, 2),
                UnmatchedRecord::no_match(Record::new(), 0),
            ],
        };
        let stats = outcome.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.no_match, 2);
        assert_eq!(stats.multiple_matches, 1);
        assert_eq!(stats.calculation_failed, 0);
    }
}
