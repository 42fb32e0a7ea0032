use crate::models::{
    get_case_insensitive, get_exact, FieldValue, KeyLookup, MatchFieldPair, MatchResult,
    MatchStrategy, PartialMatchPolicy, Record,
};

/// 记录匹配器
///
/// 平铺模式：价目表条目必须满足所有字段对；
/// 层级模式：按字段对顺序 (最泛在前) 逐层收窄候选集，
/// 收窄为空时按 `PartialMatchPolicy` 决定是否保留上一层的候选。
#[derive(Debug, Clone)]
pub struct RecordMatcher {
    pairs: Vec<MatchFieldPair>,
    strategy: MatchStrategy,
    key_lookup: KeyLookup,
}

impl RecordMatcher {
    pub fn new(pairs: Vec<MatchFieldPair>, strategy: MatchStrategy) -> Self {
        Self {
            pairs,
            strategy,
            key_lookup: KeyLookup::CaseInsensitive,
        }
    }

    pub fn with_key_lookup(mut self, key_lookup: KeyLookup) -> Self {
        self.key_lookup = key_lookup;
        self
    }

    /// 为一条用量记录查找价目表条目
    pub fn find(&self, usage: &Record, price_list: &[Record]) -> MatchResult {
        match self.strategy {
            MatchStrategy::Flat => self.find_flat(usage, price_list),
            MatchStrategy::Hierarchical(policy) => self.find_hierarchical(usage, price_list, policy),
        }
    }

    fn find_flat(&self, usage: &Record, price_list: &[Record]) -> MatchResult {
        let entries: Vec<Record> = price_list
            .iter()
            .filter(|entry| self.pairs.iter().all(|pair| self.pair_satisfied(entry, usage, pair)))
            .cloned()
            .collect();

        let depth = if entries.is_empty() { 0 } else { self.pairs.len() };
        MatchResult::from_entries(entries, depth)
    }

    fn find_hierarchical(
        &self,
        usage: &Record,
        price_list: &[Record],
        policy: PartialMatchPolicy,
    ) -> MatchResult {
        // 候选集用下标表示，保持价目表原始顺序
        let mut candidates: Vec<usize> = (0..price_list.len()).collect();
        let mut depth = 0;

        for pair in &self.pairs {
            let narrowed: Vec<usize> = candidates
                .iter()
                .copied()
                .filter(|&idx| self.pair_satisfied(&price_list[idx], usage, pair))
                .collect();

            if narrowed.is_empty() {
                return match policy {
                    PartialMatchPolicy::NoMatch => MatchResult::none(),
                    // 第 0 层都未命中时没有可用的候选集
                    PartialMatchPolicy::BestMatch if depth == 0 => MatchResult::none(),
                    PartialMatchPolicy::BestMatch => MatchResult::from_entries(
                        candidates.iter().map(|&idx| price_list[idx].clone()).collect(),
                        depth,
                    ),
                };
            }

            candidates = narrowed;
            depth += 1;
        }

        MatchResult::from_entries(
            candidates.iter().map(|&idx| price_list[idx].clone()).collect(),
            depth,
        )
    }

    fn field<'r>(&self, record: &'r Record, key: &str) -> Option<&'r FieldValue> {
        match self.key_lookup {
            KeyLookup::CaseInsensitive => get_case_insensitive(record, key),
            KeyLookup::Exact => get_exact(record, key),
        }
    }

    /// 两侧值都必须已定义，且按宽松规则相等
    fn pair_satisfied(&self, entry: &Record, usage: &Record, pair: &MatchFieldPair) -> bool {
        match (
            self.field(entry, &pair.price_list_field),
            self.field(usage, &pair.usage_field),
        ) {
            (Some(price_value), Some(usage_value)) => price_value.loosely_equals(usage_value),
            _ => false,
        }
    }
}

/// 单次匹配的便捷入口
pub fn match_record(
    usage: &Record,
    price_list: &[Record],
    match_fields: &[MatchFieldPair],
    strategy: MatchStrategy,
) -> MatchResult {
    RecordMatcher::new(match_fields.to_vec(), strategy).find(usage, price_list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record_from_json;
    use serde_json::{json, Value};

    fn rec(v: Value) -> Record {
        record_from_json(v).unwrap()
    }

    fn price_list() -> Vec<Record> {
        vec![
            rec(json!({ "Category": "Compute", "Product": "VM-Small", "price": 0.05 })),
            rec(json!({ "Category": "Compute", "Product": "VM-Large", "price": 0.20 })),
            rec(json!({ "Category": "Storage", "Product": "Blob", "price": 0.01 })),
        ]
    }

    fn levels() -> Vec<MatchFieldPair> {
        vec![MatchFieldPair::same("Category"), MatchFieldPair::same("Product")]
    }

    #[test]
    fn test_flat_match_ignores_case() {
        let usage = rec(json!({ "product": "vm-small", "category": "COMPUTE" }));
        let result = match_record(&usage, &price_list(), &levels(), MatchStrategy::Flat);
        assert!(result.matched);
        assert_eq!(result.depth, 2);
        assert_eq!(result.entries[0]["Product"], FieldValue::text("VM-Small"));
    }

    #[test]
    fn test_flat_match_requires_defined_values() {
        let list = vec![rec(json!({ "sku": null })), rec(json!({ "other": 1 }))];
        let usage = rec(json!({ "sku": null }));
        let result = match_record(&usage, &list, &[MatchFieldPair::same("sku")], MatchStrategy::Flat);
        assert_eq!(result.match_count, 0);
    }

    #[test]
    fn test_flat_multiple_matches_not_resolved() {
        let usage = rec(json!({ "Category": "compute" }));
        let result = match_record(
            &usage,
            &price_list(),
            &[MatchFieldPair::same("Category")],
            MatchStrategy::Flat,
        );
        assert!(!result.matched);
        assert_eq!(result.match_count, 2);
    }

    #[test]
    fn test_strict_equality_for_non_strings() {
        let list = vec![rec(json!({ "tier": 1 })), rec(json!({ "tier": "1" }))];
        let usage = rec(json!({ "tier": 1 }));
        let result = match_record(&usage, &list, &[MatchFieldPair::same("tier")], MatchStrategy::Flat);
        assert_eq!(result.match_count, 1);
        assert_eq!(result.entries[0]["tier"], FieldValue::from(1i64));
    }

    #[test]
    fn test_hierarchical_best_match_keeps_partial_level() {
        let usage = rec(json!({ "Category": "Compute", "Product": "GPU" }));
        let best = match_record(
            &usage,
            &price_list(),
            &levels(),
            MatchStrategy::Hierarchical(PartialMatchPolicy::BestMatch),
        );
        assert_eq!(best.match_count, 2);
        assert_eq!(best.depth, 1);

        let strict = match_record(
            &usage,
            &price_list(),
            &levels(),
            MatchStrategy::Hierarchical(PartialMatchPolicy::NoMatch),
        );
        assert_eq!(strict.match_count, 0);
    }

    #[test]
    fn test_hierarchical_full_match() {
        let usage = rec(json!({ "Category": "storage", "Product": "blob" }));
        let result = match_record(
            &usage,
            &price_list(),
            &levels(),
            MatchStrategy::Hierarchical(PartialMatchPolicy::NoMatch),
        );
        assert!(result.matched);
        assert_eq!(result.depth, 2);
    }

    #[test]
    fn test_best_match_with_no_first_level_is_empty() {
        let usage = rec(json!({ "Category": "Network", "Product": "Blob" }));
        let result = match_record(
            &usage,
            &price_list(),
            &levels(),
            MatchStrategy::Hierarchical(PartialMatchPolicy::BestMatch),
        );
        assert_eq!(result.match_count, 0);
        assert_eq!(result.depth, 0);
    }

    #[test]
    fn test_exact_key_lookup() {
        let usage = rec(json!({ "category": "Storage" }));
        let matcher = RecordMatcher::new(vec![MatchFieldPair::same("Category")], MatchStrategy::Flat)
            .with_key_lookup(KeyLookup::Exact);
        assert_eq!(matcher.find(&usage, &price_list()).match_count, 0);

        let usage = rec(json!({ "Category": "Storage" }));
        assert!(matcher.find(&usage, &price_list()).matched);
    }
}
