use crate::models::{
    get_case_insensitive, get_exact, FieldSource, FieldValue, KeyLookup, MatchFieldPair,
    OutputFieldConfig, PriceKind, Record,
};
use crate::service::calculator::Calculation;

/// 输出记录组装
///
/// 赋值顺序固定，键冲突时后写覆盖先写：
/// 匹配键回显 -> 数量/价格字段 -> 计算金额 -> 显式映射
#[derive(Debug, Clone)]
pub struct OutputAssembler {
    config: OutputFieldConfig,
    match_fields: Vec<MatchFieldPair>,
    quantity_field: String,
    key_lookup: KeyLookup,
}

impl OutputAssembler {
    pub fn new(
        config: OutputFieldConfig,
        match_fields: Vec<MatchFieldPair>,
        quantity_field: impl Into<String>,
    ) -> Self {
        Self {
            config,
            match_fields,
            quantity_field: quantity_field.into(),
            key_lookup: KeyLookup::CaseInsensitive,
        }
    }

    pub fn with_key_lookup(mut self, key_lookup: KeyLookup) -> Self {
        self.key_lookup = key_lookup;
        self
    }

    fn field<'r>(&self, record: &'r Record, key: &str) -> Option<&'r FieldValue> {
        match self.key_lookup {
            KeyLookup::CaseInsensitive => get_case_insensitive(record, key),
            KeyLookup::Exact => get_exact(record, key),
        }
    }

    pub fn assemble(&self, usage: &Record, entry: &Record, calc: &Calculation) -> Record {
        let cfg = &self.config;
        let mut out = Record::new();

        if cfg.include_match_pricelist_fields {
            for pair in &self.match_fields {
                if let Some(v) = self.field(entry, &pair.price_list_field) {
                    out.insert(format!("{}{}", cfg.price_prefix, pair.price_list_field), v.clone());
                }
            }
        }

        if cfg.include_match_usage_fields {
            for pair in &self.match_fields {
                if let Some(v) = self.field(usage, &pair.usage_field) {
                    out.insert(format!("{}{}", cfg.usage_prefix, pair.usage_field), v.clone());
                }
            }
        }

        if cfg.include_calculation_fields {
            out.insert(
                calc_field_name(cfg, &self.quantity_field),
                FieldValue::Number(calc.quantity.clone()),
            );
            for (_, field, value) in &calc.prices {
                out.insert(calc_field_name(cfg, field), FieldValue::Number(value.clone()));
            }
        }

        let amounts = [
            (PriceKind::Price, &calc.amount),
            (PriceKind::Cost, &calc.cost_amount),
            (PriceKind::Sell, &calc.sell_amount),
        ];
        for (kind, value) in amounts {
            if let Some(v) = value {
                out.insert(amount_field_name(cfg, kind).to_string(), FieldValue::Number(v.clone()));
            }
        }
        if let Some(margin) = &calc.margin {
            out.insert(cfg.margin_field.clone(), FieldValue::Number(margin.clone()));
        }

        for mapping in &cfg.mappings {
            let source = match mapping.source {
                FieldSource::Pricelist => entry,
                FieldSource::Usage => usage,
            };
            // 源值未定义时不写目标键
            if let Some(v) = self.field(source, &mapping.source_field) {
                out.insert(mapping.target_field.clone(), v.clone());
            }
        }

        out
    }
}

/// 价格字段对应的回显键名
pub fn calc_field_name(config: &OutputFieldConfig, field: &str) -> String {
    format!("{}{}", config.calc_prefix, field)
}

/// 金额字段名
pub fn amount_field_name(config: &OutputFieldConfig, kind: PriceKind) -> &str {
    match kind {
        PriceKind::Price => &config.amount_field,
        PriceKind::Cost => &config.cost_amount_field,
        PriceKind::Sell => &config.sell_amount_field,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{record_from_json, CalculationConfig, FieldMapping};
    use crate::service::calculator::BillingCalculator;
    use serde_json::{json, Value};

    fn rec(v: Value) -> Record {
        record_from_json(v).unwrap()
    }

    fn calc_for(usage: &Record, entry: &Record) -> Calculation {
        BillingCalculator::new(CalculationConfig::basic("qty", "price"))
            .calculate(usage, entry)
            .unwrap()
    }

    #[test]
    fn test_default_layout() {
        let usage = rec(json!({ "sku": "a1", "qty": 3 }));
        let entry = rec(json!({ "SKU": "A1", "price": 1.1 }));
        let calc = calc_for(&usage, &entry);
        let asm = OutputAssembler::new(
            OutputFieldConfig::default(),
            vec![MatchFieldPair::new("SKU", "sku")],
            "qty",
        );
        let out = asm.assemble(&usage, &entry, &calc);
        let keys: Vec<&str> = out.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["price_SKU", "usage_sku", "calc_qty", "calc_price", "calc_amount"]);
        assert_eq!(out["calc_amount"].to_json(), json!(3.3));
        assert_eq!(out["calc_qty"].to_json(), json!(3));
        assert_eq!(out["calc_price"].to_json(), json!(1.1));
    }

    #[test]
    fn test_toggles_and_custom_names() {
        let usage = rec(json!({ "sku": "a1", "qty": 2 }));
        let entry = rec(json!({ "sku": "A1", "price": 5 }));
        let calc = calc_for(&usage, &entry);
        let cfg = OutputFieldConfig {
            include_match_pricelist_fields: false,
            include_match_usage_fields: false,
            include_calculation_fields: false,
            amount_field: "total".to_string(),
            ..Default::default()
        };
        let out = OutputAssembler::new(cfg, vec![MatchFieldPair::same("sku")], "qty")
            .assemble(&usage, &entry, &calc);
        assert_eq!(out.len(), 1);
        assert_eq!(out["total"].to_json(), json!(10));
    }

    #[test]
    fn test_mappings_overwrite_and_skip_undefined() {
        let usage = rec(json!({ "sku": "a1", "qty": 1, "customer": "ACME" }));
        let entry = rec(json!({ "sku": "A1", "price": 4, "description": "Widget" }));
        let calc = calc_for(&usage, &entry);
        let cfg = OutputFieldConfig {
            mappings: vec![
                FieldMapping::new(FieldSource::Usage, "customer", "customer_name"),
                FieldMapping::new(FieldSource::Pricelist, "description", "calc_amount"),
                FieldMapping::new(FieldSource::Pricelist, "missing", "never_written"),
            ],
            ..Default::default()
        };
        let out = OutputAssembler::new(cfg, vec![MatchFieldPair::same("sku")], "qty")
            .assemble(&usage, &entry, &calc);
        assert_eq!(out["customer_name"], FieldValue::text("ACME"));
        assert_eq!(out["calc_amount"], FieldValue::text("Widget"));
        assert!(!out.contains_key("never_written"));
    }

    #[test]
    fn test_field_name_helpers() {
        let cfg = OutputFieldConfig::default();
        assert_eq!(calc_field_name(&cfg, "qty"), "calc_qty");
        assert_eq!(amount_field_name(&cfg, PriceKind::Sell), "calc_sell_amount");
    }
}
