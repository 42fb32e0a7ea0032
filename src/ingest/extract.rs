use crate::error::{LookupError, Result};
use crate::models::{record_from_json, Record};
use serde_json::Value;

/// 规范化为记录集合
///
/// - 字符串：尝试按 JSON 解析，失败视为空集合
/// - 数组：逐个取对象元素
/// - 单个对象：包装为单元素集合
/// - 其余：空集合
pub fn normalize_collection(value: Value) -> Vec<Record> {
    match value {
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(parsed @ (Value::Array(_) | Value::Object(_))) => normalize_collection(parsed),
            Ok(_) | Err(_) => {
                tracing::debug!("[Extract] string input is not a JSON collection, treating as empty");
                Vec::new()
            }
        },
        Value::Array(items) => {
            let total = items.len();
            let records: Vec<Record> = items.into_iter().filter_map(record_from_json).collect();
            if records.len() < total {
                tracing::warn!(
                    "[Extract] 跳过 {} 个非对象元素",
                    total - records.len()
                );
            }
            records
        }
        Value::Object(_) => record_from_json(value).into_iter().collect(),
        _ => Vec::new(),
    }
}

/// 从容器中提取集合
///
/// `path` 为空时直接使用容器本身 (顶层字段即一条记录，或数组本身)；
/// 否则按点分路径逐级取字段，途中遇到 JSON 字符串会先解析。
pub fn extract_collection(container: &Value, path: Option<&str>) -> Result<Vec<Record>> {
    let Some(path) = path else {
        return Ok(normalize_collection(container.clone()));
    };

    let path = path.trim();
    if path.is_empty() {
        return Err(LookupError::Config(
            "source field name must not be empty".to_string(),
        ));
    }

    let mut current = container.clone();
    for segment in path.split('.') {
        let object = match current {
            Value::String(text) => serde_json::from_str::<Value>(&text).map_err(|e| {
                LookupError::Extraction(format!(
                    "cannot resolve '{}': value before '{}' is not a JSON object ({})",
                    path, segment, e
                ))
            })?,
            other => other,
        };
        current = match object {
            Value::Object(mut map) => map.remove(segment).ok_or_else(|| {
                LookupError::Extraction(format!("field '{}' not found (path '{}')", segment, path))
            })?,
            _ => {
                return Err(LookupError::Extraction(format!(
                    "cannot resolve '{}': '{}' is not inside an object",
                    path, segment
                )))
            }
        };
    }

    Ok(normalize_collection(current))
}
