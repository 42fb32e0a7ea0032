use crate::models::UnmatchedReason;

/// 查询流程中的离散生命周期事件
#[derive(Debug, Clone, PartialEq)]
pub enum LookupEvent {
    InvocationStarted {
        price_list_len: usize,
        usage_len: usize,
    },
    MatchAttempted {
        index: usize,
    },
    MatchResolved {
        index: usize,
        match_count: usize,
        depth: usize,
    },
    RecordUnmatched {
        index: usize,
        reason: UnmatchedReason,
        match_count: usize,
    },
    InvocationCompleted {
        matched: usize,
        unmatched: usize,
    },
    InvocationFailed {
        code: &'static str,
        message: String,
    },
}

/// 事件接收方，由调用方注入；核心流程本身不直接输出日志
pub trait LookupEventSink: Send + Sync {
    fn emit(&self, event: LookupEvent);
}

/// 默认实现：转成 tracing 日志
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl LookupEventSink for TracingEventSink {
    fn emit(&self, event: LookupEvent) {
        match event {
            LookupEvent::InvocationStarted { price_list_len, usage_len } => {
                tracing::info!(
                    "[Lookup] 开始匹配: 价目表 {} 条, 用量记录 {} 条",
                    price_list_len, usage_len
                );
            }
            LookupEvent::MatchAttempted { index } => {
                tracing::trace!("[Lookup] record {}: match attempted", index);
            }
            LookupEvent::MatchResolved { index, match_count, depth } => {
                tracing::debug!(
                    "[Lookup] record {}: 命中 {} 条, depth {}",
                    index, match_count, depth
                );
            }
            LookupEvent::RecordUnmatched { index, reason, match_count } => {
                tracing::debug!(
                    "[Lookup] record {}: unmatched ({:?}, count {})",
                    index, reason, match_count
                );
            }
            LookupEvent::InvocationCompleted { matched, unmatched } => {
                tracing::info!(
                    "[Lookup] 匹配完成: 已匹配 {}, 未匹配 {}",
                    matched, unmatched
                );
            }
            LookupEvent::InvocationFailed { code, message } => {
                tracing::error!("[Lookup] invocation failed ({}): {}", code, message);
            }
        }
    }
}

/// 丢弃所有事件
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl LookupEventSink for NoopEventSink {
    fn emit(&self, _event: LookupEvent) {}
}
