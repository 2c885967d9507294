//! 错误分类器
//!
//! 把存储层的原始错误映射为四类：Retryable / Validation / NotFound / Terminal。
//! 这是重试决策的唯一事实来源：同一个输入永远得到同一个分类。

use crate::store::StoreError;

/// 原始错误的分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 瞬时故障（5xx / 超时 / 连接失败），可自动重试
    Retryable,
    /// 输入被业务规则拒绝，重试同样的输入不可能成功
    Validation,
    /// 引用的实体不存在，重试不可能成功
    NotFound,
    /// 未预期的错误，立即上浮，不重试
    Terminal,
}

/// 分类规则：5xx 等价 / 超时 / 连接失败 => Retryable；4xx 语义错误 => Validation；
/// 404 等价 => NotFound；其余 => Terminal
pub fn classify(err: &StoreError) -> ErrorClass {
    match err {
        StoreError::Server { status, .. } if (500..600).contains(status) => ErrorClass::Retryable,
        StoreError::Timeout(_) | StoreError::Connection(_) => ErrorClass::Retryable,
        StoreError::Invalid(_) => ErrorClass::Validation,
        StoreError::NotFound(_) => ErrorClass::NotFound,
        // 带非 5xx 状态码的 Server 错误不在预期内
        StoreError::Server { .. } => ErrorClass::Terminal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_server_errors_are_retryable() {
        for status in [500, 502, 503, 599] {
            let err = StoreError::server(status, "boom");
            assert_eq!(classify(&err), ErrorClass::Retryable);
        }
    }

    #[test]
    fn test_timeout_and_connection_are_retryable() {
        assert_eq!(
            classify(&StoreError::Timeout(Duration::from_secs(5))),
            ErrorClass::Retryable
        );
        assert_eq!(
            classify(&StoreError::Connection("refused".into())),
            ErrorClass::Retryable
        );
    }

    #[test]
    fn test_invalid_is_validation() {
        assert_eq!(
            classify(&StoreError::invalid("bad status")),
            ErrorClass::Validation
        );
    }

    #[test]
    fn test_not_found() {
        assert_eq!(
            classify(&StoreError::NotFound("ticket-x".into())),
            ErrorClass::NotFound
        );
    }

    #[test]
    fn test_unexpected_status_is_terminal() {
        assert_eq!(
            classify(&StoreError::server(302, "weird redirect")),
            ErrorClass::Terminal
        );
    }

    #[test]
    fn test_classification_is_deterministic() {
        let err = StoreError::server(503, "unavailable");
        assert_eq!(classify(&err), classify(&err));
    }
}
