//! 弹性分发层
//!
//! classify（错误分类）、retry（策略与退避）、dispatcher（重试状态机）。
//! 系统其余部分只与 Dispatcher::execute 打交道，重试责任全部收敛在这里。

mod classify;
mod dispatcher;
mod retry;

pub use classify::{classify, ErrorClass};
pub use dispatcher::{
    AttemptOutcome, CallAttempt, DispatchOutcome, Dispatcher, FailureKind, FailureReport,
};
pub use retry::{DispatchConfig, PolicyError, RetryPolicy};
