//! 工单存储契约
//!
//! 所有后端访问都经由 TicketStore trait（create / get / update / delete / list / ping），
//! 返回结构化负载或带状态码语义的 StoreError。核心层从不直接触碰存储内部结构，
//! 故障注入层（FlakyStore）与真实存储实现同一契约，可自由替换。

mod flaky;
mod memory;

pub use flaky::{FlakyStore, SimulationConfig};
pub use memory::InMemoryStore;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::ticket::{Category, Priority, Ticket, TicketDraft, TicketPatch, TicketStatus};

/// 存储层错误：对应 HTTP 式状态码语义，供 dispatch::classify 分类
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// 404：引用的工单不存在
    #[error("Ticket with ID '{0}' not found. Please check the ticket ID and try again.")]
    NotFound(String),

    /// 422：输入不合法（含不支持的状态迁移）
    #[error("Invalid request: {0}")]
    Invalid(String),

    /// 5xx：后端瞬时故障（真实的或注入的）
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// 单次调用超出时限
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// 传输层连接失败
    #[error("Connection failed: {0}")]
    Connection(String),
}

impl StoreError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        StoreError::Invalid(msg.into())
    }

    pub fn server(status: u16, msg: impl Into<String>) -> Self {
        StoreError::Server {
            status,
            message: msg.into(),
        }
    }
}

/// 列表查询过滤条件
#[derive(Debug, Clone, Copy, Default)]
pub struct ListFilter {
    pub status: Option<TicketStatus>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
}

impl ListFilter {
    pub fn matches(&self, ticket: &Ticket) -> bool {
        self.status.map_or(true, |s| ticket.status == s)
            && self.category.map_or(true, |c| ticket.category == c)
            && self.priority.map_or(true, |p| ticket.priority == p)
    }
}

/// 工单存储契约。实现必须线程安全，单次调用即单次快照，不提供跨调用的事务隔离。
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// 健康检查（故障注入层对 ping 放行，对齐「/health 跳过模拟」的行为）
    async fn ping(&self) -> Result<(), StoreError>;

    async fn create(&self, draft: TicketDraft) -> Result<Ticket, StoreError>;

    async fn get(&self, id: &str) -> Result<Ticket, StoreError>;

    async fn update(&self, id: &str, patch: TicketPatch) -> Result<Ticket, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// 按过滤条件列出工单，按创建时间降序
    async fn list(&self, filter: ListFilter) -> Result<Vec<Ticket>, StoreError>;
}

/// 共享句柄别名：核心层统一以 Arc<dyn TicketStore> 持有存储
pub type SharedStore = Arc<dyn TicketStore>;
