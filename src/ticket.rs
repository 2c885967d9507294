//! 工单数据模型
//!
//! Ticket 及其枚举字段（状态 / 类别 / 优先级）、创建草稿 TicketDraft 与更新补丁 TicketPatch。
//! 工单归后端存储所有，核心层只通过 store 的读写契约访问，从不在本地缓存权威状态。

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 标题长度上限（字符数）
pub const MAX_TITLE_LEN: usize = 200;
/// 描述长度上限
pub const MAX_DESCRIPTION_LEN: usize = 1000;
/// 解决方案备注长度上限
pub const MAX_RESOLUTION_LEN: usize = 500;

/// 工单状态：OPEN -> RESOLVED -> CLOSED
///
/// 转入 RESOLVED 必须附带非空 resolution；转入 CLOSED 要求当前已是 RESOLVED，
/// 或在补丁中显式 force_close 覆盖。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TicketStatus {
    Open,
    Resolved,
    Closed,
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TicketStatus::Open => "OPEN",
            TicketStatus::Resolved => "RESOLVED",
            TicketStatus::Closed => "CLOSED",
        };
        f.write_str(s)
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OPEN" => Ok(TicketStatus::Open),
            "RESOLVED" => Ok(TicketStatus::Resolved),
            "CLOSED" => Ok(TicketStatus::Closed),
            other => Err(format!(
                "Invalid status '{other}'. Valid statuses are: OPEN, RESOLVED, CLOSED"
            )),
        }
    }
}

/// 工单类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Hardware,
    Software,
    Network,
    Access,
    Performance,
    Other,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Hardware => "HARDWARE",
            Category::Software => "SOFTWARE",
            Category::Network => "NETWORK",
            Category::Access => "ACCESS",
            Category::Performance => "PERFORMANCE",
            Category::Other => "OTHER",
        };
        f.write_str(s)
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HARDWARE" => Ok(Category::Hardware),
            "SOFTWARE" => Ok(Category::Software),
            "NETWORK" => Ok(Category::Network),
            "ACCESS" => Ok(Category::Access),
            "PERFORMANCE" => Ok(Category::Performance),
            "OTHER" => Ok(Category::Other),
            other => Err(format!(
                "Invalid category '{other}'. Valid categories are: HARDWARE, SOFTWARE, NETWORK, ACCESS, PERFORMANCE, OTHER"
            )),
        }
    }
}

/// 工单优先级（严重度从低到高）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Ok(Priority::Low),
            "MEDIUM" => Ok(Priority::Medium),
            "HIGH" => Ok(Priority::High),
            "CRITICAL" => Ok(Priority::Critical),
            other => Err(format!(
                "Invalid priority '{other}'. Valid priorities are: LOW, MEDIUM, HIGH, CRITICAL"
            )),
        }
    }
}

/// 完整工单。id 一经分配不可变；updated 永远不早于 created。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub category: Category,
    pub priority: Priority,
    /// 标签集合（BTreeSet 保证序列化顺序稳定）
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// 仅当 status = RESOLVED 时存在
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub comments: Vec<String>,
}

/// 创建工单的草稿（id / 时间戳由存储层分配）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TicketDraft {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub comments: Vec<String>,
}

impl TicketDraft {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Default::default()
        }
    }
}

/// 更新工单的补丁：None 表示不修改该字段
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TicketPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TicketStatus>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub tags: Option<BTreeSet<String>>,
    #[serde(default)]
    pub comments: Option<Vec<String>>,
    /// 显式覆盖：允许未 RESOLVED 直接 CLOSED
    #[serde(default)]
    pub force_close: bool,
}

impl TicketPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.resolution.is_none()
            && self.category.is_none()
            && self.priority.is_none()
            && self.tags.is_none()
            && self.comments.is_none()
    }

    pub fn resolve(resolution: impl Into<String>) -> Self {
        Self {
            status: Some(TicketStatus::Resolved),
            resolution: Some(resolution.into()),
            ..Default::default()
        }
    }
}
