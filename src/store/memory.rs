//! 内存工单存储
//!
//! RwLock<HashMap> 的线程安全实现，承载全部业务校验：字段长度、状态迁移规则、
//! RESOLVED 必须带 resolution、CLOSED 需先 RESOLVED（或 force_close 覆盖）。
//! 启动时可灌入示例数据，供演示与 `test` 场景使用。

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::{ListFilter, StoreError, TicketStore};
use crate::ticket::{
    Category, Priority, Ticket, TicketDraft, TicketPatch, TicketStatus, MAX_DESCRIPTION_LEN,
    MAX_RESOLUTION_LEN, MAX_TITLE_LEN,
};

/// 内存存储：工单以 id 为键；校验失败返回 Invalid / NotFound，从不产生 5xx
#[derive(Default)]
pub struct InMemoryStore {
    tickets: RwLock<HashMap<String, Ticket>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 生成形如 ticket-1a2b3c4d 的短 id
    fn next_id() -> String {
        let hex = Uuid::new_v4().simple().to_string();
        format!("ticket-{}", &hex[..8])
    }

    fn validate_title(title: &str) -> Result<(), StoreError> {
        let len = title.chars().count();
        if title.trim().is_empty() {
            return Err(StoreError::invalid("Field 'title' must not be empty"));
        }
        if len > MAX_TITLE_LEN {
            return Err(StoreError::invalid(format!(
                "Field 'title' exceeds {MAX_TITLE_LEN} characters (got {len})"
            )));
        }
        Ok(())
    }

    fn validate_description(description: &str) -> Result<(), StoreError> {
        let len = description.chars().count();
        if description.trim().is_empty() {
            return Err(StoreError::invalid("Field 'description' must not be empty"));
        }
        if len > MAX_DESCRIPTION_LEN {
            return Err(StoreError::invalid(format!(
                "Field 'description' exceeds {MAX_DESCRIPTION_LEN} characters (got {len})"
            )));
        }
        Ok(())
    }

    fn validate_resolution(resolution: &str) -> Result<(), StoreError> {
        let len = resolution.chars().count();
        if len > MAX_RESOLUTION_LEN {
            return Err(StoreError::invalid(format!(
                "Field 'resolution' exceeds {MAX_RESOLUTION_LEN} characters (got {len})"
            )));
        }
        Ok(())
    }

    /// 在副本上应用补丁并校验状态迁移；调用方决定是否落库
    fn apply_patch(ticket: &Ticket, patch: &TicketPatch) -> Result<Ticket, StoreError> {
        let mut next = ticket.clone();

        if let Some(ref title) = patch.title {
            Self::validate_title(title)?;
            next.title = title.clone();
        }
        if let Some(ref description) = patch.description {
            Self::validate_description(description)?;
            next.description = description.clone();
        }
        if let Some(ref resolution) = patch.resolution {
            Self::validate_resolution(resolution)?;
            next.resolution = Some(resolution.clone());
        }
        if let Some(category) = patch.category {
            next.category = category;
        }
        if let Some(priority) = patch.priority {
            next.priority = priority;
        }
        if let Some(ref tags) = patch.tags {
            next.tags = tags.clone();
        }
        if let Some(ref comments) = patch.comments {
            next.comments = comments.clone();
        }

        if let Some(status) = patch.status {
            match status {
                TicketStatus::Resolved => {
                    // 迁移到 RESOLVED 必须有非空 resolution（新带的或已有的）
                    let has_resolution = next
                        .resolution
                        .as_deref()
                        .map(|r| !r.trim().is_empty())
                        .unwrap_or(false);
                    if !has_resolution {
                        return Err(StoreError::invalid(
                            "Field 'resolution' must be a non-empty note when setting status to 'RESOLVED'",
                        ));
                    }
                }
                TicketStatus::Closed => {
                    if ticket.status != TicketStatus::Resolved && !patch.force_close {
                        return Err(StoreError::invalid(format!(
                            "Unsupported status transition {} -> CLOSED: resolve the ticket first or pass force_close",
                            ticket.status
                        )));
                    }
                }
                TicketStatus::Open => {}
            }
            next.status = status;
        }

        next.updated = Utc::now();
        Ok(next)
    }

    /// 灌入示例工单（对齐原型的 sample data，含已解决的键盘工单供推荐演示）
    pub async fn seed_sample_data(&self) {
        let now = Utc::now();
        let samples = vec![
            Ticket {
                id: "ticket-001".to_string(),
                title: "Login issues".to_string(),
                description: "Cannot log into the system after password reset".to_string(),
                status: TicketStatus::Open,
                category: Category::Access,
                priority: Priority::High,
                tags: ["login", "account"].iter().map(|s| s.to_string()).collect(),
                created: now - ChronoDuration::days(2),
                updated: now - ChronoDuration::days(2),
                resolution: None,
                comments: vec!["User reported issue at 9 AM".to_string()],
            },
            Ticket {
                id: "ticket-002".to_string(),
                title: "Printer not working".to_string(),
                description: "Office printer is not responding to print jobs".to_string(),
                status: TicketStatus::Resolved,
                category: Category::Hardware,
                priority: Priority::Medium,
                tags: ["printer"].iter().map(|s| s.to_string()).collect(),
                created: now - ChronoDuration::days(5),
                updated: now - ChronoDuration::days(4),
                resolution: Some("Replaced toner cartridge".to_string()),
                comments: vec![
                    "Checked printer status".to_string(),
                    "Toner was empty".to_string(),
                ],
            },
            Ticket {
                id: "ticket-003".to_string(),
                title: "Sticky keyboard keys".to_string(),
                description: "Several keyboard keys are stuck and not responding".to_string(),
                status: TicketStatus::Resolved,
                category: Category::Hardware,
                priority: Priority::Low,
                tags: ["keyboard"].iter().map(|s| s.to_string()).collect(),
                created: now - ChronoDuration::days(10),
                updated: now - ChronoDuration::days(9),
                resolution: Some("Replaced keyboard".to_string()),
                comments: vec![],
            },
            Ticket {
                id: "ticket-004".to_string(),
                title: "Software installation request".to_string(),
                description: "Need Adobe Photoshop installed on workstation".to_string(),
                status: TicketStatus::Closed,
                category: Category::Software,
                priority: Priority::Low,
                tags: ["install"].iter().map(|s| s.to_string()).collect(),
                created: now - ChronoDuration::days(20),
                updated: now - ChronoDuration::days(18),
                resolution: Some("Software installed and configured".to_string()),
                comments: vec![
                    "Approved by manager".to_string(),
                    "Installation completed".to_string(),
                ],
            },
            Ticket {
                id: "ticket-005".to_string(),
                title: "VPN connection drops".to_string(),
                description: "VPN disconnects every few minutes when working remotely".to_string(),
                status: TicketStatus::Open,
                category: Category::Network,
                priority: Priority::High,
                tags: ["vpn", "remote"].iter().map(|s| s.to_string()).collect(),
                created: now - ChronoDuration::hours(6),
                updated: now - ChronoDuration::hours(6),
                resolution: None,
                comments: vec![],
            },
        ];

        let mut tickets = self.tickets.write().await;
        for ticket in samples {
            tickets.insert(ticket.id.clone(), ticket);
        }
        tracing::info!(count = tickets.len(), "Seeded sample tickets");
    }

    /// 当前工单数（测试辅助）
    pub async fn len(&self) -> usize {
        self.tickets.read().await.len()
    }
}

#[async_trait]
impl TicketStore for InMemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn create(&self, draft: TicketDraft) -> Result<Ticket, StoreError> {
        Self::validate_title(&draft.title)?;
        Self::validate_description(&draft.description)?;

        let now = Utc::now();
        let ticket = Ticket {
            id: Self::next_id(),
            title: draft.title,
            description: draft.description,
            status: TicketStatus::Open,
            category: draft.category.unwrap_or(Category::Other),
            priority: draft.priority.unwrap_or(Priority::Medium),
            tags: draft.tags,
            created: now,
            updated: now,
            resolution: None,
            comments: draft.comments,
        };

        let mut tickets = self.tickets.write().await;
        tickets.insert(ticket.id.clone(), ticket.clone());
        Ok(ticket)
    }

    async fn get(&self, id: &str) -> Result<Ticket, StoreError> {
        let tickets = self.tickets.read().await;
        tickets
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn update(&self, id: &str, patch: TicketPatch) -> Result<Ticket, StoreError> {
        let mut tickets = self.tickets.write().await;
        let current = tickets
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let next = Self::apply_patch(current, &patch)?;
        tickets.insert(id.to_string(), next.clone());
        Ok(next)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut tickets = self.tickets.write().await;
        tickets
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list(&self, filter: ListFilter) -> Result<Vec<Ticket>, StoreError> {
        let tickets = self.tickets.read().await;
        let mut result: Vec<Ticket> = tickets
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| a.id.cmp(&b.id)));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryStore::new();
        let ticket = store
            .create(TicketDraft::new("Broken mouse", "Left button does not click"))
            .await
            .unwrap();
        assert!(ticket.id.starts_with("ticket-"));
        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(ticket.created, ticket.updated);

        let fetched = store.get(&ticket.id).await.unwrap();
        assert_eq!(fetched.title, "Broken mouse");
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.get("ticket-nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(ref id) if id == "ticket-nope"));
    }

    #[tokio::test]
    async fn test_create_rejects_empty_title() {
        let store = InMemoryStore::new();
        let err = store
            .create(TicketDraft::new("  ", "something"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(ref m) if m.contains("title")));
    }

    #[tokio::test]
    async fn test_resolve_requires_resolution() {
        let store = InMemoryStore::new();
        let ticket = store
            .create(TicketDraft::new("Screen flicker", "External monitor flickers"))
            .await
            .unwrap();

        let patch = TicketPatch {
            status: Some(TicketStatus::Resolved),
            resolution: Some("   ".to_string()),
            ..Default::default()
        };
        let err = store.update(&ticket.id, patch).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(ref m) if m.contains("resolution")));

        // 校验失败不得修改工单
        let unchanged = store.get(&ticket.id).await.unwrap();
        assert_eq!(unchanged.status, TicketStatus::Open);
        assert!(unchanged.resolution.is_none());
    }

    #[tokio::test]
    async fn test_close_requires_resolved_or_force() {
        let store = InMemoryStore::new();
        let ticket = store
            .create(TicketDraft::new("Slow laptop", "Boot takes five minutes"))
            .await
            .unwrap();

        let close = TicketPatch {
            status: Some(TicketStatus::Closed),
            ..Default::default()
        };
        let err = store.update(&ticket.id, close.clone()).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));

        let forced = TicketPatch {
            force_close: true,
            ..close
        };
        let closed = store.update(&ticket.id, forced).await.unwrap();
        assert_eq!(closed.status, TicketStatus::Closed);
    }

    #[tokio::test]
    async fn test_resolve_then_close() {
        let store = InMemoryStore::new();
        let ticket = store
            .create(TicketDraft::new("No audio", "Speakers are silent"))
            .await
            .unwrap();

        let resolved = store
            .update(&ticket.id, TicketPatch::resolve("Re-enabled audio device"))
            .await
            .unwrap();
        assert_eq!(resolved.status, TicketStatus::Resolved);
        assert!(resolved.updated >= resolved.created);

        let closed = store
            .update(
                &ticket.id,
                TicketPatch {
                    status: Some(TicketStatus::Closed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(closed.status, TicketStatus::Closed);
    }

    #[tokio::test]
    async fn test_list_filters_and_order() {
        let store = InMemoryStore::new();
        store.seed_sample_data().await;

        let all = store.list(ListFilter::default()).await.unwrap();
        assert_eq!(all.len(), 5);
        // 创建时间降序
        for pair in all.windows(2) {
            assert!(pair[0].created >= pair[1].created);
        }

        let open = store
            .list(ListFilter {
                status: Some(TicketStatus::Open),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(open.iter().all(|t| t.status == TicketStatus::Open));

        let hardware = store
            .list(ListFilter {
                category: Some(Category::Hardware),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(hardware.len(), 2);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryStore::new();
        let ticket = store
            .create(TicketDraft::new("Temp ticket", "To be removed"))
            .await
            .unwrap();
        store.delete(&ticket.id).await.unwrap();
        assert!(matches!(
            store.delete(&ticket.id).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }
}
