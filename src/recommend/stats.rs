//! 类别统计
//!
//! 对语料快照按类别聚合：总数与各状态（open / resolved / closed）计数。
//! 与趋势检测一样按需派生，从不缓存；只统计语料中出现过的类别。

use std::collections::HashMap;

use serde::Serialize;

use crate::ticket::{Category, Ticket, TicketStatus};

/// 单个类别的计数
#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub category: Category,
    pub total: usize,
    pub open: usize,
    pub resolved: usize,
    pub closed: usize,
}

/// 全语料的类别统计（serde 字段名即对外负载形状）
#[derive(Debug, Clone, Serialize)]
pub struct CategoryStatsSnapshot {
    pub total_tickets: usize,
    pub categories: Vec<CategoryCount>,
}

/// 聚合语料的类别统计。次序：总数降序, 类别名升序。
pub fn collect(corpus: &[Ticket]) -> CategoryStatsSnapshot {
    let mut counts: HashMap<Category, CategoryCount> = HashMap::new();
    for ticket in corpus {
        let entry = counts.entry(ticket.category).or_insert(CategoryCount {
            category: ticket.category,
            total: 0,
            open: 0,
            resolved: 0,
            closed: 0,
        });
        entry.total += 1;
        match ticket.status {
            TicketStatus::Open => entry.open += 1,
            TicketStatus::Resolved => entry.resolved += 1,
            TicketStatus::Closed => entry.closed += 1,
        }
    }

    let mut categories: Vec<CategoryCount> = counts.into_values().collect();
    categories.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| a.category.to_string().cmp(&b.category.to_string()))
    });

    CategoryStatsSnapshot {
        total_tickets: corpus.len(),
        categories,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::Priority;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn ticket(id: &str, category: Category, status: TicketStatus) -> Ticket {
        let now = Utc::now();
        Ticket {
            id: id.to_string(),
            title: "t".to_string(),
            description: "d".to_string(),
            status,
            category,
            priority: Priority::Medium,
            tags: BTreeSet::new(),
            created: now,
            updated: now,
            resolution: None,
            comments: vec![],
        }
    }

    #[test]
    fn test_counts_by_category_and_status() {
        let corpus = vec![
            ticket("t1", Category::Hardware, TicketStatus::Open),
            ticket("t2", Category::Hardware, TicketStatus::Resolved),
            ticket("t3", Category::Hardware, TicketStatus::Closed),
            ticket("t4", Category::Network, TicketStatus::Open),
        ];
        let stats = collect(&corpus);
        assert_eq!(stats.total_tickets, 4);
        assert_eq!(stats.categories.len(), 2);

        let hardware = &stats.categories[0];
        assert_eq!(hardware.category, Category::Hardware);
        assert_eq!(hardware.total, 3);
        assert_eq!(hardware.open, 1);
        assert_eq!(hardware.resolved, 1);
        assert_eq!(hardware.closed, 1);
    }

    #[test]
    fn test_ties_ordered_by_category_name() {
        let corpus = vec![
            ticket("t1", Category::Software, TicketStatus::Open),
            ticket("t2", Category::Access, TicketStatus::Open),
        ];
        let stats = collect(&corpus);
        // 总数并列，ACCESS 在 SOFTWARE 前
        assert_eq!(stats.categories[0].category, Category::Access);
        assert_eq!(stats.categories[1].category, Category::Software);
    }

    #[test]
    fn test_empty_corpus() {
        let stats = collect(&[]);
        assert_eq!(stats.total_tickets, 0);
        assert!(stats.categories.is_empty());
    }

    #[test]
    fn test_absent_categories_not_listed() {
        let corpus = vec![ticket("t1", Category::Network, TicketStatus::Open)];
        let stats = collect(&corpus);
        assert_eq!(stats.categories.len(), 1);
    }

    #[test]
    fn test_wire_shape() {
        let corpus = vec![ticket("t1", Category::Hardware, TicketStatus::Resolved)];
        let json = serde_json::to_value(collect(&corpus)).unwrap();
        assert_eq!(json["total_tickets"], 1);
        let first = &json["categories"][0];
        for field in ["category", "total", "open", "resolved", "closed"] {
            assert!(first.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(first["category"], "HARDWARE");
    }
}
