//! 解决方案聚合
//!
//! 在相似工单中取已 RESOLVED 的，按归一化后的 resolution 文本分组，
//! 置信度随组大小与平均相似度单调不减，按置信度降序输出，并保留来源工单 id 以便追溯。

use std::collections::HashMap;

use serde::Serialize;

use crate::recommend::similarity::ScoredTicket;
use crate::ticket::{Category, TicketStatus};

/// 推荐的解决方案条目（serde 字段名即对外负载形状）
#[derive(Debug, Clone, Serialize)]
pub struct RecommendedSolution {
    pub solution: String,
    pub confidence: f64,
    pub source_tickets: Vec<String>,
    pub category: Category,
}

/// 归一化 resolution 文本作为分组键：小写、折叠空白、去掉尾部标点
pub fn normalize_resolution(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['.', '!', ';'])
        .to_string()
}

/// 置信度：avg_similarity * n/(n+1)。
/// 固定平均相似度时随组大小单调不减，固定组大小时随平均相似度单调不减，且恒小于 1。
pub fn confidence(group_size: usize, avg_similarity: f64) -> f64 {
    let n = group_size as f64;
    (avg_similarity.clamp(0.0, 1.0) * n / (n + 1.0)).clamp(0.0, 1.0)
}

struct Group {
    /// 展示用原文（取组内排名最高者的 resolution）
    display: String,
    scores: Vec<f64>,
    sources: Vec<String>,
    categories: Vec<Category>,
}

/// 聚合相似工单的解决方案。输入须已按相似度降序（rank 的输出）。
pub fn aggregate(similar: &[ScoredTicket], max_solutions: usize) -> Vec<RecommendedSolution> {
    let mut groups: HashMap<String, Group> = HashMap::new();

    for scored in similar {
        if scored.ticket.status != TicketStatus::Resolved {
            continue;
        }
        let Some(resolution) = scored.ticket.resolution.as_deref() else {
            continue;
        };
        if resolution.trim().is_empty() {
            continue;
        }

        let key = normalize_resolution(resolution);
        let group = groups.entry(key).or_insert_with(|| Group {
            display: resolution.trim().to_string(),
            scores: Vec::new(),
            sources: Vec::new(),
            categories: Vec::new(),
        });
        group.scores.push(scored.score);
        group.sources.push(scored.ticket.id.clone());
        group.categories.push(scored.ticket.category);
    }

    let mut solutions: Vec<RecommendedSolution> = groups
        .into_values()
        .map(|g| {
            let avg = g.scores.iter().sum::<f64>() / g.scores.len() as f64;
            RecommendedSolution {
                confidence: confidence(g.scores.len(), avg),
                category: most_frequent_category(&g.categories),
                solution: g.display,
                source_tickets: g.sources,
            }
        })
        .collect();

    // 置信度降序；并列时来源多者优先，再按文本稳定排序
    solutions.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| b.source_tickets.len().cmp(&a.source_tickets.len()))
            .then_with(|| a.solution.cmp(&b.solution))
    });
    solutions.truncate(max_solutions);
    solutions
}

fn most_frequent_category(categories: &[Category]) -> Category {
    let mut counts: HashMap<Category, usize> = HashMap::new();
    for &c in categories {
        *counts.entry(c).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.to_string().cmp(&a.0.to_string())))
        .map(|(c, _)| c)
        .unwrap_or(Category::Other)
}
