//! 推荐引擎
//!
//! （语料快照, 查询）的纯函数：相似工单排名、解决方案聚合、类别/优先级推断、
//! 自动标签、趋势检测。无隐藏状态、无随机性，同输入必同输出。
//! 语料由调用方经弹性分发层取来，引擎自身从不访问存储。

mod similarity;
mod solutions;
mod stats;
mod trends;

pub use similarity::{score, tokenize, QueryDoc, ScoredTicket};
pub use solutions::{confidence, normalize_resolution, RecommendedSolution};
pub use stats::{collect as collect_category_stats, CategoryCount, CategoryStatsSnapshot};
pub use trends::{detect as detect_trends, TrendDirection, TrendEntry, TrendSnapshot};

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::ticket::{Category, Priority, Ticket, TicketStatus};

/// [recommend] 配置段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecommendConfig {
    /// 纳入结果的最低相似度
    pub score_threshold: f64,
    /// 相似工单数量上限（top-K）
    pub max_similar: usize,
    /// 推荐解决方案数量上限
    pub max_solutions: usize,
    /// 自动标签数量上限
    pub max_auto_tags: usize,
    /// 趋势方向阈值
    pub trend_threshold: f64,
    /// 趋势条目数量上限
    pub trend_top_n: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.1,
            max_similar: 5,
            max_solutions: 3,
            max_auto_tags: 5,
            trend_threshold: 0.25,
            trend_top_n: 10,
        }
    }
}

/// 推荐查询：自由文本或既有工单，可覆盖数量上限（search_similar 用更宽的 K）
#[derive(Debug, Clone, Default)]
pub struct RecommendQuery {
    pub doc: QueryDoc,
    /// 剔除查询自身（查询来自既有工单时）
    pub exclude_id: Option<String>,
    pub max_similar: Option<usize>,
    pub max_solutions: Option<usize>,
}

impl RecommendQuery {
    pub fn from_text(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            doc: QueryDoc::from_text(title, description),
            ..Default::default()
        }
    }

    pub fn from_ticket(ticket: &Ticket) -> Self {
        Self {
            doc: QueryDoc::from_ticket(ticket),
            exclude_id: Some(ticket.id.clone()),
            ..Default::default()
        }
    }
}

/// 相似工单条目（serde 字段名即对外负载形状）
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityResult {
    pub id: String,
    pub title: String,
    pub similarity_score: f64,
    /// 仅 RESOLVED 工单携带
    pub resolution: Option<String>,
    pub status: TicketStatus,
}

/// 一次查询的完整推荐结果。列表为空时序列化为 []，字段永远存在。
#[derive(Debug, Clone, Serialize)]
pub struct RecommendationBundle {
    pub similar_tickets: Vec<SimilarityResult>,
    pub recommended_solutions: Vec<RecommendedSolution>,
    pub suggested_category: Option<Category>,
    pub suggested_priority: Option<Priority>,
    pub auto_tags: Vec<String>,
}

impl RecommendationBundle {
    pub fn is_empty(&self) -> bool {
        self.similar_tickets.is_empty()
    }
}

/// 推荐引擎：只持有只读配置
#[derive(Debug, Clone, Default)]
pub struct RecommendationEngine {
    config: RecommendConfig,
}

impl RecommendationEngine {
    pub fn new(config: RecommendConfig) -> Self {
        Self { config }
    }

    /// 对语料快照计算一次完整推荐
    pub fn recommend(&self, corpus: &[Ticket], query: &RecommendQuery) -> RecommendationBundle {
        let top_k = query.max_similar.unwrap_or(self.config.max_similar);
        let max_solutions = query.max_solutions.unwrap_or(self.config.max_solutions);

        let ranked = similarity::rank(
            corpus,
            &query.doc,
            self.config.score_threshold,
            top_k,
            query.exclude_id.as_deref(),
        );

        let similar_tickets = ranked
            .iter()
            .map(|s| SimilarityResult {
                id: s.ticket.id.clone(),
                title: s.ticket.title.clone(),
                similarity_score: s.score,
                resolution: if s.ticket.status == TicketStatus::Resolved {
                    s.ticket.resolution.clone()
                } else {
                    None
                },
                status: s.ticket.status,
            })
            .collect();

        RecommendationBundle {
            similar_tickets,
            recommended_solutions: solutions::aggregate(&ranked, max_solutions),
            suggested_category: suggest_category(&ranked),
            suggested_priority: suggest_priority(&ranked),
            auto_tags: auto_tags(&ranked, &query.doc.tags, self.config.max_auto_tags),
        }
    }

    /// 类别统计：各类别总数与状态分布
    pub fn category_stats(&self, corpus: &[Ticket]) -> CategoryStatsSnapshot {
        stats::collect(corpus)
    }

    /// 趋势检测：窗口 [now-window, now) 对比前一等长窗口
    pub fn trends(&self, corpus: &[Ticket], now: DateTime<Utc>, window: Duration) -> TrendSnapshot {
        trends::detect(
            corpus,
            now,
            window,
            self.config.trend_threshold,
            self.config.trend_top_n,
        )
    }
}

/// top-K 中最高频的类别；频次并列取平均相似度更高者
fn suggest_category(ranked: &[ScoredTicket]) -> Option<Category> {
    let mut stats: HashMap<Category, (usize, f64)> = HashMap::new();
    for s in ranked {
        let entry = stats.entry(s.ticket.category).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += s.score;
    }
    stats
        .into_iter()
        .map(|(cat, (count, sum))| (cat, count, sum / count as f64))
        .max_by(|a, b| {
            a.1.cmp(&b.1)
                .then_with(|| a.2.total_cmp(&b.2))
                .then_with(|| b.0.to_string().cmp(&a.0.to_string()))
        })
        .map(|(cat, _, _)| cat)
}

/// top-K 中最高频的优先级；频次并列取严重度更高者（CRITICAL > HIGH > MEDIUM > LOW）
fn suggest_priority(ranked: &[ScoredTicket]) -> Option<Priority> {
    let mut counts: HashMap<Priority, usize> = HashMap::new();
    for s in ranked {
        *counts.entry(s.ticket.priority).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)))
        .map(|(p, _)| p)
}

/// 相似工单里最高频的标签，剔除查询自带的，截断到 cap；次序（频次降序, 名称升序）
fn auto_tags(ranked: &[ScoredTicket], query_tags: &BTreeSet<String>, cap: usize) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for s in ranked {
        for tag in &s.ticket.tags {
            if !query_tags.contains(tag) {
                *counts.entry(tag.as_str()).or_insert(0) += 1;
            }
        }
    }
    let mut tags: Vec<(&str, usize)> = counts.into_iter().collect();
    tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    tags.truncate(cap);
    tags.into_iter().map(|(t, _)| t.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn ticket(
        id: &str,
        title: &str,
        description: &str,
        category: Category,
        priority: Priority,
        status: TicketStatus,
        resolution: Option<&str>,
        tags: &[&str],
    ) -> Ticket {
        let now = Utc::now();
        Ticket {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            status,
            category,
            priority,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            created: now - ChronoDuration::days(1),
            updated: now - ChronoDuration::days(1),
            resolution: resolution.map(|r| r.to_string()),
            comments: vec![],
        }
    }

    fn keyboard_corpus() -> Vec<Ticket> {
        vec![
            ticket(
                "ticket-kb",
                "Sticky keyboard keys",
                "Several keyboard keys are stuck and not responding",
                Category::Hardware,
                Priority::Low,
                TicketStatus::Resolved,
                Some("Replaced keyboard"),
                &["keyboard"],
            ),
            ticket(
                "ticket-vpn",
                "VPN connection drops",
                "VPN disconnects frequently",
                Category::Network,
                Priority::High,
                TicketStatus::Open,
                None,
                &["vpn"],
            ),
        ]
    }

    #[test]
    fn test_keyboard_scenario() {
        let engine = RecommendationEngine::default();
        let query = RecommendQuery::from_text(
            "Keyboard not responding",
            "The keyboard has stuck keys and stopped responding",
        );
        let bundle = engine.recommend(&keyboard_corpus(), &query);

        let hit = bundle
            .similar_tickets
            .iter()
            .find(|s| s.id == "ticket-kb")
            .expect("resolved keyboard ticket should be similar");
        assert!(hit.similarity_score >= 0.1);
        assert_eq!(hit.resolution.as_deref(), Some("Replaced keyboard"));

        assert!(bundle
            .recommended_solutions
            .iter()
            .any(|s| s.solution == "Replaced keyboard"));
        assert_eq!(bundle.suggested_category, Some(Category::Hardware));
    }

    #[test]
    fn test_bundle_wire_shape() {
        let engine = RecommendationEngine::default();
        let query = RecommendQuery::from_text("Unrelated billing topic", "invoice is wrong");
        let bundle = engine.recommend(&[], &query);

        let json = serde_json::to_value(&bundle).unwrap();
        // 空结果也必须带出全部字段，列表为 []
        assert_eq!(json["similar_tickets"], serde_json::json!([]));
        assert_eq!(json["recommended_solutions"], serde_json::json!([]));
        assert!(json.get("suggested_category").is_some());
        assert!(json.get("suggested_priority").is_some());
        assert_eq!(json["auto_tags"], serde_json::json!([]));
    }

    #[test]
    fn test_similar_entry_wire_fields() {
        let engine = RecommendationEngine::default();
        let query = RecommendQuery::from_text("Sticky keyboard keys", "keyboard keys stuck");
        let bundle = engine.recommend(&keyboard_corpus(), &query);
        let json = serde_json::to_value(&bundle).unwrap();
        let first = &json["similar_tickets"][0];
        for field in ["id", "title", "similarity_score", "resolution", "status"] {
            assert!(first.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(first["status"], "RESOLVED");
    }

    #[test]
    fn test_priority_tie_breaks_by_severity() {
        let corpus = vec![
            ticket(
                "t1",
                "Server room overheating",
                "temperature alarm in server room",
                Category::Hardware,
                Priority::Critical,
                TicketStatus::Open,
                None,
                &[],
            ),
            ticket(
                "t2",
                "Server room overheating",
                "temperature alarm in server room",
                Category::Hardware,
                Priority::Low,
                TicketStatus::Open,
                None,
                &[],
            ),
        ];
        let engine = RecommendationEngine::default();
        let query = RecommendQuery::from_text("Server room overheating", "temperature alarm");
        let bundle = engine.recommend(&corpus, &query);
        // 频次 1:1，严重度高者胜出
        assert_eq!(bundle.suggested_priority, Some(Priority::Critical));
    }

    #[test]
    fn test_auto_tags_exclude_query_tags() {
        let corpus = vec![
            ticket(
                "t1",
                "Wifi outage in office",
                "office wifi down",
                Category::Network,
                Priority::High,
                TicketStatus::Open,
                None,
                &["wifi", "office"],
            ),
            ticket(
                "t2",
                "Wifi outage again",
                "office wifi down again",
                Category::Network,
                Priority::High,
                TicketStatus::Open,
                None,
                &["wifi"],
            ),
        ];
        let engine = RecommendationEngine::default();
        let mut query = RecommendQuery::from_text("Wifi outage", "office wifi down");
        query.doc.tags = ["wifi"].iter().map(|s| s.to_string()).collect();
        let bundle = engine.recommend(&corpus, &query);
        assert!(bundle.auto_tags.contains(&"office".to_string()));
        assert!(!bundle.auto_tags.contains(&"wifi".to_string()));
    }

    #[test]
    fn test_recommend_is_deterministic() {
        let engine = RecommendationEngine::default();
        let corpus = keyboard_corpus();
        let query = RecommendQuery::from_text("Keyboard not responding", "stuck keys");
        let a = serde_json::to_string(&engine.recommend(&corpus, &query)).unwrap();
        let b = serde_json::to_string(&engine.recommend(&corpus, &query)).unwrap();
        assert_eq!(a, b);
    }
}
