//! 编排核心
//!
//! 接收结构化意图（封闭枚举，路由全部静态可检查），经弹性分发层访问后端，
//! 必要时串接推荐引擎（推荐所需的语料同样走分发层取），把失败报告翻译成用户可读的指引。
//! 用户可见的失败文案只在这一层产生；本层自己从不重试。

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::dispatch::{DispatchOutcome, Dispatcher, FailureKind, FailureReport};
use crate::recommend::{
    CategoryStatsSnapshot, RecommendQuery, RecommendationBundle, RecommendationEngine,
    TrendDirection, TrendSnapshot,
};
use crate::store::{ListFilter, SharedStore};
use crate::ticket::{Ticket, TicketDraft, TicketPatch};

/// 结构化意图：推理协作方（或 CLI 解析器）产出，一个变体对应一个受支持的操作
#[derive(Debug, Clone)]
pub enum Intent {
    CreateTicket {
        draft: TicketDraft,
        /// 创建成功后是否串接一次推荐
        with_recommendations: bool,
    },
    GetTicket {
        id: String,
    },
    UpdateTicket {
        id: String,
        patch: TicketPatch,
        with_recommendations: bool,
    },
    DeleteTicket {
        id: String,
    },
    ListTickets {
        filter: ListFilter,
    },
    RecommendForText {
        title: String,
        description: String,
    },
    RecommendForTicket {
        id: String,
    },
    TrendingIssues {
        days: i64,
    },
    /// 各类别工单总数与状态分布
    CategoryStats,
    /// recommend_for_text 的宽 K 版本（对齐原型 search_similar_tickets）
    SearchSimilar {
        title: String,
        description: String,
    },
}

impl Intent {
    /// 操作名（日志与审计用）
    pub fn operation(&self) -> &'static str {
        match self {
            Intent::CreateTicket { .. } => "create_ticket",
            Intent::GetTicket { .. } => "get_ticket",
            Intent::UpdateTicket { .. } => "update_ticket",
            Intent::DeleteTicket { .. } => "delete_ticket",
            Intent::ListTickets { .. } => "list_tickets",
            Intent::RecommendForText { .. } => "recommend_for_text",
            Intent::RecommendForTicket { .. } => "recommend_for_ticket",
            Intent::TrendingIssues { .. } => "trending_issues",
            Intent::CategoryStats => "category_stats",
            Intent::SearchSimilar { .. } => "search_similar",
        }
    }

    /// 是否会改写后端状态（失败文案需要强调「未生效」）
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Intent::CreateTicket { .. } | Intent::UpdateTicket { .. } | Intent::DeleteTicket { .. }
        )
    }
}

/// 意图执行的结构化结果。变体标签以 snake_case 出现在对外 JSON 中。
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ticket(Ticket),
    Tickets(Vec<Ticket>),
    Deleted { id: String },
    Recommendations(RecommendationBundle),
    TicketWithRecommendations {
        ticket: Ticket,
        /// 串接的推荐阶段失败时为 None（主操作已成功，不回滚）
        recommendations: Option<RecommendationBundle>,
    },
    Trends(TrendSnapshot),
    CategoryStats(CategoryStatsSnapshot),
    Failed { kind: FailureKind },
}

/// 编排结果：结构化负载 + 给推理协作方转述的一句话
#[derive(Debug, Serialize)]
pub struct OrchestrationResult {
    pub operation: &'static str,
    pub outcome: Outcome,
    pub narration: String,
    /// 主分发阶段的尝试次数
    pub attempts: u32,
}

impl OrchestrationResult {
    pub fn succeeded(&self) -> bool {
        !matches!(self.outcome, Outcome::Failed { .. })
    }
}

/// 编排核心：持有存储句柄、分发器与推荐引擎
pub struct OrchestrationCore {
    store: SharedStore,
    dispatcher: Arc<Dispatcher>,
    engine: RecommendationEngine,
}

impl OrchestrationCore {
    pub fn new(store: SharedStore, dispatcher: Arc<Dispatcher>, engine: RecommendationEngine) -> Self {
        Self {
            store,
            dispatcher,
            engine,
        }
    }

    /// 连通性检查（启动自检与 status 命令共用），经分发层执行，返回尝试次数
    pub async fn ping(&self, cancel: &CancellationToken) -> Result<u32, FailureReport> {
        let store = self.store.clone();
        self.dispatcher
            .execute("ping", cancel, move |_| {
                let store = store.clone();
                async move { store.ping().await }
            })
            .await
            .map(|outcome| outcome.attempts())
    }

    /// 处理一个意图：Received -> Dispatching -> Succeeded / Failed
    pub async fn handle(&self, intent: Intent, cancel: &CancellationToken) -> OrchestrationResult {
        let op = intent.operation();
        tracing::debug!(op, "Intent received, dispatching");

        match intent {
            Intent::CreateTicket {
                draft,
                with_recommendations,
            } => self.create_ticket(draft, with_recommendations, cancel).await,
            Intent::GetTicket { id } => self.get_ticket(id, cancel).await,
            Intent::UpdateTicket {
                id,
                patch,
                with_recommendations,
            } => self.update_ticket(id, patch, with_recommendations, cancel).await,
            Intent::DeleteTicket { id } => self.delete_ticket(id, cancel).await,
            Intent::ListTickets { filter } => self.list_tickets(filter, cancel).await,
            Intent::RecommendForText { title, description } => {
                self.recommend_for_query(
                    "recommend_for_text",
                    RecommendQuery::from_text(title, description),
                    cancel,
                )
                .await
            }
            Intent::RecommendForTicket { id } => self.recommend_for_ticket(id, cancel).await,
            Intent::TrendingIssues { days } => self.trending_issues(days, cancel).await,
            Intent::CategoryStats => self.category_stats(cancel).await,
            Intent::SearchSimilar { title, description } => {
                let mut query = RecommendQuery::from_text(title, description);
                // 宽口径检索：对齐原型 search_similar_tickets(max_similar=10, max_solutions=5)
                query.max_similar = Some(10);
                query.max_solutions = Some(5);
                self.recommend_for_query("search_similar", query, cancel).await
            }
        }
    }

    async fn create_ticket(
        &self,
        draft: TicketDraft,
        with_recommendations: bool,
        cancel: &CancellationToken,
    ) -> OrchestrationResult {
        let store = self.store.clone();
        let result = self
            .dispatcher
            .execute("create_ticket", cancel, move |_| {
                let store = store.clone();
                let draft = draft.clone();
                async move { store.create(draft).await }
            })
            .await;

        match result {
            Ok(outcome) => {
                let attempts = outcome.attempts();
                let ticket = outcome.value;
                tracing::info!(id = %ticket.id, attempts, "Ticket created");
                if with_recommendations {
                    self.attach_recommendations("create_ticket", ticket, attempts, cancel)
                        .await
                } else {
                    OrchestrationResult {
                        operation: "create_ticket",
                        narration: format!(
                            "Created ticket '{}' ({} / {}): {}",
                            ticket.id, ticket.category, ticket.priority, ticket.title
                        ),
                        outcome: Outcome::Ticket(ticket),
                        attempts,
                    }
                }
            }
            Err(report) => self.fail("create_ticket", true, report),
        }
    }

    async fn get_ticket(&self, id: String, cancel: &CancellationToken) -> OrchestrationResult {
        let store = self.store.clone();
        let lookup = id.clone();
        let result = self
            .dispatcher
            .execute("get_ticket", cancel, move |_| {
                let store = store.clone();
                let id = lookup.clone();
                async move { store.get(&id).await }
            })
            .await;

        match result {
            Ok(outcome) => {
                let attempts = outcome.attempts();
                let ticket = outcome.value;
                OrchestrationResult {
                    operation: "get_ticket",
                    narration: format!(
                        "Ticket '{}' is {} ({} / {}): {}",
                        ticket.id, ticket.status, ticket.category, ticket.priority, ticket.title
                    ),
                    attempts,
                    outcome: Outcome::Ticket(ticket),
                }
            }
            Err(report) => self.fail("get_ticket", false, report),
        }
    }

    async fn update_ticket(
        &self,
        id: String,
        patch: TicketPatch,
        with_recommendations: bool,
        cancel: &CancellationToken,
    ) -> OrchestrationResult {
        let store = self.store.clone();
        let target = id.clone();
        let result = self
            .dispatcher
            .execute("update_ticket", cancel, move |_| {
                let store = store.clone();
                let id = target.clone();
                let patch = patch.clone();
                async move { store.update(&id, patch).await }
            })
            .await;

        match result {
            Ok(outcome) => {
                let attempts = outcome.attempts();
                let ticket = outcome.value;
                tracing::info!(id = %ticket.id, attempts, "Ticket updated");
                if with_recommendations {
                    self.attach_recommendations("update_ticket", ticket, attempts, cancel)
                        .await
                } else {
                    OrchestrationResult {
                        operation: "update_ticket",
                        narration: format!(
                            "Updated ticket '{}': now {}{}",
                            ticket.id,
                            ticket.status,
                            ticket
                                .resolution
                                .as_deref()
                                .map(|r| format!(", resolution: {r}"))
                                .unwrap_or_default()
                        ),
                        outcome: Outcome::Ticket(ticket),
                        attempts,
                    }
                }
            }
            Err(report) => self.fail("update_ticket", true, report),
        }
    }

    async fn delete_ticket(&self, id: String, cancel: &CancellationToken) -> OrchestrationResult {
        let store = self.store.clone();
        let target = id.clone();
        let result = self
            .dispatcher
            .execute("delete_ticket", cancel, move |_| {
                let store = store.clone();
                let id = target.clone();
                async move { store.delete(&id).await }
            })
            .await;

        match result {
            Ok(outcome) => OrchestrationResult {
                operation: "delete_ticket",
                narration: format!("Ticket '{id}' has been deleted"),
                attempts: outcome.attempts(),
                outcome: Outcome::Deleted { id },
            },
            Err(report) => self.fail("delete_ticket", true, report),
        }
    }

    async fn list_tickets(&self, filter: ListFilter, cancel: &CancellationToken) -> OrchestrationResult {
        match self.fetch_corpus("list_tickets", filter, cancel).await {
            Ok(outcome) => {
                let attempts = outcome.attempts();
                let tickets = outcome.value;
                OrchestrationResult {
                    operation: "list_tickets",
                    narration: format!("Found {} tickets", tickets.len()),
                    attempts,
                    outcome: Outcome::Tickets(tickets),
                }
            }
            Err(report) => self.fail("list_tickets", false, report),
        }
    }

    async fn recommend_for_ticket(&self, id: String, cancel: &CancellationToken) -> OrchestrationResult {
        let store = self.store.clone();
        let target = id.clone();
        let fetched = self
            .dispatcher
            .execute("recommend_for_ticket", cancel, move |_| {
                let store = store.clone();
                let id = target.clone();
                async move { store.get(&id).await }
            })
            .await;

        match fetched {
            Ok(outcome) => {
                let query = RecommendQuery::from_ticket(&outcome.value);
                self.recommend_for_query("recommend_for_ticket", query, cancel)
                    .await
            }
            Err(report) => self.fail("recommend_for_ticket", false, report),
        }
    }

    /// 推荐类操作的公共路径：取语料 -> 纯函数推荐
    async fn recommend_for_query(
        &self,
        op: &'static str,
        query: RecommendQuery,
        cancel: &CancellationToken,
    ) -> OrchestrationResult {
        match self.fetch_corpus(op, ListFilter::default(), cancel).await {
            Ok(outcome) => {
                let bundle = self.engine.recommend(&outcome.value, &query);
                let narration = if bundle.is_empty() {
                    "No similar tickets found".to_string()
                } else {
                    format!(
                        "Found {} similar tickets and {} suggested solutions",
                        bundle.similar_tickets.len(),
                        bundle.recommended_solutions.len()
                    )
                };
                OrchestrationResult {
                    operation: op,
                    narration,
                    attempts: outcome.attempts(),
                    outcome: Outcome::Recommendations(bundle),
                }
            }
            Err(report) => self.fail(op, false, report),
        }
    }

    async fn trending_issues(&self, days: i64, cancel: &CancellationToken) -> OrchestrationResult {
        let days = days.max(1);
        match self
            .fetch_corpus("trending_issues", ListFilter::default(), cancel)
            .await
        {
            Ok(outcome) => {
                let snapshot =
                    self.engine
                        .trends(&outcome.value, Utc::now(), ChronoDuration::days(days));
                let rising = snapshot
                    .keywords
                    .iter()
                    .filter(|e| e.direction == TrendDirection::Rising)
                    .count();
                OrchestrationResult {
                    operation: "trending_issues",
                    narration: format!(
                        "Last {days} days: {} tickets ({} in prior window), {rising} rising topics",
                        snapshot.window_total, snapshot.prior_total
                    ),
                    attempts: outcome.attempts(),
                    outcome: Outcome::Trends(snapshot),
                }
            }
            Err(report) => self.fail("trending_issues", false, report),
        }
    }

    async fn category_stats(&self, cancel: &CancellationToken) -> OrchestrationResult {
        match self
            .fetch_corpus("category_stats", ListFilter::default(), cancel)
            .await
        {
            Ok(outcome) => {
                let snapshot = self.engine.category_stats(&outcome.value);
                OrchestrationResult {
                    operation: "category_stats",
                    narration: format!(
                        "{} tickets across {} categories",
                        snapshot.total_tickets,
                        snapshot.categories.len()
                    ),
                    attempts: outcome.attempts(),
                    outcome: Outcome::CategoryStats(snapshot),
                }
            }
            Err(report) => self.fail("category_stats", false, report),
        }
    }

    /// 变更成功后的第二阶段：串接推荐。推荐失败不影响已生效的变更。
    async fn attach_recommendations(
        &self,
        op: &'static str,
        ticket: Ticket,
        attempts: u32,
        cancel: &CancellationToken,
    ) -> OrchestrationResult {
        let query = RecommendQuery::from_ticket(&ticket);
        match self.fetch_corpus(op, ListFilter::default(), cancel).await {
            Ok(outcome) => {
                let bundle = self.engine.recommend(&outcome.value, &query);
                OrchestrationResult {
                    operation: op,
                    narration: format!(
                        "Saved ticket '{}'; found {} similar tickets and {} suggested solutions",
                        ticket.id,
                        bundle.similar_tickets.len(),
                        bundle.recommended_solutions.len()
                    ),
                    outcome: Outcome::TicketWithRecommendations {
                        ticket,
                        recommendations: Some(bundle),
                    },
                    attempts,
                }
            }
            Err(report) => {
                tracing::warn!(op, kind = ?report.kind, "Recommendation phase failed after successful mutation");
                OrchestrationResult {
                    operation: op,
                    narration: format!(
                        "Saved ticket '{}', but recommendations are temporarily unavailable",
                        ticket.id
                    ),
                    outcome: Outcome::TicketWithRecommendations {
                        ticket,
                        recommendations: None,
                    },
                    attempts,
                }
            }
        }
    }

    async fn fetch_corpus(
        &self,
        op: &'static str,
        filter: ListFilter,
        cancel: &CancellationToken,
    ) -> Result<DispatchOutcome<Vec<Ticket>>, FailureReport> {
        let store = self.store.clone();
        self.dispatcher
            .execute(op, cancel, move |_| {
                let store = store.clone();
                async move { store.list(filter).await }
            })
            .await
    }

    /// 失败报告 -> 用户可读指引。这是全系统唯一产生用户可见失败文案的地方。
    fn fail(&self, op: &'static str, mutating: bool, report: FailureReport) -> OrchestrationResult {
        let no_change = if mutating {
            " No change has been applied."
        } else {
            ""
        };
        let narration = match report.kind {
            FailureKind::Validation => format!("Request rejected: {}", report.reason),
            FailureKind::NotFound => report.reason.clone(),
            FailureKind::ExhaustedRetries => format!(
                "The ticket service is temporarily unavailable (gave up after {} attempts).{no_change} Please try again shortly.",
                report.attempts
            ),
            FailureKind::Terminal => {
                format!("An unexpected backend error occurred.{no_change} The issue has been logged.")
            }
            FailureKind::Cancelled => format!("The operation was cancelled.{no_change}"),
        };
        tracing::warn!(op, kind = ?report.kind, attempts = report.attempts, "Intent failed");
        OrchestrationResult {
            operation: op,
            narration,
            attempts: report.attempts,
            outcome: Outcome::Failed { kind: report.kind },
        }
    }
}
