//! 相似度打分
//!
//! 确定性的内容匹配：对 title / tags / description 分词后做字段加权 Jaccard，
//! 得分有界 [0,1]，完全相同的内容得 1.0。没有任何隐藏状态或随机性，
//! 同一（语料快照, 查询）永远得到同一结果。

use std::collections::{BTreeSet, HashMap};

use crate::ticket::Ticket;

/// 标题命中的权重
const WEIGHT_TITLE: f64 = 3.0;
/// 标签命中的权重
const WEIGHT_TAG: f64 = 2.0;
/// 描述命中的权重
const WEIGHT_DESCRIPTION: f64 = 1.0;

/// 不参与匹配的高频词
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "in",
    "is", "it", "its", "my", "no", "not", "of", "on", "or", "our", "that", "the", "their", "this",
    "to", "was", "when", "will", "with",
];

/// 小写、按非字母数字切分、过滤停用词与单字符
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2 && !STOPWORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

/// 查询文档：来自新工单草稿、既有工单或自由文本
#[derive(Debug, Clone, Default)]
pub struct QueryDoc {
    pub title: String,
    pub description: String,
    pub tags: BTreeSet<String>,
}

impl QueryDoc {
    pub fn from_text(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            tags: BTreeSet::new(),
        }
    }

    pub fn from_ticket(ticket: &Ticket) -> Self {
        Self {
            title: ticket.title.clone(),
            description: ticket.description.clone(),
            tags: ticket.tags.clone(),
        }
    }

    /// token -> 权重；同一 token 出现在多个字段时取最高权重
    pub fn weights(&self) -> HashMap<String, f64> {
        let mut weights: HashMap<String, f64> = HashMap::new();
        for token in tokenize(&self.description) {
            weights.insert(token, WEIGHT_DESCRIPTION);
        }
        for tag in &self.tags {
            for token in tokenize(tag) {
                let w = weights.entry(token).or_insert(0.0);
                *w = w.max(WEIGHT_TAG);
            }
        }
        for token in tokenize(&self.title) {
            let w = weights.entry(token).or_insert(0.0);
            *w = w.max(WEIGHT_TITLE);
        }
        weights
    }
}

/// 加权 Jaccard：sum(min) / sum(max)。两边为空时得 0。
pub fn score(query: &HashMap<String, f64>, candidate: &HashMap<String, f64>) -> f64 {
    if query.is_empty() && candidate.is_empty() {
        return 0.0;
    }
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (token, &qw) in query {
        match candidate.get(token) {
            Some(&cw) => {
                numerator += qw.min(cw);
                denominator += qw.max(cw);
            }
            None => denominator += qw,
        }
    }
    for (token, &cw) in candidate {
        if !query.contains_key(token) {
            denominator += cw;
        }
    }
    if denominator == 0.0 {
        0.0
    } else {
        (numerator / denominator).clamp(0.0, 1.0)
    }
}

/// 打分后的候选工单
#[derive(Debug, Clone)]
pub struct ScoredTicket {
    pub ticket: Ticket,
    pub score: f64,
}

/// 给语料里的每个候选打分，过滤阈值以下者，按（得分降序, 更新时间降序, id 升序）排序并截断 top_k。
/// exclude_id 用于把查询自身从结果中剔除。
pub fn rank(
    corpus: &[Ticket],
    query: &QueryDoc,
    threshold: f64,
    top_k: usize,
    exclude_id: Option<&str>,
) -> Vec<ScoredTicket> {
    let query_weights = query.weights();
    let mut scored: Vec<ScoredTicket> = corpus
        .iter()
        .filter(|t| exclude_id.map_or(true, |id| t.id != id))
        .map(|t| ScoredTicket {
            score: score(&query_weights, &QueryDoc::from_ticket(t).weights()),
            ticket: t.clone(),
        })
        .filter(|s| s.score >= threshold)
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.ticket.updated.cmp(&a.ticket.updated))
            .then_with(|| a.ticket.id.cmp(&b.ticket.id))
    });
    scored.truncate(top_k);
    scored
}
