//! 趋势检测
//!
//! 按创建时间把工单分入「当前窗口」与「前一窗口」（等长），统计关键词与类别频次，
//! 与前一窗口对比给出 rising / falling / flat 方向。按需派生，从不缓存。

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::recommend::similarity::tokenize;
use crate::ticket::Ticket;
use std::collections::HashMap;

/// 趋势方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Rising,
    Falling,
    Flat,
}

/// 一个关键词 / 类别的窗口对比
#[derive(Debug, Clone, Serialize)]
pub struct TrendEntry {
    pub keyword: String,
    pub count: usize,
    pub prior_count: usize,
    pub direction: TrendDirection,
}

/// 窗口化聚合结果
#[derive(Debug, Clone, Serialize)]
pub struct TrendSnapshot {
    /// 窗口长度（天）
    pub window_days: i64,
    /// 当前窗口内工单总数
    pub window_total: usize,
    /// 前一窗口内工单总数
    pub prior_total: usize,
    pub keywords: Vec<TrendEntry>,
    pub categories: Vec<TrendEntry>,
}

/// 方向判定：count > prior*(1+threshold) => rising；count*(1+threshold) < prior => falling；其余 flat。
/// 两边相等（threshold > 0）必然 flat。
pub fn direction(count: usize, prior: usize, threshold: f64) -> TrendDirection {
    let count = count as f64;
    let prior = prior as f64;
    if count > prior * (1.0 + threshold) {
        TrendDirection::Rising
    } else if count * (1.0 + threshold) < prior {
        TrendDirection::Falling
    } else {
        TrendDirection::Flat
    }
}

/// 对语料做窗口化趋势检测。窗口为 [now-window, now)，前一窗口为 [now-2*window, now-window)。
pub fn detect(
    corpus: &[Ticket],
    now: DateTime<Utc>,
    window: Duration,
    threshold: f64,
    top_n: usize,
) -> TrendSnapshot {
    let window_start = now - window;
    let prior_start = window_start - window;

    let mut keyword_counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut category_counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut window_total = 0usize;
    let mut prior_total = 0usize;

    for ticket in corpus {
        let in_window = ticket.created >= window_start && ticket.created < now;
        let in_prior = ticket.created >= prior_start && ticket.created < window_start;
        if !in_window && !in_prior {
            continue;
        }
        if in_window {
            window_total += 1;
        } else {
            prior_total += 1;
        }

        let mut keywords = tokenize(&ticket.title);
        for tag in &ticket.tags {
            keywords.extend(tokenize(tag));
        }
        for keyword in keywords {
            let entry = keyword_counts.entry(keyword).or_insert((0, 0));
            if in_window {
                entry.0 += 1;
            } else {
                entry.1 += 1;
            }
        }

        let entry = category_counts
            .entry(ticket.category.to_string())
            .or_insert((0, 0));
        if in_window {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }

    TrendSnapshot {
        window_days: window.num_days(),
        window_total,
        prior_total,
        keywords: top_entries(keyword_counts, threshold, top_n),
        categories: top_entries(category_counts, threshold, top_n),
    }
}

/// 取当前窗口计数最高的 top_n 条（次序：当前计数降序, 名称升序），只保留当前窗口出现过的
fn top_entries(
    counts: HashMap<String, (usize, usize)>,
    threshold: f64,
    top_n: usize,
) -> Vec<TrendEntry> {
    let mut entries: Vec<TrendEntry> = counts
        .into_iter()
        .filter(|(_, (count, _))| *count > 0)
        .map(|(keyword, (count, prior_count))| TrendEntry {
            direction: direction(count, prior_count, threshold),
            keyword,
            count,
            prior_count,
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.keyword.cmp(&b.keyword)));
    entries.truncate(top_n);
    entries
}
