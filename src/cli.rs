//! 操作员 REPL
//!
//! 薄壳：把一行命令解析成结构化 Intent 丢给编排核心，打印 narration 与结构化负载。
//! 正经的自然语言理解属于外部推理协作方，这里只做确定性的命令解析，
//! 外加 help / status / test（演示场景）三个内建命令。

use std::io::Write as _;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::orchestrate::{Intent, OrchestrationCore, OrchestrationResult, Outcome};
use crate::store::ListFilter;
use crate::ticket::{TicketDraft, TicketPatch, TicketStatus};

/// 一行输入解析出的命令
#[derive(Debug)]
pub enum CliCommand {
    Help,
    Quit,
    Status,
    Test,
    Intent(Intent),
}

/// 解析一行命令；空行返回 Ok(None)，语法错误返回 Err(提示文案)
pub fn parse_command(line: &str) -> Result<Option<CliCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((h, r)) => (h, r.trim()),
        None => (line, ""),
    };

    let command = match head.to_ascii_lowercase().as_str() {
        "help" => CliCommand::Help,
        "quit" | "exit" => CliCommand::Quit,
        "status" => CliCommand::Status,
        "test" => CliCommand::Test,
        "create" => {
            let (draft, with_recommendations) = parse_create(rest)?;
            CliCommand::Intent(Intent::CreateTicket {
                draft,
                with_recommendations,
            })
        }
        "get" => CliCommand::Intent(Intent::GetTicket {
            id: require_id(rest)?,
        }),
        "delete" => CliCommand::Intent(Intent::DeleteTicket {
            id: require_id(rest)?,
        }),
        "list" => {
            let status = if rest.is_empty() {
                None
            } else {
                Some(rest.parse::<TicketStatus>()?)
            };
            CliCommand::Intent(Intent::ListTickets {
                filter: ListFilter {
                    status,
                    ..Default::default()
                },
            })
        }
        "resolve" => {
            let (id, resolution) = rest
                .split_once('|')
                .map(|(a, b)| (a.trim(), b.trim()))
                .ok_or_else(|| "Usage: resolve <id> | <resolution>".to_string())?;
            if id.is_empty() || resolution.is_empty() {
                return Err("Usage: resolve <id> | <resolution>".to_string());
            }
            CliCommand::Intent(Intent::UpdateTicket {
                id: id.to_string(),
                patch: TicketPatch::resolve(resolution),
                with_recommendations: false,
            })
        }
        "close" => {
            let mut parts = rest.split_whitespace();
            let id = parts.next().ok_or_else(|| "Usage: close <id> [force]".to_string())?;
            let force_close = matches!(parts.next(), Some("force"));
            CliCommand::Intent(Intent::UpdateTicket {
                id: id.to_string(),
                patch: TicketPatch {
                    status: Some(TicketStatus::Closed),
                    force_close,
                    ..Default::default()
                },
                with_recommendations: false,
            })
        }
        "recommend" => {
            if rest.is_empty() {
                return Err("Usage: recommend <title> [| <description>]".to_string());
            }
            // 没给描述时用标题兜底
            let (title, description) = rest
                .split_once('|')
                .map(|(a, b)| (a.trim().to_string(), b.trim().to_string()))
                .unwrap_or_else(|| (rest.to_string(), rest.to_string()));
            CliCommand::Intent(Intent::RecommendForText { title, description })
        }
        "similar" => {
            if rest.is_empty() {
                return Err("Usage: similar <text>".to_string());
            }
            CliCommand::Intent(Intent::SearchSimilar {
                title: rest.to_string(),
                description: rest.to_string(),
            })
        }
        "stats" => CliCommand::Intent(Intent::CategoryStats),
        "trending" => {
            let days = if rest.is_empty() {
                7
            } else {
                rest.parse::<i64>()
                    .map_err(|_| format!("Invalid day count '{rest}'"))?
            };
            CliCommand::Intent(Intent::TrendingIssues { days })
        }
        other => return Err(format!("Unknown command '{other}'. Type 'help' for usage.")),
    };
    Ok(Some(command))
}

fn require_id(rest: &str) -> Result<String, String> {
    let id = rest.split_whitespace().next().unwrap_or("");
    if id.is_empty() {
        Err("A ticket id is required, e.g. 'get ticket-001'".to_string())
    } else {
        Ok(id.to_string())
    }
}

/// create <title> | <description> [| rec]
fn parse_create(rest: &str) -> Result<(TicketDraft, bool), String> {
    let parts: Vec<&str> = rest.split('|').map(str::trim).collect();
    match parts.as_slice() {
        [title, description] if !title.is_empty() && !description.is_empty() => {
            Ok((TicketDraft::new(*title, *description), false))
        }
        [title, description, "rec"] if !title.is_empty() && !description.is_empty() => {
            Ok((TicketDraft::new(*title, *description), true))
        }
        _ => Err("Usage: create <title> | <description> [| rec]".to_string()),
    }
}

const HELP_TEXT: &str = "\
Commands:
  help                                 Show this help
  status                               Check backend connectivity
  test                                 Run the demonstration scenarios
  quit / exit                          Leave the REPL

Intents:
  create <title> | <description> [| rec]   Create a ticket (rec = attach recommendations)
  get <id>                                 Show one ticket
  list [open|resolved|closed]              List tickets
  resolve <id> | <resolution>              Mark a ticket RESOLVED
  close <id> [force]                       Close a ticket
  delete <id>                              Delete a ticket
  recommend <title> [| <description>]      Recommendations for a described issue
  similar <text>                           Wide search for similar tickets
  stats                                    Ticket counts per category
  trending [days]                          Trending issues (default 7 days)";

/// REPL 主循环：读 stdin，解析，交给编排核心，打印结果
pub async fn run_repl(core: Arc<OrchestrationCore>, cancel: CancellationToken) -> anyhow::Result<()> {
    println!("deskbee ticket assistant - type 'help' for commands, 'quit' to exit");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let line = tokio::select! {
            _ = cancel.cancelled() => {
                println!();
                tracing::info!("Shutdown requested, leaving REPL");
                return Ok(());
            }
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            // stdin 关闭（EOF）
            return Ok(());
        };

        match parse_command(&line) {
            Ok(None) => {}
            Ok(Some(CliCommand::Help)) => println!("{HELP_TEXT}"),
            Ok(Some(CliCommand::Quit)) => return Ok(()),
            Ok(Some(CliCommand::Status)) => match core.ping(&cancel).await {
                Ok(attempts) => println!("Backend reachable ({attempts} attempt(s))"),
                Err(report) => println!("Backend unreachable: {}", report.reason),
            },
            Ok(Some(CliCommand::Test)) => {
                run_test_scenarios(&core, &cancel).await;
            }
            Ok(Some(CliCommand::Intent(intent))) => {
                let result = core.handle(intent, &cancel).await;
                print_result(&result.narration, &result.outcome);
            }
            Err(message) => println!("{message}"),
        }
    }
}

fn print_result(narration: &str, outcome: &Outcome) {
    println!("{narration}");
    match outcome {
        Outcome::Failed { .. } => {}
        other => {
            if let Ok(json) = serde_json::to_string_pretty(other) {
                println!("{json}");
            }
        }
    }
}

/// 演示场景：覆盖成功路径、校验拒绝、NotFound 与推荐串接，narration 逐条打印。
/// 校验场景的目标工单由场景 1 自己创建，不依赖示例数据开关。
async fn run_test_scenarios(
    core: &OrchestrationCore,
    cancel: &CancellationToken,
) -> Vec<OrchestrationResult> {
    let mut results: Vec<OrchestrationResult> = Vec::new();
    let report = |label: &str, result: OrchestrationResult, results: &mut Vec<OrchestrationResult>| {
        println!("--- scenario {}: {label}", results.len() + 1);
        println!(
            "[{}] {} (attempts: {})",
            if result.succeeded() { "ok" } else { "failed" },
            result.narration,
            result.attempts
        );
        results.push(result);
    };

    let created = core
        .handle(
            Intent::CreateTicket {
                draft: TicketDraft::new(
                    "Keyboard not responding",
                    "The keyboard has stuck keys and stopped responding",
                ),
                with_recommendations: true,
            },
            cancel,
        )
        .await;
    let target_id = match &created.outcome {
        Outcome::Ticket(ticket) => Some(ticket.id.clone()),
        Outcome::TicketWithRecommendations { ticket, .. } => Some(ticket.id.clone()),
        _ => None,
    };
    report(
        "create a keyboard ticket with recommendations",
        created,
        &mut results,
    );

    let listed = core
        .handle(
            Intent::ListTickets {
                filter: ListFilter {
                    status: Some(TicketStatus::Open),
                    ..Default::default()
                },
            },
            cancel,
        )
        .await;
    report("list open tickets", listed, &mut results);

    let unknown = core
        .handle(
            Intent::GetTicket {
                id: "ticket-does-not-exist".to_string(),
            },
            cancel,
        )
        .await;
    report("fetch an unknown ticket (expect NotFound)", unknown, &mut results);

    match target_id {
        Some(id) => {
            let rejected = core
                .handle(
                    Intent::UpdateTicket {
                        id,
                        patch: TicketPatch {
                            status: Some(TicketStatus::Resolved),
                            resolution: Some(String::new()),
                            ..Default::default()
                        },
                        with_recommendations: false,
                    },
                    cancel,
                )
                .await;
            report(
                "resolve with an empty note (expect rejection)",
                rejected,
                &mut results,
            );
        }
        None => println!("--- scenario skipped: no ticket to resolve (creation failed above)"),
    }

    let trends = core.handle(Intent::TrendingIssues { days: 7 }, cancel).await;
    report("trending issues over a week", trends, &mut results);

    let stats = core.handle(Intent::CategoryStats, cancel).await;
    report("category statistics", stats, &mut results);

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_and_builtin() {
        assert!(parse_command("   ").unwrap().is_none());
        assert!(matches!(
            parse_command("help").unwrap(),
            Some(CliCommand::Help)
        ));
        assert!(matches!(
            parse_command("QUIT").unwrap(),
            Some(CliCommand::Quit)
        ));
        assert!(matches!(
            parse_command("test").unwrap(),
            Some(CliCommand::Test)
        ));
    }

    #[test]
    fn test_parse_create() {
        let cmd = parse_command("create Broken mouse | Left click dead").unwrap();
        match cmd {
            Some(CliCommand::Intent(Intent::CreateTicket {
                draft,
                with_recommendations,
            })) => {
                assert_eq!(draft.title, "Broken mouse");
                assert_eq!(draft.description, "Left click dead");
                assert!(!with_recommendations);
            }
            other => panic!("unexpected parse: {other:?}"),
        }

        let cmd = parse_command("create Broken mouse | Left click dead | rec").unwrap();
        assert!(matches!(
            cmd,
            Some(CliCommand::Intent(Intent::CreateTicket {
                with_recommendations: true,
                ..
            }))
        ));

        assert!(parse_command("create only a title").is_err());
    }

    #[test]
    fn test_parse_get_requires_id() {
        assert!(parse_command("get").is_err());
        let cmd = parse_command("get ticket-001").unwrap();
        assert!(matches!(
            cmd,
            Some(CliCommand::Intent(Intent::GetTicket { ref id })) if id == "ticket-001"
        ));
    }

    #[test]
    fn test_parse_list_with_status() {
        let cmd = parse_command("list open").unwrap();
        match cmd {
            Some(CliCommand::Intent(Intent::ListTickets { filter })) => {
                assert_eq!(filter.status, Some(TicketStatus::Open));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
        assert!(parse_command("list bogus").is_err());
    }

    #[test]
    fn test_parse_resolve() {
        let cmd = parse_command("resolve ticket-001 | Replaced cable").unwrap();
        match cmd {
            Some(CliCommand::Intent(Intent::UpdateTicket { id, patch, .. })) => {
                assert_eq!(id, "ticket-001");
                assert_eq!(patch.status, Some(TicketStatus::Resolved));
                assert_eq!(patch.resolution.as_deref(), Some("Replaced cable"));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
        assert!(parse_command("resolve ticket-001").is_err());
    }

    #[test]
    fn test_parse_close_force() {
        let cmd = parse_command("close ticket-001 force").unwrap();
        match cmd {
            Some(CliCommand::Intent(Intent::UpdateTicket { patch, .. })) => {
                assert_eq!(patch.status, Some(TicketStatus::Closed));
                assert!(patch.force_close);
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_parse_trending_days() {
        let cmd = parse_command("trending 14").unwrap();
        assert!(matches!(
            cmd,
            Some(CliCommand::Intent(Intent::TrendingIssues { days: 14 }))
        ));
        let cmd = parse_command("trending").unwrap();
        assert!(matches!(
            cmd,
            Some(CliCommand::Intent(Intent::TrendingIssues { days: 7 }))
        ));
        assert!(parse_command("trending soon").is_err());
    }

    #[test]
    fn test_parse_stats() {
        assert!(matches!(
            parse_command("stats").unwrap(),
            Some(CliCommand::Intent(Intent::CategoryStats))
        ));
    }

    #[test]
    fn test_unknown_command_is_error() {
        assert!(parse_command("frobnicate").is_err());
    }

    mod scenarios {
        use super::*;
        use crate::dispatch::{Dispatcher, FailureKind, RetryPolicy};
        use crate::recommend::{RecommendConfig, RecommendationEngine};
        use crate::store::InMemoryStore;
        use std::time::Duration;

        fn unseeded_core() -> OrchestrationCore {
            let policy = RetryPolicy::new(
                3,
                Duration::from_millis(10),
                2.0,
                Duration::ZERO,
                Duration::from_secs(5),
            )
            .unwrap();
            OrchestrationCore::new(
                std::sync::Arc::new(InMemoryStore::new()),
                std::sync::Arc::new(Dispatcher::with_seed(policy, 1)),
                RecommendationEngine::new(RecommendConfig::default()),
            )
        }

        #[tokio::test]
        async fn test_scenarios_run_without_sample_data() {
            let core = unseeded_core();
            let cancel = CancellationToken::new();
            let results = run_test_scenarios(&core, &cancel).await;
            assert_eq!(results.len(), 6);

            // 场景 1 创建成功，场景 4 的校验拒绝针对该工单，而不是依赖示例数据的 id
            assert!(results[0].succeeded());
            assert!(matches!(
                results[3].outcome,
                Outcome::Failed {
                    kind: FailureKind::Validation
                }
            ));
            assert!(results[3].narration.contains("resolution"));

            // NotFound 场景点名未知 id
            assert!(matches!(
                results[2].outcome,
                Outcome::Failed {
                    kind: FailureKind::NotFound
                }
            ));

            // 统计场景看得到场景 1 创建的工单
            match &results[5].outcome {
                Outcome::CategoryStats(snapshot) => assert_eq!(snapshot.total_tickets, 1),
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
    }
}
