//! Deskbee - 弹性 IT 工单助理
//!
//! 模块划分：
//! - **ticket**: 工单数据模型（状态 / 类别 / 优先级、草稿与补丁）
//! - **store**: 存储读写契约、内存实现与故障注入包装层
//! - **dispatch**: 弹性分发（错误分类、指数退避重试、尝试追踪）
//! - **recommend**: 确定性内容相似推荐（排名、方案聚合、趋势检测）
//! - **orchestrate**: 编排核心（封闭意图集路由、失败文案翻译）
//! - **cli**: 操作员 REPL
//! - **config**: 应用配置加载（TOML + 环境变量）

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod orchestrate;
pub mod recommend;
pub mod store;
pub mod ticket;
