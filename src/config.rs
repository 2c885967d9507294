//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `DESKBEE__*` 覆盖（双下划线表示嵌套，
//! 如 `DESKBEE__DISPATCH__MAX_ATTEMPTS=5`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::dispatch::DispatchConfig;
use crate::recommend::RecommendConfig;
use crate::store::SimulationConfig;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    /// [store] 段：网络模拟（延迟区间 / 注入失败率 / 种子）
    #[serde(default)]
    pub store: SimulationConfig,
    /// [dispatch] 段：重试策略
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// [recommend] 段：相似度阈值与各项上限
    #[serde(default)]
    pub recommend: RecommendConfig,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 启动时是否灌入示例工单
    #[serde(default = "default_seed_sample_data")]
    pub seed_sample_data: bool,
}

fn default_seed_sample_data() -> bool {
    true
}

/// 加载配置：default.toml（若存在）+ 可选显式路径 + 环境变量覆盖
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("DESKBEE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
