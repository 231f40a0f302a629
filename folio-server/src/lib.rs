//! Folio Server - 页面编辑器后端
//!
//! # 架构概述
//!
//! - **数据库** (`db`): SQLite (sqlx) 存储的有序集合 (`page`, `block`)
//! - **排序引擎** (`db::reorder`): 作用域内的事务性重排, 保持 `sort_order` 连续
//! - **HTTP API** (`api`): 精简的 JSON 接口, 供编辑器客户端同步使用
//!
//! # 模块结构
//!
//! ```text
//! folio-server/src/
//! ├── core/          # 配置、状态、错误、服务器
//! ├── api/           # HTTP 路由和处理器
//! ├── db/            # 连接池、仓储、排序引擎
//! └── utils/         # 日志等工具
//! ```

pub mod api;
pub mod core;
pub mod db;
pub mod utils;

// Re-export 公共类型
pub use core::{Config, Server, ServerError, ServerState};
pub use db::{DbService, ReorderOutcome, reorder};
pub use utils::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::init_logger_with_file;

/// 设置运行环境: 加载 `.env`, 创建工作目录, 初始化日志
pub fn setup_environment() -> anyhow::Result<Config> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    std::fs::create_dir_all(&config.work_dir)?;
    if let Some(dir) = &config.log_dir {
        std::fs::create_dir_all(dir)?;
    }

    init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());
    Ok(config)
}

pub fn print_banner() {
    println!(
        r#"
    ______      ___
   / ____/___  / (_)___
  / /_  / __ \/ / / __ \
 / __/ / /_/ / / / /_/ /
/_/    \____/_/_/\____/
    "#
    );
}
