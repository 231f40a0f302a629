use crate::core::{Config, Result};
use crate::db::DbService;
use sqlx::SqlitePool;

/// 服务器状态 - 持有所有服务的共享引用
///
/// Clone 成本很低 (Config 很小，连接池内部是 Arc)，作为 axum `State` 传给每个 handler。
#[derive(Clone)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// SQLite 数据库
    pub db: DbService,
}

impl ServerState {
    pub fn new(config: Config, db: DbService) -> Self {
        Self { config, db }
    }

    /// 初始化服务器状态
    ///
    /// 1. 确保工作目录存在
    /// 2. 打开数据库并执行迁移
    pub async fn initialize(config: &Config) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(&config.database_path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| anyhow::anyhow!(e))?;
        }

        let db = DbService::new(&config.database_path).await?;
        Ok(Self::new(config.clone(), db))
    }

    /// 获取数据库连接池
    pub fn pool(&self) -> &SqlitePool {
        &self.db.pool
    }
}
