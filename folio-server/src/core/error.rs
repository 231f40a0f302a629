use shared::error::AppError;
use thiserror::Error;

/// 服务器启动/运行错误
///
/// 请求级错误走 [`AppError`] (实现了 `IntoResponse`)，这里只覆盖进程级故障。
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("数据库初始化失败: {0}")]
    Database(#[from] AppError),

    #[error("端口绑定失败: {0}")]
    Bind(#[source] std::io::Error),

    #[error("HTTP 服务异常退出: {0}")]
    Serve(#[source] std::io::Error),

    #[error("内部服务器错误")]
    Internal(#[from] anyhow::Error),
}

/// 服务器 Result 类型别名
pub type Result<T> = std::result::Result<T, ServerError>;
