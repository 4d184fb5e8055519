use thiserror::Error;
use tline_engine::errors::CommandError;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("命令执行失败: {0}")]
    Command(#[from] CommandError),
}
