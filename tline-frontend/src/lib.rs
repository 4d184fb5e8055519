pub mod cli;
pub mod errors;
pub mod loader;

use std::path::Path;

use errors::FrontendError;
use tline_config::AppConfig;
use tracing::info;

/// 加载文档并运行 CLI 演示。
pub fn run_cli(config: &AppConfig, document: Option<&Path>) -> Result<(), FrontendError> {
    info!("启动 CLI 演示前端");
    let mut loaded = loader::load_document(document, config);
    cli::run_demo(&mut loaded)
}
