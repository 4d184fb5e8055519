use std::path::{Path, PathBuf};

use tline_config::AppConfig;
use tline_core::units::UnitSystem;
use tline_engine::document::Document;
use tracing::{info, warn};

/// 文档来源，便于前端呈现加载信息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    File(PathBuf),
    Default,
}

/// 统一封装加载后的文档与元信息。
#[derive(Debug)]
pub struct LoadedDocument {
    pub document: Document,
    pub source: DocumentSource,
    pub units: UnitSystem,
    /// 加载时跳过或未能完整解析的条目。
    pub problems: Vec<String>,
}

/// 打开显式指定的文档，否则打开配置中的默认文档；
/// 都没有或打开失败时回退到新建的默认文档。
pub fn load_document(path: Option<&Path>, config: &AppConfig) -> LoadedDocument {
    let units = config.units.system;
    let path = path.or(config.document.default_path.as_deref());

    if let Some(path) = path {
        match Document::open(path, units) {
            Ok((document, problems)) => {
                info!(path = %path.display(), problems = problems.len(), "从文件加载文档成功");
                for problem in &problems {
                    warn!(path = %path.display(), problem = problem.as_str(), "文档内容不完整");
                }
                return LoadedDocument {
                    document,
                    source: DocumentSource::File(path.to_path_buf()),
                    units,
                    problems,
                };
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "加载文档失败，回退到默认文档");
            }
        }
    }

    LoadedDocument {
        document: Document::new(),
        source: DocumentSource::Default,
        units,
        problems: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_default_document() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let missing = dir.path().join("missing.lad");
        let loaded = load_document(Some(&missing), &AppConfig::default());
        assert_eq!(loaded.source, DocumentSource::Default);
        assert_eq!(loaded.document.lines().len(), 1);
        assert!(!loaded.document.is_modified());
    }

    #[test]
    fn config_path_is_used_when_no_override() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let path = dir.path().join("empty.lad");
        let mut document = Document::new();
        document.save(&path, UnitSystem::Metric).expect("保存文档失败");

        let mut config = AppConfig::default();
        config.units.system = UnitSystem::Metric;
        config.document.default_path = Some(path.clone());

        let loaded = load_document(None, &config);
        assert_eq!(loaded.source, DocumentSource::File(path));
        assert_eq!(loaded.units, UnitSystem::Metric);
        assert!(loaded.problems.is_empty());
    }
}
