//! 文件路径工具：文档中的文件叶子以相对文档目录、`/` 分隔的形式保存。

use std::path::{Component, Path, PathBuf};

/// 按词法折叠 `.` 与 `..`，不访问文件系统。
#[inline]
pub fn normalize(path: &Path) -> PathBuf {
    path_clean::clean(path)
}

/// 文档所在目录的绝对路径。
pub fn document_dir(document_path: &Path) -> PathBuf {
    let absolute = std::path::absolute(document_path).unwrap_or_else(|_| document_path.to_path_buf());
    normalize(&absolute)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// 将路径转换为相对 `base` 的存储形式。前缀不同（例如不同盘符）时保留绝对路径。
pub fn to_relative(path: &Path, base: &Path) -> String {
    let path = normalize(path);
    if !path.is_absolute() {
        return join_slash(path.components());
    }
    let base = normalize(base);

    let path_parts: Vec<Component<'_>> = path.components().collect();
    let base_parts: Vec<Component<'_>> = base.components().collect();
    if path_parts.first() != base_parts.first() {
        return join_slash(path.components());
    }

    let common = path_parts
        .iter()
        .zip(&base_parts)
        .take_while(|(left, right)| left == right)
        .count();

    let mut parts: Vec<String> = Vec::new();
    parts.extend(std::iter::repeat_n("..".to_string(), base_parts.len() - common));
    parts.extend(
        path_parts[common..]
            .iter()
            .map(|part| part.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}

/// 将存储形式的路径还原为绝对路径。
pub fn resolve(stored: &str, base: &Path) -> PathBuf {
    let relative: PathBuf = stored.split('/').collect();
    let candidate = Path::new(stored);
    if candidate.is_absolute() || relative.is_absolute() {
        normalize(candidate)
    } else {
        normalize(&base.join(relative))
    }
}

#[inline]
pub fn exists(path: &Path) -> bool {
    path.is_file()
}

fn join_slash<'a>(components: impl Iterator<Item = Component<'a>>) -> String {
    let mut text = String::new();
    for component in components {
        match component {
            Component::RootDir => text.push('/'),
            Component::Prefix(prefix) => text.push_str(&prefix.as_os_str().to_string_lossy()),
            other => {
                if !text.is_empty() && !text.ends_with('/') {
                    text.push('/');
                }
                text.push_str(&other.as_os_str().to_string_lossy());
            }
        }
    }
    text
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_dot_components() {
        assert_eq!(
            normalize(Path::new("/data/./cables/../structures/a.structure")),
            PathBuf::from("/data/structures/a.structure")
        );
        assert_eq!(normalize(Path::new("../a/../b")), PathBuf::from("../b"));
        assert_eq!(normalize(Path::new("/../a")), PathBuf::from("/a"));
    }

    #[test]
    fn relative_paths_use_forward_slashes() {
        let base = Path::new("/projects/line");
        assert_eq!(
            to_relative(Path::new("/projects/line/data/drake.cable"), base),
            "data/drake.cable"
        );
        assert_eq!(
            to_relative(Path::new("/projects/shared/tangent.structure"), base),
            "../shared/tangent.structure"
        );
        assert_eq!(to_relative(Path::new("data/./x.hardware"), base), "data/x.hardware");
    }

    #[test]
    fn resolve_inverts_to_relative() {
        let base = Path::new("/projects/line");
        for path in [
            "/projects/line/data/drake.cable",
            "/projects/shared/tangent.structure",
            "/other/root.hardware",
        ] {
            let stored = to_relative(Path::new(path), base);
            assert_eq!(resolve(&stored, base), PathBuf::from(path));
        }
        assert_eq!(
            resolve("/abs/file.cable", base),
            PathBuf::from("/abs/file.cable")
        );
    }

    #[test]
    fn document_dir_is_parent_of_absolute_path() {
        assert_eq!(
            document_dir(Path::new("/projects/line/./doc.lad")),
            PathBuf::from("/projects/line")
        );
        assert!(document_dir(Path::new("doc.lad")).is_absolute());
    }
}
