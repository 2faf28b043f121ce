use std::path::{Component, Path};

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@]+@[^@]+\.[^@]+").expect("Invalid regex"));

static NON_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("Invalid regex"));

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("Invalid regex"));

/**
 * \brief 校验邮箱格式；以 @localhost 结尾的地址直接放行。
 */
pub fn validate_email_format(email: &str) -> bool {
    if email.ends_with("@localhost") {
        return true;
    }
    EMAIL_RE.is_match(email)
}

/**
 * \brief 文件名规整：转小写、去除非单词字符、空白串替换为单个 "-"。
 */
pub fn sanitize_filename(file_name: &str) -> String {
    let lower = file_name.to_lowercase();
    let stripped = NON_WORD_RE.replace_all(&lower, "");
    WHITESPACE_RE.replace_all(&stripped, "-").into_owned()
}

/**
 * \brief 提取 data/.../docs 之后、文件名之前的目录标签（逐级累加）。
 *
 * 例如 `/srv/data/docs/a/b/file.txt` 得到 `["a", "a/b"]`。
 */
pub fn extract_folders_after_data_docs(path: impl AsRef<Path>) -> Vec<String> {
    let parts: Vec<String> = path
        .as_ref()
        .components()
        .map(|c| match c {
            Component::RootDir => "/".to_string(),
            other => other.as_os_str().to_string_lossy().into_owned(),
        })
        .collect();

    let Some(data_idx) = parts.iter().position(|p| p == "data") else {
        return Vec::new();
    };
    let Some(docs_offset) = parts[data_idx + 1..].iter().position(|p| p == "docs") else {
        return Vec::new();
    };
    let start = data_idx + 1 + docs_offset + 1;
    if start >= parts.len() {
        return Vec::new();
    }

    let folders = &parts[start..parts.len() - 1];
    (1..=folders.len())
        .map(|end| folders[..end].join("/"))
        .collect()
}
