use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Result;

/** \brief 默认的建议数据集位置（相对工作目录）。 */
pub const DEFAULT_DATASET_PATH: &str = "training/dataset/dataset-classification.json";

/**
 * \brief 建议数据集中的一条记录。
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdviceEntry {
    /** \brief 用于匹配的短语 */
    #[serde(default)]
    pub phrase: String,
    /** \brief 对应的建议 */
    #[serde(default)]
    pub advice: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AdviceEntry {
    pub fn new(phrase: impl Into<String>, advice: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
            advice: advice.into(),
            extra: Map::new(),
        }
    }
}

/**
 * \brief 只读的静态建议数据集，加载一次后按短语检索。
 */
#[derive(Debug, Clone, Default)]
pub struct AdviceDataset {
    entries: Vec<AdviceEntry>,
}

impl AdviceDataset {
    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_DATASET_PATH)
    }

    /**
     * \brief 从 JSON 数组文件加载。
     */
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let entries: Vec<AdviceEntry> = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), entries = entries.len(), "loaded advice dataset");
        Ok(Self { entries })
    }

    pub fn from_entries(entries: Vec<AdviceEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /**
     * \brief 返回 phrase 中包含 query（不区分大小写）的全部记录，保持数据集顺序。
     */
    pub fn retrieve(&self, query: &str) -> Vec<AdviceEntry> {
        let needle = query.to_lowercase();
        self.entries
            .iter()
            .filter(|entry| entry.phrase.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn dataset() -> AdviceDataset {
        AdviceDataset::from_entries(vec![
            AdviceEntry::new("I lost my job this month", "Cut discretionary spending first."),
            AdviceEntry::new("Got a bonus at work", "Put half of it into savings."),
            AdviceEntry::new("credit card debt keeps growing", "Pay the highest rate first."),
        ])
    }

    #[test]
    fn retrieval_is_case_insensitive_substring() {
        let hits = dataset().retrieve("LOST MY JOB");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].advice, "Cut discretionary spending first.");
    }

    #[test]
    fn retrieval_requires_query_inside_phrase() {
        // the phrase must contain the query, not the other way round
        assert!(dataset().retrieve("I lost my job this month and more").is_empty());
    }

    #[test]
    fn empty_query_matches_everything() {
        assert_eq!(dataset().retrieve("").len(), 3);
    }

    #[test]
    fn load_keeps_unknown_fields_and_tolerates_missing_ones() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"phrase": "rent went up", "advice": "Revisit the budget.", "category": "spending"}},
                {{"advice": "orphan"}}
            ]"#
        )
        .unwrap();

        let ds = AdviceDataset::load(file.path()).unwrap();
        assert_eq!(ds.len(), 2);
        let hits = ds.retrieve("Rent");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].extra["category"], "spending");
        assert!(ds.retrieve("orphan").is_empty());
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = AdviceDataset::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, crate::error::Error::Io(_)));
    }
}
