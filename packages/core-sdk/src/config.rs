use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::nlp::AdviceDataset;

pub const DEFAULT_CONFIG_FILE: &str = "parley.toml";
pub const ENV_PREFIX: &str = "PARLEY_";

/**
 * \brief 顶层配置（parley.toml + PARLEY_* 环境变量覆盖）。
 */
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub nlp: NlpSettings,
    #[serde(default)]
    pub log: LogSettings,
}

/**
 * \brief NLP 远程服务与数据集配置。
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NlpSettings {
    /** \brief 词性/实体/指代分析服务地址 */
    pub pipeline_url: String,
    /** \brief 分类模型推理服务基地址 */
    pub inference_base: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub emotion_model: String,
    pub category_model: String,
    pub sentiment_model: String,
    pub advice_dataset: PathBuf,
    pub timeout_secs: u64,
}

impl Default for NlpSettings {
    fn default() -> Self {
        Self {
            pipeline_url: "http://127.0.0.1:8080/analyze".to_string(),
            inference_base: "https://api-inference.huggingface.co".to_string(),
            api_key: None,
            emotion_model: "j-hartmann/emotion-english-distilroberta-base".to_string(),
            category_model: "bert-base-uncased".to_string(),
            sentiment_model: "distilbert-base-uncased-finetuned-sst-2-english".to_string(),
            advice_dataset: AdviceDataset::default_path(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSettings {
    /** \brief 默认日志级别，RUST_LOG 优先 */
    pub level: String,
    /** \brief 若设置则同时追加写入 {dir}/parley.log */
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}

impl Settings {
    /**
     * \brief 依次合并默认值、配置文件与环境变量。
     * \param path 配置文件路径，缺省为 ./parley.toml（不存在时忽略）
     */
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        Self::from_figment(
            Figment::from(Serialized::defaults(Settings::default()))
                .merge(Toml::file(file))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        figment.extract().map_err(|e| Error::Config(e.to_string()))
    }
}
