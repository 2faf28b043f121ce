use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

static FROM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^FROM\s+(\w+)").expect("Invalid regex"));

static TEMPLATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)TEMPLATE\s+"""(.+?)""""#).expect("Invalid regex"));

static STOP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)PARAMETER stop "(.*?)""#).expect("Invalid regex"));

static ADAPTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)ADAPTER (.+)").expect("Invalid regex"));

static SYSTEM_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)SYSTEM\s+"""(.+?)""""#).expect("Invalid regex"));

static SYSTEM_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)SYSTEM\s+([^\n]+)").expect("Invalid regex"));

static MESSAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)MESSAGE (\w+) (.+)").expect("Invalid regex"));

static PARAMETER_RES: Lazy<HashMap<&'static str, Regex>> = Lazy::new(|| {
    PARAMETER_NAMES
        .iter()
        .map(|name| {
            let re = Regex::new(&format!(r"(?i)PARAMETER {} (.+)", regex::escape(name)))
                .expect("Invalid regex");
            (*name, re)
        })
        .collect()
});

/**
 * \brief 参数值的类型转换。
 */
trait ParamValue: Sized {
    fn parse_param(raw: &str) -> Result<Self, String>;
}

impl ParamValue for i64 {
    fn parse_param(raw: &str) -> Result<Self, String> {
        raw.trim().parse().map_err(|e: std::num::ParseIntError| e.to_string())
    }
}

impl ParamValue for f64 {
    fn parse_param(raw: &str) -> Result<Self, String> {
        raw.trim().parse().map_err(|e: std::num::ParseFloatError| e.to_string())
    }
}

impl ParamValue for bool {
    fn parse_param(raw: &str) -> Result<Self, String> {
        Ok(raw.trim().eq_ignore_ascii_case("true"))
    }
}

macro_rules! model_params {
    ($($name:ident: $ty:ty),* $(,)?) => {
        /**
         * \brief Modelfile 中解析出的参数集合；缺省字段在序列化时省略。
         */
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct ModelParams {
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub template: Option<String>,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub stop: Option<Vec<String>>,
            $(
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $name: Option<$ty>,
            )*
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub adapter: Option<String>,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub system: Option<String>,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub messages: Option<Vec<ModelfileMessage>>,
        }

        /** \brief 可识别的 PARAMETER 名称。 */
        pub const PARAMETER_NAMES: &[&str] = &[$(stringify!($name)),*];

        impl ModelParams {
            fn apply_parameters(&mut self, text: &str) {
                $(
                    if let Some(raw) = find_parameter(text, stringify!($name)) {
                        match <$ty as ParamValue>::parse_param(raw) {
                            Ok(value) => self.$name = Some(value),
                            Err(err) => warn!(
                                parameter = stringify!($name),
                                value = raw,
                                error = %err,
                                "skipping modelfile parameter"
                            ),
                        }
                    }
                )*
            }
        }
    };
}

model_params! {
    mirostat: i64,
    mirostat_eta: f64,
    mirostat_tau: f64,
    num_ctx: i64,
    repeat_last_n: i64,
    repeat_penalty: f64,
    temperature: f64,
    seed: i64,
    tfs_z: f64,
    num_predict: i64,
    top_k: i64,
    top_p: f64,
    num_keep: i64,
    typical_p: f64,
    presence_penalty: f64,
    frequency_penalty: f64,
    penalize_newline: bool,
    numa: bool,
    num_batch: i64,
    num_gpu: i64,
    main_gpu: i64,
    low_vram: bool,
    f16_kv: bool,
    vocab_only: bool,
    use_mmap: bool,
    use_mlock: bool,
    num_thread: i64,
}

/**
 * \brief MESSAGE 指令携带的示例对话。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelfileMessage {
    pub role: String,
    pub content: String,
}

/**
 * \brief Modelfile 解析结果。
 */
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelfileConfig {
    /** \brief FROM 指定的基础模型 */
    pub base_model_id: Option<String>,
    pub params: ModelParams,
}

fn find_parameter<'t>(text: &'t str, name: &str) -> Option<&'t str> {
    PARAMETER_RES
        .get(name)?
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn first_capture<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures(text).and_then(|caps| caps.get(1)).map(|m| m.as_str())
}

/**
 * \brief 解析 Ollama Modelfile 文本。
 *
 * 各字段独立匹配，未识别的行直接忽略；单个参数类型转换失败时记录告警并跳过，整体解析不会失败。
 */
pub fn parse_ollama_modelfile(model_text: &str) -> ModelfileConfig {
    let mut data = ModelfileConfig {
        base_model_id: first_capture(&FROM_RE, model_text).map(str::to_string),
        ..Default::default()
    };
    let params = &mut data.params;

    params.template = first_capture(&TEMPLATE_RE, model_text).map(|t| t.trim().to_string());

    let stops: Vec<String> = STOP_RE
        .captures_iter(model_text)
        .map(|caps| caps[1].to_string())
        .collect();
    if !stops.is_empty() {
        params.stop = Some(stops);
    }

    params.apply_parameters(model_text);

    params.adapter = first_capture(&ADAPTER_RE, model_text).map(str::to_string);

    params.system = first_capture(&SYSTEM_BLOCK_RE, model_text)
        .or_else(|| first_capture(&SYSTEM_LINE_RE, model_text))
        .map(|s| s.trim().to_string());

    let messages: Vec<ModelfileMessage> = MESSAGE_RE
        .captures_iter(model_text)
        .map(|caps| ModelfileMessage {
            role: caps[1].to_string(),
            content: caps[2].to_string(),
        })
        .collect();
    if !messages.is_empty() {
        params.messages = Some(messages);
    }

    data
}
