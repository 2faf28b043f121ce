use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::Role;

pub const CHUNK_OBJECT: &str = "chat.completion.chunk";
pub const COMPLETION_OBJECT: &str = "chat.completion";
const FINISH_STOP: &str = "stop";

/**
 * \brief OpenAI chat completion 响应模板。
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionTemplate {
    /** \brief "{model}-{uuid}" */
    pub id: String,
    /** \brief 创建时间（Unix 秒） */
    pub created: i64,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    pub choices: Vec<TemplateChoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateChoice {
    pub index: u32,
    /** \brief 始终为 null */
    pub logprobs: Option<serde_json::Value>,
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<Delta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<CompletionMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionMessage {
    pub content: String,
    pub role: Role,
}

impl ChatCompletionTemplate {
    /** \brief 唯一的 choice，由 openai_chat_message_template 保证存在。 */
    fn choice_mut(&mut self) -> &mut TemplateChoice {
        &mut self.choices[0]
    }
}

impl TemplateChoice {
    fn empty() -> Self {
        Self {
            index: 0,
            logprobs: None,
            finish_reason: None,
            delta: None,
            message: None,
        }
    }
}

/**
 * \brief 基础模板：id、created、model 与单个空 choice。
 */
pub fn openai_chat_message_template(model: &str) -> ChatCompletionTemplate {
    ChatCompletionTemplate {
        id: format!("{}-{}", model, Uuid::new_v4()),
        created: OffsetDateTime::now_utc().unix_timestamp(),
        model: model.to_string(),
        object: None,
        choices: vec![TemplateChoice::empty()],
    }
}

/**
 * \brief 流式分片模板；无消息（或空消息）时表示结束分片。
 */
pub fn openai_chat_chunk_message_template(
    model: &str,
    message: Option<&str>,
) -> ChatCompletionTemplate {
    let mut template = openai_chat_message_template(model);
    template.object = Some(CHUNK_OBJECT.to_string());
    match message.filter(|m| !m.is_empty()) {
        Some(content) => {
            template.choice_mut().delta = Some(Delta {
                content: content.to_string(),
            })
        }
        None => template.choice_mut().finish_reason = Some(FINISH_STOP.to_string()),
    }
    template
}

/**
 * \brief 完整回复模板；finish_reason 总为 "stop"。
 */
pub fn openai_chat_completion_message_template(
    model: &str,
    message: Option<&str>,
) -> ChatCompletionTemplate {
    let mut template = openai_chat_message_template(model);
    template.object = Some(COMPLETION_OBJECT.to_string());
    let choice = template.choice_mut();
    if let Some(content) = message.filter(|m| !m.is_empty()) {
        choice.message = Some(CompletionMessage {
            content: content.to_string(),
            role: Role::Assistant,
        });
    }
    choice.finish_reason = Some(FINISH_STOP.to_string());
    template
}
