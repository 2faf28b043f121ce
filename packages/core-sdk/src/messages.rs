use crate::models::{ContentItem, Message, MessageContent, Role};

/**
 * \brief 从末尾查找最后一条用户消息。
 */
pub fn get_last_user_message_item(messages: &[Message]) -> Option<&Message> {
    messages.iter().rev().find(|m| m.role == Role::User)
}

/**
 * \brief 读取消息正文：多段内容取第一条 text 条目，纯文本直接返回。
 */
pub fn get_content_from_message(message: &Message) -> Option<String> {
    match &message.content {
        MessageContent::Text(text) => Some(text.clone()),
        MessageContent::Parts(items) => items
            .iter()
            .find(|item| item.is_text())
            .and_then(|item| item.text.clone()),
    }
}

/**
 * \brief 最后一条用户消息的正文。
 */
pub fn get_last_user_message(messages: &[Message]) -> Option<String> {
    get_last_user_message_item(messages).and_then(get_content_from_message)
}

/**
 * \brief 最后一条助手消息的正文。
 */
pub fn get_last_assistant_message(messages: &[Message]) -> Option<String> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)
        .and_then(get_content_from_message)
}

/**
 * \brief 第一条 system 消息（可位于任意位置）。
 */
pub fn get_system_message(messages: &[Message]) -> Option<&Message> {
    messages.iter().find(|m| m.role == Role::System)
}

pub fn remove_system_message(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .filter(|m| m.role != Role::System)
        .cloned()
        .collect()
}

/**
 * \brief 同时返回 system 消息与去除 system 后的列表。
 */
pub fn pop_system_message(messages: &[Message]) -> (Option<Message>, Vec<Message>) {
    (
        get_system_message(messages).cloned(),
        remove_system_message(messages),
    )
}

/**
 * \brief 在第一条用户消息前插入 "{content}\n"，返回新列表。
 *
 * 多段内容时每个 text 条目都会被加前缀；没有用户消息时原样复制。
 */
pub fn prepend_to_first_user_message_content(content: &str, messages: &[Message]) -> Vec<Message> {
    let mut out = messages.to_vec();
    if let Some(message) = out.iter_mut().find(|m| m.role == Role::User) {
        match &mut message.content {
            MessageContent::Parts(items) => {
                for item in items.iter_mut().filter(|i| i.is_text()) {
                    let existing = item.text.take().unwrap_or_default();
                    item.text = Some(format!("{}\n{}", content, existing));
                }
            }
            MessageContent::Text(text) => {
                *text = format!("{}\n{}", content, text);
            }
        }
    }
    out
}

/**
 * \brief 新增或合并首条 system 消息，返回新列表。
 *
 * 首条已是 system 时把 content 放在原内容之前，否则在开头插入新的 system 消息。
 * 多段内容保留全部条目：第一个 text 条目加前缀，没有 text 条目时在最前面插入一条。
 */
pub fn add_or_update_system_message(content: &str, messages: &[Message]) -> Vec<Message> {
    let mut out = messages.to_vec();
    if !out.first().is_some_and(|m| m.role == Role::System) {
        out.insert(0, Message::system(content));
        return out;
    }
    match &mut out[0].content {
        MessageContent::Text(text) => {
            *text = format!("{}\n{}", content, text);
        }
        MessageContent::Parts(items) => match items.iter().position(|i| i.is_text()) {
            Some(idx) => {
                let existing = items[idx].text.take().unwrap_or_default();
                items[idx].text = Some(format!("{}\n{}", content, existing));
            }
            None => items.insert(0, ContentItem::text(content)),
        },
    }
    out
}
