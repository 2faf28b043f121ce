use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};

use super::{AnalyzedDoc, LanguagePipeline, Prediction, TextClassifier};
use crate::error::{Error, Result};

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

async fn ensure_success(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        return Err(Error::Nlp(format!("{} request failed: {} -> {}", what, status, text)));
    }
    Ok(resp)
}

/**
 * \brief 远程分析服务：POST {"text": ...}，返回 AnalyzedDoc JSON。
 */
#[derive(Debug, Clone)]
pub struct RemotePipeline {
    client: reqwest::Client,
    endpoint: String,
}

impl RemotePipeline {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl LanguagePipeline for RemotePipeline {
    async fn analyze(&self, text: &str) -> Result<AnalyzedDoc> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .json(&json!({ "text": text }))
            .send()
            .await?;
        let resp = ensure_success(resp, "pipeline").await?;
        Ok(resp.json().await?)
    }
}

/**
 * \brief Hugging Face 推理接口风格的文本分类器。
 */
#[derive(Debug, Clone)]
pub struct InferenceClassifier {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

impl InferenceClassifier {
    pub fn new(
        api_base: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            api_base: api_base.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
            model: model.into(),
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}",
            self.api_base.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl TextClassifier for InferenceClassifier {
    async fn classify(&self, text: &str) -> Result<Vec<Prediction>> {
        let mut req = self
            .client
            .post(self.url())
            .header(CONTENT_TYPE, "application/json")
            .json(&json!({ "inputs": text }));
        if let Some(key) = &self.api_key {
            req = req.header(AUTHORIZATION, format!("Bearer {}", key));
        }
        let resp = ensure_success(req.send().await?, &self.model).await?;
        parse_predictions(resp.json().await?)
    }
}

/**
 * \brief 兼容 `[[{label, score}]]` 与 `[{label, score}]` 两种返回格式。
 */
fn parse_predictions(v: Value) -> Result<Vec<Prediction>> {
    let nested = v
        .as_array()
        .and_then(|outer| outer.first())
        .map(Value::is_array)
        .unwrap_or(false);
    let list = if nested {
        v[0].clone()
    } else if v.is_array() {
        v
    } else {
        return Err(Error::Nlp(format!("unexpected classifier payload: {}", v)));
    };
    Ok(serde_json::from_value(list)?)
}
