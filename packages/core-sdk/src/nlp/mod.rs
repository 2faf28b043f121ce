pub mod advice;
pub mod remote;

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::NlpSettings;
use crate::error::{Error, Result};
use crate::messages::get_content_from_message;
use crate::models::Message;

pub use advice::{AdviceDataset, AdviceEntry};
pub use remote::{InferenceClassifier, RemotePipeline};

/** \brief 分类模型输出下标对应的类别。 */
pub const CATEGORY_LABELS: &[&str] = &[
    "savings",
    "spending",
    "achievement",
    "unexpected_loss",
    "unexpected_income",
    "debt",
    "personal finance",
];

const DEFAULT_EMOTION: &str = "curious";
const DEFAULT_SENTIMENT: &str = "neutral";

/**
 * \brief 分析结果中的单个词元。
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedToken {
    pub text: String,
    #[serde(default)]
    pub lemma: String,
    /** \brief 粗粒度词性标签，如 NOUN / VERB */
    #[serde(default)]
    pub pos: String,
    #[serde(default)]
    pub is_punct: bool,
    #[serde(default)]
    pub is_stop: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedEntity {
    pub text: String,
    pub label: String,
}

/**
 * \brief 语言分析管线的输出：词元、命名实体与指代消解后的文本。
 */
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedDoc {
    #[serde(default)]
    pub tokens: Vec<AnalyzedToken>,
    #[serde(default, alias = "ents")]
    pub entities: Vec<NamedEntity>,
    #[serde(default)]
    pub coref_resolved: Option<String>,
}

impl AnalyzedDoc {
    pub fn token_texts(&self, remove_punctuation: bool) -> Vec<String> {
        self.tokens
            .iter()
            .filter(|t| !(remove_punctuation && t.is_punct))
            .map(|t| t.text.clone())
            .collect()
    }

    /** \brief 非停用词的词元原形。 */
    pub fn lemmas(&self) -> Vec<String> {
        self.tokens
            .iter()
            .filter(|t| !t.is_stop)
            .map(|t| t.lemma.clone())
            .collect()
    }

    pub fn pos_tags(&self) -> Vec<String> {
        self.tokens.iter().map(|t| t.pos.clone()).collect()
    }

    pub fn unique_pos_tags(&self) -> BTreeSet<String> {
        self.tokens.iter().map(|t| t.pos.clone()).collect()
    }

    /** \brief 管线未给出消解结果时返回原文。 */
    pub fn resolved_text(&self, original: &str) -> String {
        self.coref_resolved
            .clone()
            .unwrap_or_else(|| original.to_string())
    }
}

/**
 * \brief 分类器的单个候选标签。
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub score: f64,
}

impl Prediction {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/**
 * \brief 词性标注 / 命名实体 / 指代消解管线。
 */
#[async_trait]
pub trait LanguagePipeline: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<AnalyzedDoc>;
}

/**
 * \brief 预训练文本分类模型（情绪、类别、情感）。
 */
#[async_trait]
pub trait TextClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Vec<Prediction>>;
}

pub type NgramCounts = HashMap<String, usize>;

/**
 * \brief 统计一元与二元组；二元组键为 "前 后"。
 */
pub fn count_uni_and_bi_grams<S: AsRef<str>>(tokens: &[S]) -> (NgramCounts, NgramCounts) {
    let mut unigram = NgramCounts::new();
    let mut bigram = NgramCounts::new();
    let mut prev: Option<&str> = None;
    for token in tokens {
        let token = token.as_ref();
        *unigram.entry(token.to_string()).or_insert(0) += 1;
        if let Some(p) = prev {
            *bigram.entry(format!("{} {}", p, token)).or_insert(0) += 1;
        }
        prev = Some(token);
    }
    (unigram, bigram)
}

/**
 * \brief 以 n-1 长度的滑动窗口统计 n 元组；n 为 0 时返回空表。
 */
pub fn count_n_grams<S: AsRef<str>>(tokens: &[S], n: usize) -> NgramCounts {
    let mut ngram = NgramCounts::new();
    if n == 0 {
        return ngram;
    }
    let mut window: VecDeque<&str> = VecDeque::with_capacity(n);
    for token in tokens {
        window.push_back(token.as_ref());
        if window.len() == n {
            let key = window.iter().copied().collect::<Vec<_>>().join(" ");
            *ngram.entry(key).or_insert(0) += 1;
            window.pop_front();
        }
    }
    ngram
}

/**
 * \brief 模型情绪标签到业务情绪的映射，未知标签归为 curious。
 */
pub fn map_emotion(label: &str) -> &'static str {
    match label.to_ascii_lowercase().as_str() {
        "joy" => "joy",
        "anger" => "fear",
        "fear" => "worried",
        "surprise" => "surprise",
        "sadness" | "disgust" => "sadness",
        "neutral" | "anticipation" => "curious",
        _ => DEFAULT_EMOTION,
    }
}

/**
 * \brief 将分类标签解析为类别：`LABEL_<i>` 按下标取值，类别名原样接受。
 */
pub fn category_for_label(label: &str) -> Result<&'static str> {
    if let Some(idx) = label
        .strip_prefix("LABEL_")
        .and_then(|i| i.parse::<usize>().ok())
    {
        return CATEGORY_LABELS
            .get(idx)
            .copied()
            .ok_or_else(|| Error::UnknownCategory(label.to_string()));
    }
    CATEGORY_LABELS
        .iter()
        .copied()
        .find(|c| c.eq_ignore_ascii_case(label))
        .ok_or_else(|| Error::UnknownCategory(label.to_string()))
}

/** \brief 得分最高的候选；并列时取靠前者。 */
fn top_prediction(predictions: &[Prediction]) -> Option<&Prediction> {
    predictions.iter().fold(None, |best: Option<&Prediction>, p| match best {
        Some(b) if b.score >= p.score => Some(b),
        _ => Some(p),
    })
}

/**
 * \brief 单条消息的完整处理结果。
 */
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedMessage {
    pub tokens: Vec<String>,
    pub unique_tags: BTreeSet<String>,
    pub lemmas: Vec<String>,
    pub entities: Vec<NamedEntity>,
    pub resolved_text: String,
    pub sentiment: String,
    pub unigrams: NgramCounts,
    pub bigrams: NgramCounts,
    pub trigrams: NgramCounts,
    pub advice: Vec<AdviceEntry>,
    pub category: String,
}

/**
 * \brief 以单引号字面量形式输出字符串；含单引号且不含双引号时改用双引号。
 */
fn quote_literal(s: &str) -> String {
    if s.contains('\'') && !s.contains('"') {
        return format!("\"{}\"", s.replace('\\', "\\\\"));
    }
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

/**
 * \brief 实体列表渲染为 `[('Sam', 'PERSON'), ...]`。
 */
fn format_entities(entities: &[NamedEntity]) -> String {
    let items = entities
        .iter()
        .map(|e| format!("({}, {})", quote_literal(&e.text), quote_literal(&e.label)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{}]", items)
}

impl fmt::Display for ProcessedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let advice = self
            .advice
            .iter()
            .map(|a| format!("Advice: {}", a.advice))
            .collect::<Vec<_>>()
            .join("\n");
        writeln!(f, "Resolved Text: {}", self.resolved_text)?;
        writeln!(f, "Sentiment: {}", self.sentiment)?;
        writeln!(f, "Category: {}", self.category)?;
        writeln!(f, "Named Entities: {}", format_entities(&self.entities))?;
        writeln!(f, "Retrieved Info:")?;
        writeln!(f, "{}", advice)
    }
}

/**
 * \brief NLP 能力集合，由调用方显式构造并传入，替代进程级全局模型。
 */
#[derive(Clone)]
pub struct NlpToolkit {
    pipeline: Arc<dyn LanguagePipeline>,
    emotion: Arc<dyn TextClassifier>,
    category: Arc<dyn TextClassifier>,
    sentiment: Arc<dyn TextClassifier>,
    advice: Arc<AdviceDataset>,
}

impl NlpToolkit {
    pub fn new(
        pipeline: Arc<dyn LanguagePipeline>,
        emotion: Arc<dyn TextClassifier>,
        category: Arc<dyn TextClassifier>,
        sentiment: Arc<dyn TextClassifier>,
        advice: AdviceDataset,
    ) -> Self {
        Self {
            pipeline,
            emotion,
            category,
            sentiment,
            advice: Arc::new(advice),
        }
    }

    /**
     * \brief 按配置构造远程管线与分类器，并加载建议数据集。
     */
    pub fn from_settings(settings: &NlpSettings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.timeout_secs);
        let classifier = |model: &str| {
            InferenceClassifier::new(
                settings.inference_base.clone(),
                settings.api_key.clone(),
                model,
                timeout,
            )
        };
        let pipeline = RemotePipeline::new(settings.pipeline_url.clone(), timeout)?;
        let advice = AdviceDataset::load(&settings.advice_dataset)?;
        Ok(Self::new(
            Arc::new(pipeline),
            Arc::new(classifier(&settings.emotion_model)?),
            Arc::new(classifier(&settings.category_model)?),
            Arc::new(classifier(&settings.sentiment_model)?),
            advice,
        ))
    }

    pub fn advice(&self) -> &AdviceDataset {
        &self.advice
    }

    pub async fn tokenize(&self, text: &str, remove_punctuation: bool) -> Result<Vec<String>> {
        Ok(self.pipeline.analyze(text).await?.token_texts(remove_punctuation))
    }

    pub async fn lemmatize(&self, text: &str) -> Result<Vec<String>> {
        Ok(self.pipeline.analyze(text).await?.lemmas())
    }

    pub async fn named_entity_recognition(&self, text: &str) -> Result<Vec<NamedEntity>> {
        Ok(self.pipeline.analyze(text).await?.entities)
    }

    pub async fn resolve_coreferences(&self, text: &str) -> Result<String> {
        Ok(self.pipeline.analyze(text).await?.resolved_text(text))
    }

    /** \brief 文本中出现过的词性标签集合。 */
    pub async fn get_unique_tokens(&self, text: &str) -> Result<BTreeSet<String>> {
        Ok(self.pipeline.analyze(text).await?.unique_pos_tags())
    }

    pub async fn calculate_uni_and_bi_grams(
        &self,
        text: &str,
    ) -> Result<(NgramCounts, NgramCounts)> {
        let tags = self.pipeline.analyze(text).await?.pos_tags();
        Ok(count_uni_and_bi_grams(&tags))
    }

    pub async fn calculate_n_gram(&self, text: &str, n: usize) -> Result<NgramCounts> {
        let tags = self.pipeline.analyze(text).await?.pos_tags();
        Ok(count_n_grams(&tags, n))
    }

    pub async fn analyze_emotion(&self, text: &str) -> Result<String> {
        let predictions = self.emotion.classify(text).await?;
        let top = top_prediction(&predictions)
            .ok_or_else(|| Error::Nlp("emotion classifier returned no predictions".into()))?;
        Ok(map_emotion(&top.label).to_string())
    }

    pub async fn analyze_sentiment(&self, text: &str) -> Result<String> {
        let predictions = self.sentiment.classify(text).await?;
        Ok(top_prediction(&predictions)
            .map(|p| p.label.to_lowercase())
            .unwrap_or_else(|| DEFAULT_SENTIMENT.to_string()))
    }

    pub async fn classify_category(&self, text: &str) -> Result<String> {
        let predictions = self.category.classify(text).await?;
        let top = top_prediction(&predictions)
            .ok_or_else(|| Error::Nlp("category classifier returned no predictions".into()))?;
        Ok(category_for_label(&top.label)?.to_string())
    }

    pub fn retrieve_information(&self, query: &str) -> Vec<AdviceEntry> {
        self.advice.retrieve(query)
    }

    /**
     * \brief 对单条消息执行完整处理；文本只经过一次管线分析。
     */
    pub async fn process_message(&self, message: &Message) -> Result<ProcessedMessage> {
        let text = get_content_from_message(message).unwrap_or_default();
        let doc = self.pipeline.analyze(&text).await?;

        let tags = doc.pos_tags();
        let (unigrams, bigrams) = count_uni_and_bi_grams(&tags);
        let trigrams = count_n_grams(&tags, 3);
        let resolved_text = doc.resolved_text(&text);

        let sentiment = self.analyze_sentiment(&text).await?;
        let advice = self.retrieve_information(&resolved_text);
        let category = self.classify_category(&text).await?;
        debug!(
            role = %message.role,
            tokens = doc.tokens.len(),
            entities = doc.entities.len(),
            advice = advice.len(),
            %sentiment,
            %category,
            "processed message"
        );

        Ok(ProcessedMessage {
            tokens: doc.token_texts(false),
            unique_tags: doc.unique_pos_tags(),
            lemmas: doc.lemmas(),
            entities: doc.entities,
            resolved_text,
            sentiment,
            unigrams,
            bigrams,
            trigrams,
            advice,
            category,
        })
    }

    pub async fn process_message_content(&self, message: &Message) -> Result<String> {
        Ok(self.process_message(message).await?.to_string())
    }

    /**
     * \brief 逐条处理并以 "ROLE: 内容" 拼接。
     */
    pub async fn get_messages_content(&self, messages: &[Message]) -> Result<String> {
        let mut parts = Vec::with_capacity(messages.len());
        for message in messages {
            let content = self.process_message_content(message).await?;
            parts.push(format!(
                "{}: {}",
                message.role.as_str().to_uppercase(),
                content
            ));
        }
        Ok(parts.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedPipeline {
        doc: AnalyzedDoc,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LanguagePipeline for FixedPipeline {
        async fn analyze(&self, _text: &str) -> Result<AnalyzedDoc> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.doc.clone())
        }
    }

    struct FixedClassifier(Vec<Prediction>);

    #[async_trait]
    impl TextClassifier for FixedClassifier {
        async fn classify(&self, _text: &str) -> Result<Vec<Prediction>> {
            Ok(self.0.clone())
        }
    }

    fn token(text: &str, lemma: &str, pos: &str, is_punct: bool, is_stop: bool) -> AnalyzedToken {
        AnalyzedToken {
            text: text.into(),
            lemma: lemma.into(),
            pos: pos.into(),
            is_punct,
            is_stop,
        }
    }

    fn sample_doc() -> AnalyzedDoc {
        AnalyzedDoc {
            tokens: vec![
                token("Sam", "Sam", "PROPN", false, false),
                token("lost", "lose", "VERB", false, false),
                token("his", "his", "PRON", false, true),
                token("job", "job", "NOUN", false, false),
                token(".", ".", "PUNCT", true, false),
            ],
            entities: vec![NamedEntity {
                text: "Sam".into(),
                label: "PERSON".into(),
            }],
            coref_resolved: Some("Sam lost Sam job.".into()),
        }
    }

    fn toolkit_with(doc: AnalyzedDoc) -> (NlpToolkit, Arc<FixedPipeline>) {
        let pipeline = Arc::new(FixedPipeline {
            doc,
            calls: AtomicUsize::new(0),
        });
        let toolkit = NlpToolkit::new(
            pipeline.clone(),
            Arc::new(FixedClassifier(vec![
                Prediction::new("neutral", 0.2),
                Prediction::new("fear", 0.7),
            ])),
            Arc::new(FixedClassifier(vec![
                Prediction::new("LABEL_0", 0.1),
                Prediction::new("LABEL_3", 0.8),
                Prediction::new("LABEL_1", 0.1),
            ])),
            Arc::new(FixedClassifier(vec![Prediction::new("NEGATIVE", 0.9)])),
            AdviceDataset::from_entries(vec![
                AdviceEntry::new("sam lost sam job. what now", "Build an emergency fund."),
                AdviceEntry::new("unrelated", "Nope."),
                AdviceEntry::new("SAM LOST SAM JOB.", "Check unemployment benefits."),
            ]),
        );
        (toolkit, pipeline)
    }

    #[test]
    fn uni_and_bi_grams_count_adjacent_pairs() {
        let (uni, bi) = count_uni_and_bi_grams(&["DET", "NOUN", "VERB", "DET", "NOUN"]);
        assert_eq!(uni["DET"], 2);
        assert_eq!(uni["NOUN"], 2);
        assert_eq!(uni["VERB"], 1);
        assert_eq!(bi["DET NOUN"], 2);
        assert_eq!(bi["NOUN VERB"], 1);
        assert_eq!(bi["VERB DET"], 1);
        assert_eq!(bi.len(), 3);
    }

    #[test]
    fn n_grams_use_trailing_window() {
        let tags = ["A", "B", "C", "A", "B", "C"];
        let tri = count_n_grams(&tags, 3);
        assert_eq!(tri["A B C"], 2);
        assert_eq!(tri["B C A"], 1);
        assert_eq!(tri["C A B"], 1);
        assert_eq!(tri.values().sum::<usize>(), 4);

        let (uni, bi) = count_uni_and_bi_grams(&tags);
        assert_eq!(count_n_grams(&tags, 1), uni);
        assert_eq!(count_n_grams(&tags, 2), bi);
    }

    #[test]
    fn n_gram_edge_cases() {
        assert!(count_n_grams(&["A", "B"], 0).is_empty());
        assert!(count_n_grams(&["A", "B"], 3).is_empty());
        assert!(count_n_grams::<&str>(&[], 2).is_empty());
    }

    #[test]
    fn emotion_mapping_table() {
        assert_eq!(map_emotion("joy"), "joy");
        assert_eq!(map_emotion("anger"), "fear");
        assert_eq!(map_emotion("fear"), "worried");
        assert_eq!(map_emotion("disgust"), "sadness");
        assert_eq!(map_emotion("Neutral"), "curious");
        assert_eq!(map_emotion("anticipation"), "curious");
        assert_eq!(map_emotion("something-else"), "curious");
    }

    #[test]
    fn category_labels_resolve() {
        assert_eq!(category_for_label("LABEL_0").unwrap(), "savings");
        assert_eq!(category_for_label("LABEL_4").unwrap(), "unexpected_income");
        assert_eq!(category_for_label("debt").unwrap(), "debt");
        assert!(matches!(
            category_for_label("LABEL_9"),
            Err(Error::UnknownCategory(_))
        ));
        assert!(category_for_label("groceries").is_err());
    }

    #[test]
    fn top_prediction_prefers_first_on_tie() {
        let preds = vec![Prediction::new("a", 0.5), Prediction::new("b", 0.5)];
        assert_eq!(top_prediction(&preds).unwrap().label, "a");
        assert!(top_prediction(&[]).is_none());
    }

    #[tokio::test]
    async fn wrappers_read_from_the_pipeline() {
        let (toolkit, _) = toolkit_with(sample_doc());
        let text = "Sam lost his job.";
        assert_eq!(
            toolkit.tokenize(text, false).await.unwrap(),
            vec!["Sam", "lost", "his", "job", "."]
        );
        assert_eq!(
            toolkit.tokenize(text, true).await.unwrap(),
            vec!["Sam", "lost", "his", "job"]
        );
        assert_eq!(
            toolkit.lemmatize(text).await.unwrap(),
            vec!["Sam", "lose", "job", "."]
        );
        assert_eq!(
            toolkit.resolve_coreferences(text).await.unwrap(),
            "Sam lost Sam job."
        );
        let tags = toolkit.get_unique_tokens(text).await.unwrap();
        assert_eq!(tags.len(), 5);
        assert!(tags.contains("PROPN"));
        let tri = toolkit.calculate_n_gram(text, 3).await.unwrap();
        assert_eq!(tri["PROPN VERB PRON"], 1);
        assert_eq!(tri.len(), 3);
    }

    #[tokio::test]
    async fn coreference_falls_back_to_input() {
        let mut doc = sample_doc();
        doc.coref_resolved = None;
        let (toolkit, _) = toolkit_with(doc);
        assert_eq!(toolkit.resolve_coreferences("as is").await.unwrap(), "as is");
    }

    #[tokio::test]
    async fn classifiers_are_mapped() {
        let (toolkit, _) = toolkit_with(sample_doc());
        assert_eq!(toolkit.analyze_emotion("x").await.unwrap(), "worried");
        assert_eq!(toolkit.analyze_sentiment("x").await.unwrap(), "negative");
        assert_eq!(toolkit.classify_category("x").await.unwrap(), "unexpected_loss");
    }

    #[tokio::test]
    async fn process_message_content_formats_all_sections() {
        let (toolkit, pipeline) = toolkit_with(sample_doc());
        let out = toolkit
            .process_message_content(&Message::user("Sam lost his job."))
            .await
            .unwrap();
        assert_eq!(
            out,
            "Resolved Text: Sam lost Sam job.\n\
             Sentiment: negative\n\
             Category: unexpected_loss\n\
             Named Entities: [('Sam', 'PERSON')]\n\
             Retrieved Info:\n\
             Advice: Build an emergency fund.\n\
             Advice: Check unemployment benefits.\n"
        );
        assert_eq!(pipeline.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn process_message_without_advice_keeps_empty_line() {
        let mut doc = sample_doc();
        doc.coref_resolved = Some("nothing matches this".into());
        doc.entities.clear();
        let (toolkit, _) = toolkit_with(doc);
        let out = toolkit
            .process_message_content(&Message::user("x"))
            .await
            .unwrap();
        assert!(out.ends_with("Named Entities: []\nRetrieved Info:\n\n"));
    }

    #[tokio::test]
    async fn messages_content_prefixes_roles() {
        let (toolkit, _) = toolkit_with(sample_doc());
        let out = toolkit
            .get_messages_content(&[Message::system("s"), Message::user("u")])
            .await
            .unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "SYSTEM: Resolved Text: Sam lost Sam job.");
        assert!(out.contains("\nUSER: Resolved Text: Sam lost Sam job."));
    }

    #[test]
    fn entities_render_as_quoted_tuples() {
        let entities = vec![
            NamedEntity {
                text: "Sam".into(),
                label: "PERSON".into(),
            },
            NamedEntity {
                text: "McDonald's".into(),
                label: "ORG".into(),
            },
        ];
        assert_eq!(
            format_entities(&entities),
            r#"[('Sam', 'PERSON'), ("McDonald's", 'ORG')]"#
        );
        assert_eq!(format_entities(&[]), "[]");
        assert_eq!(quote_literal(r#"it's "x""#), r#"'it\'s "x"'"#);
    }

    #[tokio::test]
    async fn empty_classifier_output() {
        let pipeline = Arc::new(FixedPipeline {
            doc: sample_doc(),
            calls: AtomicUsize::new(0),
        });
        let toolkit = NlpToolkit::new(
            pipeline,
            Arc::new(FixedClassifier(vec![])),
            Arc::new(FixedClassifier(vec![])),
            Arc::new(FixedClassifier(vec![])),
            AdviceDataset::default(),
        );
        assert_eq!(toolkit.analyze_sentiment("x").await.unwrap(), "neutral");
        assert!(matches!(
            toolkit.analyze_emotion("x").await,
            Err(Error::Nlp(_))
        ));
        assert!(matches!(
            toolkit.classify_category("x").await,
            Err(Error::Nlp(_))
        ));
    }
}
