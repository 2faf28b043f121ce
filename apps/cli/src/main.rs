use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use parley_core_sdk::{
    config::Settings, duration, hashing, messages, modelfile, models::Message, nlp::NlpToolkit,
    telemetry, templates, validation,
};

/**
 * \brief CLI 程序入口，逐组暴露 SDK 工具函数。
 */
#[derive(Parser, Debug)]
#[command(name = "parley", version, about = "Parley chat utility toolkit")]
struct Cli {
    /** \brief 配置文件路径（默认 ./parley.toml） */
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /**
     * \brief 解析时长表达式并输出秒数。
     */
    Duration {
        #[arg(allow_hyphen_values = true)]
        expr: String,
    },

    /**
     * \brief 解析 Modelfile 并输出 JSON。
     */
    Modelfile { file: PathBuf },

    /**
     * \brief 计算文件或字符串的 SHA-256。
     */
    Sha256 {
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,
        file: Option<PathBuf>,
    },

    /** \brief 输出 Gravatar 头像地址。 */
    Gravatar { email: String },

    /** \brief 校验邮箱格式。 */
    Email { address: String },

    /** \brief 规整文件名。 */
    Sanitize { name: String },

    /** \brief 提取 data/docs 之后的目录标签。 */
    Folders { path: PathBuf },

    /**
     * \brief 生成 chat completion 响应模板。
     */
    Template {
        #[arg(long)]
        model: String,
        #[arg(long)]
        message: Option<String>,
        #[arg(long, default_value_t = false)]
        chunk: bool,
    },

    /**
     * \brief 向消息列表注入或合并 system 提示。
     */
    System {
        #[arg(long)]
        content: String,
        messages: PathBuf,
    },

    /**
     * \brief 通过 NLP 服务处理消息列表。
     */
    Process { messages: PathBuf },
}

fn load_messages(path: &Path) -> Result<Vec<Message>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read messages file {} failed", path.display()))?;
    serde_json::from_str(&raw).context("parse messages failed")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref()).context("load config failed")?;
    telemetry::init(&settings.log, cli.verbose).context("init logging failed")?;

    match cli.command {
        Commands::Duration { expr } => match duration::parse_duration(&expr)? {
            Some(d) => println!("{}", d.as_seconds_f64()),
            None => println!("none"),
        },
        Commands::Modelfile { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("read modelfile {} failed", file.display()))?;
            let parsed = modelfile::parse_ollama_modelfile(&text);
            println!("{}", serde_json::to_string_pretty(&parsed)?);
        }
        Commands::Sha256 { text, file } => {
            let digest = match (text, file) {
                (Some(t), _) => hashing::calculate_sha256_string(&t),
                (None, Some(path)) => {
                    let f = std::fs::File::open(&path)
                        .with_context(|| format!("open {} failed", path.display()))?;
                    hashing::calculate_sha256(f).context("hash file failed")?
                }
                (None, None) => hashing::calculate_sha256(std::io::stdin().lock())
                    .context("hash stdin failed")?,
            };
            println!("{}", digest);
        }
        Commands::Gravatar { email } => println!("{}", hashing::get_gravatar_url(&email)),
        Commands::Email { address } => {
            let ok = validation::validate_email_format(&address);
            println!("{}", ok);
            if !ok {
                std::process::exit(1);
            }
        }
        Commands::Sanitize { name } => println!("{}", validation::sanitize_filename(&name)),
        Commands::Folders { path } => {
            for tag in validation::extract_folders_after_data_docs(&path) {
                println!("{}", tag);
            }
        }
        Commands::Template {
            model,
            message,
            chunk,
        } => {
            let template = if chunk {
                templates::openai_chat_chunk_message_template(&model, message.as_deref())
            } else {
                templates::openai_chat_completion_message_template(&model, message.as_deref())
            };
            println!("{}", serde_json::to_string_pretty(&template)?);
        }
        Commands::System {
            content,
            messages: path,
        } => {
            let list = load_messages(&path)?;
            let updated = messages::add_or_update_system_message(&content, &list);
            println!("{}", serde_json::to_string_pretty(&updated)?);
        }
        Commands::Process { messages: path } => {
            let list = load_messages(&path)?;
            let toolkit =
                NlpToolkit::from_settings(&settings.nlp).context("build nlp toolkit failed")?;
            tracing::info!(
                messages = list.len(),
                advice_entries = toolkit.advice().len(),
                "processing messages"
            );
            let out = toolkit
                .get_messages_content(&list)
                .await
                .context("process messages failed")?;
            println!("{}", out);
        }
    }

    Ok(())
}
