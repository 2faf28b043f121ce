use std::{fs::OpenOptions, sync::Mutex};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LogSettings;
use crate::error::{Error, Result};

pub const LOG_FILE_NAME: &str = "parley.log";

/**
 * \brief 构造日志过滤器：RUST_LOG 优先，其次 verbose，最后配置中的级别。
 */
pub fn build_filter(settings: &LogSettings, verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { settings.level.as_str() };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

/**
 * \brief 初始化全局 tracing 订阅者；配置了日志目录时同时追加写入文件。
 */
pub fn init(settings: &LogSettings, verbose: bool) -> Result<()> {
    let filter = build_filter(settings, verbose);
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let file_layer = match &settings.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(LOG_FILE_NAME))?;
            Some(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("telemetry init failed: {}", e)))
}
