use std::path::PathBuf;

use draftgen_config::{AppConfig, ConfigError};
use draftgen_engine::assembler::{AssemblerOptions, DrawingAssembler};
use draftgen_engine::layouts::LayoutRegistry;
use draftgen_engine::provider::MapboxStaticProvider;
use draftgen_engine::record::AttributeRecord;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod offices;

fn main() {
    let mut args = std::env::args().skip(1);
    let mut config_override: Option<PathBuf> = None;
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut record_path: Option<PathBuf> = None;
    let mut macro_image = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config_override = Some(required_value(&mut args, "--config")),
            "--input" => input = Some(required_value(&mut args, "--input")),
            "--output" => output = Some(required_value(&mut args, "--output")),
            "--record" => record_path = Some(required_value(&mut args, "--record")),
            "--macro-image" => macro_image = true,
            other => {
                eprintln!("未知参数：{other}");
                std::process::exit(1);
            }
        }
    }

    let (Some(input), Some(output), Some(record_path)) = (input, output, record_path) else {
        eprintln!("用法：draftgen-app --input <模板> --record <属性记录> --output <成品> [--config <配置>] [--macro-image]");
        std::process::exit(1);
    };

    let config = load_configuration(config_override);
    init_logging(&config);
    info!("启动图纸组装");

    let mut record = load_record(&record_path);
    if let Err(municipality) = offices::enrich_with_office(&mut record) {
        error!(municipality = %municipality, "市镇没有对应的办事处");
        std::process::exit(1);
    }

    let token = match std::env::var(&config.provider.token_env) {
        Ok(token) if !token.is_empty() => token,
        _ => {
            error!(env = %config.provider.token_env, "缺少底图访问令牌环境变量");
            std::process::exit(1);
        }
    };
    let provider = MapboxStaticProvider::new(config.provider.style.clone(), token);

    let registry = match LayoutRegistry::with_builtin() {
        Ok(registry) => registry,
        Err(err) => {
            error!(error = %err, "初始化图纸处理器失败");
            std::process::exit(1);
        }
    };

    let assembler = DrawingAssembler::new(&config, registry, &provider);
    let options = AssemblerOptions {
        input,
        output,
        macro_image,
    };
    if let Err(err) = assembler.assemble(&mut record, &options) {
        error!(error = %err, "组装失败");
        std::process::exit(1);
    }
    info!(output = %options.output.display(), "成品已写出");
}

fn required_value(args: &mut impl Iterator<Item = String>, flag: &str) -> PathBuf {
    let Some(value) = args.next() else {
        eprintln!("`{flag}` 需要提供路径参数");
        std::process::exit(1);
    };
    PathBuf::from(value)
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn load_record(path: &PathBuf) -> AttributeRecord {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            error!(path = %path.display(), error = %err, "读取属性记录失败");
            std::process::exit(1);
        }
    };
    match serde_json::from_str(&text) {
        Ok(record) => record,
        Err(err) => {
            error!(path = %path.display(), error = %err, "解析属性记录失败");
            std::process::exit(1);
        }
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
