use anyhow::Context;
use appointment_desk::config::toml_config::TomlConfig;
use appointment_desk::utils::logger;
use appointment_desk::{CliConfig, CommandRunner, Settings};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    // 載入設定檔（若有指定）
    let file = match &config.config {
        Some(path) => TomlConfig::from_file(path)
            .with_context(|| format!("reading configuration from {}", path.display()))?,
        None => TomlConfig::default(),
    };

    let settings = match Settings::resolve(&config.overrides(), &file) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(e.exit_code());
        }
    };

    logger::init_cli_logger(
        config.verbose,
        settings.json_logs,
        settings.log_level.as_deref(),
    );
    tracing::info!("Starting appointment-desk against {}", settings.api_url);
    tracing::debug!("Settings: {:?}", settings);

    let mut runner = CommandRunner::new(settings, config.output, std::io::stdout().lock());

    if let Err(e) = runner.run(config.command).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );

        // 欄位層級的錯誤逐一列出，其他錯誤只顯示通用訊息
        let fields = e.field_errors();
        if fields.is_empty() {
            eprintln!("❌ {}", e.user_friendly_message());
        } else {
            for field in fields {
                eprintln!("❌ {}: {}", field.field, field.message);
            }
        }
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(e.exit_code());
    }

    Ok(())
}
