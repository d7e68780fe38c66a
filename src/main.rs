use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voicebatch::controllers::batch::BatchController;
use voicebatch::domain::batch::BatchState;
use voicebatch::domain::config::ProviderConfig;
use voicebatch::domain::tts::{AudioFormat, ProviderId};
use voicebatch::error::AppError;
use voicebatch::infrastructure::config::{Config, LogFormat};
use voicebatch::infrastructure::providers::ProviderRegistry;

/// Batch speech synthesis across several TTS vendors
#[derive(Debug, Parser)]
#[command(name = "voicebatch", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Synthesize every row of a JSON batch file
    Run {
        /// JSON array of objects with SCRIPT and FILENAME
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        provider: ProviderArgs,

        /// Upper bound on parallel workers
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Write the run summary as JSON to this file
        #[arg(long)]
        summary: Option<PathBuf>,
    },
    /// Check the configuration without calling the vendor
    Validate {
        #[command(flatten)]
        provider: ProviderArgs,
    },
    /// List the vendor's voices
    Voices {
        #[command(flatten)]
        provider: ProviderArgs,
    },
    /// Make one authenticated call to the vendor
    Check {
        #[command(flatten)]
        provider: ProviderArgs,
    },
}

#[derive(Debug, Args)]
struct ProviderArgs {
    /// openai, polly, elevenlabs, google, azure
    #[arg(short, long)]
    provider: Option<ProviderId>,

    #[arg(long)]
    voice: Option<String>,

    /// mp3 or wav
    #[arg(long)]
    format: Option<AudioFormat>,

    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

impl ProviderArgs {
    fn provider_config(&self, config: &Config) -> ProviderConfig {
        let mut provider_config = config.provider_config(self.provider.unwrap_or(config.provider));
        if let Some(voice) = &self.voice {
            provider_config = provider_config.with_voice(voice.clone());
        }
        if let Some(format) = self.format {
            provider_config = provider_config.with_audio_format(format);
        }
        if let Some(dir) = &self.output_dir {
            provider_config.output_dir = dir.clone();
        }
        provider_config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return exit_code(AppError::from(e).exit_code());
        }
    };

    init_logging(&config);

    match execute(cli, config).await {
        Ok(code) => code,
        Err(e) => {
            let code = e
                .downcast_ref::<AppError>()
                .map(AppError::exit_code)
                .unwrap_or(1);
            tracing::error!(error = %e, exit_code = code, "Command failed");
            eprintln!("error: {:#}", e);
            exit_code(code)
        }
    }
}

async fn execute(cli: Cli, mut config: Config) -> anyhow::Result<ExitCode> {
    let registry = Arc::new(ProviderRegistry::with_builtin_adapters());

    match cli.command {
        Command::Run {
            input,
            provider,
            concurrency,
            summary,
        } => {
            if let Some(concurrency) = concurrency {
                config.override_concurrency(concurrency);
            }
            let provider_config = provider.provider_config(&config);
            let controller = BatchController::new(registry, config.scheduler_settings());

            let cancellation = controller.cancellation();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received, finishing in-flight items");
                    cancellation.cancel();
                }
            });

            controller.prepare_output_dir(&provider_config.output_dir).await?;

            let result = controller
                .run(&input, provider_config)
                .await
                .with_context(|| format!("running batch from {}", input.display()))?;
            println!("{}", result);

            if let Some(path) = summary {
                controller.write_summary(&result, &path).await?;
            }

            Ok(match result.state {
                BatchState::Completed => ExitCode::SUCCESS,
                BatchState::Cancelled => exit_code(130),
                _ => exit_code(2),
            })
        }
        Command::Validate { provider } => {
            let provider_config = provider.provider_config(&config);
            let controller = BatchController::new(registry, config.scheduler_settings());
            let report = controller.validate(&provider_config);

            for warning in &report.warnings {
                println!("warning: {}", warning);
            }
            for error in &report.errors {
                println!("error: {}", error);
            }

            if report.is_valid() {
                println!("{} configuration is valid", provider_config.provider_id);
                Ok(ExitCode::SUCCESS)
            } else {
                Err(AppError::InvalidConfiguration(report).into())
            }
        }
        Command::Voices { provider } => {
            let provider_config = provider.provider_config(&config);
            let controller = BatchController::new(registry, config.scheduler_settings());

            for voice in controller.voices(&provider_config).await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    voice.id,
                    voice.name,
                    voice.language.as_deref().unwrap_or("-"),
                    voice.gender.as_deref().unwrap_or("-")
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { provider } => {
            let provider_config = provider.provider_config(&config);
            let controller = BatchController::new(registry, config.scheduler_settings());
            let report = controller.check(&provider_config).await?;

            if report.reachable {
                println!("{} reachable ({} ms)", report.provider, report.latency_ms);
                Ok(ExitCode::SUCCESS)
            } else {
                println!(
                    "{} unreachable: {}",
                    report.provider,
                    report.message.as_deref().unwrap_or("unknown error")
                );
                Ok(exit_code(69))
            }
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "voicebatch=debug".into());

    if config.log_format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .init();
    }
}
