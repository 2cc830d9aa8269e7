mod board;
mod version;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand};
use hostwatch_config::{Config, open_config, write_default_config};
use hostwatch_core::PollScheduler;
use tracing::{Level, info};

use crate::{
    board::StateBoard,
    version::{long_version, short_version},
};

#[derive(Parser)]
#[command(version = short_version(), long_version = long_version())]
struct Args {
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// RUST_LOG が無い場合のログレベル
    #[arg(long, default_value_t = Level::INFO)]
    log_level: Level,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// 監視ループを開始する (既定)
    Run,
    /// 1 サイクルだけ実行して結果を JSON で出力する
    Check,
    /// Wake-on-LAN でデバイスを起動する
    TurnOn { id: String },
    /// デバイスをシャットダウンする
    TurnOff { id: String },
    /// デバイスの電源状態を反転する
    Toggle { id: String },
    /// デバイスの状態を確認する
    Status { id: String },
    /// デフォルトの設定ファイルを作成する
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(args.log_level.into()),
        )
        .init();

    let command = args.command.unwrap_or(Command::Run);

    if let Command::Init = command {
        write_default_config(&args.config)?;
        info!(path = ?args.config, "Created default configuration");
        return Ok(());
    }

    tracing::info!(version = short_version(), "hostwatch version");

    let config = open_config(&args.config).context("Failed to load configuration")?;
    config.validate()?;
    info!(devices = config.devices.len(), "Configuration loaded");

    let board = Arc::new(StateBoard::default());
    let scheduler = build_scheduler(&config, board.clone()).await;

    match command {
        Command::Run | Command::Init => run(scheduler).await,
        Command::Check => {
            scheduler.run_cycle().await;
            let snapshot = scheduler.snapshot().await;
            let json =
                serde_json::to_string_pretty(&snapshot).context("Failed to serialize status")?;
            println!("{json}");
            Ok(())
        }
        Command::TurnOn { id } => {
            let name = device_name(&config, &id)?;
            if !scheduler.turn_on(&id).await? {
                bail!("Could not turn on {name}");
            }
            Ok(())
        }
        Command::TurnOff { id } => {
            let name = device_name(&config, &id)?;
            if !scheduler.turn_off(&id).await? {
                bail!("Could not turn off {name}");
            }
            Ok(())
        }
        Command::Toggle { id } => {
            let name = device_name(&config, &id)?;
            // 直前の状態がわからないと常に起動扱いになるため先に確認する
            scheduler.request_status(&id).await?;
            if !scheduler.toggle(&id).await? {
                bail!("Could not toggle {name}");
            }
            Ok(())
        }
        Command::Status { id } => {
            let name = device_name(&config, &id)?;
            scheduler.request_status(&id).await?;
            println!("{name}");
            for (key, value) in board.device(&id) {
                println!("{key}: {value}");
            }
            Ok(())
        }
    }
}

/// 設定ファイルからデバイスの表示名を引く。
fn device_name(config: &Config, id: &str) -> Result<String> {
    config
        .find_device(id)
        .map(|device| device.display_name().to_string())
        .with_context(|| format!("Unknown device: {id}"))
}

/// 設定されたすべてのデバイスを登録したスケジューラを作成する。
async fn build_scheduler(config: &Config, board: Arc<StateBoard>) -> Arc<PollScheduler> {
    let scheduler = Arc::new(PollScheduler::new(
        config.check_context(),
        board,
        config.monitor.refresh_interval,
    ));

    for device in &config.devices {
        scheduler.on_device_start(device).await;
    }

    scheduler
}

/// Ctrl-C を受け取るまで監視ループを実行する。
async fn run(scheduler: Arc<PollScheduler>) -> Result<()> {
    info!(
        interval = %humantime::format_duration(scheduler.interval()),
        devices = scheduler.device_count().await,
        "Starting monitor"
    );

    let handle = scheduler.start()?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down");

    scheduler.request_stop();
    handle.await.context("Poll loop panicked")?;
    Ok(())
}
