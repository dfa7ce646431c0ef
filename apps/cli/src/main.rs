use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use client_core::{
    EvmContractGateway, Orchestrator, OrchestratorEvent, SubmitOutcome, WalletSessionManager,
};
use evm_integration::{JsonRpcClient, NodeWalletProvider};
use shared::{domain::short_address, error::UserFacingFailure};
use wallet_integration::WalletProvider;

/// Submit a prediction question to the on-chain orchestrator and wait for
/// the analysis response.
#[derive(Parser, Debug)]
#[command(name = "oracle")]
struct Args {
    /// The question to submit.
    question: String,
    /// Extra argument passed to the contract alongside the question; repeatable.
    #[arg(long = "arg", value_name = "VALUE")]
    args: Vec<String>,
    /// Settings file (defaults to orchestrator.toml in the working directory).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Contract address override.
    #[arg(long)]
    contract_address: Option<String>,
    /// HTTP RPC endpoint override.
    #[arg(long)]
    rpc_url: Option<String>,
    /// WebSocket RPC endpoint override.
    #[arg(long)]
    ws_url: Option<String>,
    /// Give up if no response event arrives within this many seconds
    /// (0 waits forever).
    #[arg(long, default_value_t = 0)]
    wait_secs: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    match run(Args::parse()).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let mut settings = match &args.config {
        Some(path) => client_core::load_settings_from(path),
        None => client_core::load_settings(),
    };
    if let Some(v) = args.contract_address {
        settings.contract_address = v;
    }
    if let Some(v) = args.rpc_url {
        settings.rpc_http_url = v;
    }
    if let Some(v) = args.ws_url {
        settings.rpc_ws_url = Some(v);
    }
    let config = settings.into_config().context("invalid configuration")?;

    let rpc = Arc::new(JsonRpcClient::new(config.rpc_http_url.clone()));
    let wallet: Arc<dyn WalletProvider> = Arc::new(NodeWalletProvider::new(Arc::clone(&rpc)));
    let sessions = Arc::new(WalletSessionManager::new(
        Arc::clone(&wallet),
        config.required_chain,
    ));
    let gateway: Arc<dyn client_core::ContractGateway> =
        Arc::new(EvmContractGateway::new(&config, rpc, wallet));
    let orchestrator = Orchestrator::new(config, sessions, gateway);

    let mut events = orchestrator.subscribe();

    let session = match orchestrator.connect_wallet().await {
        Ok(session) => session,
        Err(err) => return Ok(report_failure(&err.to_user_facing())),
    };
    println!("Wallet connected: {}", short_address(&session.address));

    match orchestrator.submit(&args.question, args.args).await {
        SubmitOutcome::Accepted => {}
        SubmitOutcome::EmptyQuestion => {
            eprintln!("the question text is empty");
            return Ok(ExitCode::FAILURE);
        }
        SubmitOutcome::NoSession => {
            eprintln!("no wallet session; connect a wallet first");
            return Ok(ExitCode::FAILURE);
        }
        SubmitOutcome::WrongNetwork { required, .. } => {
            eprintln!("the wallet is not on the required network (chain {required})");
            return Ok(ExitCode::FAILURE);
        }
        SubmitOutcome::Busy => {
            eprintln!("another request is already in flight");
            return Ok(ExitCode::FAILURE);
        }
        SubmitOutcome::Refused(failure) => return Ok(report_failure(&failure)),
    }

    let deadline = (args.wait_secs > 0)
        .then(|| tokio::time::Instant::now() + Duration::from_secs(args.wait_secs));
    loop {
        let event = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, events.recv()).await {
                Ok(event) => event,
                Err(_) => {
                    eprintln!(
                        "gave up after {}s; the analysis may still complete on-chain",
                        args.wait_secs
                    );
                    return Ok(ExitCode::FAILURE);
                }
            },
            None => events.recv().await,
        };
        match event {
            Ok(OrchestratorEvent::StageChanged(stage)) => {
                println!("[{}]", stage.label());
            }
            Ok(OrchestratorEvent::StillAnalyzing { waited }) => {
                println!("still analyzing ({}s elapsed)", waited.as_secs());
            }
            Ok(OrchestratorEvent::Completed { text, transaction }) => {
                println!();
                println!("Analysis result:");
                println!("{text}");
                println!();
                println!("tx: {} ({})", transaction.hash, transaction.explorer_url);
                return Ok(ExitCode::SUCCESS);
            }
            Ok(OrchestratorEvent::Failed(failure)) => return Ok(report_failure(&failure)),
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "missed orchestrator events");
            }
            Err(RecvError::Closed) => {
                anyhow::bail!("orchestrator event stream closed unexpectedly");
            }
        }
    }
}

fn report_failure(failure: &UserFacingFailure) -> ExitCode {
    eprintln!("{}", failure.message);
    if let Some(hint) = &failure.hint {
        eprintln!("hint: {hint}");
    }
    ExitCode::FAILURE
}
