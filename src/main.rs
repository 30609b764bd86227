use alloy::primitives::hex;
use alloy::signers::local::PrivateKeySigner;
use arb_core::{BotConfig, BotError};
use arb_engine::{ArbEngine, TxSubmitter};
use arb_registry::PoolRegistry;
use arb_sync::{
    BlockHandler, BootstrapLoader, ExecutorClient, HeadStream, ProviderManager, TelegramNotifier,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ENV_FILE points at the env file to load; fall back to ./.env.
    match std::env::var("ENV_FILE") {
        Ok(path) if !path.is_empty() => {
            if dotenvy::from_path(&path).is_err() {
                eprintln!("Error loading env file: {path}");
                std::process::exit(1);
            }
        }
        _ => {
            dotenvy::dotenv().ok();
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("arbitrage engine starting");

    let config = match BotConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let signer: PrivateKeySigner = match config.priv_key.parse() {
        Ok(signer) => signer,
        Err(e) => {
            error!(error = %BotError::InvalidKey(format!("{e}")), "failed to parse PRIV_KEY");
            std::process::exit(1);
        }
    };

    let provider = match ProviderManager::new(&config) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            error!(error = %e, "failed to construct RPC clients");
            std::process::exit(1);
        }
    };

    let chain_id = match provider.chain_id().await {
        Ok(chain_id) => chain_id,
        Err(e) => {
            error!(error = %e, "primary RPC unreachable");
            std::process::exit(1);
        }
    };
    info!(chain_id, signer = %signer.address(), "connected");

    let registry = match PoolRegistry::load(&config.state_path) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            error!(error = %e, path = %config.state_path.display(), "failed to load pool snapshot");
            std::process::exit(1);
        }
    };

    let executor = match bind_or_deploy(&config, Arc::clone(&provider), &signer, chain_id).await {
        Ok(executor) => Arc::new(executor),
        Err(e) => {
            error!(error = %e, "failed to bind executor contract");
            std::process::exit(1);
        }
    };
    info!(executor = %executor.address(), "executor contract bound");

    // Shutdown wiring: SIGINT/SIGTERM set the flag (observed by long inner
    // loops) and interrupt the run loop through the broadcast channel.
    let shutdown = Arc::new(AtomicBool::new(false));
    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
    {
        let shutdown = Arc::clone(&shutdown);
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            info!("shutdown signal received");
            shutdown.store(true, Ordering::SeqCst);
            shutdown_tx.send(()).ok();
        });
    }

    let bootstrap = BootstrapLoader::new(
        Arc::clone(&provider),
        Arc::clone(&executor),
        Arc::clone(&registry),
        Arc::clone(&shutdown),
        config.state_path.clone(),
    );
    let handler = BlockHandler::new(
        Arc::clone(&provider),
        Arc::clone(&executor),
        Arc::clone(&registry),
        config.state_path.clone(),
    );
    let submitter = TxSubmitter::new(Arc::clone(&provider), executor.address(), signer, chain_id);
    let notifier = TelegramNotifier::from_config(&config.telegram);
    if notifier.is_none() {
        warn!("telegram credentials not set, trade notifications disabled");
    }
    let engine = ArbEngine::new(Arc::clone(&registry), Arc::clone(&executor), submitter, notifier);

    let exit = run_loop(&bootstrap, &handler, &engine, &provider, &shutdown, &mut shutdown_rx).await;

    // One last snapshot on the way out, whatever the reason.
    if let Err(e) = registry.snapshot(&config.state_path).await {
        warn!(error = %e, "final snapshot failed");
    }

    match exit {
        Ok(()) => {
            info!("shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "fatal error");
            std::process::exit(1);
        }
    }
}

/// Bind to the configured executor contract, or deploy a fresh one from the
/// creation bytecode artifact when no address is configured.
async fn bind_or_deploy(
    config: &BotConfig,
    provider: Arc<ProviderManager>,
    signer: &PrivateKeySigner,
    chain_id: u64,
) -> arb_core::Result<ExecutorClient> {
    if let Some(address) = config.mev_address {
        return Ok(ExecutorClient::new(provider, address));
    }
    let raw = std::fs::read_to_string(&config.mev_bytecode_path).map_err(|_| {
        BotError::Config(format!(
            "MEV_ADDRESS is empty and no executor bytecode found at {}",
            config.mev_bytecode_path.display()
        ))
    })?;
    let bytecode = hex::decode(raw.trim())
        .map_err(|e| BotError::Config(format!("executor bytecode is not valid hex: {e}")))?;
    ExecutorClient::deploy(provider, signer, chain_id, bytecode).await
}

/// The full engine lifecycle. Connection resets and i/o timeouts on the head
/// subscription restart the whole cycle (re-bootstrap, re-subscribe); any
/// other error is fatal.
async fn run_loop(
    bootstrap: &BootstrapLoader,
    handler: &BlockHandler,
    engine: &ArbEngine,
    provider: &ProviderManager,
    shutdown: &AtomicBool,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> arb_core::Result<()> {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            return Ok(());
        }

        bootstrap.run().await?;
        if shutdown.load(Ordering::Relaxed) {
            return Ok(());
        }

        let mut heads = match HeadStream::connect(provider.ws_url()).await {
            Ok(heads) => heads,
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "head subscription failed, restarting");
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                continue;
            }
            Err(e) => return Err(e),
        };

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => return Ok(()),

                head = heads.next() => match head {
                    Ok(head) => {
                        let outcome = handler.process_block(&head).await?;
                        engine.run_block(&outcome).await?;
                    }
                    Err(e) if e.is_recoverable() => {
                        warn!(error = %e, "head subscription dropped, re-bootstrapping");
                        break;
                    }
                    Err(e) => return Err(e),
                },
            }
        }
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(_) => {
                tokio::signal::ctrl_c().await.ok();
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}
