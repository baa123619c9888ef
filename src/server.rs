use crate::config::Config;
use crate::logging::LogWriter;
use crate::{routes, state};
use std::sync::Arc;
use tokio::{net::TcpListener, signal, task::JoinSet};
use tokio_util::sync::CancellationToken;

pub struct ServerArgs {
    pub logs: Option<Arc<LogWriter>>,
    pub config: Config,
}

/// Serve until Ctrl+C or SIGTERM, then let in-flight requests finish.
pub async fn run_until_done(args: ServerArgs, bind: TcpListener) -> anyhow::Result<()> {
    let mut signals: JoinSet<anyhow::Result<()>> = JoinSet::new();
    let shutdown_signal = CancellationToken::new();
    // axum serve
    let mut server = {
        let shutdown_signal = shutdown_signal.clone();
        let routes = routes::build(&args.config).with_state(state::AppState::new(args.config));
        tokio::spawn(async move {
            axum::serve(bind, routes.into_make_service())
                .with_graceful_shutdown(async move {
                    shutdown_signal.cancelled().await;
                })
                .await?;
            Ok::<_, anyhow::Error>(())
        })
    };
    // register ctrl+c signal
    signals.spawn(async move {
        signal::ctrl_c().await?;
        tracing::info!("Received Ctrl+C, shutting down...");
        Ok(())
    });
    // SIGTERM stops the server, SIGUSR1 reopens the log file after rotation
    #[cfg(unix)]
    {
        let logs = args.logs.clone();
        signals.spawn(async move {
            let mut usr1 = signal::unix::signal(signal::unix::SignalKind::user_defined1())?;
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
            loop {
                tokio::select! {
                    _ = sigterm.recv() => {
                        tracing::info!("Received SIGTERM, shutting down...");
                        return Ok(());
                    }
                    _ = usr1.recv() => {
                        let Some(logs) = logs.as_ref() else {
                            continue;
                        };
                        match logs.reopen() {
                            Ok(_) => tracing::info!("Reopening log file {:?}", logs.path()),
                            Err(err) => eprintln!("Failed to reopen log file: {err:?}"),
                        }
                    }
                }
            }
        });
    }
    tokio::select! {
        r = &mut server => {
            signals.shutdown().await;
            return r?;
        }
        Some(r) = signals.join_next() => {
            r??;
        }
    }
    shutdown_signal.cancel();
    signals.shutdown().await;
    server.await??;
    tracing::info!("Shutting down...");
    if let Some(logs) = args.logs.as_ref() {
        if let Err(err) = logs.shutdown().await {
            eprintln!("Failed to close log file: {err:?}");
        }
    }
    Ok(())
}
