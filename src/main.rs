mod config;

use clap::Parser as _;
use config::{Command, Config, ServeArgs, SubmitArgs};
use std::process::ExitCode;
use summarelay::{
    AppState, build_metrics_layer_and_handle, build_metrics_router, build_router,
    client::{PoolSettings, create_hyper_client},
    form::{FormHandler, LoadingIndicator, Rendered, RelayApi, SelectedFile, Submission},
};
use tokio::net::TcpListener;
use tracing::{debug, info, instrument};

#[tokio::main]
#[instrument]
pub async fn main() -> anyhow::Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse().validate()?;

    match config.command {
        Some(Command::Submit(args)) => submit(args).await,
        None => serve(config.serve).await.map(|()| ExitCode::SUCCESS),
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    info!("Starting summary relay with config: {:?}", args);

    let app_state = AppState::new(args.upstream(), args.static_root.clone(), args.pool());
    let mut router = build_router(app_state);

    if args.metrics {
        let (prometheus_layer, handle) = build_metrics_layer_and_handle(args.metrics_prefix.clone());
        router = router.layer(prometheus_layer);

        let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
        let metrics_listener = TcpListener::bind(&metrics_addr).await?;
        info!("Metrics listening on {}", metrics_addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(metrics_listener, build_metrics_router(handle)).await {
                tracing::error!("Metrics server stopped: {}", e);
            }
        });
    }

    let bind_addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Summary relay listening on http://{}", bind_addr);

    axum::serve(listener, router).await?;

    Ok(())
}

/// Logs progress instead of drawing a spinner.
struct LogIndicator;

impl LoadingIndicator for LogIndicator {
    fn show(&self) {
        info!("Summarizing...");
    }

    fn hide(&self) {
        debug!("Done");
    }
}

async fn submit(args: SubmitArgs) -> anyhow::Result<ExitCode> {
    let form_config = args.form_config().await?;
    let api = RelayApi::new(create_hyper_client(PoolSettings::default()), &args.server)?;
    info!("Submitting to {}", api.endpoint());

    let handler = FormHandler::new(form_config, api, LogIndicator);
    let file = args
        .file
        .map(|path| SelectedFile::from_path(path, args.mime_type));
    let rendered = handler
        .submit(Submission {
            apikey: args.apikey,
            file,
        })
        .await;

    Ok(match rendered {
        Rendered::Summary(summary) => {
            println!("{summary}");
            ExitCode::SUCCESS
        }
        Rendered::Error(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
        Rendered::Busy => ExitCode::FAILURE,
    })
}
