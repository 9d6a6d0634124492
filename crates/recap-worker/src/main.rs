//! Recap pipeline worker binary.

use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use recap_worker::pipeline::{self, context::PipelineContext};
use recap_worker::RecapConfig;

const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive("recap=info".parse().unwrap()))
        .init();

    info!("Starting recap-worker");

    let config = match RecapConfig::load() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };
    let max_concurrent_jobs = config.max_concurrent_jobs;

    let ctx = match PipelineContext::new(config).await {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to build pipeline context");
            std::process::exit(1);
        }
    };

    // Setup signal handlers
    let shutdown_handle = tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
    });

    run_job_loop(ctx, max_concurrent_jobs, &shutdown_handle).await;

    shutdown_handle.abort();
    info!("Worker shutdown complete");
}

/// Poll the priority then default queue for job ids, running up to
/// `max_concurrent_jobs` pipeline runs concurrently. Sleeps briefly when the
/// queue is empty rather than busy-polling Redis.
async fn run_job_loop(ctx: PipelineContext, max_concurrent_jobs: usize, shutdown: &tokio::task::JoinHandle<()>) {
    let mut inflight = tokio::task::JoinSet::new();

    loop {
        if shutdown.is_finished() && inflight.is_empty() {
            break;
        }

        while inflight.len() < max_concurrent_jobs.max(1) {
            match ctx.jobs.get_next_job().await {
                Ok(Some(job_id)) => match ctx.jobs.get_job(&job_id).await {
                    Ok(Some(job)) => {
                        let ctx = ctx.clone();
                        inflight.spawn(async move { pipeline::run_job(&ctx, job).await });
                    }
                    Ok(None) => error!(job_id = %job_id, "job id popped from queue but job record is missing"),
                    Err(e) => error!(job_id = %job_id, error = %e, "failed to load job"),
                },
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "failed to pop next job");
                    break;
                }
            }
        }

        if inflight.is_empty() {
            if shutdown.is_finished() {
                break;
            }
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
        } else {
            tokio::select! {
                _ = inflight.join_next() => {}
                _ = tokio::time::sleep(IDLE_POLL_INTERVAL) => {}
            }
        }
    }

    while inflight.join_next().await.is_some() {}
}
