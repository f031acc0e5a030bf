use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use poem::{Route, Server, listener::TcpListener};
use poem_openapi::OpenApiService;
use sqlx::postgres::PgPoolOptions;

use campaigns::{
    application::{
        handlers::{
            dispatch_worker::{DispatchHandler, DispatchWorkerConfig},
            reconciler::DeliveryReconciler,
        },
        services::{
            clock::{Clock, SystemClock},
            gateway::ProviderGateway,
            queue::DispatchQueue,
        },
        usecases::{
            campaign_stats::CampaignStatsUseCase, list_records::ListRecordsUseCase,
            provider_status::ProviderStatusUseCase, submit_campaign::SubmitCampaignUseCase,
        },
    },
    config::Config,
    domain::repositories::MessageRecordRepository,
    infrastructure::{
        providers::{sendgrid::SendgridClient, smtp::SmtpClient},
        queue::{QueueRunner, in_process::InProcessQueue, jetstream::JetstreamQueue},
        rendering::PlaceholderRenderer,
        repositories::{
            in_memory::InMemoryMessageRecordRepository, postgres::PostgresMessageRecordRepository,
        },
    },
    presentation::http::endpoints::{
        campaigns::CampaignsEndpoints, health::HealthEndpoints, providers::ProvidersEndpoints,
        root::ApiState, webhooks::WebhookEndpoints,
    },
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::try_parse().map_err(anyhow::Error::msg)?;
    telemetry::init_tracing();

    let records: Arc<dyn MessageRecordRepository> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(8)
                .connect(url)
                .await
                .context("failed to connect to postgres")?;
            sqlx::migrate!()
                .run(&pool)
                .await
                .context("failed to run migrations")?;
            Arc::new(PostgresMessageRecordRepository::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory record store");
            Arc::new(InMemoryMessageRecordRepository::new())
        }
    };

    let gateway = ProviderGateway::new(vec![
        SendgridClient::new(config.sendgrid.clone())?,
        SmtpClient::gmail(config.gmail.clone())?,
        SmtpClient::outlook(config.outlook.clone())?,
    ]);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let (queue, runner) = match &config.nats_url {
        Some(url) => {
            let (queue, runner) = JetstreamQueue::new(&config.jetstream(url))
                .await
                .context("failed to connect to jetstream")?;
            (
                queue as Arc<dyn DispatchQueue>,
                QueueRunner::Jetstream(runner),
            )
        }
        None => {
            tracing::warn!("NATS_URL not set, using the in-process queue");
            let (queue, runner) = InProcessQueue::new(config.queue_concurrency);
            (
                queue as Arc<dyn DispatchQueue>,
                QueueRunner::InProcess(runner),
            )
        }
    };

    let handler = Arc::new(DispatchHandler::new(
        records.clone(),
        gateway.clone(),
        queue.clone(),
        clock.clone(),
        DispatchWorkerConfig {
            send_timeout: Duration::from_secs(config.send_timeout_seconds),
        },
    ));
    let worker_handles = runner.spawn(handler);

    let state = Arc::new(ApiState {
        submit_campaign_usecase: Arc::new(SubmitCampaignUseCase::new(
            records.clone(),
            queue,
            Arc::new(PlaceholderRenderer),
            clock.clone(),
        )),
        list_records_usecase: Arc::new(ListRecordsUseCase::new(records.clone())),
        campaign_stats_usecase: Arc::new(CampaignStatsUseCase::new(records.clone())),
        provider_status_usecase: Arc::new(ProviderStatusUseCase::new(gateway)),
        reconciler: Arc::new(DeliveryReconciler::new(records, clock)),
    });

    let server_url = format!("{}://{}:{}", config.scheme, config.host, config.port);
    tracing::info!("starting server at {server_url}");

    let api_service = OpenApiService::new(
        (
            HealthEndpoints,
            CampaignsEndpoints::new(state.clone()),
            ProvidersEndpoints::new(state.clone()),
            WebhookEndpoints::new(state.clone()),
        ),
        "Campaign Dispatch API",
        "0.1.0",
    )
    .server(format!("{server_url}/api"));
    let ui = api_service.swagger_ui();
    let app = Route::new().nest("/api", api_service).nest("/", ui);

    Server::new(TcpListener::bind(format!("{}:{}", config.host, config.port)))
        .run_with_graceful_shutdown(app, shutdown_signal(), Some(Duration::from_secs(5)))
        .await?;

    for handle in worker_handles {
        handle.abort();
    }
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
