//! Patronpay server entrypoint.
//!
//! Wires the Postgres stores, the Redis lock, the signature verifier and
//! every provider handler into the webhook router, then serves the
//! ingestion endpoints.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use patronpay::adapters::http::{webhook_routes, HmacSignatureVerifier, WebhookAppState};
use patronpay::adapters::lock::RedisDistributedLock;
use patronpay::adapters::postgres::{
    PostgresActivityLog, PostgresPaymentStore, PostgresProfileStore, PostgresSubscriptionStore,
    PostgresUserDirectory, PostgresWebhookEventRepository,
};
use patronpay::application::handlers::paystack::{
    PaystackChargeHandler, PaystackDisputeHandler, PaystackRefundHandler,
    PaystackSubscriptionHandler, PaystackTransferHandler,
};
use patronpay::application::handlers::stripe::{
    AccountUpdatedHandler, ChargeRefundedHandler, CheckoutCompletedHandler, DisputeHandler,
    InvoiceFailedHandler, InvoicePaidHandler, PayoutSettlementHandler, SubscriptionDeletedHandler,
    SubscriptionUpdatedHandler,
};
use patronpay::application::{ProviderHandlerRegistry, WebhookRouter};
use patronpay::config::AppConfig;
use patronpay::domain::webhook::Provider;
use patronpay::ports::{
    ActivityLog, DistributedLock, PaymentStore, ProfileStore, SignatureVerifier,
    SubscriptionStore, UserDirectory, WebhookEventRepository,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone())),
        )
        .init();

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .idle_timeout(config.database.idle_timeout())
        .max_lifetime(config.database.max_lifetime())
        .connect(&config.database.url)
        .await?;

    if config.database.run_migrations {
        info!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
    }

    let redis_client = redis::Client::open(config.redis.url.as_str())?;
    let redis_conn = tokio::time::timeout(
        config.redis.connect_timeout(),
        redis_client.get_multiplexed_tokio_connection(),
    )
    .await
    .map_err(|_| "timed out connecting to the Redis lock backend")??;

    let subscriptions: Arc<dyn SubscriptionStore> =
        Arc::new(PostgresSubscriptionStore::new(pool.clone()));
    let payments: Arc<dyn PaymentStore> = Arc::new(PostgresPaymentStore::new(pool.clone()));
    let profiles: Arc<dyn ProfileStore> = Arc::new(PostgresProfileStore::new(pool.clone()));
    let activities: Arc<dyn ActivityLog> = Arc::new(PostgresActivityLog::new(pool.clone()));
    let users: Arc<dyn UserDirectory> = Arc::new(PostgresUserDirectory::new(pool.clone()));
    let events: Arc<dyn WebhookEventRepository> =
        Arc::new(PostgresWebhookEventRepository::new(pool.clone()));
    let lock: Arc<dyn DistributedLock> = Arc::new(RedisDistributedLock::new(redis_conn));

    let registry = ProviderHandlerRegistry::new()
        .register(
            Provider::Stripe,
            Arc::new(CheckoutCompletedHandler::new(
                subscriptions.clone(),
                profiles.clone(),
                users.clone(),
                lock.clone(),
            )),
        )
        .register(
            Provider::Stripe,
            Arc::new(InvoicePaidHandler::new(
                subscriptions.clone(),
                payments.clone(),
                profiles.clone(),
                activities.clone(),
                lock.clone(),
            )),
        )
        .register(
            Provider::Stripe,
            Arc::new(InvoiceFailedHandler::new(
                subscriptions.clone(),
                activities.clone(),
            )),
        )
        .register(
            Provider::Stripe,
            Arc::new(SubscriptionUpdatedHandler::new(subscriptions.clone())),
        )
        .register(
            Provider::Stripe,
            Arc::new(SubscriptionDeletedHandler::new(
                subscriptions.clone(),
                activities.clone(),
            )),
        )
        .register(
            Provider::Stripe,
            Arc::new(ChargeRefundedHandler::new(
                payments.clone(),
                subscriptions.clone(),
                activities.clone(),
            )),
        )
        .register(
            Provider::Stripe,
            Arc::new(DisputeHandler::new(
                payments.clone(),
                subscriptions.clone(),
                activities.clone(),
            )),
        )
        .register(
            Provider::Stripe,
            Arc::new(AccountUpdatedHandler::new(profiles.clone())),
        )
        .register(
            Provider::Stripe,
            Arc::new(PayoutSettlementHandler::new(
                payments.clone(),
                activities.clone(),
                lock.clone(),
            )),
        )
        .register(
            Provider::Paystack,
            Arc::new(PaystackChargeHandler::new(
                subscriptions.clone(),
                profiles.clone(),
                users.clone(),
                lock.clone(),
            )),
        )
        .register(
            Provider::Paystack,
            Arc::new(PaystackSubscriptionHandler::new(
                subscriptions.clone(),
                activities.clone(),
            )),
        )
        .register(
            Provider::Paystack,
            Arc::new(PaystackTransferHandler::new(
                payments.clone(),
                activities.clone(),
                lock.clone(),
            )),
        )
        .register(
            Provider::Paystack,
            Arc::new(PaystackRefundHandler::new(
                payments.clone(),
                subscriptions.clone(),
                activities.clone(),
            )),
        )
        .register(
            Provider::Paystack,
            Arc::new(PaystackDisputeHandler::new(
                payments.clone(),
                subscriptions.clone(),
                activities.clone(),
            )),
        );

    let router = Arc::new(WebhookRouter::new(events, Arc::new(registry)));
    let verifier: Arc<dyn SignatureVerifier> = Arc::new(HmacSignatureVerifier::new(
        config.payment.stripe_webhook_secret.clone(),
        config.payment.paystack_secret_key.clone(),
    ));
    let state = WebhookAppState::new(verifier, router);

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest("/webhooks", webhook_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.server.socket_addr();
    info!(%addr, test_mode = config.payment.is_test_mode(), "starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
