//! Server construction: adapter wiring and HTTP app assembly.

mod config;

pub use config::{AppConfig, ConfigError};

use std::sync::Arc;

use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::SameSite;
use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use diesel::Connection as _;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

use backend::domain::ports::{AvailabilityCache, NoopCache};
use backend::domain::{
    AvailabilityService, BookingsService, ExpiryReclaimer, PaymentService, ReservationService,
    SettingsService, SlotAdminService, TokioSleeper,
};
use backend::inbound::http::health::{live, ready, HealthState};
use backend::inbound::http::state::HttpState;
use backend::inbound::http::{bookings, payments, settings, slots};
use backend::outbound::cache::RedisAvailabilityCache;
use backend::outbound::mail::LogTicketMailer;
use backend::outbound::paystack::{PaystackConfig, PaystackHttpGateway};
use backend::outbound::persistence::{
    DbPool, DieselBookingLedger, DieselSettingsStore, DieselSlotStore, PoolConfig,
};
use backend::RequestLog;
#[cfg(debug_assertions)]
use backend::ApiDoc;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Errors raised while wiring the application together.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// The database pool could not be built.
    #[error("database pool: {0}")]
    Pool(String),
    /// Migrations failed to apply.
    #[error("migrations: {0}")]
    Migrations(String),
    /// The cache backend could not be reached.
    #[error("cache: {0}")]
    Cache(String),
    /// The payment gateway client could not be constructed.
    #[error("payment gateway: {0}")]
    Gateway(String),
}

/// Everything `main` needs to run: handler state and the background worker.
pub struct Services {
    /// Dependency bundle for HTTP handlers.
    pub state: HttpState,
    /// The expiry sweep worker, ready to be spawned.
    pub reclaimer: ExpiryReclaimer,
}

/// Apply pending migrations on a blocking thread.
pub async fn run_migrations(database_url: String) -> Result<(), BootstrapError> {
    tokio::task::spawn_blocking(move || {
        let mut conn = diesel::PgConnection::establish(&database_url)
            .map_err(|err| BootstrapError::Migrations(err.to_string()))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|err| BootstrapError::Migrations(err.to_string()))?;
        Ok(())
    })
    .await
    .map_err(|err| BootstrapError::Migrations(err.to_string()))?
}

/// Wire adapters and domain services from configuration.
pub async fn build_services(config: &AppConfig) -> Result<Services, BootstrapError> {
    let pool = DbPool::new(PoolConfig::new(&config.database_url))
        .await
        .map_err(|err| BootstrapError::Pool(err.to_string()))?;

    let cache: Arc<dyn AvailabilityCache> = match &config.redis_url {
        Some(url) => Arc::new(
            RedisAvailabilityCache::connect(url)
                .await
                .map_err(|err| BootstrapError::Cache(err.to_string()))?,
        ),
        None => {
            info!("no REDIS_URL configured; availability caching disabled");
            Arc::new(NoopCache)
        }
    };

    let ledger = Arc::new(DieselBookingLedger::new(pool.clone()));
    let slot_store = Arc::new(DieselSlotStore::new(pool.clone()));
    let settings_store = Arc::new(DieselSettingsStore::new(pool));

    let mut gateway_config = PaystackConfig::new(
        config.paystack_base_url.clone(),
        config.paystack_secret_key.clone(),
    );
    if let Some(callback) = &config.payment_callback_url {
        gateway_config = gateway_config.with_callback_url(callback.clone());
    }
    let gateway = Arc::new(
        PaystackHttpGateway::new(gateway_config)
            .map_err(|err| BootstrapError::Gateway(err.to_string()))?,
    );

    let clock = Arc::new(mockable::DefaultClock);
    let mailer = Arc::new(LogTicketMailer);

    let settings = Arc::new(SettingsService::new(
        settings_store,
        slot_store.clone(),
        cache.clone(),
    ));
    let availability = Arc::new(AvailabilityService::new(
        settings.clone(),
        slot_store.clone(),
        cache.clone(),
    ));
    let payments = Arc::new(PaymentService::new(
        ledger.clone(),
        gateway,
        mailer,
        cache.clone(),
        clock.clone(),
    ));
    let reservations = Arc::new(ReservationService::with_hold_ttl(
        settings.clone(),
        ledger.clone(),
        cache.clone(),
        payments.clone(),
        clock.clone(),
        chrono::Duration::minutes(config.hold_ttl_minutes),
    ));
    let bookings_service = Arc::new(BookingsService::new(
        ledger.clone(),
        slot_store.clone(),
        cache.clone(),
    ));
    let slot_admin = Arc::new(SlotAdminService::new(
        slot_store,
        settings.clone(),
        cache.clone(),
    ));

    let reclaimer = ExpiryReclaimer::with_runtime(
        ledger,
        cache,
        clock,
        Arc::new(TokioSleeper),
        config.sweep_interval,
    );

    Ok(Services {
        state: HttpState {
            availability,
            reservations,
            payments,
            bookings: bookings_service,
            settings,
            slot_admin,
            webhook_secret: config.paystack_secret_key.clone(),
        },
        reclaimer,
    })
}

/// Build and start the HTTP server.
pub fn run_server(
    config: &AppConfig,
    state: HttpState,
    health: web::Data<HealthState>,
) -> std::io::Result<Server> {
    let session_key = config.session_key.clone();
    let cookie_secure = config.cookie_secure;
    let state = web::Data::new(state);

    let server = HttpServer::new(move || {
        let session = SessionMiddleware::builder(CookieSessionStore::default(), session_key.clone())
            .cookie_name("session".into())
            .cookie_path("/".into())
            .cookie_secure(cookie_secure)
            .cookie_http_only(true)
            .cookie_same_site(SameSite::Lax)
            .build();

        let api = web::scope("/api/v1")
            .wrap(session)
            .service(slots::get_slots)
            .service(slots::create_slot)
            .service(slots::update_slot)
            .service(slots::delete_slot)
            .service(bookings::create_booking)
            .service(bookings::initiate_payment)
            .service(bookings::cancel_bookings)
            .service(bookings::get_all_bookings)
            .service(bookings::get_user_bookings)
            .service(payments::verify_payment)
            .service(payments::payment_callback)
            .service(payments::payment_webhook)
            .service(settings::get_settings)
            .service(settings::update_settings)
            .service(settings::update_amount)
            .service(settings::toggle_time)
            .service(settings::add_template_time)
            .service(settings::remove_template_time);

        let app = App::new()
            .app_data(state.clone())
            .app_data(health.clone())
            .wrap(RequestLog)
            .service(api)
            .service(ready)
            .service(live);

        #[cfg(debug_assertions)]
        let app =
            app.service(SwaggerUi::new("/docs/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()));

        app
    })
    .bind(config.bind_addr)?;

    Ok(server.run())
}
