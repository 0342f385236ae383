use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use gate_engine::{CachedStore, SlidingWindowLimiter, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    middleware::CorsMiddlewareFactory,
    pipeline::Gatekeeper,
    routes::{
        health,
        AccountProfileRoute,
        BrandEventsRoute,
        BrandStatusRoute,
        CashbackSummaryRoute,
        CreateBrandRoute,
        GrooveWalletRoute,
        PlaceBetRoute,
        RequestWithdrawalRoute,
        WhoamiRoute,
    },
};

/// The store the production server runs against: SQLite behind the TTL cache.
pub type ServerStore = CachedStore<SqliteDatabase>;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(format!("Migrations failed. {e}")))?;
    let store = Arc::new(CachedStore::new(db, config.gatekeeper.cache_ttl));
    let gatekeeper = Gatekeeper::new(store, &config.auth, &config.gatekeeper).with_proxy(config.proxy);
    let _sweeper = start_sweeper(gatekeeper.limiters(), Arc::clone(gatekeeper.store()), SWEEP_INTERVAL);
    let srv = create_server_instance(config, web::Data::new(gatekeeper))?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    gatekeeper: web::Data<Gatekeeper<ServerStore>>,
) -> Result<Server, ServerError> {
    // Policies are validated once, here, so that a bad declaration stops the server from starting
    let whoami = WhoamiRoute::<ServerStore>::new()?;
    let account_profile = AccountProfileRoute::<ServerStore>::new()?;
    let create_brand = CreateBrandRoute::<ServerStore>::new()?;
    let cashback_summary = CashbackSummaryRoute::<ServerStore>::new()?;
    let place_bet = PlaceBetRoute::<ServerStore>::new()?;
    let request_withdrawal = RequestWithdrawalRoute::<ServerStore>::new()?;
    let brand_events = BrandEventsRoute::<ServerStore>::new()?;
    let brand_status = BrandStatusRoute::<ServerStore>::new()?;
    let groove_wallet = GrooveWalletRoute::<ServerStore>::new()?;
    let cors_origins = config.cors_origins.clone();
    let srv = HttpServer::new(move || {
        let api_scope = web::scope("/api")
            .service(whoami.clone())
            .service(account_profile.clone())
            .service(create_brand.clone())
            .service(cashback_summary.clone())
            .service(place_bet.clone())
            .service(request_withdrawal.clone())
            .service(brand_events.clone())
            .service(brand_status.clone())
            .service(groove_wallet.clone());
        App::new()
            .wrap(CorsMiddlewareFactory::new(cors_origins.clone()))
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("gate::access_log"))
            .app_data(gatekeeper.clone())
            .service(health)
            .service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    info!("🚀️ Gatekeeper listening on {}:{}", config.host, config.port);
    Ok(srv)
}

/// Periodically drops rate limit keys whose windows have emptied, and lookup cache entries that have outlived their
/// TTL. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_sweeper<B>(
    limiters: Vec<Arc<SlidingWindowLimiter>>,
    cache: Arc<CachedStore<B>>,
    every: Duration,
) -> JoinHandle<()>
where
    B: Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(every);
        info!("🚦️ Rate limit and cache sweeper started");
        loop {
            timer.tick().await;
            let now = std::time::Instant::now();
            for limiter in &limiters {
                let purged = limiter.purge_expired(now);
                if purged > 0 {
                    debug!("🚦️ Dropped {purged} idle keys from the {} limiter", limiter.name());
                }
            }
            let purged = cache.purge_expired(now);
            if purged > 0 {
                debug!("🗃️ Dropped {purged} expired lookup cache entries");
            }
        }
    })
}
