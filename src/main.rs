use std::{future::IntoFuture, process, sync::Arc};

use carta::{
    application::{
        dishes::DishService,
        error::AppError,
        full_menu::FullMenuService,
        menus::MenuService,
        repos::{
            DishesRepo, DishesWriteRepo, MenuTreeRepo, MenusRepo, MenusWriteRepo, SubmenusRepo,
            SubmenusWriteRepo,
        },
        submenus::SubmenuService,
        sync::{SyncJob, SyncJobConfig},
    },
    cache::{
        CacheBackend, CacheConfig, CacheConsumer, CacheStore, CacheTrigger, EventQueue,
        MemoryBackend, RedisBackend,
    },
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState},
        telemetry,
    },
};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
        config::Command::SyncOnce(_) => run_sync_once(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let cache_trigger = build_cache(&settings).await;
    let services = Services::build(&repositories, cache_trigger.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    let consumer_handle = cache_trigger
        .as_ref()
        .map(|trigger| tokio::spawn(trigger.consumer().clone().run(shutdown_rx.clone())));

    let sync_handle = if settings.sync.enabled {
        let job = services.sync_job(&repositories, &settings.sync);
        Some(tokio::spawn(job.run_forever(shutdown_rx.clone())))
    } else {
        None
    };

    let state = ApiState {
        menus: Arc::new(services.menus),
        submenus: Arc::new(services.submenus),
        dishes: Arc::new(services.dishes),
        full_menu: Arc::new(services.full_menu),
        health: repositories.clone(),
    };

    let result = serve_http(&settings, state, shutdown_tx.clone(), shutdown_rx).await;

    let _ = shutdown_tx.send(true);
    join_background("sync", sync_handle).await;
    join_background("cache consumer", consumer_handle).await;

    result
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    init_repositories(&settings).await?;
    info!(target = "carta::migrate", "Migrations applied");
    Ok(())
}

async fn run_sync_once(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let cache_trigger = build_cache(&settings).await;
    let services = Services::build(&repositories, cache_trigger.clone());
    let job = services.sync_job(&repositories, &settings.sync);

    info!(
        target = "carta::sync",
        file = %job.file().display(),
        "Starting single sync pass"
    );

    let report = job
        .run_once()
        .await
        .map_err(|err| AppError::unexpected(format!("menu sync failed: {err}")))?;

    if let Some(trigger) = &cache_trigger {
        trigger.flush().await;
    }

    info!(
        target = "carta::sync",
        created = report.created,
        updated = report.updated,
        deleted = report.deleted,
        "Sync pass completed"
    );
    Ok(())
}

struct Services {
    menus: MenuService,
    submenus: SubmenuService,
    dishes: DishService,
    full_menu: FullMenuService,
}

impl Services {
    fn build(
        repositories: &Arc<PostgresRepositories>,
        cache_trigger: Option<Arc<CacheTrigger>>,
    ) -> Self {
        let menus_repo: Arc<dyn MenusRepo> = repositories.clone();
        let menus_write_repo: Arc<dyn MenusWriteRepo> = repositories.clone();
        let submenus_repo: Arc<dyn SubmenusRepo> = repositories.clone();
        let submenus_write_repo: Arc<dyn SubmenusWriteRepo> = repositories.clone();
        let dishes_repo: Arc<dyn DishesRepo> = repositories.clone();
        let dishes_write_repo: Arc<dyn DishesWriteRepo> = repositories.clone();
        let tree_repo: Arc<dyn MenuTreeRepo> = repositories.clone();

        Self {
            menus: MenuService::new(menus_repo.clone(), menus_write_repo)
                .with_cache_trigger_opt(cache_trigger.clone()),
            submenus: SubmenuService::new(menus_repo, submenus_repo.clone(), submenus_write_repo)
                .with_cache_trigger_opt(cache_trigger.clone()),
            dishes: DishService::new(submenus_repo, dishes_repo, dishes_write_repo)
                .with_cache_trigger_opt(cache_trigger.clone()),
            full_menu: FullMenuService::new(tree_repo).with_cache_trigger_opt(cache_trigger),
        }
    }

    fn sync_job(
        &self,
        repositories: &Arc<PostgresRepositories>,
        settings: &config::SyncSettings,
    ) -> SyncJob {
        let tree_repo: Arc<dyn MenuTreeRepo> = repositories.clone();
        SyncJob::new(
            SyncJobConfig {
                file: settings.file.clone(),
                interval: settings.interval,
                retry_delay: settings.retry_delay,
            },
            tree_repo,
            self.menus.clone(),
            self.submenus.clone(),
            self.dishes.clone(),
        )
    }
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

/// Build the cache stack. An unreachable Redis degrades to the in-process
/// backend rather than failing startup.
async fn build_cache(settings: &config::Settings) -> Option<Arc<CacheTrigger>> {
    let cache_config = CacheConfig::from(&settings.cache);
    if !cache_config.is_enabled() {
        info!(target = "carta::cache", "Cache disabled");
        return None;
    }

    let backend: Arc<dyn CacheBackend> = match cache_config.url.as_deref() {
        Some(url) => match RedisBackend::connect(url).await {
            Ok(redis) => Arc::new(redis),
            Err(err) => {
                warn!(
                    target = "carta::cache",
                    error = %err,
                    "Redis unavailable; falling back to the in-process cache"
                );
                Arc::new(MemoryBackend::new(&cache_config))
            }
        },
        None => Arc::new(MemoryBackend::new(&cache_config)),
    };

    let store = Arc::new(CacheStore::new(backend, &cache_config));
    info!(
        target = "carta::cache",
        backend = store.backend_name(),
        ttl_secs = cache_config.ttl().as_secs(),
        "Cache ready"
    );

    let queue = Arc::new(EventQueue::new());
    let consumer = Arc::new(CacheConsumer::new(
        cache_config.clone(),
        store,
        queue.clone(),
    ));
    Some(Arc::new(CacheTrigger::new(cache_config, queue, consumer)))
}

async fn serve_http(
    settings: &config::Settings,
    state: ApiState,
    shutdown_tx: Arc<watch::Sender<bool>>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(target = "carta::http", addr = %settings.server.addr, "Listening");

    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .into_future();

    let grace = settings.server.graceful_shutdown;
    let deadline = async move {
        let _ = shutdown_rx.wait_for(|stop| *stop).await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::from(InfraError::from(err)))?;
        }
        _ = deadline => {
            warn!(
                target = "carta::http",
                grace_secs = grace.as_secs(),
                "Graceful shutdown timed out; closing remaining connections"
            );
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!(target = "carta::http", "Shutdown requested");
}

async fn join_background(name: &'static str, handle: Option<JoinHandle<()>>) {
    if let Some(handle) = handle
        && let Err(err) = handle.await
    {
        warn!(task = name, error = %err, "background task ended abnormally");
    }
}
