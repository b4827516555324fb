use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use log::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod blockchain;
mod config;

use blockchain::{
    BlockStore, InMemoryPool, Ledger, MemoryStore, SledPool, SledStore, TransactionPool,
};
use config::{Backend, Config};

// Build the ledger over the configured backend, creating genesis on an empty store
fn initialize_ledger(config: &Config) -> anyhow::Result<Ledger> {
    let (store, pool): (Box<dyn BlockStore>, Box<dyn TransactionPool>) =
        match config.storage.backend {
            Backend::Memory => {
                info!("Using in-memory storage");
                (Box::new(MemoryStore::new()), Box::new(InMemoryPool::new()))
            }
            Backend::Sled => {
                let path = &config.storage.path;
                std::fs::create_dir_all(path)
                    .with_context(|| format!("failed to create data directory {}", path))?;
                let store = SledStore::open(path)
                    .with_context(|| format!("failed to open sled database at {}", path))?;
                let pool = SledPool::new(store.db().clone());
                info!("Using sled storage at {}", path);
                (Box::new(store), Box::new(pool))
            }
        };

    let ledger = Ledger::new(
        config.ledger.name.clone(),
        config.ledger.difficulty,
        store,
        pool,
    )
    .with_mining_timeout(config.ledger.mining_timeout());

    ledger
        .resume_or_create()
        .context("failed to resume or create the chain")?;

    Ok(ledger)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::new_transaction,
        api::handlers::mine,
        api::handlers::cancel_mining,
        api::handlers::get_blocks,
        api::handlers::get_block,
        api::handlers::get_transactions,
        api::handlers::get_pending_transactions,
        api::handlers::validate_chain
    ),
    components(
        schemas(
            blockchain::Block,
            blockchain::Transaction,
            api::handlers::BlocksResponse,
            api::handlers::TransactionsResponse,
            api::handlers::MiningResponse,
            api::handlers::CancelResponse,
            api::handlers::ValidationResponse
        )
    ),
    tags(
        (name = "ledger", description = "Ledger API endpoints")
    ),
    info(
        title = "Ledger API",
        version = "1.0.0",
        description = "A single-writer proof-of-work ledger",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
struct ApiDoc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::load_default().context("failed to load configuration")?;
    let ledger = web::Data::new(initialize_ledger(&config)?);

    info!(
        "Starting HTTP server at http://{}:{} (difficulty {})",
        config.server.host,
        config.server.port,
        ledger.difficulty()
    );

    HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        let openapi = ApiDoc::openapi();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(ledger.clone())
            .configure(api::configure_routes)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    Ok(())
}
