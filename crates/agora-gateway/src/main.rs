use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use agora_agents::{AgentRegistry, ClockTool, Supervisor, SupervisorConfig, ToolRegistry};
use agora_gateway::{
    auth::{AuthClient, JwtVerifier},
    config::Config,
    health::{AuthServiceProbe, BreakerProbe, HealthChecker, LlmProviderProbe, MongoProbe},
    middleware::logging,
    resilience::CircuitBreaker,
    routes::{credits, health, stream, threads},
    state::AppState,
    ws,
};
use agora_llm::{CostTable, ModelRouter, ProviderConfig};
use agora_persist::PersistClient;

const HEALTH_FAILURE_THRESHOLD: u32 = 3;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&config);

    tracing::info!("Starting Agora gateway");
    tracing::info!("Config loaded: {}:{}", config.server.host, config.server.port);

    // Persistence
    tracing::info!("Connecting to MongoDB");
    let mongo = mongodb::Client::with_uri_str(&config.mongodb_uri).await?;
    let persist = Arc::new(PersistClient::with_client(
        &mongo,
        &config.mongodb.database,
        config.llm.max_context_tokens,
    ));
    tracing::info!("MongoDB connected");

    // Model routing and cost table
    let mut provider = ProviderConfig::openai("openai", config.openai_api_key.clone())
        .with_models(config.llm.models.clone());
    if let Some(base_url) = &config.llm.base_url {
        provider = provider.with_base_url(base_url);
    }

    let mut costs = CostTable::new();
    for (model, rate) in &config.llm.rates {
        costs = costs.with_rate(model, (*rate).into());
    }
    let models = Arc::new(ModelRouter::from_providers(
        &[provider],
        config.llm.default_model.clone(),
        costs,
    )?);
    for model in &config.llm.models {
        if models.costs().rate_for(model).is_none() {
            tracing::warn!(model, "no cost rate configured, runs on it are free");
        }
    }

    // Agents and tools
    let default_agent = config
        .agents
        .default_agent
        .clone()
        .ok_or_else(|| anyhow::anyhow!("agents.default_agent is required"))?;
    let mut registry = AgentRegistry::new(default_agent);
    for specialist in &config.agents.specialists {
        registry.register(specialist.clone());
    }

    let tools = ToolRegistry::new().with_tool(Arc::new(ClockTool));

    let supervisor_config = SupervisorConfig::new()
        .with_max_iterations(config.supervisor.max_iterations)
        .with_timeout(Duration::from_secs(config.supervisor.execution_timeout_secs));

    let supervisor = Arc::new(
        Supervisor::new(
            Arc::new(registry),
            Arc::clone(&models),
            Arc::new(tools),
            supervisor_config,
        )
        .with_persistence(Arc::clone(&persist)),
    );

    // Auth and resilience
    let verifier = JwtVerifier::new(&config.jwt_secret);
    let auth_client = AuthClient::new(config.auth_service_url.clone());
    let auth_breaker = Arc::new(CircuitBreaker::new(
        config.auth.breaker_failure_threshold,
        config.auth.breaker_success_threshold,
        config.auth.breaker_cooldown(),
    ));

    // Health probes
    let mut health_checker = HealthChecker::new(HEALTH_FAILURE_THRESHOLD)
        .with_probe(Arc::new(MongoProbe::new(
            mongo.clone(),
            config.mongodb.database.clone(),
        )))
        .with_probe(Arc::new(LlmProviderProbe::new(
            config
                .llm
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            config.openai_api_key.clone(),
        )))
        .with_probe(Arc::new(BreakerProbe::new(Arc::clone(&auth_breaker))));
    if !config.auth_service_url.is_empty() {
        health_checker.register(Arc::new(AuthServiceProbe::new(auth_client.clone())));
    }

    let state = Arc::new(AppState {
        config: Arc::new(config.clone()),
        persist,
        supervisor,
        ws: Arc::new(ws::WsManager::new()),
        verifier,
        auth_client,
        auth_breaker,
        health: Arc::new(health_checker),
    });

    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health
        .route("/health", get(health::health))
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .route("/health/detailed", get(health::detailed))
        // Threads
        .route("/threads", post(threads::create_thread))
        .route("/threads", get(threads::list_threads))
        .route("/threads/:thread_id", get(threads::get_thread))
        .route("/threads/:thread_id", delete(threads::delete_thread))
        // Messages
        .route("/threads/:thread_id/messages", get(threads::list_messages))
        .route("/threads/:thread_id/messages", post(stream::send_message_stream))
        // Credits
        .route("/credits", get(credits::get_credits))
        // WebSocket
        .route("/ws", get(ws::ws_upgrade));

    Router::new()
        .nest("/", api_routes)
        .layer(middleware::from_fn(logging::log_request))
        .layer(TimeoutLayer::new(Duration::from_secs(300))) // runs stream for minutes
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    if config.cors.enabled {
        let mut cors = CorsLayer::new()
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers(Any);

        if config.cors.origins.iter().any(|o| o == "*") {
            cors = cors.allow_origin(Any);
        } else {
            for origin in &config.cors.origins {
                if let Ok(parsed_origin) = origin.parse::<axum::http::HeaderValue>() {
                    cors = cors.allow_origin(parsed_origin);
                }
            }
        }

        cors
    } else {
        CorsLayer::permissive()
    }
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}
