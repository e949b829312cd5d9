// src/main.rs — Tripwise entry point

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use tripwise::api::{self, ApiState};
use tripwise::cli::{Cli, Commands};
use tripwise::context::attractions::GeoapifyClient;
use tripwise::context::countries::RestCountriesClient;
use tripwise::context::location::ChainLocationExtractor;
use tripwise::context::weather::OpenWeatherClient;
use tripwise::context::{ContextAggregator, EnrichmentPolicy};
use tripwise::core::{ControllerSettings, CorrectionController};
use tripwise::infra::config::Config;
use tripwise::infra::{logger, paths};
use tripwise::intent::IntentGate;
use tripwise::judge::ResponseJudge;
use tripwise::provider::{resolver, Generator, ModelProvider, ModelRef};
use tripwise::session::{spawn_store_server, StoreHandle, TtlPolicy, TurnStore};

const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config (falls back to defaults if no config.toml)
    let mut config = match cli.config.as_deref() {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    logger::init_logging(&config.server.log_level);
    paths::ensure_dirs().await?;

    let command = cli.command();
    if let Commands::Serve { host, port } = &command {
        if let Some(host) = host {
            config.server.host = host.clone();
        }
        if let Some(port) = port {
            config.server.port = *port;
        }
    }

    let db_path = config.session.db_path();
    let turn_store = TurnStore::open(&db_path, TtlPolicy::from_config(&config.session))?;
    tracing::info!(path = %db_path.display(), "Opened conversation store");
    let (store, _store_task) = spawn_store_server(turn_store);

    let controller = Arc::new(build_controller(&config, store.clone())?);

    match command {
        Commands::Serve { .. } => {
            spawn_sweeper(store);
            api::start_server(&config.server, ApiState::new(controller)).await
        }
        Commands::Ask {
            user,
            session,
            message,
        } => {
            let message = message.join(" ");
            let exchange = controller
                .handle(&user, session.as_deref(), &message)
                .await?;
            println!("{}", exchange.reply());
            Ok(())
        }
    }
}

fn build_controller(config: &Config, store: StoreHandle) -> anyhow::Result<CorrectionController> {
    let chat_ref = resolver::parse_model(&config.models.chat)?;
    let chat_provider = resolver::resolve(&chat_ref, &config.models)?;
    let generator = Generator::from_config(
        chat_provider.clone(),
        chat_ref.model.clone(),
        &config.models,
        &config.timeouts,
    );
    let judge_generator = generator.clone().with_timeout(config.timeouts.judge());

    let intents = Arc::new(build_intent_gate(config, &chat_ref, chat_provider)?);
    warm_up(intents.clone());

    let locator = ChainLocationExtractor::standard(
        config
            .context
            .llm_location_fallback
            .then(|| generator.clone()),
    );
    let aggregator = ContextAggregator::new(
        Arc::new(locator),
        Arc::new(OpenWeatherClient::from_env()),
        Arc::new(RestCountriesClient::new()),
        Arc::new(GeoapifyClient::from_env()),
    )
    .with_policy(EnrichmentPolicy::from_config(&config.context)?)
    .with_attraction_limit(config.context.attraction_limit)
    .with_lookup_timeout(config.timeouts.lookup());

    Ok(CorrectionController::new(
        Arc::new(store),
        intents,
        Arc::new(aggregator),
        ResponseJudge::new(judge_generator),
        generator,
    )
    .with_settings(ControllerSettings::from(config)))
}

/// The embedder falls back to the chat provider when its own key is missing;
/// if that cannot embed either, every message classifies as `other`.
fn build_intent_gate(
    config: &Config,
    chat_ref: &ModelRef,
    chat_provider: Arc<dyn ModelProvider>,
) -> anyhow::Result<IntentGate> {
    let embed_ref = resolver::parse_model(&config.models.embedder)?;
    let (embedder, used) =
        resolver::resolve_embedder(&embed_ref, &config.models, chat_ref, chat_provider);
    Ok(IntentGate::new(
        embedder,
        used.to_string(),
        &config.intent,
        &config.timeouts,
    ))
}

fn warm_up(intents: Arc<IntentGate>) {
    tokio::spawn(async move {
        match intents.warm_up().await {
            Ok(_) => tracing::info!("Intent gate ready"),
            Err(e) => tracing::warn!("Intent gate warm-up failed, requests retry after the cooldown: {e}"),
        }
    });
}

fn spawn_sweeper(store: StoreHandle) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tick.tick().await;
            match store.sweep_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "Swept expired conversations"),
                Err(e) => tracing::warn!("Expired-session sweep failed: {e}"),
            }
        }
    });
}
