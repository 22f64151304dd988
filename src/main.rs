use clap::Parser;
use implicit_als::services::serving::create_router;
use implicit_als::{init_tracing, AppState, Config};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve recommendations from a trained implicit ALS model", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Overrides `data.model_path`.
    #[arg(short, long)]
    model: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing();

    let mut config = if std::path::Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, using default configuration");
        Config::default()
    };
    if let Some(model) = args.model {
        config.data.model_path = model;
    }

    info!("Starting implicit ALS recommendation server with config: {:?}", config.server);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers.max(1))
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let addr = config.server.socket_addr()?;
        let state = AppState::load(config)?;
        let app = create_router(state);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Server listening on {}", addr);

        axum::serve(listener, app).await?;
        Ok::<(), anyhow::Error>(())
    })
}
