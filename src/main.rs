/// ORGiD Validator - JWT and ORGiD resolution service
use anyhow::Context;
use orgid_validator::{config::ServerConfig, server, AppContext};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = ServerConfig::from_env().context("Failed to load configuration")?;

    init_logging(&config);
    install_panic_hook();

    print_banner();

    let ctx = AppContext::new(config).context("Failed to initialise application")?;

    server::serve(ctx).await.context("Server terminated with error")?;

    Ok(())
}

/// `RUST_LOG` wins over `LOG_LEVEL`
fn init_logging(config: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "orgid_validator={level},tower_http={level}",
            level = config.logging.level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Panics are fatal, also inside request tasks
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("Unrecoverable error, exiting: {}", info);
        default_hook(info);
        std::process::exit(1);
    }));
}

fn print_banner() {
    println!(
        r#"
   ____  ____   ____ _ ____     __     __    _ _     _       _
  / __ \|  _ \ / ___(_)  _ \    \ \   / /_ _| (_) __| | __ _| |_ ___  _ __
 | |  | | |_) | |  _| | | | |    \ \ / / _` | | |/ _` |/ _` | __/ _ \| '__|
 | |__| |  _ <| |_| | | |_| |     \ V / (_| | | | (_| | (_| | || (_) | |
  \____/|_| \_\\____|_|____/       \_/ \__,_|_|_|\__,_|\__,_|\__\___/|_|

        JWT & ORGiD resolution service v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
