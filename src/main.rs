use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use axum_server::tls_rustls::RustlsConfig;
use clap::{Parser, Subcommand};
use http::{
    Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use anyhow::anyhow;

use voicebridge::core::audio;
use voicebridge::{ServerConfig, routes, state::AppState};

/// Voicebridge - realtime audio bridge and MCP tool gateway
#[derive(Parser, Debug)]
#[command(name = "voicebridge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List tools advertised by the configured MCP servers
    Tools,

    /// Convert a WAV file to raw PCM16 at a realtime input rate
    Convert {
        /// Input WAV file
        input: PathBuf,

        /// Output file (raw little-endian PCM16)
        output: PathBuf,

        /// Target sample rate in Hz
        #[arg(short = 'r', long = "rate", default_value_t = audio::TARGET_RATE_GEMINI)]
        rate: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Initialize crypto provider for TLS connections
    // This must be done before any TLS connections are attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration from file or environment
    let config = if let Some(ref config_path) = cli.config {
        println!("Loading configuration from {}", config_path.display());
        ServerConfig::from_file(config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        ServerConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };

    // Handle subcommands
    if let Some(command) = cli.command {
        match command {
            Commands::Tools => {
                return list_tools(config).await;
            }
            Commands::Convert {
                input,
                output,
                rate,
            } => {
                return convert_wav(&input, &output, rate);
            }
        }
    }

    let address = config.address();
    let tls_config = config.tls.clone();
    let is_tls_enabled = config.is_tls_enabled();
    let cors_origins = config.cors_allowed_origins.clone();
    println!("Starting server on {address}");

    // Create application state
    let app_state = Arc::new(AppState::new(config).map_err(|e| anyhow!(e.to_string()))?);

    // Configure CORS
    let cors_layer = if let Some(ref origins) = cors_origins {
        if origins == "*" {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_credentials(false)
        } else {
            // Parse comma-separated origins
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_credentials(true)
        }
    } else {
        // No CORS configured - same-origin only
        info!(
            "CORS not configured, defaulting to same-origin only. \
             Set CORS_ALLOWED_ORIGINS to enable cross-origin access."
        );
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([AUTHORIZATION, CONTENT_TYPE])
            .allow_credentials(false)
    };

    // Security headers
    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_CONTENT_TYPE_OPTIONS,
            http::HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_FRAME_OPTIONS,
            http::HeaderValue::from_static("DENY"),
        ));

    let app = routes::create_app(app_state)
        .layer(cors_layer)
        .layer(security_headers);

    // Parse socket address
    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{}': {}", address, e))?;

    // Start server with or without TLS
    if is_tls_enabled {
        let tls = tls_config.expect("TLS config must be present when TLS is enabled");

        let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to load TLS certificates from {} and {}: {}",
                    tls.cert_path.display(),
                    tls.key_path.display(),
                    e
                )
            })?;

        println!("Server listening on https://{} (TLS enabled)", socket_addr);

        axum_server::bind_rustls(socket_addr, rustls_config)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|e| anyhow!("TLS server error: {}", e))?;
    } else {
        println!("Server listening on http://{}", socket_addr);

        let listener = TcpListener::bind(&socket_addr).await?;
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
    }

    Ok(())
}

async fn list_tools(config: ServerConfig) -> anyhow::Result<()> {
    if config.tool_servers.is_empty() {
        println!("No MCP tool servers configured.");
        return Ok(());
    }

    let router = voicebridge::core::mcp::ToolRouter::from_configs(&config.tool_servers);
    let tools = router.list_tools().await;
    if tools.is_empty() {
        println!("No tools advertised.");
        return Ok(());
    }

    for entry in tools {
        match entry.tool.description {
            Some(ref desc) => println!("{}/{} - {}", entry.server, entry.tool.name, desc),
            None => println!("{}/{}", entry.server, entry.tool.name),
        }
    }
    Ok(())
}

fn convert_wav(input: &PathBuf, output: &PathBuf, rate: u32) -> anyhow::Result<()> {
    let file = std::fs::File::open(input)
        .map_err(|e| anyhow!("Failed to open {}: {}", input.display(), e))?;
    let frames = audio::wav_to_pcm_frames(std::io::BufReader::new(file), rate)
        .map_err(|e| anyhow!("Failed to convert {}: {}", input.display(), e))?;

    let mut pcm = Vec::new();
    for frame in &frames {
        pcm.extend_from_slice(&frame.data);
    }
    std::fs::write(output, &pcm)
        .map_err(|e| anyhow!("Failed to write {}: {}", output.display(), e))?;

    println!(
        "Wrote {} bytes of PCM16 at {} Hz to {}",
        pcm.len(),
        rate,
        output.display()
    );
    Ok(())
}
