use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod analysis;
mod config;
mod error;
mod generation;
mod handlers;
mod state;
mod upstream;

use crate::config::UpstreamArgs;
use crate::handlers::{analyze_handler, generate_handler, ping_handler};
use crate::state::AppState;
use crate::upstream::OpenRouterClient;

/// Request bodies carry several base64 images.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,
    #[arg(long)]
    public_dir: Option<PathBuf>,
    #[arg(long, requires = "tls_key")]
    tls_cert: Option<PathBuf>,
    #[arg(long, requires = "tls_cert")]
    tls_key: Option<PathBuf>,
    #[arg(long, env = "ANALYZE_STRICT")]
    analyze_strict: bool,
    #[command(flatten)]
    upstream: UpstreamArgs,
}

fn router(state: AppState, public_dir: PathBuf) -> Router {
    let api = Router::new()
        .route("/analyze", post(analyze_handler))
        .route("/generate", post(generate_handler))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ));

    Router::new()
        .merge(api)
        .route("/ping", get(ping_handler))
        .fallback_service(ServeDir::new(public_dir).append_index_html_on_directories(true))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("banana_server=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let state = AppState {
        model: Arc::new(OpenRouterClient::new(&args.upstream)),
        analyze: args.upstream.analyze_settings(),
        generate: args.upstream.generate_settings(),
        analyze_strict: args.analyze_strict,
    };
    info!(
        analyze_model = %state.analyze.model,
        generate_model = %state.generate.model,
        "upstream configured"
    );

    let public_dir = args
        .public_dir
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../public"));
    let app = router(state, public_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    match (args.tls_cert, args.tls_key) {
        (Some(cert), Some(key)) => {
            rustls::crypto::ring::default_provider()
                .install_default()
                .ok();
            let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert, key)
                .await
                .expect("Failed to load TLS certificate");
            info!("Peel a Banana running at https://localhost:{}", args.port);
            axum_server::bind_rustls(addr, tls)
                .serve(app.into_make_service())
                .await
                .expect("Server crashed");
        }
        _ => {
            info!("Peel a Banana running at http://localhost:{}", args.port);
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .expect("Failed to bind server");
            axum::serve(listener, app).await.expect("Server crashed");
        }
    }
}
