use actix_web::{middleware::Logger, web, App, HttpServer};
use clap::Parser;
use student_success_predictor::{api, config::Config, GradientBoostedModel, Predictor};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "student_success_predictor=info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();
    tracing::info!("Starting Student Success Predictor v{}", env!("CARGO_PKG_VERSION"));

    let model = GradientBoostedModel::load_async(&config.model_path).await.map_err(|e| {
        tracing::error!(path = %config.model_path.display(), error = %e, "Cannot start without a model");
        e
    })?;
    let predictor = Predictor::new(Box::new(model)).map_err(|e| {
        tracing::error!(error = %e, "Model does not match the encoder's feature columns");
        e
    })?;

    for feature in predictor.top_features() {
        tracing::debug!(feature = %feature.feature, importance = feature.importance, "Top feature");
    }

    let predictor = web::Data::new(predictor);
    let (host, port) = config.bind_address();
    tracing::info!("Dashboard available on http://{}:{}", host, port);

    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(predictor.clone())
            .configure(api::configure)
    });
    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }

    server.bind((host, port))?.run().await?;
    Ok(())
}
