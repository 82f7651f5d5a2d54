use anyhow::{Context, Result};
use macro_regression::analysis::design::ModelBuilder;
use macro_regression::analysis::diagnostics::DiagnosticsRunner;
use macro_regression::analysis::ols::Ols;
use macro_regression::analysis::summary::RegressionSummary;
use macro_regression::config::Config;
use macro_regression::data::loader::DataLoader;
use std::env;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "config/regression.yaml".to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("loading configuration from {config_path}"))?;

    let dataset = DataLoader::load_dataset(&config.response, &config.predictors, &config.alignment)
        .context("loading regression data")?;
    info!(
        observations = dataset.nobs(),
        predictors = dataset.predictor_names.len(),
        "dataset aligned"
    );

    let input = ModelBuilder::build(&dataset).context("building design matrix")?;
    let results = Ols::fit(&input).context("fitting OLS model")?;

    println!("{}", RegressionSummary::new(&results));

    info!("running residual diagnostics");
    let report = DiagnosticsRunner::new(config.diagnostics.adf.clone()).run(&results);
    print!("{report}");

    Ok(())
}
