//! Cropcast CLI
//!
//! Command-line interface for the Cropcast data service.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use cropcast::api::HttpServer;
use cropcast::forecast::LagMode;
use cropcast::models::{
    ForecastPoint, MarketAverage, PricePoint, Reading, Recommendations, TrendSummary,
    WeatherReport,
};
use cropcast::service::Services;
use cropcast::Config;

/// Cropcast - crop prices, forecasts and weather alerts
#[derive(Parser)]
#[command(name = "cropcast")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "CROPCAST_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum LagArg {
    Predicted,
    LastObserved,
}

impl From<LagArg> for LagMode {
    fn from(arg: LagArg) -> Self {
        match arg {
            LagArg::Predicted => LagMode::Predicted,
            LagArg::LastObserved => LagMode::LastObserved,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long, env = "CROPCAST_HOST")]
        host: Option<String>,

        /// HTTP API port
        #[arg(long, env = "CROPCAST_HTTP_PORT")]
        port: Option<u16>,
    },

    /// List known crops
    Crops,

    /// List markets with prices for a crop
    Markets {
        #[arg(long, default_value = "Corn")]
        crop: String,
    },

    /// Show daily prices
    Prices {
        #[arg(long, default_value = "Corn")]
        crop: String,

        /// Only this market ("All Markets" for every market)
        #[arg(long)]
        market: Option<String>,
    },

    /// Compare recent average prices across markets
    Compare {
        #[arg(long, default_value = "Corn")]
        crop: String,
    },

    /// Show per-market price trends
    Trends {
        #[arg(long, default_value = "Corn")]
        crop: String,

        /// Trailing window in days
        #[arg(long)]
        window_days: Option<i64>,
    },

    /// Forecast prices
    Forecast {
        #[arg(long, default_value = "Corn")]
        crop: String,

        /// Market to forecast; falls back to the national average
        #[arg(long)]
        market: Option<String>,

        /// Horizon in days
        #[arg(long)]
        days: Option<u32>,

        /// Lag feature used while projecting
        #[arg(long, value_enum)]
        lag_mode: Option<LagArg>,
    },

    /// Show selling recommendations
    Recommend {
        #[arg(long, default_value = "Corn")]
        crop: String,
    },

    /// Show current weather
    Weather {
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,

        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,
    },

    /// Evaluate weather alert thresholds
    Alerts {
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,

        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        generate_completions(shell);
        return ExitCode::SUCCESS;
    }

    // Load configuration
    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config, cli.verbose);

    // Execute command
    let result = run(cli.command, &mut config, cli.format).await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose { "debug" } else { config.logging.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(command: Commands, config: &mut Config, format: OutputFormat) -> anyhow::Result<()> {
    if let Commands::Forecast {
        lag_mode: Some(lag), ..
    } = &command
    {
        config.forecast.lag_mode = (*lag).into();
    }

    let services = Services::from_config(config).context("failed to initialize services")?;
    let market = &services.market;
    let climate = &services.climate;

    match command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            run_serve(services, &host, port).await
        }
        Commands::Crops => {
            let crops = market.crops().await;
            emit(format, crops.as_slice(), print_lines)
        }
        Commands::Markets { crop } => {
            let markets = market.markets(&crop).await?;
            emit(format, markets.as_slice(), print_lines)
        }
        Commands::Prices { crop, market: name } => {
            let prices = market.prices(&crop, name.as_deref()).await?;
            emit(format, prices.as_slice(), print_prices)
        }
        Commands::Compare { crop } => {
            let averages = market.comparison(&crop).await?;
            emit(format, averages.as_slice(), print_averages)
        }
        Commands::Trends { crop, window_days } => {
            let trends = market.trends(&crop, window_days).await?;
            emit(format, trends.as_slice(), print_trends)
        }
        Commands::Forecast {
            crop,
            market: name,
            days,
            ..
        } => {
            let forecast = market.forecast(&crop, name.as_deref(), days).await?;
            emit(format, forecast.as_slice(), print_forecast)
        }
        Commands::Recommend { crop } => {
            let recs = market.recommendations(&crop).await?;
            emit(format, &recs, print_recommendations)
        }
        Commands::Weather { lat, lon } => {
            let reading = climate.reading(lat, lon).await?;
            emit(format, &reading, print_reading)
        }
        Commands::Alerts { lat, lon } => {
            let report = climate.weather_alerts(lat, lon).await?;
            emit(format, &report, print_report)
        }
        Commands::Completions { .. } => Ok(()),
    }
}

async fn run_serve(services: Services, host: &str, port: u16) -> anyhow::Result<()> {
    let metrics = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;

    let addr = format!("{host}:{port}");
    info!(addr = %addr, "Starting Cropcast API");

    HttpServer::new(services, Some(metrics)).serve(&addr).await?;
    Ok(())
}

fn emit<T: Serialize + ?Sized>(
    format: OutputFormat,
    value: &T,
    text: fn(&T),
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => text(value),
    }
    Ok(())
}

fn print_lines(items: &[String]) {
    for item in items {
        println!("{item}");
    }
}

fn print_prices(points: &[PricePoint]) {
    println!("{:<12} {:<24} {:>10}", "DATE", "MARKET", "PRICE");
    for p in points {
        println!("{:<12} {:<24} {:>10.2}", p.date, p.market, p.price);
    }
}

fn print_averages(averages: &[MarketAverage]) {
    println!("{:<24} {:>10} {:>8}", "MARKET", "AVERAGE", "SAMPLES");
    for a in averages {
        println!("{:<24} {:>10.2} {:>8}", a.market, a.average_price, a.samples);
    }
}

fn print_trends(trends: &[TrendSummary]) {
    println!("{:<24} {:>10} {:>9} {:<8} {}", "MARKET", "CURRENT", "CHANGE", "TREND", "UPDATED");
    for t in trends {
        println!(
            "{:<24} {:>10.2} {:>8.2}% {:<8} {}",
            t.category,
            t.current_value,
            t.percent_change,
            t.trend_label.as_str(),
            t.last_updated
        );
    }
}

fn print_forecast(points: &[ForecastPoint]) {
    println!("{:<12} {:>10}", "DATE", "PREDICTED");
    for p in points {
        println!("{:<12} {:>10.2}", p.date, p.predicted_value);
    }
}

fn print_recommendations(recs: &Recommendations) {
    println!("Recommendations for {}", recs.crop);
    println!(
        "  Best price:  {} at {:.2} ({})",
        recs.best_price_market.market, recs.best_price_market.price, recs.best_price_market.reason
    );
    println!(
        "  Trending:    {} at {:.2}, {:+.2}% ({})",
        recs.trending_market.market,
        recs.trending_market.price,
        recs.trending_market.price_change,
        recs.trending_market.reason
    );
    println!();
    for insight in &recs.market_insights {
        println!(
            "  {:<24} {:>10.2} {:>+8.2}%  {}",
            insight.market, insight.current_price, insight.change, insight.recommendation
        );
    }
}

fn print_reading(reading: &Reading) {
    println!("Observed:    {}", reading.observed_at);
    println!("Temperature: {:.1}°C", reading.temperature);
    println!("Humidity:    {:.0}%", reading.humidity);
    println!("Wind:        {:.1} m/s", reading.wind_speed);
    if let Some(conditions) = &reading.conditions {
        println!("Conditions:  {conditions}");
    }
}

fn print_report(report: &WeatherReport) {
    println!("Location:    {:.4}, {:.4}", report.lat, report.lon);
    print_reading(&report.reading);
    println!();
    if report.alerts.is_empty() {
        println!("No alerts.");
    }
    for alert in &report.alerts {
        println!("[{:?}] {}", alert.severity, alert.message);
    }
}

fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "cropcast", &mut io::stdout());
}
