//! # Node Forecast Report
//!
//! Prints a plain-text report: upcoming tide extremes, moon events, harvest windows and
//! eligible low-tide days for the configured station, plus per-node battery forecasts
//! when a telemetry export is given.
//!
//! ```text
//! node-forecast [--config PATH] [--telemetry PATH] [--days N]
//! ```

use anyhow::{bail, Context};
use chrono::{DateTime, Duration, FixedOffset, Utc};
use std::env;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

use node_forecast_lib::config::Config;
use node_forecast_lib::forecast::{
    forecast_deployment, DeploymentState, ForecastStatus, NodeForecast,
};
use node_forecast_lib::harmonics::HarmonicLocation;
use node_forecast_lib::harvest::{harvest_day_ranges, harvest_windows};
use node_forecast_lib::lunar::{age_days, illumination_percent, phase_name, MoonEventKind};
use node_forecast_lib::telemetry::entries_from_json;
use node_forecast_lib::tide_curve::{find_extrema, sample_curve, ExtremumKind, TidePoint};
use node_forecast_lib::trend::TrendOutcome;

/// Command line options.
struct Args {
    config: Option<PathBuf>,
    telemetry: Option<PathBuf>,
    days: Option<u32>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        config: None,
        telemetry: None,
        days: None,
    };
    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                args.config = Some(iter.next().context("--config needs a path")?.into());
            }
            "--telemetry" => {
                args.telemetry = Some(iter.next().context("--telemetry needs a path")?.into());
            }
            "--days" => {
                let value = iter.next().context("--days needs a number")?;
                let days = value
                    .parse()
                    .with_context(|| format!("invalid --days: {value}"))?;
                args.days = Some(days);
            }
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(args)
}

fn local(time: DateTime<Utc>, tz: &FixedOffset) -> String {
    time.with_timezone(tz).format("%a %d %b %H:%M").to_string()
}

fn print_tides(
    location: &HarmonicLocation,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    interval: i64,
) {
    let tz = location.timezone();
    println!("Tides at {} (UTC{:+})", location.name, location.utc_offset_hours);
    let curve: Vec<TidePoint> = sample_curve(start, end, location, interval).collect();
    for extremum in find_extrema(&curve) {
        let label = match extremum.kind {
            ExtremumKind::High => "High",
            ExtremumKind::Low => "Low ",
        };
        println!(
            "  {label}  {}  {:.2} m",
            local(extremum.time, &tz),
            extremum.height_m
        );
    }
    println!();
}

fn print_moon_and_harvest(
    config: &Config,
    location: &HarmonicLocation,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) {
    let tz = location.timezone();
    println!(
        "Moon now: {} ({}% lit, {:.1} days old)",
        phase_name(start).label(),
        illumination_percent(start),
        age_days(start)
    );

    println!("Harvest windows (spring tides):");
    for window in harvest_windows(start, end) {
        let kind = match window.moon_event.kind {
            MoonEventKind::New => "new moon",
            MoonEventKind::Full => "full moon",
        };
        println!(
            "  {} .. {}  ({kind} {})",
            local(window.start, &tz),
            local(window.end, &tz),
            local(window.moon_event.time, &tz)
        );
    }

    let threshold = &config.harvest;
    if threshold.enabled {
        println!("Days with a low at or below {:.2} m:", threshold.max_height_meters);
        let first_day = start.with_timezone(&tz).date_naive();
        let last_day = end.with_timezone(&tz).date_naive();
        let ranges = harvest_day_ranges(first_day, last_day, location, threshold);
        if ranges.is_empty() {
            println!("  none");
        }
        for range in ranges {
            println!(
                "  {} .. {}  lowest {:.2} m at {}",
                range.first_day,
                range.last_day,
                range.lowest.height_m,
                local(range.lowest.time, &tz)
            );
        }
    }
    println!();
}

fn print_node(forecast: &NodeForecast) {
    println!("{}", forecast.node);
    match forecast.status {
        ForecastStatus::NoConfiguration => {
            println!("  no configuration reported yet");
            return;
        }
        ForecastStatus::NotInstalled => {
            println!("  not installed");
            return;
        }
        _ => {}
    }
    if let Some(config) = &forecast.config {
        println!("  config: {}", config.summary());
    }
    if let Some(budget) = &forecast.budget {
        print!("  model: {:.1} mAh/day", budget.daily_total_mah);
        match budget.lifetime_days() {
            Some(days) => println!(", {days:.0} days from full"),
            None => println!(),
        }
        for part in &budget.breakdown {
            println!("    {:<16} {:>8.2} mAh", part.name, part.milliamp_hours);
        }
    }
    match forecast.status {
        ForecastStatus::AwaitingReading => {
            println!("  waiting for a reading under this configuration")
        }
        ForecastStatus::CarriedOver => println!("  showing the previous configuration's curve"),
        _ => {}
    }
    if let Some(anchor) = forecast.anchor {
        println!(
            "  anchor: {:.1}% at {}",
            anchor.percent,
            anchor.time.format("%Y-%m-%d %H:%M UTC")
        );
    }
    if let Some(last) = forecast.projection.last() {
        println!(
            "  projected {:.0}% on {}",
            last.percent_remaining,
            last.time.format("%Y-%m-%d")
        );
    }
    if let Some(accuracy) = forecast.accuracy {
        println!(
            "  model error so far: {:.1} points over {} readings",
            accuracy.mean_absolute_error, accuracy.sample_count
        );
    }
    match &forecast.trend {
        TrendOutcome::Fitted(fit) => {
            let empty = fit
                .points
                .last()
                .map(|p| p.time.format("%Y-%m-%d").to_string());
            println!(
                "  trend ({}): {:.2} %/day, r² {:.2}{}",
                fit.window_label,
                fit.slope_percent_per_day,
                fit.r_squared,
                empty.map(|d| format!(", line ends {d}")).unwrap_or_default()
            );
        }
        TrendOutcome::Insufficient(shortfall) => println!("  trend: {}", shortfall.message),
    }
}

/// End of the reporting range, refusing spans chrono cannot represent.
fn report_end(start: DateTime<Utc>, days: u32) -> anyhow::Result<DateTime<Utc>> {
    match start.checked_add_signed(Duration::days(i64::from(days))) {
        Some(end) => Ok(end),
        None => bail!("--days {days} reaches past the supported date range"),
    }
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };
    let location = config.location()?;

    let days = args.days.unwrap_or(config.tide.days_ahead);
    let start = Utc::now();
    let end = report_end(start, days)?;
    info!("Reporting {} days for {}", days, location.name);

    print_tides(&location, start, end, config.tide.curve_interval_minutes);
    print_moon_and_harvest(&config, &location, start, end);

    if let Some(path) = &args.telemetry {
        let json = fs::read_to_string(path)
            .with_context(|| format!("reading telemetry {}", path.display()))?;
        let entries = entries_from_json(&json)?;
        if entries.is_empty() {
            warn!("Telemetry file {} has no entries", path.display());
        }
        let (forecasts, _state) =
            forecast_deployment(DeploymentState::default(), &entries, &config.hardware);
        println!("Battery forecasts ({} uploads)", entries.len());
        for forecast in &forecasts {
            print_node(forecast);
        }
    }

    Ok(())
}
