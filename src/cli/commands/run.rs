//! Run command implementation.

use anyhow::{bail, Context, Result};
use backtest_config::{AppConfig, RunConfig};
use backtest_core::types::PrefetchedOhlcv;
use backtest_core::FetchRange;
use backtest_data::{load_prefetched, prefetch, CsvDataSource};
use backtest_engine::{RunOutcome, RunReport, Sandbox};
use backtest_monitor::log_report;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::cli::{OutputFormat, RunArgs};

pub async fn run(args: RunArgs, app: &AppConfig) -> Result<()> {
    let mut config = RunConfig::from_path(&args.run_config)
        .with_context(|| format!("Failed to read run configuration {}", args.run_config.display()))?;
    if !args.symbols.is_empty() {
        config.symbols = args.symbols.clone();
    }
    config.validate()?;

    info!(
        config = %args.run_config.display(),
        symbols = %config.symbols.join(","),
        interval = %config.interval,
        "Starting backtest"
    );

    // Load data
    let data = load_data(&args, app, &config).await?;

    // Run backtest
    let outcome = Sandbox::new().run(&config, &data);
    if let Some(output) = render(&outcome, args.output)? {
        println!("{}", output);
    }
    let report = match outcome {
        RunOutcome::Success(report) => report,
        RunOutcome::Error { message } => bail!("Backtest failed: {}", message),
    };
    log_report(&report);
    if matches!(args.output, OutputFormat::Text) {
        println!("{}", report.summary_text());
    }

    // Save if requested
    if let Some(path) = save_path(&args, app) {
        write_report(&report, &path, app.output.pretty)?;
        info!(path = %path.display(), "Results saved");
    }
    if let Some(path) = &args.equity_csv {
        std::fs::write(path, report.equity_to_csv())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Equity curve saved");
    }

    Ok(())
}

/// JSON output carries the host payload, `status` included, for errors too.
/// Text output prints nothing here; the summary follows the run log.
fn render(outcome: &RunOutcome, format: OutputFormat) -> Result<Option<String>> {
    match format {
        OutputFormat::Json => Ok(Some(serde_json::to_string_pretty(outcome)?)),
        OutputFormat::Text => Ok(None),
    }
}

/// Candles for the run: a prefetched document, the configuration's embedded
/// data, or the CSV directory, in that order.
async fn load_data(args: &RunArgs, app: &AppConfig, config: &RunConfig) -> Result<PrefetchedOhlcv> {
    if let Some(path) = &args.prefetched {
        let path = path.to_str().context("Prefetched path is not valid UTF-8")?;
        return load_prefetched(path)
            .await
            .with_context(|| format!("Failed to load prefetched data {}", path));
    }

    if args.data.is_none() {
        if let Some(data) = &config.ohlcv_data {
            info!(symbols = data.main.len(), "Using embedded OHLCV data");
            return Ok(data.clone());
        }
    }

    let dir = args
        .data
        .clone()
        .unwrap_or_else(|| PathBuf::from(&app.data.csv_dir));
    if !dir.exists() {
        bail!(
            "Data path '{}' does not exist. Provide a directory of CSV files (e.g. --data ./data)",
            dir.display()
        );
    }

    let range = FetchRange {
        start: parse_day(args.start.as_deref(), false)?,
        end: parse_day(args.end.as_deref(), true)?,
    };
    let source = CsvDataSource::new(&dir)
        .with_context(|| format!("'{}' is not a directory", dir.display()))?;
    let data = prefetch(
        &source,
        &config.symbols,
        config.interval,
        range,
        args.detail || app.data.detail,
    )
    .await?;

    info!(symbols = data.main.len(), dir = %dir.display(), "Loaded CSV data");
    Ok(data)
}

/// Start of `day`, or its last millisecond with `end_of_day`.
fn parse_day(day: Option<&str>, end_of_day: bool) -> Result<Option<DateTime<Utc>>> {
    let Some(day) = day else {
        return Ok(None);
    };
    let date = NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", day))?;
    let time = if end_of_day {
        date.and_hms_milli_opt(23, 59, 59, 999)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    Ok(time.map(|t| Utc.from_utc_datetime(&t)))
}

fn save_path(args: &RunArgs, app: &AppConfig) -> Option<PathBuf> {
    args.save.clone().or_else(|| {
        (!app.output.dir.is_empty() && Path::new(&app.output.dir).is_dir())
            .then(|| Path::new(&app.output.dir).join("report.json"))
    })
}

fn write_report(report: &RunReport, path: &Path, pretty: bool) -> Result<()> {
    let json = if pretty {
        report.to_json()?
    } else {
        serde_json::to_string(report)?
    };
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use backtest_core::types::Candle;

    #[test]
    fn test_json_output_carries_status() {
        let error = RunOutcome::Error {
            message: "unknown strategy 'nope'".into(),
        };
        let json: serde_json::Value =
            serde_json::from_str(&render(&error, OutputFormat::Json).unwrap().unwrap()).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "unknown strategy 'nope'");

        let candles = (0..3)
            .map(|i| Candle::new(i * 86_400_000, 100.0, 101.0, 99.0, 100.0, 1.0))
            .collect();
        let data = PrefetchedOhlcv::new().with_series("BTCUSDT", candles);
        let outcome = backtest_engine::run(&RunConfig::new(vec!["BTCUSDT".into()]), &data);
        let json: serde_json::Value =
            serde_json::from_str(&render(&outcome, OutputFormat::Json).unwrap().unwrap()).unwrap();
        assert_eq!(json["status"], "success");
        assert!(json["final_cash"].is_string() || json["final_cash"].is_number());

        assert!(render(&outcome, OutputFormat::Text).unwrap().is_none());
    }
}
