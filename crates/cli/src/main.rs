use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rebalancer_core::analysis::{self, AnalysisOutcome, Analyzer};
use rebalancer_core::domain::portfolio::{Artifact, RiskProfile};
use rebalancer_core::error::AnalysisError;
use rebalancer_core::llm::gemini::GeminiClient;
use rebalancer_core::session::ReportStore;
use rebalancer_core::views::{self, PageView};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Debug, Parser)]
#[command(name = "rebalancer")]
struct Args {
    /// Portfolio holdings: .csv, .xlsx, .png or .jpg/.jpeg.
    #[arg(long)]
    file: PathBuf,

    /// conservative, moderate or aggressive.
    #[arg(long)]
    risk_profile: RiskProfile,

    /// Overrides the content type guessed from the file extension.
    #[arg(long)]
    content_type: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Print the prompt that would be sent and exit without calling the model.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = rebalancer_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let artifact = read_artifact(&args).await?;

    if args.dry_run {
        let payload =
            analysis::prepare(&artifact, args.risk_profile).map_err(report_failure)?;
        tracing::info!(
            file_name = %artifact.file_name,
            dry_run = true,
            has_image = payload.image.is_some(),
            "prompt prepared"
        );
        println!("{}", payload.text);
        return Ok(());
    }

    let client = GeminiClient::from_settings(&settings)?;
    let analyzer =
        Analyzer::new(client).with_allocation_tolerance(settings.allocation_tolerance_pct);
    let store = ReportStore::new();

    let outcome = analyzer
        .run(&artifact, args.risk_profile, &store)
        .await
        .map_err(report_failure)?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Text => print!("{}", render_text(&outcome)),
    }
    Ok(())
}

async fn read_artifact(args: &Args) -> anyhow::Result<Artifact> {
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("read {} failed", args.file.display()))?;
    let file_name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let content_type = args.content_type.clone().or_else(|| {
        mime_guess::from_path(&args.file)
            .first()
            .map(|m| m.essence_str().to_string())
    });
    Ok(Artifact::new(file_name, content_type, bytes))
}

/// Prints the user-facing notice and hands the error on for the exit status.
fn report_failure(err: AnalysisError) -> anyhow::Error {
    eprintln!("error [{}]: {}", err.category(), err);
    eprintln!("{}", err.guidance());
    let correctable = err.is_user_correctable();
    let err = anyhow::Error::new(err);
    if !correctable {
        sentry_anyhow::capture_anyhow(&err);
    }
    err
}

fn render_text(outcome: &AnalysisOutcome) -> String {
    let report = Some(outcome.report.as_ref());
    let mut out = String::new();

    for w in &outcome.warnings {
        out.push_str(&format!("warning: {w}\n\n"));
    }

    out.push_str("== Sector allocation ==\n");
    match views::sector_allocation_view(report) {
        PageView::Ready { view } => {
            out.push_str(&format!("Country: {}\n", view.identified_country));
            for row in &view.rows {
                out.push_str(&format!(
                    "  {:<28} {:>16} {:>8}\n",
                    row.sector, row.investment_display, row.percentage_display
                ));
            }
            out.push_str(&format!(
                "  {:<28} {:>16}\n",
                "Total",
                views::format_currency(view.total_investment)
            ));
        }
        other => out.push_str(&notice(&other)),
    }

    out.push_str("\n== Diversification ==\n");
    match views::diversification_view(report) {
        PageView::Ready { view } => out.push_str(&format!("{}\n", view.assessment)),
        other => out.push_str(&notice(&other)),
    }

    out.push_str("\n== Recommendations ==\n");
    match views::recommendations_view(report) {
        PageView::Ready { view } => {
            out.push_str(&format!("{}\n\nAction items:\n", view.summary));
            match &view.action_items.empty_message {
                Some(msg) => out.push_str(&format!("  {msg}\n")),
                None => {
                    for item in &view.action_items.items {
                        out.push_str(&format!("  - {item}\n"));
                    }
                }
            }
            for (title, section) in [
                ("Suggested ETFs", &view.suggested_etfs),
                ("Suggested companies", &view.suggested_companies),
            ] {
                out.push_str(&format!("\n{title}:\n"));
                if let Some(msg) = &section.empty_message {
                    out.push_str(&format!("  {msg}\n"));
                }
                for s in &section.items {
                    out.push_str(&format!("  - {} ({}): {}\n", s.ticker, s.name, s.reason));
                }
            }
        }
        other => out.push_str(&notice(&other)),
    }

    out
}

fn notice<T>(view: &PageView<T>) -> String {
    match view {
        PageView::NotAnalyzed { message } | PageView::Unavailable { message, .. } => {
            format!("{message}\n")
        }
        PageView::Ready { .. } => String::new(),
    }
}

fn init_sentry(settings: &rebalancer_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
