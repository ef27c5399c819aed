use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod batch;
mod db;
mod engine;
mod error;
mod models;
mod resolver;

#[derive(Parser)]
#[command(name = "churnscope")]
#[command(about = "Customer churn batch scoring and history tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Write a sample customer CSV
    Sample {
        #[arg(long, default_value = "sample_customers.csv")]
        out: PathBuf,
    },
    /// Score a single customer profile; omitted fields take their defaults
    Predict {
        #[arg(long)]
        gender: Option<String>,
        #[arg(long)]
        senior_citizen: Option<String>,
        #[arg(long)]
        partner: Option<String>,
        #[arg(long)]
        dependents: Option<String>,
        #[arg(long)]
        tenure: Option<String>,
        #[arg(long)]
        contract: Option<String>,
        #[arg(long)]
        payment_method: Option<String>,
        #[arg(long)]
        monthly_charges: Option<String>,
        #[arg(long)]
        total_charges: Option<String>,
        #[arg(long)]
        internet_service: Option<String>,
        #[arg(long)]
        model: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Score a CSV of customers and record the batch
    Batch {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        model: Option<PathBuf>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// List stored batches, most recent first
    Uploads,
    /// Show one batch's customers joined with their predictions
    Show {
        #[arg(long)]
        id: String,
    },
    /// Delete one batch and everything it produced
    Delete {
        #[arg(long)]
        id: String,
    },
    /// Global counts across all stored batches
    Stats,
}

const SAMPLE_CSV: &str = "\
Gender,SeniorCitizen,Partner,Dependents,tenure,Contract,PaymentMethod,MonthlyCharges,TotalCharges,InternetService
Female,1,No,No,2,Month-to-month,Electronic check,95.0,190.0,Fiber optic
Male,0,Yes,Yes,48,Two year,Credit card (automatic),45.0,2160.0,DSL
Female,0,No,No,12,Month-to-month,Bank transfer (automatic),85.5,1026.0,Fiber optic
Male,1,Yes,No,3,Month-to-month,Electronic check,89.0,267.0,Fiber optic
Female,0,Yes,Yes,36,One year,Credit card (automatic),70.0,2520.0,DSL
Male,0,No,No,6,Month-to-month,Electronic check,95.0,570.0,Fiber optic
Female,1,No,No,1,Month-to-month,Electronic check,99.0,99.0,Fiber optic
Male,0,Yes,Yes,60,Two year,Bank transfer (automatic),50.0,3000.0,DSL
";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("churnscope=info")),
        )
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://churn_predictions.db?mode=rwc".to_string());

    let pool = db::connect(&database_url)
        .await
        .context("failed to open the churn database")?;
    db::init_db(&pool)
        .await
        .context("failed to prepare the schema")?;

    match cli.command {
        Commands::InitDb => {
            println!("Schema ready.");
        }
        Commands::Sample { out } => {
            std::fs::write(&out, SAMPLE_CSV)?;
            println!("Sample written to {}.", out.display());
        }
        Commands::Predict {
            gender,
            senior_citizen,
            partner,
            dependents,
            tenure,
            contract,
            payment_method,
            monthly_charges,
            total_charges,
            internet_service,
            model,
            json,
        } => {
            let mut record = resolver::RawRecord::new();
            let fields = [
                ("gender", gender),
                ("senior_citizen", senior_citizen),
                ("partner", partner),
                ("dependents", dependents),
                ("tenure", tenure),
                ("contract", contract),
                ("payment_method", payment_method),
                ("monthly_charges", monthly_charges),
                ("total_charges", total_charges),
                ("internet_service", internet_service),
            ];
            for (key, value) in fields {
                if let Some(value) = value {
                    record.insert(resolver::normalize_key(key), value);
                }
            }

            let model = engine::load_model(model.as_deref());
            let profile = resolver::resolve(1, &record)?;
            let score = model.score(&profile);
            let probability_pct = models::round1(score.probability * 100.0);
            let risk_tier = models::RiskTier::from_percent(probability_pct);

            if json {
                let result = models::ScoredRecord {
                    profile,
                    will_churn: score.will_churn,
                    probability_pct,
                    risk_tier,
                };
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!(
                    "{}: churn probability {:.1}% ({} risk, {} model)",
                    if score.will_churn { "Will churn" } else { "Will stay" },
                    probability_pct,
                    risk_tier.as_str(),
                    model.name()
                );
            }
        }
        Commands::Batch {
            csv,
            model,
            limit,
            json,
        } => {
            let model = engine::load_model(model.as_deref());
            let outcome = batch::score_file(&csv, model.as_ref())?;

            let upload_id = db::new_upload_id();
            let filename = csv
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| csv.display().to_string());

            // Persistence is best effort: the scored batch is reported either
            // way, a storage failure only costs the history entry.
            if let Err(err) = db::persist_batch(&pool, &upload_id, &filename, &outcome).await {
                error!("batch {upload_id} was scored but not recorded: {err}");
            }

            let report = models::BatchReport {
                upload_id,
                summary: outcome.summary,
                results: outcome.results,
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                let summary = &report.summary;
                println!(
                    "Upload {} ({}): {} customers scored.",
                    report.upload_id, filename, summary.total
                );
                println!("- High risk: {} ({:.1}%)", summary.high_risk, summary.high_risk_pct);
                println!(
                    "- Medium risk: {} ({:.1}%)",
                    summary.medium_risk, summary.medium_risk_pct
                );
                println!("- Low risk: {} ({:.1}%)", summary.low_risk, summary.low_risk_pct);
                for result in report.results.iter().take(limit) {
                    println!(
                        "- row {}: {} at {:.1}% ({} risk)",
                        result.profile.row,
                        if result.will_churn { "churn" } else { "stay" },
                        result.probability_pct,
                        result.risk_tier.as_str()
                    );
                }
                if report.results.len() > limit {
                    println!("  ... and {} more rows", report.results.len() - limit);
                }
            }
        }
        Commands::Uploads => {
            let uploads = db::list_uploads(&pool).await?;
            if uploads.is_empty() {
                println!("No uploads recorded.");
            } else {
                for upload in uploads {
                    println!(
                        "- {} {} ({} customers: {} high / {} medium / {} low) at {}",
                        upload.upload_id,
                        upload.filename,
                        upload.total_customers,
                        upload.high_risk_count,
                        upload.medium_risk_count,
                        upload.low_risk_count,
                        upload.created_at.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
        }
        Commands::Show { id } => {
            let upload = db::get_upload(&pool, &id).await?;
            let details = db::fetch_upload_details(&pool, &id).await?;
            println!(
                "Upload {} ({}) recorded {}",
                upload.upload_id,
                upload.filename,
                upload.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            for detail in details {
                let customer = &detail.customer;
                match &detail.prediction {
                    Some(prediction) => println!(
                        "- customer {}: {} / {} / tenure {} -> {} at {:.1}% ({} risk)",
                        customer.id,
                        customer.gender,
                        customer.contract,
                        customer.tenure,
                        if prediction.will_churn == 1 { "churn" } else { "stay" },
                        prediction.churn_probability,
                        prediction.risk_level
                    ),
                    None => println!(
                        "- customer {}: {} / {} / tenure {} (no prediction)",
                        customer.id, customer.gender, customer.contract, customer.tenure
                    ),
                }
            }
        }
        Commands::Delete { id } => {
            db::delete_upload(&pool, &id).await?;
            println!("Upload {id} deleted.");
        }
        Commands::Stats => {
            let stats = db::stats(&pool).await?;
            println!("Uploads: {}", stats.total_uploads);
            println!("Customers scored: {}", stats.total_customers);
            println!(
                "Risk mix: {} high / {} medium / {} low",
                stats.high_risk, stats.medium_risk, stats.low_risk
            );
        }
    }

    Ok(())
}
