mod cli;

use clap::Parser;
use cli::{Cli, Commands, OutputFormat, PlanSelector};
use colored::*;
use coursemap::{
    config::{Config, StoreBackend},
    eligibility::{self, BatchToggler, EligibilityEngine, ProgressSummary},
    error::{self, PlanError},
    ingest,
    plan::{Plan, RawPlan},
    store::{DocumentStore, HttpDocumentStore, SqliteDocumentStore},
    utils,
};
use indicatif::ProgressBar;
use std::{path::Path, sync::Arc, time::Duration};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("coursemap=info,warn")),
        )
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let result = run(cli.command, &config).await;

    if let Err(e) = result {
        error!("{}", format!("Error: {}", e).red());
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: &Config) -> error::Result<()> {
    if let Commands::Config = command {
        return show_config(config);
    }

    let engine = EligibilityEngine::new(open_store(config)?, config.request_timeout());

    match command {
        Commands::Upload { file } => {
            info!("Uploading {}", file);
            upload_pdf(&engine, &file).await
        }

        Commands::Import { file, analyzer } => {
            info!("Importing {}", file);
            import_plan(&engine, &file, analyzer).await
        }

        Commands::Show { plan, format } => {
            let plan = select_plan(&engine, &plan).await?;
            show_plan(&plan, format)
        }

        Commands::Eligible { plan } => {
            let plan = select_plan(&engine, &plan).await?;
            show_eligible(&plan);
            Ok(())
        }

        Commands::Pass { doc_id, codes } => set_status(&engine, config, &doc_id, codes, true).await,

        Commands::Fail { doc_id, codes } => set_status(&engine, config, &doc_id, codes, false).await,

        Commands::Toggle { doc_id, code } => toggle_course(&engine, &doc_id, &code).await,

        Commands::Rename { doc_id, name } => {
            engine.load(&doc_id).await?;
            engine.rename(&name).await?;
            println!("{}", format!("✓ {} is now named \"{}\"", doc_id, name).green());
            Ok(())
        }

        Commands::Stats { plan, format } => {
            let plan = select_plan(&engine, &plan).await?;
            show_stats(&plan, format)
        }

        Commands::Config => show_config(config),
    }
}

fn open_store(config: &Config) -> error::Result<Arc<dyn DocumentStore>> {
    match config.store.backend {
        StoreBackend::Http => {
            info!("Using document service at {}", config.api.base_url);
            let store = HttpDocumentStore::new(&config.api.base_url, config.request_timeout())?;
            Ok(Arc::new(store))
        }
        StoreBackend::Local => {
            info!("Using local database {}", config.database.path);
            let store = SqliteDocumentStore::new(&config.database.path)?;
            Ok(Arc::new(store))
        }
    }
}

async fn select_plan(engine: &EligibilityEngine, selector: &PlanSelector) -> error::Result<Plan> {
    match (&selector.doc_id, &selector.name) {
        (_, Some(name)) => engine.load_by_name(name).await,
        (Some(doc_id), None) => engine.load(doc_id).await,
        (None, None) => Err(PlanError::Config(
            "a document id or --name is required".to_string(),
        )),
    }
}

async fn upload_pdf(engine: &EligibilityEngine, file: &str) -> error::Result<()> {
    let bytes = tokio::fs::read(file).await?;
    let file_name = Path::new(file)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("plan.pdf");

    let spinner = ProgressBar::new_spinner();
    spinner.set_message("Processing document...");
    spinner.enable_steady_tick(Duration::from_millis(120));
    let result = engine.upload_pdf(file_name, bytes).await;
    spinner.finish_and_clear();

    let plan = result?;
    println!("{}", "✓ Document processed".green());
    print_plan_header(&plan);
    show_eligible(&plan);
    Ok(())
}

async fn import_plan(engine: &EligibilityEngine, file: &str, analyzer: bool) -> error::Result<()> {
    let text = tokio::fs::read_to_string(file).await?;
    let value: serde_json::Value = serde_json::from_str(&text)?;

    let raw: RawPlan = if analyzer {
        ingest::extract_plan(&value)?
    } else {
        serde_json::from_value(value)?
    };

    let plan = engine.upload_plan(&raw).await?;
    println!("{}", format!("✓ Imported plan {}", plan.doc_id).green());
    print_plan_header(&plan);
    Ok(())
}

async fn set_status(
    engine: &EligibilityEngine,
    config: &Config,
    doc_id: &str,
    codes: Vec<String>,
    passed: bool,
) -> error::Result<()> {
    engine.load(doc_id).await?;

    let changes = codes.into_iter().map(|code| (code, passed)).collect();
    let summary = BatchToggler::new(engine, config.api.max_in_flight)
        .apply(doc_id, changes)
        .await;
    summary.print_summary();

    if let Some(plan) = engine.snapshot() {
        show_eligible(&plan);
    }

    if summary.failed > 0 {
        return Err(anyhow::anyhow!(
            "{} of {} status updates failed",
            summary.failed,
            summary.total
        )
        .into());
    }
    Ok(())
}

async fn toggle_course(engine: &EligibilityEngine, doc_id: &str, code: &str) -> error::Result<()> {
    let plan = engine.load(doc_id).await?;
    let current = plan
        .course(code)
        .ok_or_else(|| PlanError::UnknownCourse(code.to_string()))?
        .passed;

    engine.toggle_status(doc_id, code, !current).await?;
    let state = if current { "not passed".yellow() } else { "passed".green() };
    println!("✓ {} marked {}", code, state);

    if let Some(plan) = engine.snapshot() {
        show_eligible(&plan);
    }
    Ok(())
}

fn print_plan_header(plan: &Plan) {
    println!("\n{}", "=== Study Plan ===".cyan().bold());
    println!("  Document:   {}", plan.doc_id);
    println!("  Faculty:    {}", if plan.faculty.is_empty() { "—" } else { plan.faculty.as_str() });
    println!("  Program:    {}", if plan.program.is_empty() { "—" } else { plan.program.as_str() });
    if let Some(name) = &plan.name {
        println!("  Name:       {}", name);
    }
    println!("  Courses:    {}", plan.len());
}

fn show_eligible(plan: &Plan) {
    let eligible = plan.eligible();
    println!("\n{}", "Eligible next:".cyan());
    if eligible.is_empty() {
        println!("  —");
        return;
    }

    for code in eligible {
        if let Some(course) = plan.course(code) {
            println!(
                "  {}  {}  ({})",
                code.cyan(),
                course.name,
                utils::format_term(&course.year, &course.term)
            );
        }
    }
}

fn show_plan(plan: &Plan, format: OutputFormat) -> error::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(plan)?);
        return Ok(());
    }

    print_plan_header(plan);
    show_eligible(plan);
    println!();

    let passed = plan.passed_set();
    let widths = [10, 40, 20, 11, 8, 6];

    match format {
        OutputFormat::Table => {
            utils::print_table_border(105);
            utils::print_table_row(
                &["Code", "Course", "Prerequisites", "Fundamental", "Term", "Passed"],
                &widths,
            );
            utils::print_table_border(105);

            for course in plan.courses() {
                let state = eligibility::classify(course, &passed);
                utils::print_table_row(
                    &[
                        &utils::state_badge(&course.code, state),
                        &utils::truncate(&course.name, 40),
                        &utils::truncate(&utils::format_codes(&course.prerequisites), 20),
                        utils::yes_no(course.is_fundamental),
                        &utils::format_term(&course.year, &course.term),
                        if course.passed { "✓" } else { "" },
                    ],
                    &widths,
                );
            }
            utils::print_table_border(105);
        }
        OutputFormat::Cards | OutputFormat::Json => {
            for course in plan.courses() {
                let state = eligibility::classify(course, &passed);
                println!(
                    "┌ {}  [{}]",
                    utils::state_badge(&course.code, state),
                    eligibility::eligibility_reason(course, plan.courses(), &passed)
                );
                println!("│ {}", course.name.bold());
                println!("│ Term {}", utils::format_term(&course.year, &course.term));
                println!("└ Prerequisites: {}\n", utils::format_codes(&course.prerequisites));
            }
        }
    }

    for dangling in eligibility::dangling_prerequisites(plan.courses()) {
        println!(
            "{}",
            format!(
                "⚠ {} requires {} which is not part of the plan",
                dangling.course,
                utils::format_codes(&dangling.missing)
            )
            .yellow()
        );
    }

    Ok(())
}

fn show_stats(plan: &Plan, format: OutputFormat) -> error::Result<()> {
    let stats = ProgressSummary::from_courses(plan.courses());

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    print_plan_header(plan);
    println!("\nProgress:");
    println!("  Passed:      {}", stats.passed.to_string().green());
    println!("  Eligible:    {}", stats.eligible.to_string().cyan());
    println!("  Blocked:     {}", stats.blocked.to_string().red());
    println!("  Completion:  {:.1}%", stats.completion());
    println!(
        "  Fundamental: {}/{}",
        stats.fundamental_passed, stats.fundamental_total
    );
    if stats.dangling > 0 {
        println!(
            "  {}",
            format!("{} courses reference prerequisites outside the plan", stats.dangling).yellow()
        );
    }
    Ok(())
}

fn show_config(config: &Config) -> error::Result<()> {
    let rendered = toml::to_string_pretty(config).map_err(anyhow::Error::from)?;
    println!("{}", rendered);
    Ok(())
}
