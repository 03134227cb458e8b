//! mysql-table-migrate CLI - preview and copy table data between MySQL databases.

use clap::{Parser, Subcommand};
use mysql_table_migrate::orchestrator::{self, health_check};
use mysql_table_migrate::{
    Config, MigrateError, MigrateRequest, MigrationLockStatus, MigrationStatus, PreviewRequest,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "mysql-table-migrate")]
#[command(about = "Preview and migrate table data between MySQL/MariaDB databases")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List source tables with row counts and destination state
    Tables,

    /// Compare source and destination tables without writing
    Preview {
        /// Table to compare (repeatable; default: config or all source tables)
        #[arg(long = "table")]
        tables: Vec<String>,

        /// Use catalog row estimates instead of COUNT(*)
        #[arg(long)]
        approximate: bool,
    },

    /// Copy table data from source to destination
    Migrate {
        /// Table to migrate (repeatable; default: config or all source tables)
        #[arg(long = "table")]
        tables: Vec<String>,

        /// Allow merging into this non-empty destination table (repeatable)
        #[arg(long = "overwrite")]
        overwrite: Vec<String>,

        /// Allow merging into every non-empty destination table
        #[arg(long)]
        overwrite_all: bool,

        /// Disable destination foreign key checks for the run
        #[arg(long)]
        disable_foreign_key_checks: bool,
    },

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli.verbosity, &cli.log_format).map_err(MigrateError::Config)?;

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Tables => {
            let listing =
                orchestrator::fetch_tables(&config.source, Some(&config.destination)).await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                println!("{:<40} {:>12} {:>12}  IN DEST", "TABLE", "SOURCE", "DEST");
                for t in &listing.tables {
                    println!(
                        "{:<40} {:>12} {:>12}  {}",
                        t.table,
                        t.source_count,
                        t.dest_count.map(|c| c.to_string()).unwrap_or_default(),
                        match t.exists_in_dest {
                            Some(true) => "yes",
                            Some(false) => "no",
                            None => "-",
                        }
                    );
                }
                print_lock_status(listing.migration_lock.as_ref());
            }
        }

        Commands::Preview {
            tables,
            approximate,
        } => {
            if !tables.is_empty() {
                config.migration.tables = tables;
            }
            if approximate {
                config.migration.approximate_counts = true;
            }

            let request = PreviewRequest::from(&config.migration);
            let report =
                orchestrator::preview(&config.source, &config.destination, &request).await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{:<40} {:>12} {:>12}  STATUS", "TABLE", "SOURCE", "DEST");
                for t in &report.tables {
                    println!(
                        "{:<40} {:>12} {:>12}  {}",
                        t.table,
                        t.source_count,
                        t.dest_count
                            .map(|c| c.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                        t.status
                    );
                    if let Some(diff) = &t.schema_diff {
                        if !diff.missing_in_dest.is_empty() {
                            println!(
                                "    missing in destination: {}",
                                diff.missing_in_dest.join(", ")
                            );
                        }
                        for m in &diff.type_mismatches {
                            println!(
                                "    type mismatch: {} ({} -> {})",
                                m.column, m.src_type, m.dest_type
                            );
                        }
                        if !diff.extra_in_dest.is_empty() {
                            println!(
                                "    extra in destination: {}",
                                diff.extra_in_dest.join(", ")
                            );
                        }
                    }
                }
                print_lock_status(report.migration_lock.as_ref());
            }
        }

        Commands::Migrate {
            tables,
            overwrite,
            overwrite_all,
            disable_foreign_key_checks,
        } => {
            // Apply overrides
            if !tables.is_empty() {
                config.migration.tables = tables;
            }
            for table in overwrite {
                config.migration.overwrite.insert(table, true);
            }
            if overwrite_all {
                config.migration.overwrite_all = true;
            }
            if disable_foreign_key_checks {
                config.migration.disable_foreign_key_checks = true;
            }

            let request = MigrateRequest::from(&config.migration);
            let report =
                orchestrator::migrate(&config.source, &config.destination, &request).await?;

            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                println!("\nMigration completed!");
                println!("  Run ID: {}", report.run_id);
                println!("  Duration: {:.2}s", report.duration_seconds);
                println!(
                    "  Tables: {} migrated, {} skipped, {} failed",
                    report.tables_migrated, report.tables_skipped, report.tables_failed
                );
                println!("  Rows processed: {}", report.rows_processed);
                for r in &report.results {
                    let detail = match (&r.status, &r.reason) {
                        (MigrationStatus::Migrated, _) => format!("{} rows", r.processed),
                        (_, Some(reason)) => reason.clone(),
                        (_, None) => String::new(),
                    };
                    println!(
                        "    {:<40} {:<9} {}",
                        r.table,
                        r.status.as_str(),
                        detail
                    );
                }
            }

            if report.tables_failed > 0 {
                let failed: Vec<&str> = report
                    .results
                    .iter()
                    .filter(|r| r.status == MigrationStatus::Error)
                    .map(|r| r.table.as_str())
                    .collect();
                return Err(MigrateError::transfer(
                    failed.join(", "),
                    format!("{} table(s) failed", failed.len()),
                ));
            }
        }

        Commands::HealthCheck => {
            let result = health_check(&config.source, &config.destination).await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source ({}): {} ({}ms)",
                    config.source.display_name(),
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Destination ({}): {} ({}ms)",
                    config.destination.display_name(),
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::pool("Health check failed", "health-check"));
            }
        }
    }

    Ok(())
}

fn print_lock_status(lock: Option<&MigrationLockStatus>) {
    match lock {
        Some(lock) if lock.has_lock_table => println!(
            "\nknex migration lock: {}",
            match lock.is_locked {
                Some(true) => "LOCKED",
                Some(false) => "unlocked",
                None => "unknown",
            }
        ),
        Some(lock) if lock.has_migrations_table => {
            println!("\nknex migrations table present, no lock table")
        }
        Some(_) => {}
        None => println!("\nknex migration lock: could not be checked"),
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        "trace" => Level::TRACE,
        other => return Err(format!("unknown verbosity '{}'", other)),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("unknown log format '{}'", other)),
    }

    Ok(())
}
