//! # d365pos
//!
//! Command-line front end of the register.
//!
//! ```text
//! d365pos sync                          pull the catalog from the ERP
//! d365pos journal [--receipt R]         list or show finalized transactions
//! d365pos price-check ITEM              unit prices of an item
//! d365pos search TEXT                   product search
//! d365pos register [--sync]             interactive register session
//! d365pos init-config                   write a config file template
//! d365pos sign-in USER [--sync]         resolve company and store, save them
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};

use d365pos_core::amount::format_amount;
use d365pos_db::JournalStore;
use d365pos_register::commands;
use d365pos_register::console::Console;
use d365pos_register::error::{ApiError, ErrorCode};
use d365pos_register::state::AppConfig;
use d365pos_register::{init_tracing, Register};

/// D365 POS register.
#[derive(Parser, Debug)]
#[command(name = "d365pos", version, about, long_about = None)]
struct Cli {
    /// Config file (default: platform config directory)
    #[arg(global = true, long, env = "D365POS_CONFIG")]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(global = true, long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pull products, prices and barcode masks from the ERP
    Sync,

    /// List recent transactions, or show one receipt
    Journal {
        #[arg(long)]
        receipt: Option<String>,

        #[arg(long)]
        limit: Option<u32>,
    },

    /// Show the unit prices of an item
    PriceCheck { item: String },

    /// Search products by description, barcode or item id
    Search {
        text: String,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Run an interactive register session on stdin
    Register {
        /// Sync the catalog before the session starts
        #[arg(long, default_value_t = false)]
        sync: bool,
    },

    /// Look up the operator's company and store in the ERP and save them
    /// to the config file
    SignIn {
        /// ERP user id, also saved as the staff id
        user: String,

        #[arg(long, env = "D365POS_PASSWORD", hide_env_values = true)]
        password: String,

        /// Sync the catalog of the resolved store afterwards
        #[arg(long, default_value_t = false)]
        sync: bool,
    },

    /// Write a config file with default values
    InitConfig {
        /// Overwrite an existing file
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(code = ?err.code, "{}", err.message);
            eprintln!("error: {}", err.message);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), ApiError> {
    // Both run before the store section exists.
    match cli.command {
        Command::InitConfig { force } => return init_config(cli.config, force),
        Command::SignIn {
            user,
            password,
            sync: sync_after,
        } => return sign_in(cli.config, cli.json, &user, &password, sync_after).await,
        _ => {}
    }

    let config = AppConfig::load(cli.config)?;
    let register = Register::open(config).await?;
    let json = cli.json;

    match cli.command {
        Command::Sync => {
            let response = sync(&register).await?;
            print(json, &response, || {
                let mut text: String = response
                    .steps
                    .iter()
                    .map(|s| {
                        let outcome = if s.kept_previous {
                            "kept previous".to_string()
                        } else {
                            format!("{} stored", s.stored)
                        };
                        format!(
                            "{:<14} {:>6} received  {:>6} skipped  {}\n",
                            s.step, s.received, s.skipped, outcome
                        )
                    })
                    .collect();
                text.push_str(&format!(
                    "catalog: {} products, {} prices\n",
                    response.products, response.prices
                ));
                text
            })?;
            if let (Some(step), Some(err)) = (&response.failed_step, &response.error) {
                return Err(ApiError::new(
                    ErrorCode::RemoteError,
                    format!("Sync stopped at {}: {}", step, err),
                ));
            }
        }
        Command::Journal {
            receipt: Some(receipt),
            ..
        } => {
            let tx = commands::show_receipt(&register.db.transactions(), &receipt).await?;
            print(json, &tx, || {
                let mut text = format!(
                    "{} {} {} total {}\n",
                    tx.header.receipt_id,
                    tx.header.transaction_type,
                    tx.header.created_at.format("%Y-%m-%d %H:%M:%S"),
                    format_amount(tx.header.total)
                );
                for line in &tx.lines {
                    text.push_str(&format!(
                        "{:>3} {:<12} {:<6} {:>9} x {:>9} = {:>10}\n",
                        line.line_num,
                        line.item_id,
                        line.unit_id,
                        format_amount(line.quantity),
                        format_amount(line.unit_price),
                        format_amount(line.gross_amount)
                    ));
                }
                if let Some(payment) = &tx.payment {
                    text.push_str(&format!(
                        "{} {} {}\n",
                        payment.method,
                        payment.payment_type.as_str(),
                        format_amount(payment.amount)
                    ));
                }
                text
            })?;
        }
        Command::Journal {
            receipt: None,
            limit,
        } => {
            let rows = commands::list_journal(&register.db.transactions(), limit).await?;
            print(json, &rows, || {
                rows.iter()
                    .map(|r| {
                        format!(
                            "{:<20} {:<8} {:<19} {:>3} {:>10} {:>9} {:>10}\n",
                            r.receipt_id,
                            r.transaction_type,
                            r.created_at,
                            r.lines,
                            r.subtotal,
                            r.tax,
                            r.total
                        )
                    })
                    .collect()
            })?;
        }
        Command::PriceCheck { item } => {
            let response = commands::price_check(&register.session, &item)?;
            print(json, &response, || {
                let mut text = format!(
                    "{} {}\n",
                    response.item_id,
                    response.description.as_deref().unwrap_or("")
                );
                for price in &response.prices {
                    text.push_str(&format!(
                        "  {:<6} {:>10}{}\n",
                        price.unit_id,
                        format_amount(price.unit_price),
                        if price.includes_tax() { " incl. tax" } else { "" }
                    ));
                }
                text
            })?;
        }
        Command::Search { text, limit } => {
            let hits = commands::search_products(&register.session, &text, limit)?;
            print(json, &hits, || {
                hits.iter()
                    .map(|p| format!("{:<12} {:<16} {}\n", p.item_id, p.barcode, p.description))
                    .collect()
            })?;
        }
        Command::Register { sync: sync_first } => {
            if sync_first {
                let response = sync(&register).await?;
                info!(
                    complete = response.is_complete(),
                    products = response.products,
                    "Startup catalog sync finished"
                );
            }
            let client = register.erp_client()?;
            let finalizer = register.finalizer(client);
            let journal: Arc<dyn JournalStore> = Arc::new(register.db.clone());
            let console = Console::new(register.session.clone(), finalizer, journal);

            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            console
                .run(stdin, tokio::io::stdout())
                .await
                .map_err(|e| ApiError::internal(format!("Console I/O failed: {}", e)))?;
        }
        Command::InitConfig { .. } | Command::SignIn { .. } => {}
    }

    register.db.close().await;
    Ok(())
}

async fn sync(register: &Register) -> Result<commands::SyncResponse, ApiError> {
    let client = register.erp_client()?;
    let service = register.catalog_sync_service(client);
    commands::sync_catalog(&register.session, &service, &register.db.catalog()).await
}

async fn sign_in(
    path: Option<PathBuf>,
    json: bool,
    user: &str,
    password: &str,
    sync_after: bool,
) -> Result<(), ApiError> {
    // The file is rewritten as read; environment overrides only shape the
    // connection used for the lookup.
    let mut file = AppConfig::read_file(path.clone())?;
    let mut effective = file.clone();
    effective.apply_env_overrides();

    let service = d365pos_register::sign_in_service(&effective.erp)?;
    let response = commands::sign_in(&service, &mut file, user, password).await?;
    let written = file.save(path)?;

    print(json, &response, || {
        format!(
            "signed in as {}: company {}, store {}\nsaved to {}\n",
            response.user_id,
            response.company,
            response.store_id,
            written.display()
        )
    })?;

    if sync_after {
        effective.apply_sign_in(&d365pos_sync::RegisterIdentity {
            user_id: response.user_id.clone(),
            company: response.company.clone(),
            store_id: response.store_id.clone(),
        });
        let register = Register::open(effective).await?;
        let synced = sync(&register).await;
        register.db.close().await;
        let synced = synced?;
        info!(
            complete = synced.is_complete(),
            products = synced.products,
            "Post sign-in catalog sync finished"
        );
        if let (Some(step), Some(err)) = (&synced.failed_step, &synced.error) {
            return Err(ApiError::new(
                ErrorCode::RemoteError,
                format!("Sync stopped at {}: {}", step, err),
            ));
        }
    }

    Ok(())
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<(), ApiError> {
    let target = path.clone().or_else(AppConfig::default_config_path);
    if let Some(target) = &target {
        if target.exists() && !force {
            return Err(ApiError::validation(format!(
                "{} already exists, pass --force to overwrite",
                target.display()
            )));
        }
    }

    let written = AppConfig::default().save(path)?;
    println!("{}", written.display());
    Ok(())
}

fn print<T, F>(json: bool, value: &T, text: F) -> Result<(), ApiError>
where
    T: Serialize,
    F: FnOnce() -> String,
{
    if json {
        let out = serde_json::to_string_pretty(value)
            .map_err(|e| ApiError::internal(format!("JSON output failed: {}", e)))?;
        println!("{}", out);
    } else {
        print!("{}", text());
    }
    Ok(())
}
