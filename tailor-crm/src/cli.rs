//! Command-line front end
//!
//! Parses arguments with clap, builds the [`AppState`] and dispatches to the
//! directories, the ledger and the maintenance services. On the remote
//! backend every data command needs a stored session (`tailor-crm login`).

use crate::app::AppState;
use crate::config::AppConfig;
use crate::database::{Bill, BillAmounts, BillStatus, Customer, PhotoUpload};
use crate::services::{AnalyticsSummary, BillFilter, BillLedger, ReconcilePlan};
use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "tailor-crm", version, about = "Shops, customers and bills for tailoring businesses")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage shops
    #[command(subcommand)]
    Shops(ShopCommand),
    /// Manage the customers of a shop
    #[command(subcommand)]
    Customers(CustomerCommand),
    /// Manage bills, photos and completion
    #[command(subcommand)]
    Bills(BillCommand),
    /// Paid, unpaid and stitching totals
    Analytics,
    /// Delete stored photos no bill refers to
    Reconcile {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Write a JSON backup of every table
    Export {
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Sign in to the remote backend
    Login(Credentials),
    /// Create an account on the remote backend
    Signup(Credentials),
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
}

#[derive(Args, Debug)]
pub struct Credentials {
    #[arg(long)]
    pub email: String,
    /// Read from standard input when omitted
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ShopCommand {
    List,
    Add { name: String },
    Rename { id: String, name: String },
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum CustomerCommand {
    List {
        /// Defaults to the first shop
        #[arg(long)]
        shop: Option<String>,
    },
    Add {
        #[arg(long)]
        shop: String,
        name: String,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Replace every field of a customer
    Edit {
        id: String,
        name: String,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum BillCommand {
    List {
        /// Defaults to the first shop
        #[arg(long)]
        shop: Option<String>,
        /// all, completed, complete, ordered or working
        #[arg(long, default_value = "all")]
        filter: BillFilter,
    },
    Add {
        #[arg(long)]
        shop: String,
        #[arg(long)]
        customer: String,
        #[arg(long)]
        stitching: f64,
        #[arg(long)]
        balance: f64,
        #[arg(long, default_value = "unpaid")]
        status: BillStatus,
        /// Photo file to attach
        #[arg(long)]
        photo: Option<PathBuf>,
    },
    /// Replace the amounts and payment status
    Edit {
        id: String,
        #[arg(long)]
        stitching: f64,
        #[arg(long)]
        balance: f64,
        #[arg(long)]
        status: BillStatus,
    },
    /// Attach a new photo
    Photo { id: String, path: PathBuf },
    Complete {
        id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    Incomplete {
        id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Set the reason, or clear it when omitted
    Reason {
        id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    Delete { id: String },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load().await?;
    let state = AppState::initialize(config).await?;

    match cli.command {
        Command::Login(credentials) => login(&state, credentials, false).await,
        Command::Signup(credentials) => login(&state, credentials, true).await,
        Command::Logout => {
            match &state.auth {
                Some(auth) => {
                    auth.sign_out().await?;
                    println!("Signed out");
                }
                None => println!("Local backend, nothing to sign out of"),
            }
            Ok(())
        }
        Command::Whoami => {
            match &state.auth {
                Some(auth) => match auth.session() {
                    Some(session) => println!(
                        "{} ({})",
                        session.user.email.as_deref().unwrap_or("-"),
                        session.user.id
                    ),
                    None => println!("Not signed in"),
                },
                None => println!("Local backend at {}", state.config.data_dir.display()),
            }
            Ok(())
        }
        command => {
            state.require_session()?;
            run_data_command(&state, command).await
        }
    }
}

async fn run_data_command(state: &AppState, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Shops(command) => run_shop_command(state, command).await,
        Command::Customers(command) => run_customer_command(state, command).await,
        Command::Bills(command) => run_bill_command(state, command).await,
        Command::Analytics => {
            let summary = state.analytics().compute().await?;
            print_analytics(&summary);
            Ok(())
        }
        Command::Reconcile { yes } => {
            let reconciler = state.reconciler();
            let plan = reconciler.plan().await?;
            print_plan(&plan);

            if plan.is_empty() {
                return Ok(());
            }
            if !yes && !confirm(&format!("Delete {} objects?", plan.orphans.len())).await? {
                println!("Nothing deleted");
                return Ok(());
            }

            let deleted = reconciler.execute(&plan).await;
            println!("Deleted {} of {} orphaned objects", deleted, plan.orphans.len());
            Ok(())
        }
        Command::Export { dir } => {
            let dir = dir.unwrap_or_else(|| state.config.exports_dir());
            let path = state.exporter().write_export(&dir).await?;
            println!("Export written to {}", path.display());
            Ok(())
        }
        Command::Login(_) | Command::Signup(_) | Command::Logout | Command::Whoami => {
            bail!("not a data command")
        }
    }
}

async fn run_shop_command(state: &AppState, command: ShopCommand) -> anyhow::Result<()> {
    let shops = state.shops();
    match command {
        ShopCommand::List => {
            for shop in shops.list_shops().await? {
                println!("{}  {}", shop.id, shop.name);
            }
        }
        ShopCommand::Add { name } => {
            let shop = shops.create_shop(&name).await?;
            println!("Created shop {} ({})", shop.name, shop.id);
        }
        ShopCommand::Rename { id, name } => {
            let shop = shops.rename_shop(&id, &name).await?;
            println!("Renamed shop to {}", shop.name);
        }
        ShopCommand::Delete { id } => {
            shops.delete_shop(&id).await?;
            println!("Deleted shop {} with its customers and bills", id);
        }
    }
    Ok(())
}

async fn run_customer_command(state: &AppState, command: CustomerCommand) -> anyhow::Result<()> {
    let mut directory = state.customers();
    match command {
        CustomerCommand::List { shop } => {
            match shop {
                Some(shop_id) => directory.select_shop(&shop_id).await?,
                None => directory.refresh_shops().await?,
            }
            if directory.selected_shop().is_none() {
                println!("No shops yet");
                return Ok(());
            }
            for customer in directory.customers() {
                print_customer(customer);
            }
        }
        CustomerCommand::Add {
            shop,
            name,
            address,
            phone,
        } => {
            let customer = directory
                .create_customer(&shop, &name, address.as_deref(), phone.as_deref())
                .await?;
            println!("Created customer {} ({})", customer.name, customer.id);
        }
        CustomerCommand::Edit {
            id,
            name,
            address,
            phone,
        } => {
            let customer = directory
                .update_customer(&id, &name, address.as_deref(), phone.as_deref())
                .await?;
            print_customer(&customer);
        }
        CustomerCommand::Delete { id } => {
            directory.delete_customer(&id).await?;
            println!("Deleted customer {} with their bills", id);
        }
    }
    Ok(())
}

async fn run_bill_command(state: &AppState, command: BillCommand) -> anyhow::Result<()> {
    let mut ledger = state.ledger();
    match command {
        BillCommand::List { shop, filter } => {
            match shop {
                Some(shop_id) => ledger.select_shop(&shop_id).await?,
                None => ledger.refresh_shops().await?,
            }
            if ledger.selected_shop().is_none() {
                println!("No shops yet");
                return Ok(());
            }
            ledger.set_filter(filter);
            for bill in ledger.visible_bills() {
                print_bill(&bill, &ledger);
            }
            println!("{}", ledger.filter_summary());
        }
        BillCommand::Add {
            shop,
            customer,
            stitching,
            balance,
            status,
            photo,
        } => {
            let photo = match photo {
                Some(path) => Some(read_photo(&path).await?),
                None => None,
            };
            let amounts = BillAmounts {
                stitching_amount: stitching,
                balance_amount: balance,
                status,
            };
            let bill = ledger.create_bill(&shop, &customer, amounts, photo).await?;
            println!("Created bill {}", bill.id);
        }
        BillCommand::Edit {
            id,
            stitching,
            balance,
            status,
        } => {
            let amounts = BillAmounts {
                stitching_amount: stitching,
                balance_amount: balance,
                status,
            };
            ledger.update_bill_amounts(&id, amounts).await?;
            println!("Updated bill {}", id);
        }
        BillCommand::Photo { id, path } => {
            let photo = read_photo(&path).await?;
            let bill = ledger.replace_photo(&id, photo).await?;
            println!("Photo stored at {}", bill.image_url.unwrap_or_default());
        }
        BillCommand::Complete { id, reason } => {
            ledger.set_completion(&id, true, reason.as_deref()).await?;
            println!("Bill {} marked complete", id);
        }
        BillCommand::Incomplete { id, reason } => {
            ledger.set_completion(&id, false, reason.as_deref()).await?;
            println!("Bill {} marked incomplete", id);
        }
        BillCommand::Reason { id, reason } => {
            ledger.set_reason(&id, reason.as_deref()).await?;
            println!("Reason updated for bill {}", id);
        }
        BillCommand::Delete { id } => {
            ledger.delete_bill(&id).await?;
            println!("Deleted bill {}", id);
        }
    }
    Ok(())
}

async fn login(state: &AppState, credentials: Credentials, sign_up: bool) -> anyhow::Result<()> {
    let Some(auth) = &state.auth else {
        println!("Local backend, no sign-in needed");
        return Ok(());
    };

    let password = match credentials.password {
        Some(password) => password,
        None => prompt("Password: ").await?,
    };

    if sign_up {
        match auth.sign_up(&credentials.email, &password).await? {
            Some(_) => println!("Account created and signed in"),
            None => println!("Account created, confirm your email address then log in"),
        }
    } else {
        let session = auth.sign_in(&credentials.email, &password).await?;
        println!("Signed in as {}", session.user.email.as_deref().unwrap_or(&session.user.id));
    }
    Ok(())
}

async fn read_photo(path: &Path) -> anyhow::Result<PhotoUpload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read photo {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(PhotoUpload::new(file_name, bytes))
}

async fn prompt(message: &str) -> anyhow::Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(message.as_bytes()).await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn confirm(question: &str) -> anyhow::Result<bool> {
    let answer = prompt(&format!("{} [y/N] ", question)).await?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn print_customer(customer: &Customer) {
    println!(
        "{}  {}  {}  {}",
        customer.id,
        customer.name,
        customer.address.as_deref().unwrap_or("-"),
        customer.phone.as_deref().unwrap_or("-")
    );
}

fn print_bill(bill: &Bill, ledger: &BillLedger) {
    let customer = ledger
        .customers()
        .iter()
        .find(|c| c.id == bill.customer_id)
        .map(|c| c.name.as_str())
        .unwrap_or("?");
    let done = if bill.is_completed { "done" } else { "open" };

    println!(
        "{}  {}  {}  stitching {:.2}  balance {:.2}  {}  {}{}",
        bill.id,
        bill.created_at.format("%Y-%m-%d"),
        customer,
        bill.stitching_amount,
        bill.balance_amount,
        bill.status,
        done,
        bill.completion_reason
            .as_deref()
            .map(|r| format!(" ({})", r))
            .unwrap_or_default()
    );
}

fn print_analytics(summary: &AnalyticsSummary) {
    let t = &summary.totals;
    println!("Paid:        {:.2}", t.paid);
    println!("Unpaid:      {:.2}", t.unpaid);
    println!("Stitching:   {:.2}", t.stitching);
    println!("50% deduct:  {:.2}", t.half_deduction);

    for row in &summary.shops {
        println!(
            "{:<24} paid {:.2}  unpaid {:.2}  stitching {:.2}  deduct {:.2}",
            row.shop_name,
            row.totals.paid,
            row.totals.unpaid,
            row.totals.stitching,
            row.totals.half_deduction
        );
    }
}

fn print_plan(plan: &ReconcilePlan) {
    println!(
        "{} stored, {} referenced, {} orphaned",
        plan.stored,
        plan.referenced,
        plan.orphans.len()
    );
    for key in &plan.orphans {
        println!("  {}", key);
    }
}
