use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use token_balances::{
    format_usd, BalanceClient, ClientConfig, NativeBalanceRecord, PageEvent, TokenBalanceRecord,
    TokenListRecord,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "token-balances")]
#[command(about = "Query native and ERC-20 balances through The Graph token API", long_about = None)]
struct Args {
    /// The wallet address to query (0x followed by 40 hex characters)
    #[arg(short, long)]
    address: String,

    /// Network name or chain id (ethereum, polygon, base, arbitrum, optimism, bsc, avalanche)
    #[arg(short, long, default_value = "ethereum")]
    network: String,

    /// Look up a single token by symbol
    #[arg(short, long, conflicts_with = "all")]
    token: Option<String>,

    /// List every token the address holds
    #[arg(long)]
    all: bool,

    /// Only keep these symbols when listing, comma separated
    #[arg(long, value_delimiter = ',', requires = "all")]
    symbols: Vec<String>,

    /// The Graph API key
    #[arg(long, env = "THEGRAPH_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Print the JSON record instead of a table
    #[arg(long)]
    json: bool,

    /// Give up on --all after this many seconds
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = ClientConfig::from_env().with_api_key(args.api_key.clone());
    let mut client = BalanceClient::from_config(config).context("cannot create balance client")?;
    if args.all && !args.json {
        client = client.on_progress(report_progress);
    }

    let outcome = run(&client, &args).await;
    client.close();

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(client: &BalanceClient, args: &Args) -> Result<()> {
    if let Some(symbol) = &args.token {
        let record = client
            .token_balance_record(&args.address, symbol, &args.network)
            .await;
        return print_token(&record, args.json);
    }

    if args.all {
        let symbols = (!args.symbols.is_empty()).then_some(args.symbols.as_slice());
        let listing = client.token_list_record(&args.address, &args.network, symbols);
        let record = tokio::time::timeout(Duration::from_secs(args.timeout_secs), listing)
            .await
            .map_err(|_| {
                anyhow!(
                    "the API call took longer than {}s; the address may hold many tokens or the API is rate limiting. Try --token or --symbols",
                    args.timeout_secs
                )
            })?;
        return print_tokens(&record, args.json);
    }

    let record = client
        .native_balance_record(&args.address, &args.network)
        .await;
    print_native(&record, args.json)
}

fn report_progress(event: &PageEvent) {
    match event {
        PageEvent::PageRequested { page } => eprint!("\r   Fetching page {}...", page),
        PageEvent::PageFetched { page, total, .. } => {
            eprint!("\r   Page {}: {} tokens so far", page, total)
        }
        PageEvent::RateLimited { page, retry_in, .. } => eprint!(
            "\r   Rate limited on page {}, retrying in {}s...",
            page,
            retry_in.as_secs()
        ),
        PageEvent::Finished { .. } => eprintln!(),
    }
}

fn print_native(record: &NativeBalanceRecord, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
    }
    if let Some(error) = &record.error {
        bail!("{}", error);
    }
    if json {
        return Ok(());
    }

    println!("Chain: {}", record.chain_name.as_deref().unwrap_or("N/A"));
    println!("{}", "=".repeat(60));
    println!(
        "{:6} | {:>24} (raw: {})",
        record.token_symbol,
        shorten(&record.balance),
        record.balance_raw
    );
    println!("{}", "=".repeat(60));
    Ok(())
}

fn print_token(record: &TokenBalanceRecord, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
    }
    if let Some(error) = &record.error {
        bail!("{}", error);
    }
    if json {
        return Ok(());
    }

    if record.token_address.is_empty() {
        println!("No {} balance found", record.token_symbol);
        return Ok(());
    }
    println!("Chain: {}", record.chain_name.as_deref().unwrap_or("N/A"));
    println!(
        "Token: {} ({})",
        record.token_symbol,
        record.token_name.as_deref().unwrap_or("Unknown")
    );
    println!("Balance: {} {}", shorten(&record.balance), record.token_symbol);
    println!("USD Value: {}", format_usd(usd_of(record)));
    println!("Token Address: {}", record.token_address);
    Ok(())
}

fn print_tokens(record: &TokenListRecord, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
    } else {
        println!("Found {} token(s)\n", record.tokens.len());
        println!(
            "{:<30} {:<10} {:<25} {:<15} {:<15}",
            "Token Name", "Symbol", "Balance", "Price (USD)", "Value (USD)"
        );
        println!("{}", "-".repeat(95));

        let mut total = 0.0;
        for token in &record.tokens {
            let name: String = token
                .token_name
                .as_deref()
                .unwrap_or("Unknown")
                .chars()
                .take(28)
                .collect();
            let value = usd_of(token);
            let price = match token.balance.parse::<f64>() {
                Ok(balance) if balance > 0.0 => format_usd(value / balance),
                _ => format_usd(0.0),
            };
            total += value;

            println!(
                "{:<30} {:<10} {:<25} {:<15} {:<15}",
                name,
                token.token_symbol,
                shorten(&token.balance),
                price,
                format_usd(value)
            );
        }

        println!("{}", "-".repeat(95));
        println!("{:<66} {:<15}", "Total", format_usd(total));
    }

    match &record.error {
        Some(error) => bail!("listing incomplete: {}", error),
        None => Ok(()),
    }
}

fn usd_of(record: &TokenBalanceRecord) -> f64 {
    record
        .usd_value
        .as_deref()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.0)
}

/// At most eight fractional digits for display.
fn shorten(balance: &str) -> String {
    match balance.split_once('.') {
        Some((whole, frac)) if frac.len() > 8 => {
            let frac = frac[..8].trim_end_matches('0');
            if frac.is_empty() {
                whole.to_string()
            } else {
                format!("{}.{}", whole, frac)
            }
        }
        _ => balance.to_string(),
    }
}
