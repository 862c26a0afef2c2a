//! Prints a quote, the company overview and the market status for one symbol.
//!
//! The API key is taken from `~/.alphavantage` or `ALPHAVANTAGE_API_KEY`.
//!
//! Run with: `cargo run --example market_snapshot -- IBM`

use vantage::{Client, Error};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("vantage=debug,market_snapshot=info")
        .init();

    let symbol = std::env::args().nth(1).unwrap_or_else(|| "IBM".to_string());

    let client = Client::builder().cache(true).build()?;

    let quote = client.global_quote(symbol.as_str()).await?;
    if quote.base.limit_reached {
        println!("Rate limit reached, try again in a minute");
        return Ok(());
    }
    if !quote.base.success {
        println!(
            "No quote for {}: {}",
            symbol,
            quote.base.error_message.unwrap_or_default()
        );
        return Ok(());
    }

    println!("=== Quote ===");
    for (field, value) in &quote.data {
        println!("{}: {}", field, value);
    }
    println!();

    println!("=== Overview ===");
    let overview = client.company_overview(symbol.as_str()).await?;
    for key in ["Name", "Sector", "MarketCapitalization", "PERatio"] {
        println!("{}: {}", key, overview.get(key).unwrap_or("-"));
    }
    println!();

    println!("=== Open markets ===");
    let status = client.market_status().await?;
    for market in status.open_markets() {
        println!("{} ({})", market.region, market.market_type);
    }

    println!();
    println!("Upstream calls made: {}", client.total_calls());

    Ok(())
}
