//! # Fresh Feed Live Test
//!
//! Asks the live 500px fresh feed for its newest photo, then fetches that
//! photo's page and its owner's page once, the same way a worker takes a
//! snapshot. Nothing is written to disk.

use anyhow::Result;
use clap::Parser;
use lib_common::ingestors::fresh_feed::DEFAULT_FEED_URL;
use lib_common::ingestors::snapshot_fetcher::DEFAULT_SITE_URL;
use lib_common::ingestors::{FeedSource, FreshFeed, SiteFetcher, SnapshotFetcher};

#[derive(Parser, Debug)]
#[clap(about = "Print the freshest 500px photo and fetch its pages once")]
struct Args {
    #[clap(long, default_value = DEFAULT_FEED_URL)]
    feed_url: String,

    #[clap(long, default_value = DEFAULT_SITE_URL)]
    site_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let feed = FreshFeed::new(&args.feed_url)?;
    let fetcher = SiteFetcher::new(&args.site_url)?;

    println!("[*] Polling {}", args.feed_url);

    let fresh = match feed.latest().await {
        Ok(Some(fresh)) => fresh,
        Ok(None) => {
            println!("[INFO] The feed is currently empty.");
            return Ok(());
        }
        Err(e) => {
            // // Statement: Same failure that makes the crawler exit with code 2
            eprintln!("\n[ERROR] Discovery failed:");
            eprintln!(">>> {}", e);
            std::process::exit(2);
        }
    };
    println!("[SUCCESS] Newest photo {} by {}", fresh.id, fresh.owner);

    let item = fetcher.fetch_item(fresh.id).await?;
    println!("[INFO] photo page: status {}, {} bytes", item.status, item.body.len());

    let owner = fetcher.fetch_owner(&fresh.owner).await?;
    println!("[INFO] user page:  status {}, {} bytes", owner.status, owner.body.len());

    Ok(())
}
