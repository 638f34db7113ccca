//! # Seed Data Generator
//!
//! Populates the database with demo listings for local development.
//!
//! ## Usage
//! ```bash
//! # Insert the demo listings into ./kitshare_dev.db
//! cargo run -p rental-db --bin seed
//!
//! # Another database, five owners
//! cargo run -p rental-db --bin seed -- --db ./data/kitshare.db --owners 5
//! ```
//!
//! Listings are spread round-robin over demo owners `owner-1` .. `owner-N`
//! (three by default) so the API can be exercised with tokens for those uids.

use chrono::Utc;
use rental_core::{CancellationPolicy, Listing, ListingStatus, LoyaltyTier};
use rental_db::{Database, DbConfig};
use std::env;
use uuid::Uuid;

/// (title, daily price cents, gear value cents, delivery fee cents)
const GEAR: &[(&str, i64, i64, i64)] = &[
    ("Canon EOS R6 body", 4500, 180_000, 1500),
    ("Sony FE 24-70mm f/2.8 GM", 3000, 160_000, 1000),
    ("DJI Mavic 3 drone", 6500, 220_000, 2000),
    ("Aputure 300d II light kit", 3500, 90_000, 1500),
    ("Rode Wireless GO II", 1500, 30_000, 500),
    ("MSR Hubba Hubba 2P tent", 2000, 45_000, 0),
    ("Thule roof box 450L", 2500, 70_000, 0),
    ("Trek Marlin 7 mountain bike", 3500, 110_000, 2500),
    ("Burton Custom snowboard", 3000, 60_000, 0),
    ("Festool TS 55 track saw", 4000, 75_000, 1500),
    ("Makita rotary hammer", 2500, 35_000, 1000),
    ("JBL PartyBox 310", 3000, 50_000, 1500),
];

const POLICIES: &[CancellationPolicy] = &[
    CancellationPolicy::Flexible,
    CancellationPolicy::Moderate,
    CancellationPolicy::Strict,
];

const TIERS: &[LoyaltyTier] = &[LoyaltyTier::None, LoyaltyTier::Silver, LoyaltyTier::Gold];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut db_path = String::from("./kitshare_dev.db");
    let mut owners: usize = 3;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" | "-d" => {
                if let Some(path) = args.next() {
                    db_path = path;
                }
            }
            "--owners" | "-o" => {
                owners = args.next().and_then(|n| n.parse().ok()).unwrap_or(owners).max(1);
            }
            "--help" | "-h" => {
                println!("Usage: seed [--db <PATH>] [--owners <N>]");
                println!();
                println!("  -d, --db <PATH>     Database file (default: ./kitshare_dev.db)");
                println!("  -o, --owners <N>    Spread listings over owner-1..owner-N (default: 3)");
                return Ok(());
            }
            other => eprintln!("Ignoring unknown argument {}", other),
        }
    }

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("Seeding {} (schema migrated)", db_path);

    let existing = db.listings().count().await?;
    if existing > 0 {
        println!("{} listings already present, nothing to do", existing);
        return Ok(());
    }

    let mut inserted = 0;
    for (idx, (title, daily, gear_value, delivery)) in GEAR.iter().enumerate() {
        let listing = demo_listing(idx, owners, title, *daily, *gear_value, *delivery);

        match db.listings().insert(&listing).await {
            Ok(()) => {
                println!(
                    "  {:<30} {}/day  {:?}  {}",
                    listing.title,
                    listing.daily_price(),
                    listing.cancellation_policy,
                    listing.owner_uid
                );
                inserted += 1;
            }
            Err(e) => eprintln!("  {} skipped: {}", listing.title, e),
        }
    }

    println!("{} of {} demo listings inserted", inserted, GEAR.len());
    db.close().await;
    Ok(())
}

/// Owner, policy and loyalty tier rotate with `idx`.
fn demo_listing(
    idx: usize,
    owners: usize,
    title: &str,
    daily: i64,
    gear_value: i64,
    delivery: i64,
) -> Listing {
    let now = Utc::now();
    Listing {
        id: Uuid::new_v4().to_string(),
        owner_uid: format!("owner-{}", idx % owners + 1),
        title: title.to_string(),
        daily_price_cents: daily,
        status: ListingStatus::Active,
        location: Some("Brooklyn, NY".to_string()),
        gear_value_cents: gear_value,
        delivery_fee_cents: delivery,
        owner_loyalty_tier: TIERS[idx % TIERS.len()],
        cancellation_policy: POLICIES[idx % POLICIES.len()],
        availability_version: 0,
        created_at: now,
        updated_at: now,
    }
}
