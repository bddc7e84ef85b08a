//! # Seed Data Generator
//!
//! Populates the database with sites, zones and vehicles for development.
//!
//! ## Usage
//! ```bash
//! # 3 sites, 500 vehicles (default)
//! cargo run -p parking-db --bin seed
//!
//! # Custom vehicle count
//! cargo run -p parking-db --bin seed -- --vehicles 2000
//!
//! # Specify database path
//! cargo run -p parking-db --bin seed -- --db ./data/parking.db
//! ```
//!
//! ## Generated Data
//! - One site per entry in `SITES`
//! - Every site gets every zone layout in `ZONES`
//! - Vehicles with plates `{AAA}{NNN}` and a type mix weighted toward cars

use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::env;

use parking_core::{Money, Site, Vehicle, VehicleType, Zone};
use parking_db::{Database, DbConfig};

/// (name, city)
const SITES: &[(&str, &str)] = &[
    ("North Campus", "Medellin"),
    ("Downtown Tower", "Bogota"),
    ("Harbor Mall", "Cartagena"),
];

/// (name, capacity, hourly rates in major units per allowed type)
const ZONES: &[(&str, i64, &[(VehicleType, i64)])] = &[
    (
        "General",
        120,
        &[(VehicleType::Car, 2000), (VehicleType::Truck, 3500)],
    ),
    (
        "Two Wheels",
        60,
        &[(VehicleType::Motorcycle, 1000), (VehicleType::Bicycle, 0)],
    ),
    ("Buses", 8, &[(VehicleType::Bus, 5000)]),
];

/// Type mix for generated vehicles, cycled by index.
const VEHICLE_MIX: &[VehicleType] = &[
    VehicleType::Car,
    VehicleType::Car,
    VehicleType::Car,
    VehicleType::Motorcycle,
    VehicleType::Car,
    VehicleType::Bicycle,
    VehicleType::Car,
    VehicleType::Motorcycle,
    VehicleType::Truck,
    VehicleType::Bus,
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut vehicles: usize = 500;
    let mut db_path = String::from("./parking_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--vehicles" | "-v" => {
                if i + 1 < args.len() {
                    vehicles = args[i + 1].parse().unwrap_or(500);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Parking Engine Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -v, --vehicles <N>  Number of vehicles to register (default: 500)");
                println!("  -d, --db <PATH>     Database file path (default: ./parking_dev.db)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Parking Engine Seed Data Generator");
    println!("=====================================");
    println!("Database: {}", db_path);
    println!("Vehicles: {}", vehicles);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.sites().list().await?;
    if !existing.is_empty() {
        println!("⚠ Database already has {} sites", existing.len());
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let now = Utc::now();
    let start = std::time::Instant::now();

    println!();
    println!("Creating sites and zones...");

    for (site_name, city) in SITES {
        let site = Site::new(site_name, city, now)?;
        db.sites().insert(&site).await?;

        for (zone_name, capacity, rates) in ZONES {
            let allowed: BTreeSet<VehicleType> = rates.iter().map(|(t, _)| *t).collect();
            let tariffs: BTreeMap<VehicleType, Money> = rates
                .iter()
                .map(|(t, major)| (*t, Money::from_major_minor(*major, 0)))
                .collect();

            let zone = Zone::new(&site.id, zone_name, *capacity, allowed, tariffs, now)?;
            db.zones().insert(&zone).await?;
            println!("  {} / {} ({} slots)", site.name, zone.name, zone.capacity_max);
        }
    }

    println!();
    println!("Registering vehicles...");

    let mut registered = 0;
    for index in 0..vehicles {
        let vehicle_type = VEHICLE_MIX[index % VEHICLE_MIX.len()];
        let owner = format!("owner-{:04}", index % 400);
        let vehicle = Vehicle::new(&plate_for(index), &owner, vehicle_type, now)?;

        if let Err(e) = db.vehicles().insert(&vehicle).await {
            eprintln!("Failed to insert {}: {}", vehicle.plate, e);
            continue;
        }

        registered += 1;
        if registered % 100 == 0 {
            println!("  Registered {} vehicles...", registered);
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!(
        "✓ Created {} sites, {} zones, {} vehicles in {:?}",
        SITES.len(),
        SITES.len() * ZONES.len(),
        registered,
        elapsed
    );

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Deterministic plate: three letters then three digits, e.g. `AAB007`.
fn plate_for(index: usize) -> String {
    let letters: String = [index / 676, index / 26, index]
        .iter()
        .map(|n| char::from(b'A' + (n % 26) as u8))
        .collect();
    format!("{}{:03}", letters, index % 1000)
}
