// Small command line front end for the travel booking client
//
//   travel_client                          featured destinations and packages
//   travel_client destinations <query>     search destinations
//   travel_client packages <query> [TYPE]  search packages, optionally by package type

use std::env;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use travel_booking_client::{
    ApiService, ClientConfig, Destination, FeaturedCatalog, SearchController, SearchCriteria,
    SearchMode, SearchOutcome, SessionStore, TravelPackage,
};

fn print_destinations(destinations: &[Destination]) {
    for d in destinations {
        println!(
            "[{}] {} ({}, {}) from {:.2} {}",
            d.id, d.name, d.city, d.country, d.price, d.currency
        );
    }
}

fn print_packages(packages: &[TravelPackage]) {
    for p in packages {
        println!(
            "[{}] {} - {} - {:.2} {} - {} seats left",
            p.id,
            p.name,
            p.package_type.as_str(),
            p.price,
            p.currency,
            p.remaining_capacity()
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "travel_booking_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env();
    tracing::info!("Using travel API at {}", config.base_url);

    let api = Arc::new(ApiService::new(&config).context("failed to create API client")?);
    let session = SessionStore::from_config(api.clone(), &config);
    if let Some(user) = session.current_user() {
        println!("Signed in as {} ({})", user.username, user.full_name());
    }

    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None => {
            let catalog = FeaturedCatalog::load(&api).await?;
            println!("Featured destinations:");
            print_destinations(&catalog.destinations);
            println!("Featured packages:");
            print_packages(&catalog.packages);
        }
        Some(kind @ ("destinations" | "packages")) => {
            let term = args.get(1).map(String::as_str).unwrap_or_default();
            let package_type = args.get(2).map(String::as_str).unwrap_or_default();
            let criteria = SearchCriteria::from_inputs(term, "", "", package_type)?;

            let search = SearchController::new(api.clone());
            if kind == "packages" {
                search.set_mode(SearchMode::Packages);
            }
            match search.search(&criteria).await? {
                SearchOutcome::Destinations(found) => print_destinations(&found),
                SearchOutcome::Packages(found) => print_packages(&found),
                SearchOutcome::Superseded => {}
            }
        }
        Some(other) => bail!("unknown command: {}", other),
    }

    Ok(())
}
