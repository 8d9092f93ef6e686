use anyhow::{Context, Result};
use openelev::{Coordinate, ElevationEngine, ElevationError, Settings};
use serde::Serialize;

#[derive(Serialize)]
struct QueryOutput {
    latitude: f64,
    longitude: f64,
    elevation: Option<f64>,
}

pub async fn run(settings: Settings, lat: f64, lon: f64, json: bool) -> Result<()> {
    let coord = Coordinate::new(lat, lon)?;

    let engine = ElevationEngine::initialize(settings)
        .context("Failed to initialize elevation engine")?;

    let elevation = match engine.lookup(coord).await {
        Ok(elevation) => Some(elevation),
        Err(ElevationError::NoCoverage { .. }) => None,
        Err(err) => return Err(err.into()),
    };

    if json {
        let output = QueryOutput {
            latitude: lat,
            longitude: lon,
            elevation,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        match elevation {
            Some(elevation) => println!("{elevation:.2}"),
            None => println!("no data"),
        }
    }

    Ok(())
}
