use anyhow::{Context, Result};
use serde::Serialize;

use super::GlobalArgs;

#[derive(Serialize)]
struct ElevationResponse<'a> {
    x: f64,
    y: f64,
    dataset: &'a str,
    elevation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tile: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    interpolated: bool,
}

pub fn run(global: &GlobalArgs, x: f64, y: f64, interpolate: bool, json: bool) -> Result<()> {
    let service = global.build_service()?;

    let elevation = if interpolate {
        service.point_elevation_interpolated(x, y)
    } else {
        service.point_elevation(x, y)
    }
    .context("Failed to get elevation")?;

    if json {
        let (nx, ny) = service.to_native(x, y);
        let response = ElevationResponse {
            x,
            y,
            dataset: service.dataset().as_str(),
            elevation,
            tile: service.scheme().frame_name_at(nx, ny),
            interpolated: interpolate,
        };
        println!("{}", serde_json::to_string(&response)?);
    } else {
        match elevation {
            Some(h) if interpolate => println!("{:.2}", h),
            Some(h) => println!("{}", h),
            None => println!("void"),
        }
    }

    Ok(())
}
