// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Physical variables reconstructed by the downstream decoder.

use serde::Serialize;

pub const PRESSURE_LEVELS: [u32; 13] = [50, 100, 150, 200, 250, 300, 400, 500, 600, 700, 850, 925, 1000];

pub const SURFACE_VARIABLES: [&str; 6] = [
    "2m_temperature",
    "10m_u_component_of_wind",
    "10m_v_component_of_wind",
    "mean_sea_level_pressure",
    "sea_surface_temperature",
    "total_precipitation",
];

pub const ATMOSPHERIC_VARIABLES: [&str; 5] = [
    "temperature",
    "u_component_of_wind",
    "v_component_of_wind",
    "geopotential",
    "specific_humidity",
];

pub const CONTEXT_VARIABLES: [&str; 1] = ["toa_incident_solar_radiation"];

/// Model output is m/h; published fields are mm/h.
const PRECIPITATION_SCALE: f64 = 1000.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct VariableInfo {
    pub name: &'static str,
    pub units: &'static str,
    pub long_name: &'static str,
    pub is_level: bool,
}

/// State variables in decoder order: surface first, then pressure-level fields.
pub fn state_variables() -> impl Iterator<Item = &'static str> {
    SURFACE_VARIABLES
        .iter()
        .chain(ATMOSPHERIC_VARIABLES.iter())
        .copied()
}

pub fn variable_info(name: &str) -> Option<VariableInfo> {
    let (units, long_name) = match name {
        "10m_u_component_of_wind" => ("m/s", "10 meter U wind component"),
        "10m_v_component_of_wind" => ("m/s", "10 meter V wind component"),
        "u_component_of_wind" => ("m/s", "U wind component"),
        "v_component_of_wind" => ("m/s", "V wind component"),
        "total_precipitation" => ("mm/h", "Total precipitation"),
        "mean_sea_level_pressure" => ("Pa", "Mean sea level pressure"),
        "sea_surface_temperature" => ("K", "Sea surface temperature"),
        "temperature" => ("K", "Temperature"),
        "2m_temperature" => ("K", "2 meter temperature"),
        "geopotential" => ("m^2 s^-2", "Geopotential"),
        "specific_humidity" => ("kg kg^-1", "Specific humidity"),
        _ => return None,
    };
    let name = state_variables().find(|known| *known == name)?;
    Some(VariableInfo {
        name,
        units,
        long_name,
        is_level: ATMOSPHERIC_VARIABLES.contains(&name),
    })
}

/// Catalog of every state variable, in decoder order.
pub fn catalog() -> Vec<VariableInfo> {
    state_variables().filter_map(variable_info).collect()
}

/// Converts a decoded value from model units into published units.
pub fn convert_units(name: &str, value: f64) -> f64 {
    match name {
        "total_precipitation" => value * PRECIPITATION_SCALE,
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_every_state_variable() {
        let catalog = catalog();
        assert_eq!(catalog.len(), SURFACE_VARIABLES.len() + ATMOSPHERIC_VARIABLES.len());
        assert!(catalog.iter().filter(|v| v.is_level).count() == ATMOSPHERIC_VARIABLES.len());
    }

    #[test]
    fn context_variables_have_no_published_units() {
        assert!(variable_info(CONTEXT_VARIABLES[0]).is_none());
        assert!(variable_info("unknown").is_none());
    }

    #[test]
    fn precipitation_is_reported_in_millimetres() {
        assert_eq!(convert_units("total_precipitation", 0.5), 500.0);
        assert_eq!(convert_units("temperature", 280.0), 280.0);
        assert_eq!(variable_info("total_precipitation").unwrap().units, "mm/h");
    }
}
