//! Station gazetteer: canonical station name to map coordinates.
//!
//! The gazetteer is injected into the pipeline rather than read from a
//! global, so deployments can ship their own table (`GAZETTEER_PATH`) and
//! tests can use fixtures. Stations without an entry are dropped from map
//! output only; they still appear in charts and tables.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::normalize::CanonicalStation;

// ---

/// WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Static lookup from station name to coordinates.
#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    exact: HashMap<String, Coordinates>,
    folded: HashMap<String, Coordinates>,
}

/// Municipal telemetry stations and national rain gauges around Manaus.
const BUILTIN: &[(&str, f64, f64)] = &[
    // Municipal network
    ("EST_SEMULSP", -3.1089, -60.0548),
    ("EST_MINDU", -3.0780, -60.0070),
    ("ANNA RAYMUNDA", -2.9750, -60.0080),
    ("EST_PONTA_NEGRA", -3.0624, -60.1044),
    // National network
    ("Igarapé do Quarenta", -3.119457, -59.978352),
    ("Igarapé Quarenta", -3.119457, -59.978352),
    ("Igarapé do Mindu", -3.091422, -60.015121),
    ("Puraquequara", -3.05913, -59.84491),
    ("Colônia Antônio Aleixo", -3.08671, -59.88327),
    ("Mauazinho", -3.1244, -59.94),
    ("Jorge Teixeira", -3.04505, -59.92481),
    ("Cidade de Deus", -3.01954, -59.94026),
    ("Santa Luzia", -3.13807, -60.00741),
    ("Flores", -3.04046, -59.99958),
    ("Bairro da União", -3.09952, -60.0159),
    ("Santa Etelvina", -2.98676, -60.01654),
    ("Tarumã", -3.00228, -60.04581),
    ("Redenção", -3.05418, -60.04631),
    ("Compensa", -3.11483, -60.05759),
    ("Gilberto Mestrinho", -3.085, -59.93),
];

impl Gazetteer {
    // ---
    /// The coordinates shipped with the service.
    pub fn builtin() -> Self {
        Self::from_entries(
            BUILTIN
                .iter()
                .map(|&(name, lat, lon)| (name.to_string(), Coordinates { lat, lon })),
        )
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Coordinates)>,
    {
        let mut gazetteer = Self::default();
        for (name, coords) in entries {
            gazetteer.insert(name, coords);
        }
        gazetteer
    }

    /// Parse a JSON object of the form `{"Name": {"lat": .., "lon": ..}}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let entries: HashMap<String, Coordinates> =
            serde_json::from_str(json).context("gazetteer JSON is not a name → {lat, lon} map")?;
        Ok(Self::from_entries(entries))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read gazetteer {}", path.display()))?;
        Self::from_json_str(&json)
    }

    pub fn insert(&mut self, name: String, coords: Coordinates) {
        self.folded.insert(fold(&name), coords);
        self.exact.insert(name, coords);
    }

    /// Look a station up: exact name first, then accent/case-insensitive.
    pub fn locate(&self, station: &CanonicalStation) -> Option<Coordinates> {
        // ---
        self.exact
            .get(station.as_str())
            .or_else(|| self.folded.get(&fold(station.as_str())))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }
}

/// Lowercase and strip the Portuguese diacritics station labels vary on.
fn fold(name: &str) -> String {
    // ---
    name.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}
