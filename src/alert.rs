//! 24-hour rainfall alert classification.
//!
//! Breakpoints (mm over 24 h), lower bound inclusive:
//!
//! | Level      | Range      |
//! |------------|------------|
//! | NORMAL     | < 10       |
//! | OBSERVAÇÃO | [10, 30)   |
//! | ATENÇÃO    | [30, 70)   |
//! | CRÍTICO    | >= 70      |
//!
//! A value exactly on a breakpoint takes the higher level. NaN maps to
//! [`AlertLevel::NoData`], which is distinct from NORMAL.

use serde::{Deserialize, Serialize};

// ---

/// Ordinal rainfall severity. `NoData` sorts below every real level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AlertLevel {
    #[serde(rename = "SEM_DADOS")]
    NoData,
    #[serde(rename = "NORMAL")]
    Normal,
    #[serde(rename = "OBSERVACAO")]
    Observacao,
    #[serde(rename = "ATENCAO")]
    Atencao,
    #[serde(rename = "CRITICO")]
    Critico,
}

impl AlertLevel {
    /// Severity levels in ascending order, excluding `NoData`.
    pub const LEVELS: [AlertLevel; 4] = [
        AlertLevel::Normal,
        AlertLevel::Observacao,
        AlertLevel::Atencao,
        AlertLevel::Critico,
    ];

    pub fn display_label(self) -> &'static str {
        match self {
            AlertLevel::NoData => "SEM DADOS",
            AlertLevel::Normal => "NORMAL",
            AlertLevel::Observacao => "OBSERVAÇÃO",
            AlertLevel::Atencao => "ATENÇÃO",
            AlertLevel::Critico => "CRÍTICO",
        }
    }

    /// Colour token for map markers and badges.
    pub fn display_color(self) -> &'static str {
        match self {
            AlertLevel::NoData => "#95a5a6",
            AlertLevel::Normal => "#2ecc71",
            AlertLevel::Observacao => "#f1c40f",
            AlertLevel::Atencao => "#e67e22",
            AlertLevel::Critico => "#e74c3c",
        }
    }

    /// Whether panels should highlight the station (OBSERVAÇÃO or worse).
    pub fn is_elevated(self) -> bool {
        self >= AlertLevel::Observacao
    }
}

/// Breakpoints for [`AlertThresholds::classify`], in mm over 24 h.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    pub observation_mm: f64,
    pub attention_mm: f64,
    pub critical_mm: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            observation_mm: 10.0,
            attention_mm: 30.0,
            critical_mm: 70.0,
        }
    }
}

impl AlertThresholds {
    // ---
    /// Classify a 24 h rainfall total. Total over `f64`, NaN → `NoData`.
    pub fn classify(&self, rain_24h_mm: f64) -> AlertLevel {
        // ---
        if rain_24h_mm.is_nan() {
            AlertLevel::NoData
        } else if rain_24h_mm >= self.critical_mm {
            AlertLevel::Critico
        } else if rain_24h_mm >= self.attention_mm {
            AlertLevel::Atencao
        } else if rain_24h_mm >= self.observation_mm {
            AlertLevel::Observacao
        } else {
            AlertLevel::Normal
        }
    }

    /// Classify an optional total; `None` is no data.
    pub fn classify_opt(&self, rain_24h_mm: Option<f64>) -> AlertLevel {
        rain_24h_mm.map_or(AlertLevel::NoData, |v| self.classify(v))
    }

    /// Label with its range, e.g. `"ATENÇÃO (30-70mm)"`.
    pub fn range_label(&self, level: AlertLevel) -> String {
        // ---
        let label = level.display_label();
        match level {
            AlertLevel::NoData => label.to_string(),
            AlertLevel::Normal => format!("{label} (<{}mm)", self.observation_mm),
            AlertLevel::Observacao => {
                format!("{label} ({}-{}mm)", self.observation_mm, self.attention_mm)
            }
            AlertLevel::Atencao => format!("{label} ({}-{}mm)", self.attention_mm, self.critical_mm),
            AlertLevel::Critico => format!("{label} (>={}mm)", self.critical_mm),
        }
    }

    /// Whether breakpoints are strictly increasing.
    pub fn is_ordered(&self) -> bool {
        self.observation_mm < self.attention_mm && self.attention_mm < self.critical_mm
    }
}

/// Classify with the default breakpoints.
pub fn classify(rain_24h_mm: f64) -> AlertLevel {
    AlertThresholds::default().classify(rain_24h_mm)
}
