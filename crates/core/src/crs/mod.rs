//! Coordinate Reference System handling
//!
//! GeoTIFF stores the CRS as GeoKeys; the reader resolves them to an EPSG
//! code where possible and otherwise keeps the ASCII citation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// EPSG code if known
    epsg: Option<u32>,
    /// Free-form citation (GeoAsciiParams) when no code is available
    citation: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            citation: None,
        }
    }

    /// Create a CRS known only by its citation string
    pub fn from_citation(citation: impl Into<String>) -> Self {
        Self {
            epsg: None,
            citation: Some(citation.into()),
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get the citation string if present
    pub fn citation(&self) -> Option<&str> {
        self.citation.as_deref()
    }

    /// Whether the EPSG code falls in the geographic 2D block (4000..5000).
    pub fn is_geographic(&self) -> bool {
        matches!(self.epsg, Some(code) if (4000..5000).contains(&code))
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        match (&self.epsg, &self.citation) {
            (Some(code), _) => format!("EPSG:{}", code),
            (None, Some(citation)) => citation.clone(),
            (None, None) => "Unknown".to_string(),
        }
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(32618);
        assert_eq!(crs.epsg(), Some(32618));
        assert_eq!(crs.identifier(), "EPSG:32618");
        assert!(!crs.is_geographic());
    }

    #[test]
    fn test_wgs84_is_geographic() {
        assert!(CRS::wgs84().is_geographic());
        assert_eq!(CRS::from_citation("WGS 84").identifier(), "WGS 84");
    }
}
