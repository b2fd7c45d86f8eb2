//! Coordinate reference system identifiers

use std::fmt;

use serde::Serialize;

/// Opaque CRS identifier such as `EPSG:4326`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Crs(String);

impl Crs {
    pub fn new(id: impl AsRef<str>) -> Self {
        Crs(id.as_ref().trim().to_string())
    }

    pub fn from_epsg(code: u32) -> Self {
        Crs(format!("EPSG:{}", code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric code of an `EPSG:<n>` identifier
    pub fn epsg(&self) -> Option<u32> {
        let (authority, code) = self.0.split_once(':')?;
        if !authority.eq_ignore_ascii_case("epsg") {
            return None;
        }
        code.trim().parse().ok()
    }

    /// Geographic (lat/lon) systems of the EPSG 4000 block
    pub fn is_geographic(&self) -> bool {
        self.epsg().is_some_and(|code| {
            (4000..=4999).contains(&code) && !is_geocentric(code) && !is_projected_in_geographic_block(code)
        })
    }

    /// Earth-centred cartesian systems
    pub fn is_geocentric(&self) -> bool {
        self.epsg().is_some_and(is_geocentric)
    }
}

fn is_geocentric(code: u32) -> bool {
    match code {
        4328 | 4330..=4338 | 4465 | 4468 | 4473 | 4479 | 4481 | 4556 => true,
        4882 | 4884 | 4886 | 4888 | 4896 | 4906 | 4910..=4920 => true,
        // geocentric and geographic 3D definitions alternate
        4340..=4388 | 4922..=4998 => code % 2 == 0,
        _ => false,
    }
}

/// Projected systems whose codes were allocated inside the 4000 block
fn is_projected_in_geographic_block(code: u32) -> bool {
    matches!(
        code,
        4026 | 4037 | 4038 | 4048..=4051 | 4056..=4063 | 4071 | 4082 | 4083 | 4087 | 4088
            | 4093..=4096 | 4217 | 4390..=4415 | 4417..=4434 | 4437 | 4438 | 4455..=4457
            | 4462 | 4467 | 4471 | 4474 | 4484..=4489 | 4491..=4554 | 4559 | 4568..=4589
            | 4647 | 4652..=4656 | 4766..=4800 | 4812 | 4822 | 4826 | 4839 | 4855..=4880
    )
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Crs {
    fn from(value: &str) -> Self {
        Crs::new(value)
    }
}
