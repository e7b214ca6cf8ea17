use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Native format of a stored data item.
///
/// The format never changes how bytes are moved around; it is carried in
/// history records and job descriptions so that downstream consumers know
/// how to interpret the payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    /// GRIB-encoded meteorological fields.
    Grib,
    /// NetCDF datasets.
    Netcdf,
    /// Model native spectral/gridpoint files.
    Fa,
    /// Plain text.
    Ascii,
    /// JSON documents (promise notes, job descriptions).
    Json,
    /// Tar bundles (possibly compressed).
    Tar,
    /// Opaque binary data.
    #[default]
    Binary,
}

impl DataFormat {
    /// Format tag as it appears in history records and job files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grib => "grib",
            Self::Netcdf => "netcdf",
            Self::Fa => "fa",
            Self::Ascii => "ascii",
            Self::Json => "json",
            Self::Tar => "tar",
            Self::Binary => "binary",
        }
    }
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DataFormat {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grib" => Ok(Self::Grib),
            "netcdf" => Ok(Self::Netcdf),
            "fa" => Ok(Self::Fa),
            "ascii" => Ok(Self::Ascii),
            "json" => Ok(Self::Json),
            "tar" => Ok(Self::Tar),
            "binary" => Ok(Self::Binary),
            other => Err(TypeError::UnknownFormat(other.to_string())),
        }
    }
}
