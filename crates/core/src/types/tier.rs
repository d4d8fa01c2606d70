//! Quality tiers and their output dimensions.
//!
//! The tier table is closed: every [`QualityTier`] has exactly one entry in
//! [`TIERS`], and parsing only ever yields a tier that is in the table.
//! Unknown names are rejected, never mapped to a default.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned for a tier name outside the table.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown quality tier '{0}' (expected one of thumbnail, preview, medium, high, fullsize)")]
pub struct TierError(pub String);

/// Target size handed to the processing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// Square output of the given edge length in pixels.
    Pixels(u32),
    /// Keep the size of the detected face crop.
    Original,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pixels(px) => write!(f, "{px}"),
            Self::Original => f.write_str("original"),
        }
    }
}

/// Named quality preset, ordered from smallest to largest output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Thumbnail,
    Preview,
    Medium,
    High,
    Fullsize,
}

/// One row of the tier table.
#[derive(Debug, Clone, Copy)]
pub struct TierSpec {
    pub tier: QualityTier,
    pub name: &'static str,
    pub dimension: Dimension,
    /// Whether anonymous callers may request this tier.
    pub free: bool,
}

const THUMBNAIL: TierSpec = TierSpec {
    tier: QualityTier::Thumbnail,
    name: "thumbnail",
    dimension: Dimension::Pixels(150),
    free: true,
};

const PREVIEW: TierSpec = TierSpec {
    tier: QualityTier::Preview,
    name: "preview",
    dimension: Dimension::Pixels(300),
    free: true,
};

const MEDIUM: TierSpec = TierSpec {
    tier: QualityTier::Medium,
    name: "medium",
    dimension: Dimension::Pixels(600),
    free: false,
};

const HIGH: TierSpec = TierSpec {
    tier: QualityTier::High,
    name: "high",
    dimension: Dimension::Pixels(1000),
    free: false,
};

const FULLSIZE: TierSpec = TierSpec {
    tier: QualityTier::Fullsize,
    name: "fullsize",
    dimension: Dimension::Original,
    free: false,
};

/// The tier table, in tier order.
pub const TIERS: [TierSpec; 5] = [THUMBNAIL, PREVIEW, MEDIUM, HIGH, FULLSIZE];

impl QualityTier {
    /// All tiers, in order.
    pub const ALL: [Self; 5] = [
        Self::Thumbnail,
        Self::Preview,
        Self::Medium,
        Self::High,
        Self::Fullsize,
    ];

    /// The table row for this tier.
    #[must_use]
    pub const fn spec(self) -> &'static TierSpec {
        match self {
            Self::Thumbnail => &THUMBNAIL,
            Self::Preview => &PREVIEW,
            Self::Medium => &MEDIUM,
            Self::High => &HIGH,
            Self::Fullsize => &FULLSIZE,
        }
    }

    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.spec().name
    }

    /// Output dimension for this tier.
    #[must_use]
    pub const fn dimension(self) -> Dimension {
        self.spec().dimension
    }

    /// Whether anonymous callers may request this tier.
    #[must_use]
    pub const fn is_free(self) -> bool {
        self.spec().free
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = TierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TIERS
            .iter()
            .find(|spec| spec.name == s)
            .map(|spec| spec.tier)
            .ok_or_else(|| TierError(s.to_owned()))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for QualityTier {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for QualityTier {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(s.parse()?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for QualityTier {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}
