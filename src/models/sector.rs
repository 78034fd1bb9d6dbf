use serde::Serialize;
use utoipa::ToSchema;

/// Closed set of sector keys permitted in the reference dataset. Rows read
/// from `sector_companies` must parse into one of these; anything else is a
/// data error, not a new sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Sector {
    Technology,
    ConsumerDiscretionary,
    ConsumerStaples,
    Energy,
    Financials,
    Healthcare,
    Industrials,
    Materials,
    RealEstate,
    UsIndices,
    Utilities,
}

impl Sector {
    pub const ALL: [Sector; 11] = [
        Sector::Technology,
        Sector::ConsumerDiscretionary,
        Sector::ConsumerStaples,
        Sector::Energy,
        Sector::Financials,
        Sector::Healthcare,
        Sector::Industrials,
        Sector::Materials,
        Sector::RealEstate,
        Sector::UsIndices,
        Sector::Utilities,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Sector::Technology => "Technology",
            Sector::ConsumerDiscretionary => "Consumer Discretionary",
            Sector::ConsumerStaples => "Consumer Staples",
            Sector::Energy => "Energy",
            Sector::Financials => "Financials",
            Sector::Healthcare => "Healthcare",
            Sector::Industrials => "Industrials",
            Sector::Materials => "Materials",
            Sector::RealEstate => "Real Estate",
            Sector::UsIndices => "US Indices",
            Sector::Utilities => "Utilities",
        }
    }

    pub fn parse(key: &str) -> Option<Sector> {
        Sector::ALL.iter().copied().find(|s| s.as_str() == key)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SectorCompany {
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SectorListing {
    pub sector: String,
    pub companies: Vec<SectorCompany>,
}
