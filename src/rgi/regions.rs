use std::path::{Path, PathBuf};

use anyhow::anyhow;

/// A first-order region of the Randolph Glacier Inventory 6.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgiRegion {
    pub number: u8,
    pub name: &'static str,
}

pub const RGI_REGIONS: [RgiRegion; 19] = [
    RgiRegion { number: 1, name: "Alaska" },
    RgiRegion { number: 2, name: "WesternCanadaUS" },
    RgiRegion { number: 3, name: "ArcticCanadaNorth" },
    RgiRegion { number: 4, name: "ArcticCanadaSouth" },
    RgiRegion { number: 5, name: "GreenlandPeriphery" },
    RgiRegion { number: 6, name: "Iceland" },
    RgiRegion { number: 7, name: "Svalbard" },
    RgiRegion { number: 8, name: "Scandinavia" },
    RgiRegion { number: 9, name: "RussianArctic" },
    RgiRegion { number: 10, name: "NorthAsia" },
    RgiRegion { number: 11, name: "CentralEurope" },
    RgiRegion { number: 12, name: "CaucasusMiddleEast" },
    RgiRegion { number: 13, name: "CentralAsia" },
    RgiRegion { number: 14, name: "SouthAsiaWest" },
    RgiRegion { number: 15, name: "SouthAsiaEast" },
    RgiRegion { number: 16, name: "LowLatitudes" },
    RgiRegion { number: 17, name: "SouthernAndes" },
    RgiRegion { number: 18, name: "NewZealand" },
    RgiRegion { number: 19, name: "AntarcticSubantarctic" },
];

impl RgiRegion {
    pub fn from_number(number: u8) -> anyhow::Result<Self> {
        RGI_REGIONS
            .iter()
            .find(|region| region.number == number)
            .copied()
            .ok_or_else(|| {
                anyhow!(
                    "RGI region {} does not exist, regions are numbered 1 to {}",
                    number,
                    RGI_REGIONS.len()
                )
            })
    }

    /// Directory and file stem of the region's shapefile, e.g. "01_rgi60_Alaska".
    pub fn stem(&self) -> String {
        format!("{:02}_rgi60_{}", self.number, self.name)
    }

    /// Shapefile path relative to the RGI root directory.
    pub fn relative_path(&self) -> PathBuf {
        let stem = self.stem();
        Path::new(&stem).join(format!("{}.shp", stem))
    }
}

/// Path of the shapefile of region `number` under `rgi_data_dir`.
pub fn region_shapefile(rgi_data_dir: &Path, number: u8) -> anyhow::Result<PathBuf> {
    Ok(rgi_data_dir.join(RgiRegion::from_number(number)?.relative_path()))
}
