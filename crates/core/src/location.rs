// Facility layout used to turn a device placement into a place name

use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::device::Device;

/// Restroom area within a floor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Area {
    pub id: String,
    pub name: String,
}

/// Building floor with its areas.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Floor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub areas: Vec<Area>,
}

impl Floor {
    /// Place name for a device on this floor: "floor area stall".
    /// Missing parts are left out.
    pub fn describe(&self, device: &Device) -> String {
        let area_name = device
            .location
            .as_ref()
            .and_then(|loc| loc.area_id.as_deref())
            .and_then(|area_id| self.areas.iter().find(|a| a.id == area_id))
            .map(|a| a.name.as_str());

        [Some(self.name.as_str()), area_name, Some(device.display_name())]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
