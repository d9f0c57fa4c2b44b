//! Built-in species requirement data. Seeded once, keyed by species;
//! per-habitat config may override individual values.

use crate::model::{HabitatRequirements, Species};

/// Ideal ranges per supported species. Temperatures in °C, humidity in %.
pub fn requirements_for(species: Species) -> HabitatRequirements {
    match species {
        Species::BallPython => HabitatRequirements {
            species,
            basking_temp_min: 31.0,
            basking_temp_max: 33.0,
            cool_side_temp_min: 24.0,
            cool_side_temp_max: 27.0,
            night_temp_min: 22.0,
            night_temp_max: 26.0,
            humidity_min: 50.0,
            humidity_max: 60.0,
            uvb_required: false,
        },
        Species::CornSnake => HabitatRequirements {
            species,
            basking_temp_min: 28.0,
            basking_temp_max: 31.0,
            cool_side_temp_min: 22.0,
            cool_side_temp_max: 25.0,
            night_temp_min: 20.0,
            night_temp_max: 24.0,
            humidity_min: 40.0,
            humidity_max: 50.0,
            uvb_required: false,
        },
        Species::BeardedDragon => HabitatRequirements {
            species,
            basking_temp_min: 38.0,
            basking_temp_max: 42.0,
            cool_side_temp_min: 24.0,
            cool_side_temp_max: 29.0,
            night_temp_min: 18.0,
            night_temp_max: 24.0,
            humidity_min: 30.0,
            humidity_max: 40.0,
            uvb_required: true,
        },
        Species::LeopardGecko => HabitatRequirements {
            species,
            basking_temp_min: 32.0,
            basking_temp_max: 35.0,
            cool_side_temp_min: 24.0,
            cool_side_temp_max: 27.0,
            night_temp_min: 18.0,
            night_temp_max: 24.0,
            humidity_min: 30.0,
            humidity_max: 40.0,
            uvb_required: false,
        },
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leopard_gecko_basking_range() {
        let req = requirements_for(Species::LeopardGecko);
        assert_eq!(req.basking_temp_min, 32.0);
        assert_eq!(req.basking_temp_max, 35.0);
    }

    #[test]
    fn bearded_dragon_requires_uvb() {
        assert!(requirements_for(Species::BeardedDragon).uvb_required);
        assert!(!requirements_for(Species::BallPython).uvb_required);
    }

    #[test]
    fn all_species_have_sane_ranges() {
        for species in [
            Species::BallPython,
            Species::CornSnake,
            Species::BeardedDragon,
            Species::LeopardGecko,
        ] {
            let r = requirements_for(species);
            assert!(r.basking_temp_min < r.basking_temp_max, "{species}");
            assert!(r.cool_side_temp_min < r.cool_side_temp_max, "{species}");
            assert!(r.night_temp_min < r.night_temp_max, "{species}");
            assert!(r.humidity_min < r.humidity_max, "{species}");
        }
    }
}
