//! Code for reading optimisation records from a CSV file.
use super::*;
use crate::facility::{FacilityCategory, FacilityRegistry};
use crate::optimisation::OptimisationRecordMap;
use crate::optimisation::encoding::Approach;
use crate::units::Capacity;
use anyhow::{Context, Result, bail, ensure};
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::path::Path;

const OPTIMISATION_FILE_NAME: &str = "optimisation.csv";

#[derive(PartialEq, Debug, Clone, Copy, DeserializeLabeledStringEnum)]
enum ApproachKind {
    #[string = "discrete"]
    Discrete,
    #[string = "range"]
    Range,
    #[string = "none"]
    None,
}

#[derive(PartialEq, Debug, Deserialize)]
struct OptimisationRecordRaw {
    name: String,
    approach: ApproachKind,
    capacities: Option<String>,
    min: Option<f64>,
    max: Option<f64>,
    step: Option<f64>,
}

impl OptimisationRecordRaw {
    fn into_approach(self) -> Result<Approach> {
        match self.approach {
            ApproachKind::None => Ok(Approach::Fixed),
            ApproachKind::Discrete => {
                let capacities = parse_number_list(self.capacities.as_deref().unwrap_or_default())?;
                ensure!(
                    !capacities.is_empty(),
                    "Discrete approach requires at least one capacity"
                );
                for capacity in &capacities {
                    check_non_negative(*capacity, "capacity")?;
                }
                Ok(Approach::Discrete(
                    capacities.into_iter().map(Capacity).collect(),
                ))
            }
            ApproachKind::Range => {
                let (Some(min), Some(max), Some(step)) = (self.min, self.max, self.step) else {
                    bail!("Range approach requires min, max and step");
                };
                check_non_negative(min, "min")?;
                ensure!(max >= min, "max ({max}) cannot be less than min ({min})");
                ensure!(
                    step.is_finite() && step > 0.0,
                    "step must be greater than zero"
                );
                Ok(Approach::Range {
                    min: Capacity(min),
                    max: Capacity(max),
                    step: Capacity(step),
                })
            }
        }
    }
}

/// Read how the capacity of each facility may be varied by the optimiser.
///
/// The file is optional.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `facilities` - The fleet
///
/// # Returns
///
/// An approach for each listed facility, keyed by facility ID, or an error.
pub fn read_optimisation_records(
    model_dir: &Path,
    facilities: &FacilityRegistry,
) -> Result<OptimisationRecordMap> {
    let file_path = model_dir.join(OPTIMISATION_FILE_NAME);
    let raw: Vec<OptimisationRecordRaw> = read_csv_optional(&file_path)?;
    read_optimisation_records_from_iter(raw, facilities).with_context(|| input_err_msg(&file_path))
}

fn read_optimisation_records_from_iter<I>(
    iter: I,
    facilities: &FacilityRegistry,
) -> Result<OptimisationRecordMap>
where
    I: IntoIterator<Item = OptimisationRecordRaw>,
{
    let mut records = OptimisationRecordMap::new();
    for raw in iter {
        let facility = facilities
            .get_by_name(&raw.name)
            .with_context(|| format!("Unknown facility {}", raw.name))?;
        ensure!(
            facility.category != FacilityCategory::Load,
            "The load cannot be optimised"
        );

        let id = facility.id.clone();
        let approach = raw
            .into_approach()
            .with_context(|| format!("Invalid optimisation record for {id}"))?;
        ensure!(
            records.insert(id.clone(), approach).is_none(),
            "More than one optimisation record for {id}"
        );
    }

    Ok(records)
}
