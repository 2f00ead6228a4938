//! The module responsible for writing output data to disk.
use crate::dispatch::DispatchResult;
use crate::metrics::{FacilitySummary, Summary, Totals};
use crate::model::Model;
use crate::optimisation::{GenerationReport, OptimisationResult, Solution};
use crate::series::hour_to_datetime;
use anyhow::{Context, Result, ensure};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "powermatch_results";

/// The output file name for the per-facility summary
const SUMMARY_FILE_NAME: &str = "summary.csv";

/// The output file name for system-wide figures
const ANALYSIS_FILE_NAME: &str = "analysis.csv";

/// The output file name for hourly dispatch
const HOURLY_FILE_NAME: &str = "debug_hourly.csv";

/// The output file name for the best fleets found by the optimiser
const OPTIMISATION_FILE_NAME: &str = "optimisation.csv";

/// The output file name for optimiser progress
const OPTIMISATION_PROGRESS_FILE_NAME: &str = "optimisation_progress.csv";

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Get the model name from the specified directory path
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Canonicalise in case the user has specified "."
    let model_dir = model_dir
        .canonicalize()
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory, clearing out an existing one if `allow_overwrite` is set.
///
/// Returns whether an existing non-empty directory was overwritten.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let overwrite = if let Ok(mut entries) = fs::read_dir(output_dir) {
        if entries.next().is_none() {
            // Already exists and is empty
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. \
            Please delete the folder or pass the --overwrite command-line option."
        );

        fs::remove_dir_all(output_dir)?;
        true
    } else {
        false
    };

    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

fn format_datetime(datetime: Option<NaiveDateTime>) -> Option<String> {
    datetime.map(|datetime| datetime.format(DATETIME_FORMAT).to_string())
}

/// Represents a row in the summary CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct SummaryRow {
    facility: String,
    capacity: f64,
    to_meet_load: f64,
    generation: f64,
    capacity_factor: Option<f64>,
    annual_cost: Option<f64>,
    lcog: Option<f64>,
    lcoe: Option<f64>,
    emissions: f64,
    emissions_cost: f64,
    lcoe_with_carbon: Option<f64>,
    max_hourly: Option<f64>,
    max_balance: Option<f64>,
    capital_cost: f64,
    lifetime_cost: Option<f64>,
    lifetime_emissions: f64,
    lifetime_emissions_cost: f64,
    area: f64,
}

impl SummaryRow {
    fn from_facility(row: &FacilitySummary) -> Self {
        Self {
            facility: row.id.to_string(),
            capacity: row.capacity.value(),
            to_meet_load: row.to_meet_load.value(),
            generation: row.generation.value(),
            capacity_factor: row.capacity_factor,
            annual_cost: row.annual_cost.map(|cost| cost.value()),
            lcog: row.lcog.map(|lcog| lcog.value()),
            lcoe: row.lcoe.map(|lcoe| lcoe.value()),
            emissions: row.emissions.value(),
            emissions_cost: row.emissions_cost.value(),
            lcoe_with_carbon: row.lcoe_with_carbon.map(|lcoe| lcoe.value()),
            max_hourly: Some(row.max_hourly.value()),
            max_balance: row.max_balance.map(|balance| balance.value()),
            capital_cost: row.capital_cost.value(),
            lifetime_cost: row.lifetime_cost.map(|cost| cost.value()),
            lifetime_emissions: row.lifetime_emissions.value(),
            lifetime_emissions_cost: row.lifetime_emissions_cost.value(),
            area: row.area.value(),
        }
    }

    /// The totals row, with carbon costs optionally folded into the annual and lifetime costs
    fn from_totals(totals: &Totals, include_carbon: bool) -> Self {
        let (facility, annual_cost, lcoe, lifetime_cost) = if include_carbon {
            (
                "Total incl. carbon cost",
                totals.annual_cost + totals.emissions_cost,
                totals.lcoe_with_carbon,
                totals.lifetime_cost + totals.lifetime_emissions_cost,
            )
        } else {
            (
                "Total",
                totals.annual_cost,
                totals.lcoe,
                totals.lifetime_cost,
            )
        };

        Self {
            facility: facility.to_string(),
            capacity: totals.capacity.value(),
            to_meet_load: totals.to_meet_load.value(),
            generation: totals.generation.value(),
            capacity_factor: None,
            annual_cost: Some(annual_cost.value()),
            lcog: totals.lcog.map(|lcog| lcog.value()),
            lcoe: lcoe.map(|lcoe| lcoe.value()),
            emissions: totals.emissions.value(),
            emissions_cost: totals.emissions_cost.value(),
            lcoe_with_carbon: totals.lcoe_with_carbon.map(|lcoe| lcoe.value()),
            max_hourly: None,
            max_balance: None,
            capital_cost: totals.capital_cost.value(),
            lifetime_cost: Some(lifetime_cost.value()),
            lifetime_emissions: totals.lifetime_emissions.value(),
            lifetime_emissions_cost: totals.lifetime_emissions_cost.value(),
            area: totals.area.value(),
        }
    }
}

/// Represents a row in the analysis CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct AnalysisRow {
    metric: String,
    value: Option<f64>,
    detail: Option<String>,
}

impl AnalysisRow {
    fn new(metric: &str, value: Option<f64>) -> Self {
        Self {
            metric: metric.to_string(),
            value,
            detail: None,
        }
    }
}

/// The analysis and correlation rows for a summary
fn analysis_rows(summary: &Summary) -> Vec<AnalysisRow> {
    let analysis = &summary.analysis;
    let correlations = &summary.correlations;
    let mut rows = vec![
        AnalysisRow::new("re_pct", analysis.re_pct),
        AnalysisRow::new("storage_pct", analysis.storage_pct),
        AnalysisRow::new("total_load", Some(analysis.total_load.value())),
        AnalysisRow::new("shortfall", Some(analysis.shortfall.value())),
        AnalysisRow::new("load_met", Some(analysis.load_met.value())),
        AnalysisRow::new("load_met_pct", analysis.load_met_pct),
        AnalysisRow::new("re_pct_of_load", analysis.re_pct_of_load),
        AnalysisRow::new("storage_losses", Some(analysis.storage_losses.value())),
        AnalysisRow::new("surplus", Some(analysis.surplus.value())),
        AnalysisRow::new("surplus_pct", analysis.surplus_pct),
    ];

    let mut largest = AnalysisRow::new(
        "largest_shortfall",
        analysis
            .largest_shortfall
            .map(|largest| largest.shortfall.value()),
    );
    if let Some(shortfall) = &analysis.largest_shortfall {
        let hour = format!("hour {}", shortfall.hour);
        largest.detail = Some(match format_datetime(shortfall.datetime) {
            Some(datetime) => format!("{hour} ({datetime})"),
            None => hour,
        });
    }
    rows.push(largest);

    rows.extend([
        AnalysisRow::new("correlation_load_renewables", correlations.load_renewables),
        AnalysisRow::new(
            "correlation_load_renewables_storage",
            correlations.load_renewables_storage,
        ),
        AnalysisRow::new("correlation_load_served", correlations.load_served),
    ]);

    rows
}

/// Represents a row in the optimisation CSV file: one facility of one fleet
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct OptimisationRow {
    fleet: String,
    rank: Option<usize>,
    chromosome: String,
    lcoe_score: f64,
    multi_score: f64,
    facility: String,
    capacity: f64,
}

fn optimisation_rows(fleet: &str, rank: Option<usize>, solution: &Solution) -> Vec<OptimisationRow> {
    let chromosome: String = solution
        .chromosome
        .iter()
        .map(|bit| if *bit { '1' } else { '0' })
        .collect();

    solution
        .capacities
        .iter()
        .map(|(id, capacity)| OptimisationRow {
            fleet: fleet.to_string(),
            rank,
            chromosome: chromosome.clone(),
            lcoe_score: solution.scores.lcoe,
            multi_score: solution.scores.multi,
            facility: id.to_string(),
            capacity: capacity.value(),
        })
        .collect()
}

/// Represents a row in the optimisation progress CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ProgressRow {
    generation: u32,
    best_lcoe_score: f64,
    mean_lcoe_score: Option<f64>,
    best_multi_score: f64,
    mean_multi_score: Option<f64>,
}

impl From<&GenerationReport> for ProgressRow {
    fn from(report: &GenerationReport) -> Self {
        Self {
            generation: report.generation,
            best_lcoe_score: report.best_lcoe,
            mean_lcoe_score: report.mean_lcoe,
            best_multi_score: report.best_multi,
            mean_multi_score: report.mean_multi,
        }
    }
}

/// For writing the hourly dispatch of every facility
struct DebugDataWriter {
    hourly_writer: csv::Writer<File>,
}

impl DebugDataWriter {
    /// Open CSV files to write debug info to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    fn create(output_path: &Path) -> Result<Self> {
        Ok(Self {
            hourly_writer: csv::Writer::from_path(output_path.join(HOURLY_FILE_NAME))?,
        })
    }

    /// Write one row per hour: system series, then each facility's output and storage balance
    fn write_hourly(&mut self, model: &Model, result: &DispatchResult) -> Result<()> {
        let mut header: Vec<String> = [
            "hour",
            "datetime",
            "load",
            "renewables",
            "generators",
            "storage_discharge",
            "storage_charge",
            "shortfall",
        ]
        .map(String::from)
        .to_vec();

        let mut columns: Vec<&[f64]> = Vec::new();
        for (handle, facility) in model.facilities.iter() {
            let output = result.facility(handle);
            if output.hourly.is_empty() {
                continue;
            }

            header.push(facility.id.to_string());
            columns.push(&output.hourly);
            if let Some(trace) = &output.storage {
                header.push(format!("{} balance", facility.id));
                columns.push(&trace.state_of_charge);
            }
        }
        self.hourly_writer.write_record(&header)?;

        let year = i32::try_from(model.parameters.year).unwrap_or_default();
        for hour in 0..result.load.len() {
            let mut record = vec![
                hour.to_string(),
                format_datetime(hour_to_datetime(year, hour)).unwrap_or_default(),
            ];
            record.extend(
                [
                    result.load.as_slice(),
                    &result.renewables,
                    &result.generators,
                    &result.storage_discharge,
                    &result.storage_charge,
                    &result.shortfall,
                ]
                .into_iter()
                .chain(columns.iter().copied())
                .map(|series| series[hour].to_string()),
            );
            self.hourly_writer.write_record(&record)?;
        }

        Ok(())
    }

    /// Flush the underlying streams
    fn flush(&mut self) -> Result<()> {
        self.hourly_writer.flush()?;

        Ok(())
    }
}

/// An object for writing dispatch and optimisation results to file
pub struct DataWriter {
    output_path: PathBuf,
    summary_writer: csv::Writer<File>,
    analysis_writer: csv::Writer<File>,
    debug_writer: Option<DebugDataWriter>,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    /// * `save_debug_info` - Whether to include the hourly dispatch
    pub fn create(output_path: &Path, save_debug_info: bool) -> Result<Self> {
        let new_writer = |file_name| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(file_path)
        };

        let debug_writer = if save_debug_info {
            Some(DebugDataWriter::create(output_path)?)
        } else {
            None
        };

        Ok(Self {
            output_path: output_path.to_path_buf(),
            summary_writer: new_writer(SUMMARY_FILE_NAME)?,
            analysis_writer: new_writer(ANALYSIS_FILE_NAME)?,
            debug_writer,
        })
    }

    /// Write the facility summary, the totals rows and the analysis
    pub fn write_summary(&mut self, summary: &Summary) -> Result<()> {
        for row in &summary.facilities {
            self.summary_writer
                .serialize(SummaryRow::from_facility(row))?;
        }
        for include_carbon in [false, true] {
            self.summary_writer
                .serialize(SummaryRow::from_totals(&summary.totals, include_carbon))?;
        }

        for row in analysis_rows(summary) {
            self.analysis_writer.serialize(row)?;
        }

        Ok(())
    }

    /// Write the hourly dispatch, if debug output is enabled
    pub fn write_debug_info(&mut self, model: &Model, result: &DispatchResult) -> Result<()> {
        if let Some(wtr) = &mut self.debug_writer {
            wtr.write_hourly(model, result)?;
        }

        Ok(())
    }

    /// Write the best fleets and the progress of an optimisation run
    pub fn write_optimisation(&mut self, result: &OptimisationResult) -> Result<()> {
        let mut writer = csv::Writer::from_path(self.output_path.join(OPTIMISATION_FILE_NAME))?;
        let bests = [("best_lcoe", &result.best_lcoe), ("best_multi", &result.best_multi)];
        for (fleet, solution) in bests {
            if let Some(solution) = solution {
                for row in optimisation_rows(fleet, None, solution) {
                    writer.serialize(row)?;
                }
            }
        }
        for (rank, solution) in result.ranked_multi.iter().enumerate() {
            for row in optimisation_rows("ranked_multi", Some(rank + 1), solution) {
                writer.serialize(row)?;
            }
        }
        writer.flush()?;

        let mut writer =
            csv::Writer::from_path(self.output_path.join(OPTIMISATION_PROGRESS_FILE_NAME))?;
        for report in &result.history {
            writer.serialize(ProgressRow::from(report))?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        self.summary_writer.flush()?;
        self.analysis_writer.flush()?;
        if let Some(wtr) = &mut self.debug_writer {
            wtr.flush()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::dispatch;
    use crate::fixture::model;
    use crate::metrics::summarise;
    use crate::optimisation::fitness::Scores;
    use crate::units::Capacity;
    use itertools::Itertools;
    use rstest::rstest;
    use std::fs::File;
    use tempfile::tempdir;

    fn read_rows<T: for<'de> Deserialize<'de>>(path: &Path) -> Vec<T> {
        csv::Reader::from_path(path)
            .unwrap()
            .into_deserialize()
            .try_collect()
            .unwrap()
    }

    #[test]
    fn test_create_output_directory() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("out");

        // New directory
        assert!(!create_output_directory(&output_dir, false).unwrap());
        assert!(output_dir.is_dir());

        // Existing empty directory
        assert!(!create_output_directory(&output_dir, false).unwrap());

        // Non-empty directory
        File::create(output_dir.join("summary.csv")).unwrap();
        assert!(create_output_directory(&output_dir, false).is_err());
        assert!(create_output_directory(&output_dir, true).unwrap());
        assert!(fs::read_dir(&output_dir).unwrap().next().is_none());
    }

    #[rstest]
    fn test_write_summary(model: Model) {
        let result = dispatch(&model);
        let summary = summarise(&model, &result);
        let dir = tempdir().unwrap();
        {
            let mut writer = DataWriter::create(dir.path(), true).unwrap();
            writer.write_summary(&summary).unwrap();
            writer.write_debug_info(&model, &result).unwrap();
            writer.flush().unwrap();
        }

        let rows: Vec<SummaryRow> = read_rows(&dir.path().join(SUMMARY_FILE_NAME));
        let names = rows.iter().map(|row| row.facility.as_str()).collect_vec();
        assert_eq!(
            names,
            [
                "north.Wind",
                "Solar",
                "Coal",
                "Battery",
                "Total",
                "Total incl. carbon cost"
            ]
        );
        assert_eq!(rows[0], SummaryRow::from_facility(&summary.facilities[0]));

        let rows: Vec<AnalysisRow> = read_rows(&dir.path().join(ANALYSIS_FILE_NAME));
        assert_eq!(rows, analysis_rows(&summary));
        assert_eq!(rows[0].metric, "re_pct");

        let hourly = csv::Reader::from_path(dir.path().join(HOURLY_FILE_NAME))
            .unwrap()
            .records()
            .count();
        assert_eq!(hourly, result.load.len());
    }

    #[test]
    fn test_no_debug_file() {
        let dir = tempdir().unwrap();
        DataWriter::create(dir.path(), false).unwrap();
        assert!(!dir.path().join(HOURLY_FILE_NAME).exists());
    }

    #[test]
    fn test_write_optimisation() {
        let solution = Solution {
            chromosome: vec![true, false, true],
            scores: Scores {
                lcoe: 55.0,
                multi: 1.5,
            },
            capacities: vec![("Wind".into(), Capacity(100.0)), ("Gas".into(), Capacity(50.0))],
        };
        let result = OptimisationResult {
            best_lcoe: Some(solution.clone()),
            best_multi: None,
            ranked_multi: vec![solution],
            history: vec![GenerationReport {
                generation: 1,
                best_lcoe: 55.0,
                mean_lcoe: Some(60.0),
                best_multi: 1.5,
                mean_multi: None,
            }],
            generations_run: 1,
            cancelled: false,
            seed: 1,
        };

        let dir = tempdir().unwrap();
        {
            let mut writer = DataWriter::create(dir.path(), false).unwrap();
            writer.write_optimisation(&result).unwrap();
        }

        let rows: Vec<OptimisationRow> = read_rows(&dir.path().join(OPTIMISATION_FILE_NAME));
        assert_eq!(rows.len(), 4);
        assert_eq!(
            rows[0],
            OptimisationRow {
                fleet: "best_lcoe".into(),
                rank: None,
                chromosome: "101".into(),
                lcoe_score: 55.0,
                multi_score: 1.5,
                facility: "Wind".into(),
                capacity: 100.0,
            }
        );
        assert_eq!(rows[3].fleet, "ranked_multi");
        assert_eq!(rows[3].rank, Some(1));

        let rows: Vec<ProgressRow> =
            read_rows(&dir.path().join(OPTIMISATION_PROGRESS_FILE_NAME));
        assert_eq!(rows, [ProgressRow::from(&result.history[0])]);
    }
}
