//! Implementation of the `babysitter inspect` command.
//!
//! Prints one entry for every job: the last journal value of a key, or a field
//! of the descriptor's solver, search or data sections.

use anyhow::Result;
use clap::{Args, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::context::{CliContext, Inputs};
use crate::cli::display::{output, CommandOutput};
use crate::domain::models::JobDescriptor;
use crate::domain::ports::{DescriptorStore, JournalStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    /// Last value of a journal key
    Journal,
    /// Solver parameter or setting
    Solver,
    /// Binary search field
    Search,
    /// Variable of each data record
    Data,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Journal key or descriptor field to print
    pub entry: String,

    /// Job descriptor files
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Where to look the entry up
    #[arg(short, long, value_enum, default_value = "journal")]
    pub section: Section,

    /// Print values only
    #[arg(long)]
    pub no_filename: bool,
}

#[derive(Debug, Serialize)]
pub struct InspectLine {
    pub descriptor: PathBuf,
    pub value: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InspectOutput {
    pub entry: String,
    pub section: Section,
    pub values: Vec<InspectLine>,
    #[serde(skip)]
    no_filename: bool,
}

impl CommandOutput for InspectOutput {
    fn to_human(&self) -> String {
        self.values
            .iter()
            .map(|line| {
                let value = line.value.as_deref().unwrap_or("-");
                if self.no_filename {
                    value.to_string()
                } else {
                    format!("{}: {value}", line.descriptor.display())
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A solver parameter by its solver-side or configuration-side name.
fn solver_entry(descriptor: &JobDescriptor, entry: &str) -> Option<String> {
    let solver = &descriptor.solver;
    match entry {
        "precision" => solver.precision.map(|p| p.to_string()),
        "initialMatrixScalePrimal" | "initial_matrix_scale_primal" => {
            solver.initial_matrix_scale_primal.clone()
        }
        "initialMatrixScaleDual" | "initial_matrix_scale_dual" => {
            solver.initial_matrix_scale_dual.clone()
        }
        "extra_args" => solver.extra_args.clone(),
        _ => solver.settings.get(entry).cloned().or_else(|| {
            solver
                .flags
                .iter()
                .any(|flag| flag == entry)
                .then(|| "true".to_string())
        }),
    }
}

fn search_entry(descriptor: &JobDescriptor, entry: &str) -> Option<String> {
    let search = descriptor.search.binary_search.as_ref()?;
    match entry {
        "variable" => Some(search.variable.clone()),
        "primal" => Some(search.primal.clone()),
        "dual" => Some(search.dual.clone()),
        "threshold" => Some(search.threshold.clone()),
        _ => None,
    }
}

/// The entry of every data record that has it, comma separated.
fn data_entry(descriptor: &JobDescriptor, entry: &str) -> Option<String> {
    let values: Vec<&str> = descriptor
        .data
        .iter()
        .filter_map(|record| {
            if entry == "filename" {
                Some(record.filename.as_str())
            } else {
                record.variables.get(entry).map(String::as_str)
            }
        })
        .collect();
    (!values.is_empty()).then(|| values.join(", "))
}

async fn lookup(ctx: &CliContext, args: &InspectArgs, path: &PathBuf) -> Result<Option<String>> {
    if args.section == Section::Journal {
        let journal = ctx.journals.load(path).await?;
        return Ok(journal.last_value(&args.entry, None).map(str::to_string));
    }
    let descriptor = ctx.descriptors.load(path).await?;
    Ok(match args.section {
        Section::Solver => solver_entry(&descriptor, &args.entry),
        Section::Search => search_entry(&descriptor, &args.entry),
        Section::Data => data_entry(&descriptor, &args.entry),
        Section::Journal => None,
    })
}

pub async fn execute(args: InspectArgs, ctx: &CliContext, json_mode: bool) -> Result<()> {
    let inputs = Inputs::partition(args.files.clone());

    let mut values = Vec::with_capacity(inputs.found.len());
    for path in &inputs.found {
        values.push(InspectLine {
            descriptor: path.clone(),
            value: lookup(ctx, &args, path).await?,
        });
    }

    output(
        &InspectOutput {
            entry: args.entry,
            section: args.section,
            values,
            no_filename: args.no_filename,
        },
        json_mode,
    );
    inputs.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::descriptor::YamlDescriptorStore;
    use std::path::Path;

    fn descriptor() -> JobDescriptor {
        YamlDescriptorStore::parse(
            Path::new("/jobs/run.yaml"),
            r#"
solver:
  precision: 1024
  settings:
    maxRuntime: 3600
  flags: [findPrimalFeasible]
data:
  - filename: a.json
    variables: { gap: "1.5", spin: "0" }
  - filename: b.json
    variables: { gap: "1.5" }
search:
  binary_search: { variable: gap, primal: "1", dual: "2", threshold: "0.01" }
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_solver_entries() {
        let d = descriptor();
        assert_eq!(solver_entry(&d, "precision").as_deref(), Some("1024"));
        assert_eq!(solver_entry(&d, "maxRuntime").as_deref(), Some("3600"));
        assert_eq!(solver_entry(&d, "findPrimalFeasible").as_deref(), Some("true"));
        assert_eq!(solver_entry(&d, "initialMatrixScaleDual"), None);
    }

    #[test]
    fn test_search_and_data_entries() {
        let d = descriptor();
        assert_eq!(search_entry(&d, "threshold").as_deref(), Some("0.01"));
        assert_eq!(data_entry(&d, "gap").as_deref(), Some("1.5, 1.5"));
        assert_eq!(data_entry(&d, "spin").as_deref(), Some("0"));
        assert_eq!(data_entry(&d, "filename").as_deref(), Some("a.json, b.json"));
        assert_eq!(data_entry(&d, "missing"), None);
    }
}
