//! Job descriptor domain model.
//!
//! A descriptor is the persisted configuration of one optimization attempt:
//! solver parameters, the input data records, and an optional search directive.
//! Its filesystem path is its identity. Descriptors are never edited once
//! submitted; follow-up attempts are written as successor files named by
//! [`successor_name`].
//!
//! Numeric values that take part in bisection are kept as decimal strings so no
//! precision is lost between attempts. Unquoted YAML numbers are accepted too,
//! but they pass through a float and should be quoted when every digit matters.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Extension of the journal file kept next to each descriptor.
pub const JOURNAL_EXTENSION: &str = "log";

const COUNTER_PREFIX: &str = "count";

/// Parameters handed to the solver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolverParams {
    /// Working precision of the solver
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "opt_scalar"
    )]
    pub initial_matrix_scale_primal: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "opt_scalar"
    )]
    pub initial_matrix_scale_dual: Option<String>,

    /// Any other `--name value` solver option, keyed by the solver's name
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "scalar_map"
    )]
    pub settings: BTreeMap<String, String>,

    /// Solver switches without a value, e.g. `findPrimalFeasible`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,

    /// Raw arguments appended verbatim, split on whitespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_args: Option<String>,
}

/// One input data file and the named variables used to generate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRecord {
    pub filename: String,

    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "scalar_map"
    )]
    pub variables: BTreeMap<String, String>,
}

/// Binary search over one data variable.
///
/// `primal` and `dual` bracket the boundary between primal-feasible and
/// dual-feasible values of `variable`; `threshold` is the convergence width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinarySearch {
    pub variable: String,
    #[serde(deserialize_with = "scalar")]
    pub primal: String,
    #[serde(deserialize_with = "scalar")]
    pub dual: String,
    #[serde(deserialize_with = "scalar")]
    pub threshold: String,
}

/// Search section of a descriptor. At most one directive is honoured; binary
/// search wins when both are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_search: Option<BinarySearch>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_search: Option<serde_yaml::Value>,
}

impl SearchSection {
    pub fn is_empty(&self) -> bool {
        self.binary_search.is_none() && self.maximum_search.is_none()
    }
}

/// The search directive a descriptor carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirective<'a> {
    None,
    Binary(&'a BinarySearch),
    /// A directive this crate knows about but cannot run
    Unsupported(&'static str),
}

/// File staging between shared storage and the compute node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingSpec {
    /// Shared directory files are copied from and back to; falls back to the
    /// backend's configured staging directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    /// Only copy results back when the run hit its budget
    #[serde(default)]
    pub only_on_timeout: bool,
}

/// Per-job executable overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutableOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux_creator: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solver: Option<String>,
}

impl ExecutableOverrides {
    pub fn is_empty(&self) -> bool {
        self.aux_creator.is_none() && self.solver.is_none()
    }
}

/// Persisted configuration of one optimization attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    #[serde(skip)]
    path: PathBuf,

    #[serde(default)]
    pub solver: SolverParams,

    #[serde(default)]
    pub data: Vec<DataRecord>,

    #[serde(default, skip_serializing_if = "SearchSection::is_empty")]
    pub search: SearchSection,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging: Option<StagingSpec>,

    /// Extra attributes for the batch scheduler's submit description
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "scalar_map"
    )]
    pub cluster: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "ExecutableOverrides::is_empty")]
    pub executables: ExecutableOverrides,

    /// Sections this crate does not interpret, carried over to successors
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl JobDescriptor {
    /// Empty descriptor identified by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Same content under another identity.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = path.into();
    }

    /// The journal belonging to this descriptor: same name, `.log` extension.
    pub fn journal_path(&self) -> PathBuf {
        journal_path_for(&self.path)
    }

    /// Directory relative paths in the descriptor are resolved against.
    pub fn directory(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    pub fn resolve(&self, file: impl AsRef<Path>) -> PathBuf {
        let file = file.as_ref();
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.directory().join(file)
        }
    }

    /// Resolved paths of all input data files.
    pub fn data_files(&self) -> Vec<PathBuf> {
        self.data.iter().map(|d| self.resolve(&d.filename)).collect()
    }

    pub fn search_directive(&self) -> SearchDirective<'_> {
        if let Some(binary) = &self.search.binary_search {
            SearchDirective::Binary(binary)
        } else if self.search.maximum_search.is_some() {
            SearchDirective::Unsupported("maximum_search")
        } else {
            SearchDirective::None
        }
    }

    /// First data record declaring `variable`, with its index.
    pub fn find_variable(&self, variable: &str) -> Option<(usize, &str)> {
        self.data.iter().enumerate().find_map(|(i, record)| {
            record.variables.get(variable).map(|v| (i, v.as_str()))
        })
    }

    /// Command line arguments for the solver, relative to [`Self::directory`].
    pub fn solver_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for record in &self.data {
            args.push("--sdpFile".to_string());
            args.push(record.filename.clone());
        }
        if let Some(precision) = self.solver.precision {
            args.push("--precision".to_string());
            args.push(precision.to_string());
        }
        if let Some(scale) = &self.solver.initial_matrix_scale_primal {
            args.push("--initialMatrixScalePrimal".to_string());
            args.push(scale.clone());
        }
        if let Some(scale) = &self.solver.initial_matrix_scale_dual {
            args.push("--initialMatrixScaleDual".to_string());
            args.push(scale.clone());
        }
        for (name, value) in &self.solver.settings {
            args.push(format!("--{name}"));
            args.push(value.clone());
        }
        for flag in &self.solver.flags {
            args.push(format!("--{flag}"));
        }
        if let Some(extra) = &self.solver.extra_args {
            args.extend(extra.split_whitespace().map(str::to_string));
        }
        args
    }

    /// File the solver writes its results to.
    pub fn out_file(&self) -> Option<PathBuf> {
        self.solver_file("outFile", "out")
    }

    /// Checkpoint file of the solver.
    pub fn checkpoint_file(&self) -> Option<PathBuf> {
        self.solver_file("checkpointFile", "ck")
    }

    /// The solver keeps the previous checkpoint under a `.bk` suffix.
    pub fn backup_checkpoint_file(&self) -> Option<PathBuf> {
        self.checkpoint_file().map(|ck| {
            let mut name = ck.into_os_string();
            name.push(".bk");
            PathBuf::from(name)
        })
    }

    fn solver_file(&self, setting: &str, extension: &str) -> Option<PathBuf> {
        if let Some(explicit) = self.solver.settings.get(setting) {
            return Some(self.resolve(explicit));
        }
        let first = self.data.first()?;
        Some(self.resolve(Path::new(&first.filename).with_extension(extension)))
    }

    /// Successor counter of this descriptor, `None` for an original.
    pub fn counter(&self) -> Option<u32> {
        counter_of(&self.path.to_string_lossy())
    }

    /// Data records whose file name differs from the record at the same
    /// position in `predecessor`. Those files belong to this descriptor alone
    /// and move with it when its name is taken.
    pub fn fresh_records(&self, predecessor: &Self) -> Vec<usize> {
        self.data
            .iter()
            .enumerate()
            .filter(|(i, record)| {
                predecessor
                    .data
                    .get(*i)
                    .map_or(true, |before| before.filename != record.filename)
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Move the descriptor name, and the data files of `records`, to their
    /// next counter.
    pub fn advance_counter(&mut self, records: &[usize]) {
        self.path = PathBuf::from(successor_name(&self.path.to_string_lossy()));
        for &i in records {
            if let Some(record) = self.data.get_mut(i) {
                record.filename = successor_name(&record.filename);
            }
        }
    }
}

/// Journal path for a descriptor path.
pub fn journal_path_for(descriptor: &Path) -> PathBuf {
    descriptor.with_extension(JOURNAL_EXTENSION)
}

/// Successor name of a file: `run.yaml` becomes `run.count001.yaml`,
/// `run.count001.yaml` becomes `run.count002.yaml`. Counters are zero padded
/// to three digits and keep growing past 999.
pub fn successor_name(name: &str) -> String {
    let (root, extension) = split_extension(name);
    let (bare, counter) = split_extension(root);
    match counter.and_then(parse_counter) {
        Some(n) => join(bare, &format!("{COUNTER_PREFIX}{:03}", n + 1), extension),
        None => join(root, &format!("{COUNTER_PREFIX}001"), extension),
    }
}

/// Successor counter embedded in a file name.
pub fn counter_of(name: &str) -> Option<u32> {
    let (root, _) = split_extension(name);
    split_extension(root).1.and_then(parse_counter)
}

fn parse_counter(segment: &str) -> Option<u32> {
    let digits = segment.strip_prefix(COUNTER_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn join(root: &str, counter: &str, extension: Option<&str>) -> String {
    match extension {
        Some(ext) => format!("{root}.{counter}.{ext}"),
        None => format!("{root}.{counter}"),
    }
}

/// Split off the extension of the last path component. A leading dot (hidden
/// file) does not start an extension.
fn split_extension(name: &str) -> (&str, Option<&str>) {
    let component_start = name.rfind(['/', '\\']).map_or(0, |i| i + 1);
    match name[component_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let dot = component_start + dot;
            (&name[..dot], Some(&name[dot + 1..]))
        }
        _ => (name, None),
    }
}

fn scalar_to_string(value: serde_yaml::Value) -> Result<String, String> {
    match value {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("expected a scalar, found {other:?}")),
    }
}

fn scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    scalar_to_string(value).map_err(serde::de::Error::custom)
}

fn opt_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_yaml::Value>::deserialize(deserializer)? {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(value) => scalar_to_string(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn scalar_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, serde_yaml::Value>>::deserialize(deserializer)?;
    raw.unwrap_or_default()
        .into_iter()
        .map(|(k, v)| scalar_to_string(v).map(|v| (k, v)))
        .collect::<Result<_, _>>()
        .map_err(serde::de::Error::custom)
}
