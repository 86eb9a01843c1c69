//! Project persistence behind a repository trait
//!
//! A project is three pieces of state: the record set, the acknowledgment
//! log and the previous-method memo. The engine reads all three when a
//! session opens and writes after every mutation.

use crate::acknowledgment::Acknowledgment;
use crate::error::{DeskError, Result};
use crate::record::ForecastRecord;
use curve_math::Method;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Everything persisted for one project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub project_id: String,
    pub records: Vec<ForecastRecord>,
    pub acknowledgments: Vec<Acknowledgment>,
    pub previous_methods: BTreeMap<String, Method>,
}

impl ProjectSnapshot {
    pub fn empty(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            ..Self::default()
        }
    }
}

/// Key-value store keyed by project
pub trait ProjectRepository {
    /// Load a project, `None` when nothing was stored yet
    fn load(&self, project_id: &str) -> Result<Option<ProjectSnapshot>>;

    /// Overwrite the record set
    fn save_records(&mut self, project_id: &str, records: &[ForecastRecord]) -> Result<()>;

    /// Append one acknowledgment to the audit log
    fn append_acknowledgment(&mut self, project_id: &str, entry: &Acknowledgment) -> Result<()>;

    /// Overwrite the previous-method memo
    fn save_previous_methods(
        &mut self,
        project_id: &str,
        previous_methods: &BTreeMap<String, Method>,
    ) -> Result<()>;
}

/// Repository kept in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    projects: HashMap<String, ProjectSnapshot>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored snapshot, for inspection
    pub fn project(&self, project_id: &str) -> Option<&ProjectSnapshot> {
        self.projects.get(project_id)
    }

    fn entry(&mut self, project_id: &str) -> &mut ProjectSnapshot {
        self.projects
            .entry(project_id.to_string())
            .or_insert_with(|| ProjectSnapshot::empty(project_id))
    }
}

impl ProjectRepository for InMemoryRepository {
    fn load(&self, project_id: &str) -> Result<Option<ProjectSnapshot>> {
        Ok(self.projects.get(project_id).cloned())
    }

    fn save_records(&mut self, project_id: &str, records: &[ForecastRecord]) -> Result<()> {
        self.entry(project_id).records = records.to_vec();
        Ok(())
    }

    fn append_acknowledgment(&mut self, project_id: &str, entry: &Acknowledgment) -> Result<()> {
        self.entry(project_id).acknowledgments.push(entry.clone());
        Ok(())
    }

    fn save_previous_methods(
        &mut self,
        project_id: &str,
        previous_methods: &BTreeMap<String, Method>,
    ) -> Result<()> {
        self.entry(project_id).previous_methods = previous_methods.clone();
        Ok(())
    }
}

/// Repository writing one directory per project
///
/// `records.json` and `previous_methods.json` are rewritten on save;
/// `acknowledgments.jsonl` is only ever appended to.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    root: PathBuf,
}

impl JsonFileRepository {
    const RECORDS_FILE: &'static str = "records.json";
    const MEMO_FILE: &'static str = "previous_methods.json";
    const LOG_FILE: &'static str = "acknowledgments.jsonl";

    /// Repository rooted at `root`; the directory is created on first write
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn project_dir(&self, project_id: &str) -> Result<PathBuf> {
        let valid = !project_id.is_empty()
            && project_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(DeskError::ValidationError(format!(
                "Project id must be non-empty and use only letters, digits, '-' or '_': {}",
                project_id
            )));
        }
        Ok(self.root.join(project_id))
    }

    fn ensure_project_dir(&self, project_id: &str) -> Result<PathBuf> {
        let dir = self.project_dir(project_id)?;
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn read_log(path: &Path) -> Result<Vec<Acknowledgment>> {
        let reader = BufReader::new(File::open(path)?);
        let mut entries = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str(&line).map_err(|e| {
                DeskError::DataError(format!(
                    "Corrupt acknowledgment at {}:{}: {}",
                    path.display(),
                    index + 1,
                    e
                ))
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

impl ProjectRepository for JsonFileRepository {
    fn load(&self, project_id: &str) -> Result<Option<ProjectSnapshot>> {
        let dir = self.project_dir(project_id)?;
        if !dir.exists() {
            return Ok(None);
        }

        let mut snapshot = ProjectSnapshot::empty(project_id);

        let records_path = dir.join(Self::RECORDS_FILE);
        if records_path.exists() {
            snapshot.records = serde_json::from_reader(BufReader::new(File::open(records_path)?))?;
        }

        let memo_path = dir.join(Self::MEMO_FILE);
        if memo_path.exists() {
            snapshot.previous_methods =
                serde_json::from_reader(BufReader::new(File::open(memo_path)?))?;
        }

        let log_path = dir.join(Self::LOG_FILE);
        if log_path.exists() {
            snapshot.acknowledgments = Self::read_log(&log_path)?;
        }

        Ok(Some(snapshot))
    }

    fn save_records(&mut self, project_id: &str, records: &[ForecastRecord]) -> Result<()> {
        let dir = self.ensure_project_dir(project_id)?;
        Self::write_json(&dir.join(Self::RECORDS_FILE), records)
    }

    fn append_acknowledgment(&mut self, project_id: &str, entry: &Acknowledgment) -> Result<()> {
        let dir = self.ensure_project_dir(project_id)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(Self::LOG_FILE))?;
        let line = serde_json::to_string(entry)?;
        writeln!(file, "{}", line)?;
        file.sync_data()?;
        Ok(())
    }

    fn save_previous_methods(
        &mut self,
        project_id: &str,
        previous_methods: &BTreeMap<String, Method>,
    ) -> Result<()> {
        let dir = self.ensure_project_dir(project_id)?;
        Self::write_json(&dir.join(Self::MEMO_FILE), previous_methods)
    }
}
