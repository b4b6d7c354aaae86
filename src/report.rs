use crate::engine::Stage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: u64,
    pub source: String,
    pub work_dir: String,
    /// True when the source was already a page-description file.
    pub skipped_intermediate: bool,
    pub state: String,
    #[serde(default)]
    pub failure: Option<String>,
    pub stages: Vec<StageReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub command: String,
    pub pid: u32,
    #[serde(default)]
    pub exit_code: Option<i32>,
    pub elapsed_ms: u64,
    pub killed: bool,
}
