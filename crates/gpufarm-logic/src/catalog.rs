//! Catalog records and their lenient JSON parsing.
//!
//! The host loads the raw tabular sources however it likes (files, network,
//! bundled strings) and hands the text to [`load_catalog`]. Each source is a
//! JSON array of string-keyed rows. Parsing is lenient: numeric fields may be
//! numbers or numeric strings, and anything missing or malformed falls back
//! to the documented default for that field. A source that is unavailable or
//! not an array yields an empty collection plus a diagnostic; the other
//! sources still load.
//!
//! ```
//! use gpufarm_logic::catalog::{load_catalog, CatalogSources};
//!
//! let sources = CatalogSources {
//!     hardware: Some(r#"[{ "id": "gpu-1", "cost": "250", "power": 4 }]"#),
//!     ..CatalogSources::default()
//! };
//! let load = load_catalog(&sources);
//! assert_eq!(load.catalog.hardware[0].cost, 250);
//! // The four missing sources each report a diagnostic.
//! assert_eq!(load.diagnostics.len(), 4);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A single untyped catalog row.
pub type RawRecord = serde_json::Map<String, Value>;

/// Default credit cost when a row has none.
pub const DEFAULT_COST: u32 = 0;
/// Default for equipment and prompt attributes (neutral: contributes nothing).
pub const DEFAULT_ATTRIBUTE: f32 = 0.0;
/// Default job complexity.
pub const DEFAULT_COMPLEXITY: f32 = 1.0;
/// Default job duration in blocks. Non-positive durations also fall back here.
pub const DEFAULT_BASELINE_DURATION: f32 = 4.0;
/// Default per-threshold error probability of a job.
pub const DEFAULT_ERROR_RATE: f32 = 0.1;
/// Default quick-resolution success probability of a job.
pub const DEFAULT_RESOLUTION_RATE: f32 = 0.5;
/// Default per-rollover probability of a message template.
pub const DEFAULT_TEMPLATE_PROBABILITY: f32 = 0.25;

/// The five catalog sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CatalogKind {
    Hardware,
    AiModels,
    Prompts,
    Jobs,
    MessageTemplates,
}

impl CatalogKind {
    pub const ALL: [CatalogKind; 5] = [
        CatalogKind::Hardware,
        CatalogKind::AiModels,
        CatalogKind::Prompts,
        CatalogKind::Jobs,
        CatalogKind::MessageTemplates,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CatalogKind::Hardware => "hardware",
            CatalogKind::AiModels => "ai_models",
            CatalogKind::Prompts => "prompts",
            CatalogKind::Jobs => "jobs",
            CatalogKind::MessageTemplates => "message_templates",
        }
    }
}

/// Feed channel a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    Social,
    Direct,
    System,
}

impl MessageType {
    /// Order used when picking one message per type.
    pub const ALL: [MessageType; 3] = [
        MessageType::Social,
        MessageType::Direct,
        MessageType::System,
    ];

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "social" => Some(MessageType::Social),
            "direct" | "dm" => Some(MessageType::Direct),
            "system" => Some(MessageType::System),
            _ => None,
        }
    }
}

/// Action a feed message offers to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageAction {
    AcceptJob,
    Open,
}

impl MessageAction {
    fn parse(s: &str) -> Option<Self> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "acceptjob" | "accept" => Some(MessageAction::AcceptJob),
            "open" => Some(MessageAction::Open),
            _ => None,
        }
    }
}

/// A GPU. The one with the highest `power` drives the modifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareRecord {
    pub id: String,
    pub name: String,
    pub cost: u32,
    pub power: f32,
    pub memory: f32,
    pub efficiency: f32,
}

/// An AI model. The one with the highest `accuracy` drives the modifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiModelRecord {
    pub id: String,
    pub name: String,
    pub cost: u32,
    pub accuracy: f32,
    pub speed: f32,
}

/// A prompt, used as the tool for guided error resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRecord {
    pub id: String,
    pub name: String,
    pub cost: u32,
    pub clarity: f32,
    pub specificity: f32,
    pub adaptability: f32,
}

impl PromptRecord {
    /// Mean of the three quality attributes.
    pub fn quality(&self) -> f32 {
        (self.clarity + self.specificity + self.adaptability) / 3.0
    }
}

/// An assignable compute job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub cost: u32,
    pub complexity: f32,
    /// Blocks needed at speed multiplier 1.0.
    pub baseline_duration: f32,
    pub error_rate: f32,
    pub resolution_rate: f32,
    pub reward: u32,
    pub reputation_reward: u32,
}

/// A feed message blueprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub id: String,
    pub message_type: MessageType,
    pub title: String,
    /// Body text; `{job}` is replaced with the linked job's title.
    pub body: String,
    /// Chance of firing on an eligible rollover, in [0, 1].
    pub probability: f32,
    pub action: Option<MessageAction>,
    pub linked_job: Option<String>,
    /// Item advertised by the message; the template goes quiet once it is owned.
    pub advertises: Option<String>,
}

/// Problems found while loading catalog sources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("source unavailable")]
    Unavailable,
    #[error("malformed source: {0}")]
    Malformed(String),
    #[error("source is not an array of records")]
    NotAnArray,
    #[error("row {row} is not a record")]
    NotARecord { row: usize },
    #[error("row {row} has no id")]
    MissingId { row: usize },
    #[error("duplicate id '{0}' (first occurrence kept)")]
    DuplicateId(String),
}

/// A per-source loading problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogDiagnostic {
    pub kind: CatalogKind,
    pub error: CatalogError,
}

impl std::fmt::Display for CatalogDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.error)
    }
}

/// Conversion from an untyped row. Only a missing id is fatal for a row.
pub trait CatalogRecord: Sized {
    const KIND: CatalogKind;

    fn id(&self) -> &str;

    fn from_raw(id: String, raw: &RawRecord) -> Self;
}

fn text_field(raw: &RawRecord, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number_field(raw: &RawRecord, key: &str, default: f32) -> f32 {
    let parsed = match raw.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => v as f32,
        _ => default,
    }
}

fn amount_field(raw: &RawRecord, key: &str, default: u32) -> u32 {
    let v = number_field(raw, key, default as f32);
    if v < 0.0 {
        default
    } else {
        v.round().min(u32::MAX as f32) as u32
    }
}

fn rate_field(raw: &RawRecord, key: &str, default: f32) -> f32 {
    number_field(raw, key, default).clamp(0.0, 1.0)
}

impl CatalogRecord for HardwareRecord {
    const KIND: CatalogKind = CatalogKind::Hardware;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_raw(id: String, raw: &RawRecord) -> Self {
        Self {
            name: text_field(raw, "name").unwrap_or_else(|| id.clone()),
            cost: amount_field(raw, "cost", DEFAULT_COST),
            power: number_field(raw, "power", DEFAULT_ATTRIBUTE).max(0.0),
            memory: number_field(raw, "memory", DEFAULT_ATTRIBUTE).max(0.0),
            efficiency: number_field(raw, "efficiency", DEFAULT_ATTRIBUTE).max(0.0),
            id,
        }
    }
}

impl CatalogRecord for AiModelRecord {
    const KIND: CatalogKind = CatalogKind::AiModels;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_raw(id: String, raw: &RawRecord) -> Self {
        Self {
            name: text_field(raw, "name").unwrap_or_else(|| id.clone()),
            cost: amount_field(raw, "cost", DEFAULT_COST),
            accuracy: number_field(raw, "accuracy", DEFAULT_ATTRIBUTE).max(0.0),
            speed: number_field(raw, "speed", DEFAULT_ATTRIBUTE).max(0.0),
            id,
        }
    }
}

impl CatalogRecord for PromptRecord {
    const KIND: CatalogKind = CatalogKind::Prompts;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_raw(id: String, raw: &RawRecord) -> Self {
        Self {
            name: text_field(raw, "name").unwrap_or_else(|| id.clone()),
            cost: amount_field(raw, "cost", DEFAULT_COST),
            clarity: number_field(raw, "clarity", DEFAULT_ATTRIBUTE).max(0.0),
            specificity: number_field(raw, "specificity", DEFAULT_ATTRIBUTE).max(0.0),
            adaptability: number_field(raw, "adaptability", DEFAULT_ATTRIBUTE).max(0.0),
            id,
        }
    }
}

impl CatalogRecord for JobRecord {
    const KIND: CatalogKind = CatalogKind::Jobs;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_raw(id: String, raw: &RawRecord) -> Self {
        let duration = number_field(raw, "baseline_duration", DEFAULT_BASELINE_DURATION);
        Self {
            title: text_field(raw, "title").unwrap_or_else(|| id.clone()),
            description: text_field(raw, "description").unwrap_or_default(),
            cost: amount_field(raw, "cost", DEFAULT_COST),
            complexity: number_field(raw, "complexity", DEFAULT_COMPLEXITY).max(0.0),
            baseline_duration: if duration > 0.0 {
                duration
            } else {
                DEFAULT_BASELINE_DURATION
            },
            error_rate: rate_field(raw, "error_rate", DEFAULT_ERROR_RATE),
            resolution_rate: rate_field(raw, "resolution_rate", DEFAULT_RESOLUTION_RATE),
            reward: amount_field(raw, "reward", 0),
            reputation_reward: amount_field(raw, "reputation_reward", 0),
            id,
        }
    }
}

impl CatalogRecord for MessageTemplate {
    const KIND: CatalogKind = CatalogKind::MessageTemplates;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_raw(id: String, raw: &RawRecord) -> Self {
        let linked_job = text_field(raw, "linked_job");
        let action = text_field(raw, "action")
            .and_then(|a| MessageAction::parse(&a))
            .or(linked_job.as_ref().map(|_| MessageAction::AcceptJob));
        Self {
            message_type: text_field(raw, "type")
                .and_then(|t| MessageType::parse(&t))
                .unwrap_or(MessageType::System),
            title: text_field(raw, "title").unwrap_or_else(|| id.clone()),
            body: text_field(raw, "body").unwrap_or_default(),
            probability: rate_field(raw, "probability", DEFAULT_TEMPLATE_PROBABILITY),
            action,
            linked_job,
            advertises: text_field(raw, "advertises"),
            id,
        }
    }
}

/// Read-only record collections, in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub hardware: Vec<HardwareRecord>,
    pub ai_models: Vec<AiModelRecord>,
    pub prompts: Vec<PromptRecord>,
    pub jobs: Vec<JobRecord>,
    pub templates: Vec<MessageTemplate>,
}

impl Catalog {
    pub fn hardware(&self, id: &str) -> Option<&HardwareRecord> {
        self.hardware.iter().find(|r| r.id == id)
    }

    pub fn ai_model(&self, id: &str) -> Option<&AiModelRecord> {
        self.ai_models.iter().find(|r| r.id == id)
    }

    pub fn prompt(&self, id: &str) -> Option<&PromptRecord> {
        self.prompts.iter().find(|r| r.id == id)
    }

    pub fn job(&self, id: &str) -> Option<&JobRecord> {
        self.jobs.iter().find(|r| r.id == id)
    }

    pub fn template(&self, id: &str) -> Option<&MessageTemplate> {
        self.templates.iter().find(|r| r.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.hardware.is_empty()
            && self.ai_models.is_empty()
            && self.prompts.is_empty()
            && self.jobs.is_empty()
            && self.templates.is_empty()
    }
}

/// Raw text of each source; `None` means the host failed to fetch it.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogSources<'a> {
    pub hardware: Option<&'a str>,
    pub ai_models: Option<&'a str>,
    pub prompts: Option<&'a str>,
    pub jobs: Option<&'a str>,
    pub templates: Option<&'a str>,
}

/// Result of [`load_catalog`]: whatever loaded, plus what went wrong.
#[derive(Debug, Clone, Default)]
pub struct CatalogLoad {
    pub catalog: Catalog,
    pub diagnostics: Vec<CatalogDiagnostic>,
}

/// Parse one source into typed records, collecting diagnostics.
pub fn parse_records<T: CatalogRecord>(
    text: Option<&str>,
    diagnostics: &mut Vec<CatalogDiagnostic>,
) -> Vec<T> {
    let mut report = |error: CatalogError| {
        log::warn!("catalog {}: {}", T::KIND.label(), error);
        diagnostics.push(CatalogDiagnostic {
            kind: T::KIND,
            error,
        });
    };

    let Some(text) = text else {
        report(CatalogError::Unavailable);
        return Vec::new();
    };
    let rows = match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(rows)) => rows,
        Ok(_) => {
            report(CatalogError::NotAnArray);
            return Vec::new();
        }
        Err(e) => {
            report(CatalogError::Malformed(e.to_string()));
            return Vec::new();
        }
    };

    let mut records: Vec<T> = Vec::with_capacity(rows.len());
    for (row, value) in rows.iter().enumerate() {
        let Value::Object(raw) = value else {
            report(CatalogError::NotARecord { row });
            continue;
        };
        let Some(id) = text_field(raw, "id") else {
            report(CatalogError::MissingId { row });
            continue;
        };
        if records.iter().any(|r| r.id() == id) {
            report(CatalogError::DuplicateId(id));
            continue;
        }
        records.push(T::from_raw(id, raw));
    }
    records
}

/// Load all five sources. Never fails as a whole.
pub fn load_catalog(sources: &CatalogSources<'_>) -> CatalogLoad {
    let mut diagnostics = Vec::new();
    let catalog = Catalog {
        hardware: parse_records(sources.hardware, &mut diagnostics),
        ai_models: parse_records(sources.ai_models, &mut diagnostics),
        prompts: parse_records(sources.prompts, &mut diagnostics),
        jobs: parse_records(sources.jobs, &mut diagnostics),
        templates: parse_records(sources.templates, &mut diagnostics),
    };
    log::info!(
        "catalog loaded: {} hardware, {} models, {} prompts, {} jobs, {} templates ({} diagnostics)",
        catalog.hardware.len(),
        catalog.ai_models.len(),
        catalog.prompts.len(),
        catalog.jobs.len(),
        catalog.templates.len(),
        diagnostics.len()
    );
    CatalogLoad {
        catalog,
        diagnostics,
    }
}
