use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Licensing model of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    OpenWeight,
    Proprietary,
}

/// Whether the provider trains on user inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingPolicy {
    YesTrain,
    NoTrain,
    OptOut,
}

/// A hosting offering for a model
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Host {
    pub host_name: String,
    #[serde(default)]
    pub host_country: Option<String>,
    /// Processing takes place inside the EEA
    #[serde(default)]
    pub eea_processing: Option<bool>,
    #[serde(default)]
    pub chat_available: Option<bool>,
    #[serde(default)]
    pub api_available: Option<bool>,
}

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOption {
    pub model_id: String,
    pub model_name: String,
    pub developer_name: String,
    pub country_of_origin: String,
    pub source_type: SourceType,
    /// Output-usage rights granted by contract
    #[serde(default)]
    pub output_ip: Option<bool>,
    #[serde(default)]
    pub training_on_user_inputs: Option<TrainingPolicy>,
    #[serde(default)]
    pub usage_based_pricing_available: Option<bool>,
    #[serde(default)]
    pub subscription_available: Option<bool>,
    #[serde(default)]
    pub api_availability: Option<bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hosts: Vec<Host>,
    /// USD per million input tokens
    #[serde(default)]
    pub input_token_price: Option<f64>,
    /// USD per million output tokens
    #[serde(default)]
    pub output_token_price: Option<f64>,
    /// Performance scores (0-100) keyed by dimension name
    #[serde(default, deserialize_with = "null_as_default")]
    pub perf: BTreeMap<String, Option<f64>>,
}

/// Read an explicit `null` the same way as an absent field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ModelOption {
    pub fn is_open_weight(&self) -> bool {
        self.source_type == SourceType::OpenWeight
    }

    pub fn has_hosts(&self) -> bool {
        !self.hosts.is_empty()
    }

    /// Score for a dimension, `None` when absent or explicitly null
    pub fn perf_value(&self, dim: PerfDimension) -> Option<f64> {
        self.perf.get(dim.as_str()).copied().flatten()
    }

    /// Average token cost (50/50 input/output), `None` when either price is missing
    pub fn avg_token_cost(&self) -> Option<f64> {
        match (self.input_token_price, self.output_token_price) {
            (Some(input), Some(output)) => Some(0.5 * input + 0.5 * output),
            _ => None,
        }
    }
}

/// The fixed set of performance dimensions, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PerfDimension {
    Intelligence,
    Speed,
    #[serde(rename = "Coding quality")]
    CodingQuality,
    #[serde(rename = "Task adherence")]
    TaskAdherence,
    #[serde(rename = "Factual reliability")]
    FactualReliability,
}

impl PerfDimension {
    pub const ALL: [PerfDimension; 5] = [
        PerfDimension::Intelligence,
        PerfDimension::Speed,
        PerfDimension::CodingQuality,
        PerfDimension::TaskAdherence,
        PerfDimension::FactualReliability,
    ];

    /// Catalog key of the dimension
    pub fn as_str(self) -> &'static str {
        match self {
            PerfDimension::Intelligence => "Intelligence",
            PerfDimension::Speed => "Speed",
            PerfDimension::CodingQuality => "Coding quality",
            PerfDimension::TaskAdherence => "Task adherence",
            PerfDimension::FactualReliability => "Factual reliability",
        }
    }

    pub fn german_label(self) -> &'static str {
        match self {
            PerfDimension::Intelligence => "Intelligenz",
            PerfDimension::Speed => "Geschwindigkeit",
            PerfDimension::CodingQuality => "Code-Qualität",
            PerfDimension::TaskAdherence => "Folgt Anweisungen",
            PerfDimension::FactualReliability => "Zuverlässigkeit",
        }
    }

    /// Look up a dimension by its catalog key
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|dim| dim.as_str() == name)
    }
}

impl fmt::Display for PerfDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Likert importance on a 1-5 scale.
///
/// Deserializes from any number; the value is truncated toward zero and
/// clamped into range, non-finite or null input falls back to the default of 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Importance(u8);

impl Importance {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(raw: f64) -> Self {
        if !raw.is_finite() {
            return Self::default();
        }
        Importance(raw.trunc().clamp(f64::from(Self::MIN), f64::from(Self::MAX)) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Blend weight: importance 1 contributes nothing
    pub fn weight(self) -> f64 {
        f64::from(self.0 - Self::MIN)
    }
}

impl Default for Importance {
    fn default() -> Self {
        Importance(3)
    }
}

impl From<u8> for Importance {
    fn from(value: u8) -> Self {
        Self::new(f64::from(value))
    }
}

impl<'de> Deserialize<'de> for Importance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<f64>::deserialize(deserializer)?;
        Ok(raw.map_or_else(Self::default, Self::new))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostingResponsibility {
    ProviderManaged,
    SelfManaged,
    Either,
}

impl HostingResponsibility {
    pub fn as_str(self) -> &'static str {
        match self {
            HostingResponsibility::ProviderManaged => "provider-managed",
            HostingResponsibility::SelfManaged => "self-managed",
            HostingResponsibility::Either => "either",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccessMode {
    #[serde(rename = "API")]
    Api,
    Chat,
}

impl AccessMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessMode::Api => "API",
            AccessMode::Chat => "Chat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentPreference {
    UsageBased,
    Subscription,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingSegment {
    Low,
    Mid,
    Premium,
}

impl PricingSegment {
    /// Target in cost-position space (1.0 = cheapest)
    pub fn target_position(self) -> f64 {
        match self {
            PricingSegment::Low => 1.0,
            PricingSegment::Mid => 0.5,
            PricingSegment::Premium => 0.0,
        }
    }
}

/// Snapshot of the questionnaire state.
///
/// `None` on a tri-state field means the question was left unanswered,
/// which is distinct from an explicit `false`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Answers {
    #[serde(deserialize_with = "null_as_default")]
    pub exclude_developers: BTreeSet<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub exclude_countries: BTreeSet<String>,
    pub hosting_responsibility: Option<HostingResponsibility>,
    #[serde(deserialize_with = "null_as_default")]
    pub required_access_modes: BTreeSet<AccessMode>,
    pub personal_data_input: Option<bool>,
    pub eea_required: Option<bool>,
    pub require_output_ip: Option<bool>,
    pub allow_training_on_inputs: Option<bool>,
    pub payment_plan_preference: Option<PaymentPreference>,
    #[serde(deserialize_with = "null_as_default")]
    pub pricing_segments: BTreeSet<PricingSegment>,
    pub cost_importance: Importance,
    /// Importance per dimension keyed by dimension name; unknown names are ignored
    #[serde(deserialize_with = "null_as_default")]
    pub perf_likert: BTreeMap<String, Importance>,
}

impl Answers {
    /// Importance of a dimension, 3 when not answered
    pub fn perf_importance(&self, dim: PerfDimension) -> Importance {
        self.perf_likert.get(dim.as_str()).copied().unwrap_or_default()
    }

    /// Provider-hosted offerings are in play unless the user self-hosts
    pub fn provider_scope(&self) -> bool {
        !matches!(
            self.hosting_responsibility,
            Some(HostingResponsibility::SelfManaged)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CostData {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "not available")]
    NotAvailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanMatch {
    #[serde(rename = "passt")]
    Matches,
    #[serde(rename = "passt nicht")]
    Mismatch,
    #[serde(rename = "keine Präferenz")]
    NoPreference,
}

impl fmt::Display for PlanMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlanMatch::Matches => "passt",
            PlanMatch::Mismatch => "passt nicht",
            PlanMatch::NoPreference => "keine Präferenz",
        })
    }
}

/// Cost third of a candidate inside the current candidate set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentLabel {
    #[serde(rename = "Unteres Drittel")]
    Lower,
    #[serde(rename = "Mittleres Drittel")]
    Middle,
    #[serde(rename = "Oberes Drittel")]
    Upper,
    #[serde(rename = "n/a")]
    NotAvailable,
}

impl fmt::Display for SegmentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SegmentLabel::Lower => "Unteres Drittel",
            SegmentLabel::Middle => "Mittleres Drittel",
            SegmentLabel::Upper => "Oberes Drittel",
            SegmentLabel::NotAvailable => "n/a",
        })
    }
}

/// Scored outcome for one surviving candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalResultRow {
    pub model_id: String,
    pub model_name: String,
    pub developer_name: String,
    pub country_of_origin: String,
    pub source_type: SourceType,
    pub final_score: f64,
    pub base_score: f64,
    pub avg_token_cost: Option<f64>,
    pub input_token_price: Option<f64>,
    pub output_token_price: Option<f64>,
    pub cost_score: f64,
    pub cost_data: CostData,
    /// Contributing dimensions, e.g. "3/5"
    pub perf_dims_used: String,
    pub plan_bonus: f64,
    pub plan_match: PlanMatch,
    pub segment_label: SegmentLabel,
    pub perf_values: BTreeMap<PerfDimension, Option<f64>>,
}

/// Complete result of one evaluation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EvaluationOutput {
    /// Rows sorted descending by final score
    pub results: Vec<EvalResultRow>,
    /// Audit trail, one entry per filter stage
    pub log: Vec<String>,
    /// Removed model names keyed by stage label
    pub excluded_by_stage: BTreeMap<String, Vec<String>>,
    pub diagnostics: BTreeMap<String, serde_json::Value>,
}

/// Outcome of one configured questionnaire run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub title: String,
    pub output: EvaluationOutput,
}
