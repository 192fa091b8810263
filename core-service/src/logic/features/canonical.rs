//! Input Canonicalizer
//!
//! Chuẩn hoá input thô (viết hoa/thường lộn xộn, nhiều kiểu phân cách) về
//! một bộ nhãn cố định. Không bao giờ lỗi: mọi field đều có giá trị mặc định.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// RAW INPUT
// ============================================================================

/// Untrusted producer input: field name → scalar
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawInput(Map<String, Value>);

impl RawInput {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Lookup by canonical key. Exact key wins, then a key that normalizes to it
    /// (`Residence_type`, `residence-type`, `residence type`).
    pub fn get(&self, key: &str) -> Option<&Value> {
        if let Some(value) = self.0.get(key) {
            return Some(value);
        }
        self.0
            .iter()
            .find(|(k, _)| normalize_key(k) == key)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for RawInput {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for RawInput {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

fn normalize_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c.is_whitespace() { '_' } else { c })
        .collect()
}

// ============================================================================
// CANONICAL VOCABULARIES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Gender {
    #[default]
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WorkType {
    #[default]
    Private,
    SelfEmployed,
    GovtJob,
    Children,
    NeverWorked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ResidenceType {
    #[default]
    Urban,
    Rural,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SmokingStatus {
    FormerlySmoked,
    NeverSmoked,
    Smokes,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EverMarried {
    Yes,
    #[default]
    No,
}

impl Gender {
    pub const ALL: [Gender; 2] = [Gender::Male, Gender::Female];

    pub fn label(self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

impl WorkType {
    pub const ALL: [WorkType; 5] = [
        WorkType::Private,
        WorkType::SelfEmployed,
        WorkType::GovtJob,
        WorkType::Children,
        WorkType::NeverWorked,
    ];

    pub fn label(self) -> &'static str {
        match self {
            WorkType::Private => "Private",
            WorkType::SelfEmployed => "Self-employed",
            WorkType::GovtJob => "Govt_job",
            WorkType::Children => "children",
            WorkType::NeverWorked => "Never_worked",
        }
    }
}

impl ResidenceType {
    pub const ALL: [ResidenceType; 2] = [ResidenceType::Urban, ResidenceType::Rural];

    pub fn label(self) -> &'static str {
        match self {
            ResidenceType::Urban => "Urban",
            ResidenceType::Rural => "Rural",
        }
    }
}

impl SmokingStatus {
    pub const ALL: [SmokingStatus; 4] = [
        SmokingStatus::FormerlySmoked,
        SmokingStatus::NeverSmoked,
        SmokingStatus::Smokes,
        SmokingStatus::Unknown,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SmokingStatus::FormerlySmoked => "formerly smoked",
            SmokingStatus::NeverSmoked => "never smoked",
            SmokingStatus::Smokes => "smokes",
            SmokingStatus::Unknown => "Unknown",
        }
    }
}

impl EverMarried {
    pub const ALL: [EverMarried; 2] = [EverMarried::Yes, EverMarried::No];

    pub fn label(self) -> &'static str {
        match self {
            EverMarried::Yes => "Yes",
            EverMarried::No => "No",
        }
    }
}

/// Categorical domain attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalField {
    Gender,
    WorkType,
    ResidenceType,
    SmokingStatus,
    EverMarried,
}

impl CategoricalField {
    pub const ALL: [CategoricalField; 5] = [
        CategoricalField::Gender,
        CategoricalField::WorkType,
        CategoricalField::ResidenceType,
        CategoricalField::SmokingStatus,
        CategoricalField::EverMarried,
    ];

    pub fn key(self) -> &'static str {
        match self {
            CategoricalField::Gender => "gender",
            CategoricalField::WorkType => "work_type",
            CategoricalField::ResidenceType => "residence_type",
            CategoricalField::SmokingStatus => "smoking_status",
            CategoricalField::EverMarried => "ever_married",
        }
    }

    /// Every canonical label of this field
    pub fn labels(self) -> Vec<&'static str> {
        match self {
            CategoricalField::Gender => Gender::ALL.iter().map(|v| v.label()).collect(),
            CategoricalField::WorkType => WorkType::ALL.iter().map(|v| v.label()).collect(),
            CategoricalField::ResidenceType => ResidenceType::ALL.iter().map(|v| v.label()).collect(),
            CategoricalField::SmokingStatus => SmokingStatus::ALL.iter().map(|v| v.label()).collect(),
            CategoricalField::EverMarried => EverMarried::ALL.iter().map(|v| v.label()).collect(),
        }
    }
}

/// Numeric domain attributes, copied into the column of the same name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericField {
    Age,
    Hypertension,
    HeartDisease,
    AvgGlucoseLevel,
    Bmi,
}

impl NumericField {
    pub const ALL: [NumericField; 5] = [
        NumericField::Age,
        NumericField::Hypertension,
        NumericField::HeartDisease,
        NumericField::AvgGlucoseLevel,
        NumericField::Bmi,
    ];

    pub fn key(self) -> &'static str {
        match self {
            NumericField::Age => "age",
            NumericField::Hypertension => "hypertension",
            NumericField::HeartDisease => "heart_disease",
            NumericField::AvgGlucoseLevel => "avg_glucose_level",
            NumericField::Bmi => "bmi",
        }
    }
}

// ============================================================================
// CANONICAL FIELDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CanonicalFields {
    pub gender: Gender,
    pub work_type: WorkType,
    pub residence_type: ResidenceType,
    pub smoking_status: SmokingStatus,
    pub ever_married: EverMarried,

    pub age: f64,
    pub hypertension: f64,
    pub heart_disease: f64,
    pub avg_glucose_level: f64,
    pub bmi: f64,

    /// Fields that fell back to their default (absent or unrecognized)
    pub defaulted: Vec<&'static str>,
}

impl CanonicalFields {
    pub fn label(&self, field: CategoricalField) -> &'static str {
        match field {
            CategoricalField::Gender => self.gender.label(),
            CategoricalField::WorkType => self.work_type.label(),
            CategoricalField::ResidenceType => self.residence_type.label(),
            CategoricalField::SmokingStatus => self.smoking_status.label(),
            CategoricalField::EverMarried => self.ever_married.label(),
        }
    }

    pub fn numeric(&self, field: NumericField) -> f64 {
        match field {
            NumericField::Age => self.age,
            NumericField::Hypertension => self.hypertension,
            NumericField::HeartDisease => self.heart_disease,
            NumericField::AvgGlucoseLevel => self.avg_glucose_level,
            NumericField::Bmi => self.bmi,
        }
    }
}

// ============================================================================
// MATCHING RULES (most specific first)
// ============================================================================

enum Pattern {
    /// Whole token equals one of these
    Exact(&'static [&'static str]),
    /// Token contains one of these
    Contains(&'static [&'static str]),
    /// Token contains `base` and at least one of `with_any`
    Compound {
        base: &'static str,
        with_any: &'static [&'static str],
    },
}

impl Pattern {
    fn matches(&self, token: &str) -> bool {
        match self {
            Pattern::Exact(words) => words.iter().any(|w| token == *w),
            Pattern::Contains(parts) => parts.iter().any(|p| token.contains(p)),
            Pattern::Compound { base, with_any } => {
                token.contains(base) && with_any.iter().any(|p| token.contains(p))
            }
        }
    }
}

struct Rule<T: 'static> {
    target: T,
    patterns: &'static [Pattern],
}

static SMOKING_RULES: &[Rule<SmokingStatus>] = &[
    Rule { target: SmokingStatus::FormerlySmoked, patterns: &[Pattern::Contains(&["formerly", "former"])] },
    Rule { target: SmokingStatus::NeverSmoked, patterns: &[Pattern::Contains(&["never", "non-smok", "nonsmok"])] },
    Rule { target: SmokingStatus::Smokes, patterns: &[Pattern::Contains(&["smok"])] },
    Rule { target: SmokingStatus::Unknown, patterns: &[Pattern::Contains(&["unknown"])] },
];

static WORK_RULES: &[Rule<WorkType>] = &[
    Rule { target: WorkType::NeverWorked, patterns: &[Pattern::Contains(&["never"])] },
    Rule { target: WorkType::Children, patterns: &[Pattern::Contains(&["child"])] },
    Rule { target: WorkType::GovtJob, patterns: &[Pattern::Contains(&["gov"])] },
    Rule {
        target: WorkType::SelfEmployed,
        patterns: &[Pattern::Compound { base: "self", with_any: &["employ", "-", "_", " "] }],
    },
    Rule { target: WorkType::Private, patterns: &[Pattern::Contains(&["private"])] },
];

static RESIDENCE_RULES: &[Rule<ResidenceType>] = &[
    Rule { target: ResidenceType::Rural, patterns: &[Pattern::Contains(&["rural"])] },
    Rule { target: ResidenceType::Urban, patterns: &[Pattern::Contains(&["urban"])] },
];

static GENDER_RULES: &[Rule<Gender>] = &[
    Rule { target: Gender::Female, patterns: &[Pattern::Exact(&["f"]), Pattern::Contains(&["female", "woman"])] },
    Rule { target: Gender::Male, patterns: &[Pattern::Exact(&["m"]), Pattern::Contains(&["male", "man"])] },
];

const TRUTHY: &[&str] = &["yes", "y", "true", "1", "married"];
const FALSY: &[&str] = &["no", "n", "false", "0", "single"];

fn match_rules<T: Copy>(rules: &[Rule<T>], token: &str) -> Option<T> {
    rules
        .iter()
        .find(|rule| rule.patterns.iter().any(|p| p.matches(token)))
        .map(|rule| rule.target)
}

/// Lower-cased, trimmed text of a scalar. Arrays/objects/null have none.
fn value_token(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_lowercase()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
    .filter(|s| !s.is_empty())
}

/// Numeric coercion: numbers, numeric strings, booleans. Anything else is None.
fn value_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn ever_married_from(value: &Value) -> Option<EverMarried> {
    match value {
        Value::Bool(b) => Some(if *b { EverMarried::Yes } else { EverMarried::No }),
        Value::Number(n) => match n.as_f64() {
            Some(v) if v == 1.0 => Some(EverMarried::Yes),
            Some(v) if v == 0.0 => Some(EverMarried::No),
            _ => None,
        },
        Value::String(s) => {
            let token = s.trim().to_lowercase();
            if TRUTHY.contains(&token.as_str()) {
                Some(EverMarried::Yes)
            } else if FALSY.contains(&token.as_str()) {
                Some(EverMarried::No)
            } else {
                None
            }
        }
        _ => None,
    }
}

// ============================================================================
// CANONICALIZE
// ============================================================================

/// Resolve one categorical field. `None` means absent or unrecognized.
fn resolve<T: Copy>(raw: &RawInput, field: CategoricalField, rules: &[Rule<T>]) -> Option<T> {
    raw.get(field.key())
        .and_then(value_token)
        .and_then(|token| match_rules(rules, &token))
}

/// Map untrusted input onto the canonical vocabularies. Pure and total.
pub fn canonicalize(raw: &RawInput) -> CanonicalFields {
    let mut fields = CanonicalFields::default();
    let mut defaulted = Vec::new();

    match resolve(raw, CategoricalField::Gender, GENDER_RULES) {
        Some(g) => fields.gender = g,
        None => defaulted.push(CategoricalField::Gender.key()),
    }
    match resolve(raw, CategoricalField::WorkType, WORK_RULES) {
        Some(w) => fields.work_type = w,
        None => defaulted.push(CategoricalField::WorkType.key()),
    }
    match resolve(raw, CategoricalField::ResidenceType, RESIDENCE_RULES) {
        Some(r) => fields.residence_type = r,
        None => defaulted.push(CategoricalField::ResidenceType.key()),
    }
    match resolve(raw, CategoricalField::SmokingStatus, SMOKING_RULES) {
        Some(s) => fields.smoking_status = s,
        None => defaulted.push(CategoricalField::SmokingStatus.key()),
    }
    match raw.get(CategoricalField::EverMarried.key()).and_then(ever_married_from) {
        Some(m) => fields.ever_married = m,
        None => defaulted.push(CategoricalField::EverMarried.key()),
    }

    for field in NumericField::ALL {
        let value = raw.get(field.key()).and_then(value_number);
        if value.is_none() {
            defaulted.push(field.key());
        }
        let value = value.unwrap_or(0.0);
        match field {
            NumericField::Age => fields.age = value,
            NumericField::Hypertension => fields.hypertension = value,
            NumericField::HeartDisease => fields.heart_disease = value,
            NumericField::AvgGlucoseLevel => fields.avg_glucose_level = value,
            NumericField::Bmi => fields.bmi = value,
        }
    }

    fields.defaulted = defaulted;
    fields
}
