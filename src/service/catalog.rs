//! Threat catalog: loads and validates domain profiles
//!
//! Two profiles are compiled into the binary. Additional profiles can be
//! loaded from a directory of `*.yaml` files; a file whose id matches a
//! built-in profile replaces it.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::model::config::ProfileSources;
use crate::model::{Condition, DomainProfile};
use crate::service::scoring::components::MAX_EXPOSURE;

const WAREHOUSE_PROFILE: &str = include_str!("../../data/profiles/warehouse.yaml");
const EXECUTIVE_PROTECTION_PROFILE: &str =
    include_str!("../../data/profiles/executive_protection.yaml");

const BUILTIN_PROFILES: &[(&str, &str)] = &[
    ("warehouse", WAREHOUSE_PROFILE),
    ("executive_protection", EXECUTIVE_PROTECTION_PROFILE),
];

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProfileError {
    #[error("Profile not found: {0}")]
    NotFound(String),

    #[error("Failed to read profile {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse profile {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Profile '{profile}' is invalid: {}", .problems.join("; "))]
    Invalid {
        profile: String,
        problems: Vec<String>,
    },
}

/// Parse and validate a built-in profile by id
pub fn builtin_profile(id: &str) -> Result<DomainProfile, ProfileError> {
    let (_, source) = BUILTIN_PROFILES
        .iter()
        .find(|(name, _)| *name == id)
        .ok_or_else(|| ProfileError::NotFound(id.to_string()))?;
    parse_profile(id, source)
}

/// Parse a YAML profile document and check its reference integrity
pub fn parse_profile(origin: &str, source: &str) -> Result<DomainProfile, ProfileError> {
    let profile: DomainProfile =
        serde_yaml::from_str(source).map_err(|source| ProfileError::Parse {
            origin: origin.to_string(),
            source,
        })?;
    validate(&profile)?;
    Ok(profile)
}

/// Reject profiles whose tables reference unknown threats, questions or
/// controls, or whose scoring constants cannot produce in-range scores
pub fn validate(profile: &DomainProfile) -> Result<(), ProfileError> {
    let mut problems = Vec::new();
    let scoring = &profile.scoring;

    if scoring.scale_max == 0 {
        problems.push("scale_max must be at least 1".to_string());
    }
    if scoring.vulnerability_baseline == 0 || scoring.vulnerability_baseline > scoring.scale_max {
        problems.push(format!(
            "vulnerability_baseline {} outside 1..={}",
            scoring.vulnerability_baseline, scoring.scale_max
        ));
    }
    if scoring.vulnerability_divisor <= 0 {
        problems.push("vulnerability_divisor must be positive".to_string());
    }
    if !(scoring.normalization_ceiling.is_finite() && scoring.normalization_ceiling > 0.0) {
        problems.push("normalization_ceiling must be a positive number".to_string());
    }
    if profile.threats.is_empty() {
        problems.push("profile defines no threats".to_string());
    }

    let threat_ids = unique_ids(profile.threats.iter().map(|t| t.id.as_str()), "threat", &mut problems);
    let question_ids = unique_ids(profile.questions.iter().map(|q| q.id.as_str()), "question", &mut problems);
    let control_ids = unique_ids(profile.controls.iter().map(|c| c.id.as_str()), "control", &mut problems);

    for threat in &profile.threats {
        for (label, value) in [("baseline_threat", threat.baseline_threat), ("baseline_impact", threat.baseline_impact)] {
            if value == 0 || value > scoring.scale_max {
                problems.push(format!("threat '{}' {} {} outside 1..={}", threat.id, label, value, scoring.scale_max));
            }
        }
    }

    let check_threats = |owner: &str, threats: &[String], problems: &mut Vec<String>| {
        for t in threats {
            if !threat_ids.contains(t.as_str()) {
                problems.push(format!("{} references unknown threat '{}'", owner, t));
            }
        }
    };

    for question in &profile.questions {
        check_threats(&format!("question '{}'", question.id), &question.threats, &mut problems);
        for control in &question.suggests_controls {
            if !control_ids.contains(control.as_str()) {
                problems.push(format!("question '{}' suggests unknown control '{}'", question.id, control));
            }
        }
    }

    let check_condition = |owner: &str, condition: &Condition, problems: &mut Vec<String>| {
        if !question_ids.contains(condition.question.as_str()) {
            problems.push(format!("{} tests unknown question '{}'", owner, condition.question));
        }
    };

    for boost in &profile.likelihood_boosts {
        check_threats("likelihood boost", &boost.threats, &mut problems);
        check_condition("likelihood boost", &boost.when, &mut problems);
    }
    for modifier in &profile.impact_modifiers {
        check_threats("impact modifier", &modifier.threats, &mut problems);
        check_condition("impact modifier", &modifier.when, &mut problems);
    }
    for clause in &profile.narrative_clauses {
        check_threats("narrative clause", std::slice::from_ref(&clause.threat), &mut problems);
        check_condition("narrative clause", &clause.when, &mut problems);
    }
    for indicator in &profile.indicators {
        let owner = format!("indicator '{}'", indicator.id);
        for condition in indicator.conditions.iter().chain(&indicator.high_severity) {
            check_condition(&owner, condition, &mut problems);
        }
    }

    for (threat, controls) in &profile.threat_controls {
        check_threats("threat_controls", std::slice::from_ref(threat), &mut problems);
        for control in controls {
            if !control_ids.contains(control.as_str()) {
                problems.push(format!("threat_controls for '{}' lists unknown control '{}'", threat, control));
            }
        }
    }

    if let Some(exposure) = &profile.exposure {
        if !(1.0..=MAX_EXPOSURE).contains(&exposure.max) {
            problems.push(format!(
                "exposure max {} must be between 1.0 and {:.1}",
                exposure.max, MAX_EXPOSURE
            ));
        }
        for factor in &exposure.factors {
            if !question_ids.contains(factor.question.as_str()) {
                problems.push(format!("exposure factor '{}' reads unknown question '{}'", factor.name, factor.question));
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ProfileError::Invalid {
            profile: profile.id.clone(),
            problems,
        })
    }
}

fn unique_ids<'a>(
    ids: impl Iterator<Item = &'a str>,
    kind: &str,
    problems: &mut Vec<String>,
) -> HashSet<&'a str> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            problems.push(format!("duplicate {} id '{}'", kind, id));
        }
    }
    seen
}

/// Loaded profiles, shared read-only across runs
#[derive(Debug, Clone, Default)]
pub struct ProfileCatalog {
    profiles: BTreeMap<String, Arc<DomainProfile>>,
}

impl ProfileCatalog {
    /// Catalog holding only the built-in profiles
    pub fn builtin() -> Result<Self, ProfileError> {
        let mut catalog = Self::default();
        for (id, _) in BUILTIN_PROFILES {
            catalog.insert(builtin_profile(id)?);
        }
        Ok(catalog)
    }

    /// Built-in profiles plus any found in the configured directory
    pub fn load(sources: &ProfileSources) -> Result<Self, ProfileError> {
        let mut catalog = Self::builtin()?;
        if let Some(dir) = &sources.directory {
            catalog.load_directory(dir)?;
        }

        tracing::info!(
            profiles = ?catalog.ids().collect::<Vec<_>>(),
            "Profile catalog loaded"
        );
        Ok(catalog)
    }

    fn load_directory(&mut self, dir: &Path) -> Result<(), ProfileError> {
        let io_error = |source| ProfileError::Io {
            path: dir.display().to_string(),
            source,
        };

        let mut paths: Vec<_> = fs::read_dir(dir)
            .map_err(io_error)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "yaml" || ext == "yml"))
            .collect();
        paths.sort();

        for path in paths {
            let contents = fs::read_to_string(&path).map_err(|source| ProfileError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let profile = parse_profile(&path.display().to_string(), &contents)?;

            if self.profiles.contains_key(&profile.id) {
                tracing::info!(profile = %profile.id, path = %path.display(), "Overriding profile from directory");
            } else {
                tracing::debug!(profile = %profile.id, path = %path.display(), "Loaded profile from directory");
            }
            self.insert(profile);
        }
        Ok(())
    }

    pub fn insert(&mut self, profile: DomainProfile) {
        self.profiles.insert(profile.id.clone(), Arc::new(profile));
    }

    pub fn get(&self, id: &str) -> Option<Arc<DomainProfile>> {
        self.profiles.get(id).cloned()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}
