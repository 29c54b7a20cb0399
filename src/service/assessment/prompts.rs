//! Prompts for AI-assisted risk scoring

use crate::model::{AnswerValue, IndicatorResult};
use crate::service::assessment::AiScoringRequest;

/// System prompt for risk scoring
pub const RISK_SCORING_SYSTEM_PROMPT: &str = r#"You are a physical security risk analyst.

Your role is to score one threat against the results of a security interview,
using the Threat x Vulnerability x Impact model.

You must:
- Base every score strictly on the interview answers and context provided
- Use only integers on the scale stated in the request
- Cite the specific answers that justify each score as evidence
- Recommend controls only from the catalog supplied in the request
- Be conservative when answers are missing or ambiguous

Do not:
- Invent incidents, assets or security measures that were not reported
- Score exposure; it is computed separately and given to you for context
- Reference industry standards that are not in the catalog

Your output must be structured JSON only and conform to the requested schema."#;

fn format_indicator(indicator: &IndicatorResult) -> String {
    format!(
        "- {} ({}): {} [{} condition(s) met]",
        indicator.name,
        indicator.id,
        indicator.level.as_str(),
        indicator.satisfied
    )
}

/// Build the scoring prompt for one threat
pub fn build_scoring_prompt(request: &AiScoringRequest<'_>) -> String {
    let profile = request.profile;
    let threat = request.threat;
    let scale = profile.scoring.scale_max;

    let responses = if request.responses.is_empty() {
        "No interview answers were recorded.".to_string()
    } else {
        request
            .responses
            .iter()
            .map(|(id, answer)| {
                let prompt = profile
                    .questions
                    .iter()
                    .find(|q| &q.id == id)
                    .map(|q| q.prompt.as_str())
                    .unwrap_or("(unlisted question)");
                format!("- {} | {} | {}", id, prompt, format_answer(answer))
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let exposure = match request.exposure {
        Some(e) => format!(
            "Exposure multiplier for this principal: {:.1} (range 1.0 to {:.1}). Already applied separately.",
            e,
            profile.exposure.as_ref().map(|x| x.max).unwrap_or(5.0)
        ),
        None => "Not applicable for this domain.".to_string(),
    };

    let context = request.context;
    let mut context_lines = Vec::new();
    if let Some(industry) = &context.industry {
        context_lines.push(format!("Industry: {}", industry));
    }
    if let Some(crime) = context.neighborhood_crime {
        context_lines.push(format!("Neighborhood crime level: {:?}", crime));
    }
    for finding in &context.photo_findings {
        context_lines.push(format!("Site photo finding: {}", finding));
    }
    for incident in &context.incident_history {
        let when = incident
            .occurred_on
            .map(|d| d.to_string())
            .unwrap_or_else(|| "date unknown".to_string());
        let threat_ref = incident.threat_id.as_deref().unwrap_or("unattributed");
        context_lines.push(format!("Incident ({}, {}): {}", threat_ref, when, incident.description));
    }
    let context_section = if context_lines.is_empty() {
        "No supplemental context provided.".to_string()
    } else {
        context_lines.join("\n")
    };

    let indicators = if request.indicators.is_empty() {
        "No incident indicators defined.".to_string()
    } else {
        request
            .indicators
            .iter()
            .map(format_indicator)
            .collect::<Vec<_>>()
            .join("\n")
    };

    let catalog = profile
        .controls
        .iter()
        .map(|c| format!("- {}: {}", c.id, c.name))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Score the threat "{name}" ({id}) for a {domain} assessment.

## Threat
Category: {category}
Description: {description}
Baseline likelihood: {baseline_threat}/{scale}
Baseline impact: {baseline_impact}/{scale}

## Scales
- threat_likelihood: integer 1..={scale} (how likely the threat is to be attempted)
- vulnerability: integer 1..={scale} (how exposed the subject is given existing controls)
- impact: integer 1..={scale} (severity of consequences if it succeeds)

## Exposure
{exposure}

## Interview Answers
(question id | question | answer)
{responses}

## Supplemental Context
{context_section}

## Incident Indicators
{indicators}

## Control Catalog
{catalog}

---

### Required Output

- threat_likelihood, vulnerability, impact: integers on the scales above
- confidence: high | medium | low
- evidence: the interview answers that justify the scores
- scenario_description: two or three sentences describing how this threat would play out
- suggested_controls: control ids from the catalog above, most urgent first

Output JSON only."#,
        name = threat.name,
        id = threat.id,
        domain = profile.name,
        category = threat.category,
        description = threat.description,
        baseline_threat = threat.baseline_threat,
        baseline_impact = threat.baseline_impact,
        scale = scale,
        exposure = exposure,
        responses = responses,
        context_section = context_section,
        indicators = indicators,
        catalog = catalog,
    )
}

fn format_answer(answer: &AnswerValue) -> String {
    match answer {
        AnswerValue::Rating(n) => format!("rating {}", n),
        other => other.display(),
    }
}
