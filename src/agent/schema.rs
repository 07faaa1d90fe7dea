//! Structured payloads produced by each agent.
//!
//! Every agent asks its model for one of these shapes. Deserialization is the
//! first half of the parse boundary; [`Validate::validate`] is the second and
//! rejects values serde accepts but the pipeline cannot use.

use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::retrieval::Passage;

/// Semantic checks applied after deserialization.
pub trait Validate {
    /// Returns an error describing the first violated constraint.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidOutput`] when a constraint is violated.
    fn validate(&self) -> Result<(), AgentError>;
}

fn invalid(message: impl Into<String>) -> AgentError {
    AgentError::InvalidOutput {
        message: message.into(),
    }
}

/// Verdict of the validation agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationVerdict {
    /// Whether the query is in scope.
    pub is_valid: bool,
    /// Explanation when rejected.
    #[serde(default)]
    pub reason: String,
}

impl Validate for ValidationVerdict {
    fn validate(&self) -> Result<(), AgentError> {
        Ok(())
    }
}

/// Primary intent tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryIntent {
    /// Catalog facts: schedule, prerequisites, instructor, description.
    CourseInfo,
    /// Student experience: difficulty, workload, teaching style.
    StudentExperience,
    /// Needs both.
    Combined,
}

/// Sections required from each database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequiredFields {
    /// Sections of the course catalog.
    #[serde(default)]
    pub course_db: Vec<String>,
    /// Kinds of review feedback.
    #[serde(default)]
    pub review_db: Vec<String>,
}

/// Relative importance of each database, 0–10.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriorityWeights {
    /// Weight of course catalog information.
    pub course_info_weight: f32,
    /// Weight of review information.
    pub review_info_weight: f32,
}

/// Output of the intent agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentAnalysis {
    /// Primary intent tag.
    pub primary_intent: PrimaryIntent,
    /// Required fields per database.
    pub required_fields: RequiredFields,
    /// Priority weighting.
    pub priority: PriorityWeights,
    /// Specific information points needed.
    #[serde(default)]
    pub specific_aspects: Vec<String>,
    /// Model's justification.
    #[serde(default)]
    pub reasoning: String,
}

impl Validate for IntentAnalysis {
    fn validate(&self) -> Result<(), AgentError> {
        let weights = [
            ("course_info_weight", self.priority.course_info_weight),
            ("review_info_weight", self.priority.review_info_weight),
        ];
        for (name, w) in weights {
            if !(0.0..=10.0).contains(&w) {
                return Err(invalid(format!("{name} must be within 0-10, got {w}")));
            }
        }
        Ok(())
    }
}

/// Database a pass should favour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrioritySource {
    /// Course catalog.
    CourseDb,
    /// Student reviews.
    ReviewDb,
    /// Neither dominates.
    #[default]
    Balanced,
}

/// Summary derived from the intent analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStatus {
    /// At least one course section is required.
    pub needs_course_info: bool,
    /// At least one review aspect is required.
    pub needs_reviews: bool,
    /// Database with priority; reviews win only on a strictly greater weight.
    pub priority_source: PrioritySource,
}

impl ProcessingStatus {
    /// Derives the status from an intent analysis.
    #[must_use]
    pub fn from_intent(intent: &IntentAnalysis) -> Self {
        let priority_source =
            if intent.priority.review_info_weight > intent.priority.course_info_weight {
                PrioritySource::ReviewDb
            } else {
                PrioritySource::CourseDb
            };
        Self {
            needs_course_info: !intent.required_fields.course_db.is_empty(),
            needs_reviews: !intent.required_fields.review_db.is_empty(),
            priority_source,
        }
    }
}

/// Per-database search queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedQueries {
    /// Query for the course catalog.
    pub course_db_query: String,
    /// Query for the review collection.
    pub review_db_query: String,
    /// What was changed and why.
    #[serde(default)]
    pub enhancement_reasoning: String,
    /// Aspects to look for in retrieved content.
    #[serde(default)]
    pub focus_aspects: Vec<String>,
}

impl Validate for EnhancedQueries {
    fn validate(&self) -> Result<(), AgentError> {
        if self.course_db_query.trim().is_empty() || self.review_db_query.trim().is_empty() {
            return Err(invalid("enhanced queries must not be empty"));
        }
        Ok(())
    }
}

/// Raw split proposed by the model, before budget correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyProposal {
    /// Proposed course result count.
    pub course_k: i64,
    /// Proposed review result count.
    pub review_k: i64,
    /// Model's justification.
    #[serde(default)]
    pub reasoning: String,
    /// Favoured database.
    #[serde(default)]
    pub priority_source: PrioritySource,
}

impl Validate for StrategyProposal {
    fn validate(&self) -> Result<(), AgentError> {
        if self.course_k <= 0 && self.review_k <= 0 {
            return Err(invalid(format!(
                "strategy allocates nothing (course_k={}, review_k={})",
                self.course_k, self.review_k
            )));
        }
        Ok(())
    }
}

/// Result-count split for one retrieval pass.
///
/// Invariant: `course_k + review_k == total_k` of the agent that built it,
/// and both counts are at least 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalStrategy {
    /// Results requested from the course catalog.
    pub course_k: usize,
    /// Results requested from reviews.
    pub review_k: usize,
    /// Why this split.
    pub reasoning: String,
    /// Favoured database.
    pub priority_source: PrioritySource,
}

impl RetrievalStrategy {
    /// Even split used when the model's proposal is unusable.
    ///
    /// The course side takes the odd result, mirroring the tie-break of
    /// [`ProcessingStatus::from_intent`].
    #[must_use]
    pub fn even_split(total_k: usize) -> Self {
        let review_k = total_k / 2;
        Self {
            course_k: total_k - review_k,
            review_k,
            reasoning: "Default balanced strategy".to_string(),
            priority_source: PrioritySource::Balanced,
        }
    }

    /// Corrects a proposal so that it honours the budget.
    ///
    /// Negative counts are treated as zero. A proposal that already sums to
    /// `total_k` with both sides at least 1 is kept; otherwise the split is
    /// rescaled proportionally and clamped so each side gets `[1, total_k - 1]`.
    /// Requires `total_k >= 2`.
    #[must_use]
    pub fn from_proposal(proposal: &StrategyProposal, total_k: usize) -> Self {
        let course = usize::try_from(proposal.course_k.max(0)).unwrap_or(usize::MAX);
        let review = usize::try_from(proposal.review_k.max(0)).unwrap_or(usize::MAX);

        let course_k = if course >= 1 && review >= 1 && course.checked_add(review) == Some(total_k)
        {
            course
        } else {
            let sum = course.saturating_add(review).max(1);
            #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let scaled = ((course as f64) * (total_k as f64) / (sum as f64)).round() as usize;
            scaled.clamp(1, total_k - 1)
        };

        Self {
            course_k,
            review_k: total_k - course_k,
            reasoning: proposal.reasoning.clone(),
            priority_source: proposal.priority_source,
        }
    }

    /// Combined budget of this split.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.course_k + self.review_k
    }
}

/// Passages retrieved in one pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievedInfo {
    /// Course catalog passages, best first.
    pub course_info: Vec<Passage>,
    /// Review passages, best first.
    pub review_info: Vec<Passage>,
}

impl RetrievedInfo {
    /// Total passages across both databases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.course_info.len() + self.review_info.len()
    }

    /// Returns `true` if neither database returned anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.course_info.is_empty() && self.review_info.is_empty()
    }
}

/// Rewritten queries suggested by context analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuerySuggestions {
    /// Suggested course query (empty when none).
    #[serde(default)]
    pub course_db: String,
    /// Suggested review query (empty when none).
    #[serde(default)]
    pub review_db: String,
}

/// Result-count adjustments suggested by context analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalSuggestions {
    /// Suggested course count.
    #[serde(default)]
    pub course_k: Option<i64>,
    /// Suggested review count.
    #[serde(default)]
    pub review_k: Option<i64>,
    /// Why.
    #[serde(default)]
    pub reasoning: String,
}

/// Refinement feedback handed back to query enhancement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Feedback {
    /// Query rewrites.
    #[serde(default)]
    pub query_suggestions: QuerySuggestions,
    /// Count adjustments.
    #[serde(default)]
    pub retrieval_suggestions: RetrievalSuggestions,
}

/// Verdict of the context analysis agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextAnalysis {
    /// Retrieved material answers the query.
    pub is_sufficient: bool,
    /// Crucial information that is missing.
    #[serde(default)]
    pub missing_aspects: Vec<String>,
    /// Some but not all of the needed information was found.
    #[serde(default)]
    pub has_partial_info: bool,
    /// No further retrieval can help.
    #[serde(default)]
    pub unanswerable: bool,
    /// Suggestions for the next pass.
    #[serde(default)]
    pub feedback: Feedback,
    /// Model's explanation.
    #[serde(default)]
    pub analysis_reasoning: String,
}

impl ContextAnalysis {
    /// Verdict used when the loop must stop regardless of the model.
    #[must_use]
    pub fn forced_sufficient(missing_aspects: Vec<String>, reasoning: impl Into<String>) -> Self {
        Self {
            is_sufficient: true,
            missing_aspects,
            has_partial_info: true,
            unanswerable: false,
            feedback: Feedback::default(),
            analysis_reasoning: reasoning.into(),
        }
    }

    /// Whether another refinement round is warranted.
    #[must_use]
    pub const fn needs_improvement(&self) -> bool {
        !self.is_sufficient && !self.unanswerable
    }
}

impl Validate for ContextAnalysis {
    fn validate(&self) -> Result<(), AgentError> {
        Ok(())
    }
}

/// Output of the response agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseData {
    /// Base answer text.
    pub response: String,
    /// Whether limitations should be noted.
    #[serde(default)]
    pub has_limitations: bool,
    /// Limitation notes.
    #[serde(default)]
    pub limitation_notes: Vec<String>,
    /// Extra suggestions for the student.
    #[serde(default)]
    pub additional_suggestions: Vec<String>,
}

impl ResponseData {
    /// Renders the final answer: base text, then limitations, then suggestions.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = self.response.clone();
        if self.has_limitations {
            out.push_str("\n\nNote: ");
            out.push_str(&self.limitation_notes.join(", "));
        }
        if !self.additional_suggestions.is_empty() {
            out.push_str("\n\nAdditional suggestions:\n- ");
            out.push_str(&self.additional_suggestions.join("\n- "));
        }
        out
    }
}

impl Validate for ResponseData {
    fn validate(&self) -> Result<(), AgentError> {
        if self.response.trim().is_empty() {
            return Err(invalid("response text is empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    fn intent(course: f32, review: f32) -> IntentAnalysis {
        IntentAnalysis {
            primary_intent: PrimaryIntent::Combined,
            required_fields: RequiredFields {
                course_db: vec!["schedule".to_string()],
                review_db: Vec::new(),
            },
            priority: PriorityWeights {
                course_info_weight: course,
                review_info_weight: review,
            },
            specific_aspects: Vec::new(),
            reasoning: String::new(),
        }
    }

    #[test]
    fn test_processing_status_tie_goes_to_course() {
        let status = ProcessingStatus::from_intent(&intent(5.0, 5.0));
        assert_eq!(status.priority_source, PrioritySource::CourseDb);
        assert!(status.needs_course_info);
        assert!(!status.needs_reviews);
    }

    #[test]
    fn test_processing_status_review_strictly_greater() {
        let status = ProcessingStatus::from_intent(&intent(3.0, 8.0));
        assert_eq!(status.priority_source, PrioritySource::ReviewDb);
    }

    #[test]
    fn test_intent_weight_out_of_range() {
        assert!(intent(11.0, 2.0).validate().is_err());
        assert!(intent(0.0, 10.0).validate().is_ok());
    }

    #[test_case(false, false => true ; "insufficient and answerable")]
    #[test_case(false, true => false ; "insufficient but unanswerable")]
    #[test_case(true, false => false ; "sufficient")]
    #[test_case(true, true => false ; "sufficient and unanswerable")]
    fn test_needs_improvement_conjunction(is_sufficient: bool, unanswerable: bool) -> bool {
        let analysis = ContextAnalysis {
            is_sufficient,
            missing_aspects: Vec::new(),
            has_partial_info: false,
            unanswerable,
            feedback: Feedback::default(),
            analysis_reasoning: String::new(),
        };
        analysis.needs_improvement()
    }

    #[test]
    fn test_even_split_honours_budget() {
        let s = RetrievalStrategy::even_split(15);
        assert_eq!((s.course_k, s.review_k), (8, 7));
        let s = RetrievalStrategy::even_split(10);
        assert_eq!((s.course_k, s.review_k), (5, 5));
    }

    #[test]
    fn test_valid_proposal_kept() {
        let proposal = StrategyProposal {
            course_k: 4,
            review_k: 11,
            reasoning: "reviews matter".to_string(),
            priority_source: PrioritySource::ReviewDb,
        };
        let s = RetrievalStrategy::from_proposal(&proposal, 15);
        assert_eq!((s.course_k, s.review_k), (4, 11));
        assert_eq!(s.priority_source, PrioritySource::ReviewDb);
    }

    #[test]
    fn test_overshooting_proposal_rescaled() {
        let proposal = StrategyProposal {
            course_k: 10,
            review_k: 20,
            reasoning: String::new(),
            priority_source: PrioritySource::Balanced,
        };
        let s = RetrievalStrategy::from_proposal(&proposal, 15);
        assert_eq!((s.course_k, s.review_k), (5, 10));
    }

    #[test]
    fn test_one_sided_proposal_keeps_minimum() {
        let proposal = StrategyProposal {
            course_k: 15,
            review_k: 0,
            reasoning: String::new(),
            priority_source: PrioritySource::CourseDb,
        };
        let s = RetrievalStrategy::from_proposal(&proposal, 15);
        assert_eq!((s.course_k, s.review_k), (14, 1));
    }

    #[test]
    fn test_empty_proposal_rejected() {
        let proposal = StrategyProposal {
            course_k: 0,
            review_k: -3,
            reasoning: String::new(),
            priority_source: PrioritySource::Balanced,
        };
        assert!(proposal.validate().is_err());
    }

    #[test]
    fn test_render_order() {
        let data = ResponseData {
            response: "Algorithms is demanding.".to_string(),
            has_limitations: true,
            limitation_notes: vec!["few reviews".to_string(), "old term".to_string()],
            additional_suggestions: vec!["Take discrete math first".to_string()],
        };
        assert_eq!(
            data.render(),
            "Algorithms is demanding.\n\nNote: few reviews, old term\n\n\
             Additional suggestions:\n- Take discrete math first"
        );
    }

    #[test]
    fn test_render_without_extras() {
        let data = ResponseData {
            response: "Yes.".to_string(),
            has_limitations: false,
            limitation_notes: vec!["ignored".to_string()],
            additional_suggestions: Vec::new(),
        };
        assert_eq!(data.render(), "Yes.");
    }

    proptest! {
        #[test]
        fn prop_strategy_always_within_budget(
            course in -50i64..200,
            review in -50i64..200,
            total in 2usize..64,
        ) {
            let proposal = StrategyProposal {
                course_k: course,
                review_k: review,
                reasoning: String::new(),
                priority_source: PrioritySource::Balanced,
            };
            let s = if proposal.validate().is_ok() {
                RetrievalStrategy::from_proposal(&proposal, total)
            } else {
                RetrievalStrategy::even_split(total)
            };
            prop_assert_eq!(s.total(), total);
            prop_assert!(s.course_k >= 1 && s.course_k <= total);
            prop_assert!(s.review_k >= 1 && s.review_k <= total);
        }
    }
}
