use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::answers::AnswerValue;
use crate::config::CatalogChoice;

/// Identifier wrapper for questionnaire items.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub String);

impl QuestionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QuestionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Selectable answer for a radio question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub value: String,
    pub label: String,
}

/// Whether a larger slider reading raises or lowers the risk contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreDirection {
    HigherIsBetter,
    HigherIsWorse,
}

/// Shape of a question and the constraints its answer must satisfy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionKind {
    Radio {
        options: Vec<ChoiceOption>,
    },
    Slider {
        min: f64,
        max: f64,
        step: f64,
        labels: BTreeMap<i64, String>,
        direction: ScoreDirection,
    },
    NumericInput {
        min: f64,
        max: f64,
        placeholder: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Question {
    pub id: QuestionId,
    pub prompt: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

/// Reason an answer does not fit the question it was given for.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnswerViolation {
    #[error("'{0}' is not one of the offered options")]
    NotAnOption(String),
    #[error("expected a text choice")]
    ExpectedChoice,
    #[error("expected a number")]
    ExpectedNumber,
    #[error("{value} is outside the range {min}..={max}")]
    OutOfRange { value: f64, min: f64, max: f64 },
    #[error("{value} does not land on a step of {step}")]
    OffStep { value: f64, step: f64 },
}

const STEP_TOLERANCE: f64 = 1e-9;

impl Question {
    pub fn radio(id: &str, prompt: &str, options: &[(&str, &str)]) -> Self {
        Self {
            id: QuestionId::from(id),
            prompt: prompt.to_string(),
            kind: QuestionKind::Radio {
                options: options
                    .iter()
                    .map(|(value, label)| ChoiceOption {
                        value: value.to_string(),
                        label: label.to_string(),
                    })
                    .collect(),
            },
        }
    }

    pub fn slider(
        id: &str,
        prompt: &str,
        range: (f64, f64),
        labels: &[(i64, &str)],
        direction: ScoreDirection,
    ) -> Self {
        Self {
            id: QuestionId::from(id),
            prompt: prompt.to_string(),
            kind: QuestionKind::Slider {
                min: range.0,
                max: range.1,
                step: 1.0,
                labels: labels
                    .iter()
                    .map(|(tick, label)| (*tick, label.to_string()))
                    .collect(),
                direction,
            },
        }
    }

    pub fn numeric_input(id: &str, prompt: &str, range: (f64, f64), placeholder: &str) -> Self {
        Self {
            id: QuestionId::from(id),
            prompt: prompt.to_string(),
            kind: QuestionKind::NumericInput {
                min: range.0,
                max: range.1,
                placeholder: placeholder.to_string(),
            },
        }
    }

    /// Highest option weight when every option value is a small integer.
    pub fn ordinal_ceiling(&self) -> Option<u32> {
        let QuestionKind::Radio { options } = &self.kind else {
            return None;
        };

        let mut ceiling = None;
        for option in options {
            let weight = option.value.trim().parse::<u8>().ok()?;
            ceiling = Some(ceiling.map_or(weight, |current: u8| current.max(weight)));
        }
        ceiling.map(u32::from)
    }

    /// Whether the local scorer draws a contribution from this question.
    pub fn is_scorable(&self) -> bool {
        match &self.kind {
            QuestionKind::Radio { .. } => self.ordinal_ceiling().is_some(),
            QuestionKind::Slider { .. } => true,
            QuestionKind::NumericInput { .. } => false,
        }
    }

    pub fn check_answer(&self, value: &AnswerValue) -> Result<(), AnswerViolation> {
        match &self.kind {
            QuestionKind::Radio { options } => {
                let choice = value.as_text().ok_or(AnswerViolation::ExpectedChoice)?;
                if options.iter().any(|option| option.value == choice) {
                    Ok(())
                } else {
                    Err(AnswerViolation::NotAnOption(choice.to_string()))
                }
            }
            QuestionKind::Slider { min, max, step, .. } => {
                let reading = check_range(value, *min, *max)?;
                let offset = (reading - min) / step;
                if (offset - offset.round()).abs() > STEP_TOLERANCE {
                    return Err(AnswerViolation::OffStep {
                        value: reading,
                        step: *step,
                    });
                }
                Ok(())
            }
            QuestionKind::NumericInput { min, max, .. } => {
                check_range(value, *min, *max).map(|_| ())
            }
        }
    }
}

fn check_range(value: &AnswerValue, min: f64, max: f64) -> Result<f64, AnswerViolation> {
    let reading = value.as_number().ok_or(AnswerViolation::ExpectedNumber)?;
    if reading < min || reading > max {
        return Err(AnswerViolation::OutOfRange {
            value: reading,
            min,
            max,
        });
    }
    Ok(reading)
}

/// Construction failures for a question catalog.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog contains no questions")]
    Empty,
    #[error("question id '{0}' appears more than once")]
    DuplicateQuestion(QuestionId),
    #[error("radio question '{0}' offers no options")]
    NoOptions(QuestionId),
    #[error("radio question '{question_id}' repeats option value '{value}'")]
    DuplicateOption { question_id: QuestionId, value: String },
    #[error("question '{0}' has an empty or inverted range")]
    InvalidRange(QuestionId),
    #[error("slider '{0}' must use a positive step")]
    InvalidStep(QuestionId),
    #[error("catalog has no scorable questions")]
    NoScorableQuestions,
}

/// Ordered, immutable questionnaire definition. Position defines step order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionCatalog {
    questions: Vec<Question>,
}

impl QuestionCatalog {
    pub fn new(questions: Vec<Question>) -> Result<Self, CatalogError> {
        if questions.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = BTreeSet::new();
        for question in &questions {
            if !seen.insert(&question.id) {
                return Err(CatalogError::DuplicateQuestion(question.id.clone()));
            }
            validate_kind(question)?;
        }

        if !questions.iter().any(Question::is_scorable) {
            return Err(CatalogError::NoScorableQuestions);
        }

        Ok(Self { questions })
    }

    pub fn from_choice(choice: CatalogChoice) -> Result<Self, CatalogError> {
        match choice {
            CatalogChoice::Phq => Self::phq(),
            CatalogChoice::Student => Self::student(),
        }
    }

    /// Eight-item depression screening: six ordinal items and two sliders.
    pub fn phq() -> Result<Self, CatalogError> {
        Self::new(phq_questions())
    }

    /// Student-lifestyle questionnaire consumed by the remote prediction model.
    pub fn student() -> Result<Self, CatalogError> {
        Self::new(student_questions())
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn total_steps(&self) -> usize {
        self.questions.len()
    }

    pub fn get(&self, step: usize) -> Option<&Question> {
        self.questions.get(step)
    }

    pub fn find(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|question| &question.id == id)
    }

    pub fn position(&self, id: &QuestionId) -> Option<usize> {
        self.questions.iter().position(|question| &question.id == id)
    }
}

fn validate_kind(question: &Question) -> Result<(), CatalogError> {
    match &question.kind {
        QuestionKind::Radio { options } => {
            if options.is_empty() {
                return Err(CatalogError::NoOptions(question.id.clone()));
            }
            let mut values = BTreeSet::new();
            for option in options {
                if !values.insert(option.value.as_str()) {
                    return Err(CatalogError::DuplicateOption {
                        question_id: question.id.clone(),
                        value: option.value.clone(),
                    });
                }
            }
        }
        QuestionKind::Slider { min, max, step, .. } => {
            if !is_valid_range(*min, *max) {
                return Err(CatalogError::InvalidRange(question.id.clone()));
            }
            if !(step.is_finite() && *step > 0.0) {
                return Err(CatalogError::InvalidStep(question.id.clone()));
            }
        }
        QuestionKind::NumericInput { min, max, .. } => {
            if !is_valid_range(*min, *max) {
                return Err(CatalogError::InvalidRange(question.id.clone()));
            }
        }
    }
    Ok(())
}

fn is_valid_range(min: f64, max: f64) -> bool {
    min.is_finite() && max.is_finite() && min < max
}

const FREQUENCY_OPTIONS: [(&str, &str); 4] = [
    ("0", "Not at all"),
    ("1", "Several days"),
    ("2", "More than half the days"),
    ("3", "Nearly every day"),
];

fn phq_questions() -> Vec<Question> {
    vec![
        Question::radio(
            "interest",
            "Over the past 2 weeks, how often have you felt little interest or pleasure in doing things?",
            &FREQUENCY_OPTIONS,
        ),
        Question::radio(
            "hopelessness",
            "Over the past 2 weeks, how often have you felt down, depressed, or hopeless?",
            &FREQUENCY_OPTIONS,
        ),
        Question::radio(
            "sleep",
            "Over the past 2 weeks, how often have you had trouble falling or staying asleep, or sleeping too much?",
            &FREQUENCY_OPTIONS,
        ),
        Question::radio(
            "energy",
            "Over the past 2 weeks, how often have you felt tired or had little energy?",
            &FREQUENCY_OPTIONS,
        ),
        Question::slider(
            "mood",
            "On a scale of 0-10, how would you rate your overall mood today?",
            (0.0, 10.0),
            &[(0, "Very low"), (5, "Neutral"), (10, "Very good")],
            ScoreDirection::HigherIsBetter,
        ),
        Question::radio(
            "self_worth",
            "Over the past 2 weeks, how often have you felt bad about yourself or that you are a failure or have let yourself or your family down?",
            &FREQUENCY_OPTIONS,
        ),
        Question::radio(
            "concentration",
            "Over the past 2 weeks, how often have you had trouble concentrating on things, such as reading or watching TV?",
            &FREQUENCY_OPTIONS,
        ),
        Question::slider(
            "difficulty",
            "On a scale of 0-10, how difficult have these problems made it for you to do your work, take care of things at home, or get along with other people?",
            (0.0, 10.0),
            &[
                (0, "Not difficult at all"),
                (5, "Somewhat difficult"),
                (10, "Extremely difficult"),
            ],
            ScoreDirection::HigherIsWorse,
        ),
    ]
}

const PRESSURE_LABELS: [(i64, &str); 2] = [(0, "None"), (5, "Extreme")];
const SATISFACTION_LABELS: [(i64, &str); 2] = [(0, "Not satisfied"), (5, "Very satisfied")];
const YES_NO: [(&str, &str); 2] = [("Yes", "Yes"), ("No", "No")];

fn student_questions() -> Vec<Question> {
    vec![
        Question::radio(
            "gender",
            "What is your gender?",
            &[("Male", "Male"), ("Female", "Female")],
        ),
        Question::numeric_input("age", "What is your age?", (0.0, 100.0), "Enter your age"),
        Question::slider(
            "academicPressure",
            "How would you rate your academic pressure (0-5)?",
            (0.0, 5.0),
            &PRESSURE_LABELS,
            ScoreDirection::HigherIsWorse,
        ),
        Question::slider(
            "workPressure",
            "How would you rate your work pressure (0-5)?",
            (0.0, 5.0),
            &PRESSURE_LABELS,
            ScoreDirection::HigherIsWorse,
        ),
        Question::slider(
            "cgpa",
            "What is your CGPA (0-10)?",
            (0.0, 10.0),
            &[(0, "Failed"), (5, "Average"), (10, "Excellent")],
            ScoreDirection::HigherIsBetter,
        ),
        Question::slider(
            "studySatisfaction",
            "How satisfied are you with your studies (0-5)?",
            (0.0, 5.0),
            &SATISFACTION_LABELS,
            ScoreDirection::HigherIsBetter,
        ),
        Question::slider(
            "jobSatisfaction",
            "How satisfied are you with your job (0-5)?",
            (0.0, 5.0),
            &SATISFACTION_LABELS,
            ScoreDirection::HigherIsBetter,
        ),
        Question::radio(
            "sleepDuration",
            "How many hours do you sleep on average per night?",
            &[
                ("Less than 5 hours", "Less than 5 hours"),
                ("5-6 hours", "5-6 hours"),
                ("7-8 hours", "7-8 hours"),
                ("More than 8 hours", "More than 8 hours"),
                ("Others", "Others"),
            ],
        ),
        Question::radio(
            "dietaryHabits",
            "How would you describe your dietary habits?",
            &[
                ("Healthy", "Healthy"),
                ("Moderate", "Moderate"),
                ("Unhealthy", "Unhealthy"),
                ("Others", "Others"),
            ],
        ),
        Question::radio(
            "suicidalThoughts",
            "Have you ever had suicidal thoughts?",
            &YES_NO,
        ),
        Question::slider(
            "workStudyHours",
            "How many hours do you work or study per day on average?",
            (0.0, 12.0),
            &[(0, "0 hours"), (6, "6 hours"), (12, "12 hours")],
            ScoreDirection::HigherIsWorse,
        ),
        Question::slider(
            "financialStress",
            "How would you rate your financial stress (0-5)?",
            (0.0, 5.0),
            &PRESSURE_LABELS,
            ScoreDirection::HigherIsWorse,
        ),
        Question::radio(
            "familyHistory",
            "Do you have a family history of mental illness?",
            &YES_NO,
        ),
    ]
}
