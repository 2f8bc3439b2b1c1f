use super::super::answers::{AnswerSet, AnswerValue};
use super::super::catalog::{Question, QuestionCatalog, QuestionKind, ScoreDirection};
use super::{ScoreComponent, ScoringError};

/// Walks the catalog in step order and accumulates ordinal and analog contributions.
pub(crate) fn accumulate(
    catalog: &QuestionCatalog,
    answers: &AnswerSet,
) -> Result<(Vec<ScoreComponent>, f64, f64), ScoringError> {
    let missing = answers.missing(catalog);
    if !missing.is_empty() {
        return Err(ScoringError::IncompleteAssessment { missing });
    }

    let mut components = Vec::new();
    let mut sum = 0.0;
    let mut max = 0.0;

    for question in catalog.questions() {
        let Some(value) = answers.get(&question.id) else {
            continue;
        };

        let component = match &question.kind {
            QuestionKind::Radio { .. } => ordinal_component(question, value)?,
            QuestionKind::Slider {
                min,
                max: upper,
                direction,
                ..
            } => analog_component(question, value, *min, *upper, *direction)?,
            QuestionKind::NumericInput { .. } => None,
        };

        if let Some(component) = component {
            sum += component.contribution;
            max += component.ceiling;
            components.push(component);
        }
    }

    Ok((components, sum, max))
}

fn ordinal_component(
    question: &Question,
    value: &AnswerValue,
) -> Result<Option<ScoreComponent>, ScoringError> {
    let Some(ceiling) = question.ordinal_ceiling() else {
        return Ok(None);
    };

    question
        .check_answer(value)
        .map_err(|violation| ScoringError::InvalidAnswer {
            question_id: question.id.clone(),
            violation,
        })?;

    // Option membership was checked above, so the choice parses as its weight.
    let weight = value
        .as_text()
        .and_then(|choice| choice.trim().parse::<u8>().ok())
        .map(f64::from)
        .unwrap_or_default();

    Ok(Some(ScoreComponent {
        question_id: question.id.clone(),
        contribution: weight,
        ceiling: f64::from(ceiling),
        notes: format!("ordinal answer {weight} of {ceiling}"),
    }))
}

fn analog_component(
    question: &Question,
    value: &AnswerValue,
    min: f64,
    max: f64,
    direction: ScoreDirection,
) -> Result<Option<ScoreComponent>, ScoringError> {
    question
        .check_answer(value)
        .map_err(|violation| ScoringError::InvalidAnswer {
            question_id: question.id.clone(),
            violation,
        })?;

    let reading = value.as_number().unwrap_or(min);
    let span = max - min;
    let (contribution, notes) = match direction {
        ScoreDirection::HigherIsBetter => (
            max - reading,
            format!("reading {reading} inverted against ceiling {max}"),
        ),
        ScoreDirection::HigherIsWorse => (
            reading - min,
            format!("reading {reading} counted directly above floor {min}"),
        ),
    };

    Ok(Some(ScoreComponent {
        question_id: question.id.clone(),
        contribution,
        ceiling: span,
        notes,
    }))
}
