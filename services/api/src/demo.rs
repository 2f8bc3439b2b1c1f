use crate::infra::{load_answers, parse_catalog};
use clap::Args;
use mindcheck::assessment::scoring::{self, ScoreBreakdown};
use mindcheck::assessment::{
    AnswerValue, AssessmentService, FileProgressStore, LocalScorer, MemoryProgressStore,
    ProgressStore, Question, QuestionCatalog, QuestionKind, ScoringResult, SessionView,
};
use mindcheck::config::{CatalogChoice, ScoringConfig};
use mindcheck::error::AppError;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// JSON object mapping question ids to answers
    #[arg(long)]
    pub(crate) answers: PathBuf,
    /// Questionnaire the answers belong to (phq or student)
    #[arg(long, value_parser = parse_catalog, default_value = "phq")]
    pub(crate) catalog: CatalogChoice,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Questionnaire to walk through (phq or student)
    #[arg(long, value_parser = parse_catalog, default_value = "phq")]
    pub(crate) catalog: CatalogChoice,
    /// Save progress under this directory instead of in memory
    #[arg(long)]
    pub(crate) progress_dir: Option<PathBuf>,
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let catalog = QuestionCatalog::from_choice(args.catalog)?;
    let answers = load_answers(&args.answers)?;

    let breakdown = scoring::breakdown(&catalog, &answers)?;
    let result = breakdown.result()?;
    render_breakdown(&breakdown);
    render_result(&result);
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let catalog = Arc::new(QuestionCatalog::from_choice(args.catalog)?);
    let store: Arc<dyn ProgressStore> = match args.progress_dir {
        Some(dir) => Arc::new(FileProgressStore::new(dir)),
        None => Arc::new(MemoryProgressStore::default()),
    };
    let timeout = ScoringConfig::default().timeout;
    let new_service = || {
        AssessmentService::new(
            Arc::clone(&catalog),
            Arc::new(LocalScorer),
            Arc::clone(&store),
            timeout,
        )
    };

    println!("Self-assessment demo ({} questions)", catalog.total_steps());

    let first = new_service();
    let view = first.start(None);
    let session = view.session_id.clone();
    render_transition("started", &view);

    let halfway = catalog.total_steps() / 2;
    for _ in 0..halfway {
        let Some(question) = first.view(&session)?.question else {
            break;
        };
        let view = first.answer(&session, question.id.clone(), scripted_answer(&question))?;
        render_transition(&format!("answered {}", question.id), &view);
        let view = first.advance(&session).await?;
        render_transition("advanced", &view);
    }

    let saved = first.save(&session)?;
    println!(
        "\nProgress {} under key {}",
        if saved.saved { "saved" } else { "NOT saved" },
        session.progress_key()
    );
    drop(first);

    println!("Restarting and resuming {session}");
    let second = new_service();
    let mut view = second.start(Some(session.clone()));
    render_transition("resumed", &view);

    while view.result.is_none() {
        let Some(question) = view.question.clone() else {
            break;
        };
        if view.answer.is_none() {
            view = second.answer(&session, question.id.clone(), scripted_answer(&question))?;
            render_transition(&format!("answered {}", question.id), &view);
        }
        view = second.advance(&session).await?;
        render_transition("advanced", &view);
    }

    if let Some(outcome) = &view.result {
        println!("\nResult: {} ({:.1})", outcome.severity_label, outcome.normalized_score);
        println!("At risk: {}", if outcome.is_at_risk { "yes" } else { "no" });
        println!("Recommendations:");
        for recommendation in &outcome.recommendations {
            println!("- {recommendation}");
        }
    }

    Ok(())
}

/// Mid-scale answer for any question kind.
fn scripted_answer(question: &Question) -> AnswerValue {
    match &question.kind {
        QuestionKind::Radio { options } => options
            .get(options.len() / 2)
            .map(|option| AnswerValue::from(option.value.as_str()))
            .unwrap_or_else(|| AnswerValue::from("")),
        QuestionKind::Slider { min, max, step, .. } => {
            let steps = ((max - min) / step / 2.0).round();
            AnswerValue::Number(min + steps * step)
        }
        QuestionKind::NumericInput { min, max, .. } => {
            AnswerValue::Number(((min + max) / 2.0).round())
        }
    }
}

fn render_transition(label: &str, view: &SessionView) {
    println!(
        "[{:<12}] step {}/{} ({:.0}%) status={} answered={}{}",
        truncate(label, 12),
        view.current_step + 1,
        view.total_steps,
        view.completion_pct,
        view.status,
        view.answered,
        view.last_error
            .as_deref()
            .map(|err| format!(" last_error={err}"))
            .unwrap_or_default()
    );
}

fn truncate(label: &str, width: usize) -> String {
    label.chars().take(width).collect()
}

fn render_breakdown(breakdown: &ScoreBreakdown) {
    println!("Question contributions");
    for component in &breakdown.components {
        println!(
            "- {:<20} {:>5.1} / {:<5.1} {}",
            component.question_id.as_str(),
            component.contribution,
            component.ceiling,
            component.notes
        );
    }
    println!("Total: {:.1} of {:.1}", breakdown.sum, breakdown.max);
}

fn render_result(result: &ScoringResult) {
    println!("\n{}", result.summary());
    println!("Recommendations:");
    for recommendation in result.severity_band.recommendations() {
        println!("- {recommendation}");
    }
}
