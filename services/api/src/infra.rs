use metrics_exporter_prometheus::PrometheusHandle;
use mindcheck::assessment::{
    scorer_from_config, AnswerSet, AssessmentService, FileProgressStore, MemoryProgressStore,
    ProgressStore, QuestionCatalog,
};
use mindcheck::config::{AssessmentConfig, CatalogChoice, ScoringStrategy};
use mindcheck::error::AppError;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// File-backed when a progress directory is configured, otherwise process-local.
pub(crate) fn build_progress_store(config: &AssessmentConfig) -> Arc<dyn ProgressStore> {
    match &config.progress_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "saving assessment progress to disk");
            Arc::new(FileProgressStore::new(dir))
        }
        None => {
            warn!("PROGRESS_DIR not set; saved progress lasts only for this process");
            Arc::new(MemoryProgressStore::default())
        }
    }
}

pub(crate) fn build_service(config: &AssessmentConfig) -> Result<AssessmentService, AppError> {
    let catalog = QuestionCatalog::from_choice(config.catalog)?;
    if config.scoring.strategy == ScoringStrategy::Remote
        && config.scoring.remote.bearer_token.is_none()
    {
        warn!("remote scoring selected without SCORING_API_TOKEN; submissions will fail");
    }
    let scorer = scorer_from_config(&config.scoring)?;

    info!(
        catalog = ?config.catalog,
        questions = catalog.total_steps(),
        scorer = scorer.name(),
        timeout_ms = config.scoring.timeout.as_millis() as u64,
        "assessment service configured"
    );

    Ok(AssessmentService::new(
        Arc::new(catalog),
        scorer,
        build_progress_store(config),
        config.scoring.timeout,
    )
    .with_session_limits(config.sessions))
}

pub(crate) fn parse_catalog(raw: &str) -> Result<CatalogChoice, String> {
    CatalogChoice::parse(raw).map_err(|err| err.to_string())
}

pub(crate) fn load_answers(path: &Path) -> Result<AnswerSet, AppError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn memory_store_when_no_directory_configured() {
        let store = build_progress_store(&AssessmentConfig::default());
        assert!(store.load("assessmentProgress").expect("load").is_none());
    }

    #[test]
    fn service_uses_configured_catalog_and_local_scorer() {
        let config = AssessmentConfig {
            catalog: CatalogChoice::Student,
            ..AssessmentConfig::default()
        };

        let service = build_service(&config).expect("service");
        assert_eq!(service.catalog().total_steps(), 13);
        assert_eq!(service.scorer_name(), "local");
    }

    #[test]
    fn parse_catalog_reports_unknown_names() {
        assert_eq!(parse_catalog("PHQ"), Ok(CatalogChoice::Phq));
        assert!(parse_catalog("unknown").is_err());
    }

    #[test]
    fn missing_answer_file_is_an_io_error() {
        let err = load_answers(&PathBuf::from("/nonexistent/answers.json")).expect_err("missing");
        assert!(matches!(err, AppError::Io(_)));
    }
}
