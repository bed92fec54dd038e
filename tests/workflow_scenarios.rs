//! 工作流端到端场景（内存协作方）

mod common;

use std::sync::Arc;

use common::{context, document, names, RuleChat, ScriptedExtractor, ScriptedRoster};
use exam_liberation::error::{AppError, InputError};
use exam_liberation::models::{ProgressStep, VerdictStatus, WorkflowEvent, WorkflowResponse};
use exam_liberation::{DocumentWorkflow, ProgressReporter};
use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};

const PRIMARY: &str = "67495788372";
const FALLBACK: &str = "95659366368";

fn text_with_both() -> String {
    format!(
        "CPF do médico: 674.957.883-72\nPaciente: JOÃO DA SILVA CE/{}\n## HEMOGRAMA",
        FALLBACK
    )
}

async fn run_silent(
    workflow: &DocumentWorkflow,
    required: &[&str],
) -> (Result<WorkflowResponse, AppError>, ProgressReporter) {
    let mut reporter = ProgressReporter::silent("teste");
    let result = workflow
        .run(&document(), &names(required), &mut reporter)
        .await;
    (result, reporter)
}

#[tokio::test]
async fn test_primary_success_never_uses_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let roster = Arc::new(
        ScriptedRoster::new()
            .with(PRIMARY, &["HEMOGRAMA COMPLETO", "GLICOSE", "AUDIOMETRIA", "GAMA GT"]),
    );
    let extractor = ScriptedExtractor::new(
        Some(PRIMARY),
        &["HEMOGRAMA", "GLICOSE", "GAMA GT"],
        &text_with_both(),
    );
    let workflow = DocumentWorkflow::new(context(extractor, roster.clone(), RuleChat::new(), dir.path()));

    let (result, mut reporter) = run_silent(&workflow, &[]).await;
    let response = assert_ok!(result);

    assert_eq!(roster.calls(), vec![PRIMARY]);
    let WorkflowResponse::Completed(record) = response else {
        panic!("esperado registro de decisão");
    };
    assert_eq!(record.cpf_processado, PRIMARY);
    assert_eq!(record.cpfs_tentados, vec![PRIMARY]);
    assert!(!record.status_liberado);
    assert_eq!(record.exames_faltantes, vec!["AUDIOMETRIA"]);
    assert_eq!(record.exames_presentes, vec!["HEMOGRAMA COMPLETO", "GLICOSE", "GAMA GT"]);
    assert_eq!(record.exames_brnet, "HEMOGRAMA COMPLETO, GLICOSE, AUDIOMETRIA, GAMA GT");
    assert!(record
        .tabela_comparacao
        .iter()
        .any(|v| v.exame == "AUDIOMETRIA" && v.status == VerdictStatus::Missing));
    assert!(!record.auditoria_salva_em.is_empty());
    assert!(std::path::Path::new(&record.auditoria_salva_em).exists());
    assert_eq!(reporter.take_terminal().map(|e| e.progress), Some(100));
}

#[tokio::test]
async fn test_fallback_identifier_is_used_after_primary_miss() {
    let dir = tempfile::tempdir().unwrap();
    let roster = Arc::new(ScriptedRoster::new().with(
        FALLBACK,
        &["AUDIOMETRIA TONAL", "HEMOGRAMA", "RAIO-X DE TÓRAX", "GLICOSE"],
    ));
    let extractor = ScriptedExtractor::new(
        Some(PRIMARY),
        &["AUDIOMETRIA TONAL", "HEMOGRAMA", "GLICOSE"],
        &text_with_both(),
    );
    let workflow = DocumentWorkflow::new(context(extractor, roster.clone(), RuleChat::new(), dir.path()));

    let (result, _) = run_silent(&workflow, &["HEMOGRAMA"]).await;
    let response = assert_ok!(result);

    assert_eq!(roster.calls(), vec![PRIMARY, FALLBACK]);
    assert!(response.is_completed());
    assert!(!response.is_liberated());
    assert_eq!(response.cpfs_tentados(), [PRIMARY.to_string(), FALLBACK.to_string()]);
    let WorkflowResponse::Completed(record) = response else {
        panic!("esperado registro de decisão");
    };
    assert_eq!(record.cpf_processado, FALLBACK);
    assert_eq!(record.exames_faltantes, vec!["RAIO-X DE TÓRAX"]);
}

#[tokio::test]
async fn test_missing_primary_goes_straight_to_recovery() {
    let dir = tempfile::tempdir().unwrap();
    let roster = Arc::new(ScriptedRoster::new().with(FALLBACK, &["HEMOGRAMA"]));
    let extractor = ScriptedExtractor::new(None, &["HEMOGRAMA"], &format!("SP/{}", FALLBACK));
    let workflow = DocumentWorkflow::new(context(extractor, roster.clone(), RuleChat::new(), dir.path()));

    let (result, _) = run_silent(&workflow, &[]).await;
    let response = assert_ok!(result);

    assert_eq!(roster.calls(), vec![FALLBACK]);
    assert!(response.is_liberated());
}

#[tokio::test]
async fn test_exhausted_identifiers_return_failure_with_sent_exams() {
    let dir = tempfile::tempdir().unwrap();
    let roster = Arc::new(ScriptedRoster::new());
    let extractor = ScriptedExtractor::new(
        Some(PRIMARY),
        &["HEMOGRAMA", "GLICOSE"],
        &text_with_both(),
    );
    let workflow = DocumentWorkflow::new(context(extractor, roster.clone(), RuleChat::new(), dir.path()));

    let (result, mut reporter) = run_silent(&workflow, &[]).await;
    let response = assert_ok!(result);

    // 主 CPF 也在文本里，但不会被重复查询
    assert_eq!(roster.calls(), vec![PRIMARY, FALLBACK]);
    assert!(!response.is_completed());
    assert_eq!(response.exames_enviados(), names(&["HEMOGRAMA", "GLICOSE"]).as_slice());

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["status"], "falha");
    assert_eq!(json["ocr_info"]["cpf"], PRIMARY);
    assert_eq!(reporter.take_terminal().map(|e| e.progress), Some(-1));
}

#[tokio::test]
async fn test_extraction_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let roster = Arc::new(ScriptedRoster::new().with(PRIMARY, &["HEMOGRAMA"]));
    let workflow = DocumentWorkflow::new(context(
        ScriptedExtractor::failing(),
        roster.clone(),
        RuleChat::new(),
        dir.path(),
    ));

    let (result, mut reporter) = run_silent(&workflow, &[]).await;
    let err = assert_err!(result);

    assert!(matches!(err, AppError::Extraction(_)));
    assert!(roster.calls().is_empty());
    let terminal = reporter.take_terminal().unwrap();
    assert_eq!(terminal.progress, -1);
    assert_eq!(terminal.step, ProgressStep::Erro);
}

#[tokio::test]
async fn test_blank_required_exam_is_rejected_before_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let roster = Arc::new(ScriptedRoster::new().with(PRIMARY, &["HEMOGRAMA"]));
    let extractor = ScriptedExtractor::new(Some(PRIMARY), &["HEMOGRAMA"], "");
    let workflow = DocumentWorkflow::new(context(extractor, roster.clone(), RuleChat::new(), dir.path()));

    let (result, mut reporter) = run_silent(&workflow, &["HEMOGRAMA", "  "]).await;

    assert!(matches!(
        result,
        Err(AppError::Input(InputError::BlankExamName { index: 1 }))
    ));
    assert!(roster.calls().is_empty());
    assert!(reporter.take_terminal().is_none());
}

#[tokio::test]
async fn test_reconciliation_error_still_completes() {
    let dir = tempfile::tempdir().unwrap();
    let roster = Arc::new(ScriptedRoster::new().with(PRIMARY, &["HEMOGRAMA", "GLICOSE"]));
    let extractor = ScriptedExtractor::new(Some(PRIMARY), &["HEMOGRAMA", "GLICOSE"], "");
    let workflow = DocumentWorkflow::new(context(extractor, roster, RuleChat::broken(), dir.path()));

    let (result, mut reporter) = run_silent(&workflow, &[]).await;
    let response = assert_ok!(result);

    let WorkflowResponse::Completed(record) = response else {
        panic!("esperado registro de decisão");
    };
    assert!(!record.status_liberado);
    assert!(record.erro.is_some());
    assert!(record.tabela_comparacao.is_empty());
    assert!(record.auditoria_salva_em.is_empty());
    assert_eq!(reporter.take_terminal().map(|e| e.progress), Some(100));
}

#[tokio::test]
async fn test_stream_ends_with_result_event() {
    let dir = tempfile::tempdir().unwrap();
    let roster = Arc::new(ScriptedRoster::new().with(PRIMARY, &["HEMOGRAMA"]));
    let extractor = ScriptedExtractor::new(Some(PRIMARY), &["HEMOGRAMA"], "");
    let workflow = DocumentWorkflow::new(context(extractor, roster, RuleChat::new(), dir.path()));

    let mut rx = workflow.run_streaming(document(), names(&["HEMOGRAMA"]));
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    let progress: Vec<i32> = events.iter().map(WorkflowEvent::progress).collect();
    assert_eq!(progress, vec![10, 30, 40, 60, 70, 90, 100]);
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

    let Some(WorkflowEvent::Result { event, resultado }) = events.last() else {
        panic!("último evento deveria carregar o resultado");
    };
    assert_eq!(event.step, ProgressStep::Concluido);
    assert!(resultado.is_liberated());

    let json = serde_json::to_value(events.last().unwrap()).unwrap();
    assert_eq!(json["progress"], 100);
    assert_eq!(json["step"], "concluido");
    assert_eq!(json["resultado"]["cpf_processado"], PRIMARY);
}

#[tokio::test]
async fn test_stream_ends_with_error_event_on_fatal_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let workflow = DocumentWorkflow::new(context(
        ScriptedExtractor::failing(),
        Arc::new(ScriptedRoster::new()),
        RuleChat::new(),
        dir.path(),
    ));

    let mut rx = workflow.run_streaming(document(), Vec::new());
    let mut last = None;
    while let Some(event) = rx.recv().await {
        last = Some(event);
    }

    let Some(WorkflowEvent::Error(event)) = last else {
        panic!("último evento deveria ser de erro");
    };
    assert_eq!(event.progress, -1);
    assert!(event.message.contains("arquivo corrompido"));
}

#[tokio::test]
async fn test_dropped_progress_receiver_does_not_abort_run() {
    let dir = tempfile::tempdir().unwrap();
    let roster = Arc::new(ScriptedRoster::new().with(PRIMARY, &["HEMOGRAMA"]));
    let extractor = ScriptedExtractor::new(Some(PRIMARY), &["HEMOGRAMA"], "");
    let workflow = DocumentWorkflow::new(context(extractor, roster, RuleChat::new(), dir.path()));

    let (tx, rx) = mpsc::unbounded_channel();
    drop(rx);
    let mut reporter = ProgressReporter::new("sem ouvinte", tx);
    let response = assert_ok!(workflow.run(&document(), &[], &mut reporter).await);

    assert!(response.is_liberated());
    assert_eq!(reporter.last_progress(), 100);
}
