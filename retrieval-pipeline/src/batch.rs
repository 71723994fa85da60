use bytes::Bytes;
use chrono::{DateTime, Utc};
use common::{
    error::AppError,
    knowledge_base::KnowledgeBaseClient,
    storage::{
        csv_table::{encode_csv, CsvRow},
        store::StorageManager,
    },
    utils::config::AppConfig,
};
use futures::{stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::{
    answer::{Citation, CitationSummary},
    ask::{ask, AskRequest},
};

pub const RESULT_HEADER: [&str; 3] = ["question_id", "answer", "citations"];

/// Id column names, most specific first.
const ID_COLUMNS: &[&str] = &["question_id", "id"];
/// Question column names, most specific first.
const TEXT_COLUMNS: &[&str] = &["question_text", "question"];

/// A questionnaire entry read from the input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchQuestion {
    pub question_id: String,
    pub question_text: String,
}

impl BatchQuestion {
    /// `None` when the row has no question text.
    pub fn from_row(row: &CsvRow) -> Option<Self> {
        let question_text = row.first_non_empty(TEXT_COLUMNS)?;

        Some(Self {
            question_id: row.first_non_empty(ID_COLUMNS).unwrap_or_default().to_string(),
            question_text: question_text.to_string(),
        })
    }
}

/// Rows without question text are dropped silently; order is preserved.
pub fn questions_from_rows(rows: &[CsvRow]) -> Vec<BatchQuestion> {
    rows.iter().filter_map(BatchQuestion::from_row).collect()
}

/// One line of the result file. `citations` holds JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResultRow {
    pub question_id: String,
    pub answer: String,
    pub citations: String,
}

impl BatchResultRow {
    fn answered(
        question_id: String,
        answer: String,
        citations: &[Citation],
    ) -> Result<Self, AppError> {
        let summaries: Vec<CitationSummary> = citations.iter().map(Citation::summary).collect();
        Ok(Self {
            question_id,
            answer,
            citations: serde_json::to_string(&summaries)?,
        })
    }

    fn failed(question_id: String) -> Self {
        Self {
            question_id,
            answer: String::new(),
            citations: "[]".to_string(),
        }
    }

    fn into_record(self) -> [String; 3] {
        [self.question_id, self.answer, self.citations]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub download_url: String,
    pub count: usize,
}

/// Answers every question with the default result count.
///
/// At most `batch_concurrency` questions are in flight; results keep input order.
/// The first failure aborts the batch unless `batch_continue_on_error` is set, in
/// which case the row is kept with an empty answer.
pub async fn answer_questions(
    knowledge_base: &dyn KnowledgeBaseClient,
    config: &AppConfig,
    questions: Vec<BatchQuestion>,
) -> Result<Vec<BatchResultRow>, AppError> {
    let continue_on_error = config.batch_continue_on_error;

    stream::iter(questions)
        .map(|question| async move {
            let request = AskRequest::new(question.question_text, None);
            match ask(knowledge_base, config, &request).await {
                Ok(answer) => {
                    BatchResultRow::answered(question.question_id, answer.answer, &answer.citations)
                }
                Err(err) if continue_on_error => {
                    warn!(
                        question_id = %question.question_id,
                        error = %err,
                        "Batch question failed; keeping empty row"
                    );
                    Ok(BatchResultRow::failed(question.question_id))
                }
                Err(err) => Err(err),
            }
        })
        .buffered(config.batch_concurrency.max(1))
        .try_collect()
        .await
}

pub fn results_to_csv(rows: Vec<BatchResultRow>) -> Result<Vec<u8>, AppError> {
    encode_csv(&RESULT_HEADER, rows.into_iter().map(BatchResultRow::into_record))
}

pub fn export_key(now: DateTime<Utc>) -> String {
    format!("batch/results_{}.csv", now.format("%Y%m%dT%H%M%SZ"))
}

/// Answers the questionnaire at `file_uri`, stores the results in the export
/// bucket and returns a presigned download link.
#[instrument(skip(storage, knowledge_base, config))]
pub async fn run_batch(
    storage: &StorageManager,
    knowledge_base: &dyn KnowledgeBaseClient,
    config: &AppConfig,
    file_uri: &str,
) -> Result<BatchSummary, AppError> {
    let rows = storage.read_csv(file_uri).await?;
    let questions = questions_from_rows(&rows);
    info!(
        rows = rows.len(),
        questions = questions.len(),
        "Starting batch questionnaire"
    );

    let results = answer_questions(knowledge_base, config, questions).await?;
    let count = results.len();

    let key = export_key(Utc::now());
    let body = results_to_csv(results)?;
    storage
        .upload(&config.export_bucket, &key, Bytes::from(body), "text/csv")
        .await?;

    let download_url = storage
        .presign(&config.export_bucket, &key, config.presign_ttl_secs)
        .await?;

    info!(count, export_key = %key, "Batch questionnaire exported");
    Ok(BatchSummary {
        download_url: download_url.to_string(),
        count,
    })
}
