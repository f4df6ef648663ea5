use std::path::PathBuf;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, instrument};

use crate::core::QuizBackend;
use crate::error::ExportError;
use crate::quiz::Question;

pub const PDF_FILE_NAME: &str = "quiz.pdf";

/// Asks the backend to render a quiz as PDF and saves it locally.
#[derive(Debug, Clone)]
pub struct PdfExporter {
    backend: Box<dyn QuizBackend>,
    output_dir: PathBuf,
}

impl PdfExporter {
    pub fn new(backend: Box<dyn QuizBackend>, output_dir: PathBuf) -> Self {
        Self { backend, output_dir }
    }

    /// Export `questions` to `<output_dir>/quiz.pdf`, returning the written path.
    #[instrument(skip(self, questions), fields(questions = questions.len(), dir = %self.output_dir.display()))]
    pub async fn export(&self, questions: &[Question]) -> Result<PathBuf, ExportError> {
        let pdf = self.backend.export_pdf(questions).await.map_err(|e| {
            error!(error = %e, "Failed to export PDF");
            ExportError::from(e)
        })?;

        let file_path = self.output_dir.join(PDF_FILE_NAME);
        fs::create_dir_all(&self.output_dir).await?;

        let mut file = fs::File::create(&file_path).await?;
        file.write_all(&pdf).await?;
        file.flush().await?;

        info!(path = %file_path.display(), size = pdf.len(), "Saved quiz PDF");
        Ok(file_path)
    }
}
