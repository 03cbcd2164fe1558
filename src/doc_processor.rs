/// Largest accepted upload, in bytes.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Parsed document content
#[derive(Debug)]
pub struct ParsedDocument {
    pub content: String,
    pub file_type: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Only .pdf and .txt files are supported")]
    Unsupported,
    #[error("PDF parse error: {0}")]
    Pdf(String),
    #[error("File is larger than {} MB", MAX_UPLOAD_BYTES / (1024 * 1024))]
    TooLarge,
}

/// Parse an uploaded file into plain text. The type is taken from the
/// extension, falling back to the declared content type.
pub fn parse_upload(
    file_name: &str,
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<ParsedDocument, ParseError> {
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(ParseError::TooLarge);
    }

    let ext = file_name
        .rsplit_once('.')
        .map(|(_, e)| e.to_lowercase())
        .unwrap_or_default();

    let kind = match (ext.as_str(), content_type) {
        ("pdf", _) | (_, Some("application/pdf")) => "pdf",
        ("txt", _) | (_, Some("text/plain")) => "txt",
        ("md" | "markdown", _) | (_, Some("text/markdown")) => "md",
        _ => return Err(ParseError::Unsupported),
    };

    match kind {
        "pdf" => {
            let content = pdf_extract::extract_text_from_mem(bytes)
                .map_err(|e| ParseError::Pdf(e.to_string()))?;
            Ok(ParsedDocument {
                content,
                file_type: "pdf".into(),
            })
        }
        other => Ok(ParsedDocument {
            content: String::from_utf8_lossy(bytes).into_owned(),
            file_type: other.into(),
        }),
    }
}

/// Split text into overlapping chunks for embedding
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() || chunk_size == 0 {
        return vec![];
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= chunk_size {
        return vec![text.to_string()];
    }

    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim().to_string();
        if !chunk.is_empty() {
            chunks.push(chunk);
        }
        if end >= chars.len() {
            break;
        }
        start += step;
    }

    chunks
}
