use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Generates `as_str`, `Display` and `FromStr` for a string-backed enum column.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("Invalid {}: {}", stringify!($name).to_lowercase(), other)),
                }
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                let text = value.as_str()?;
                text.parse()
                    .map_err(|e: String| rusqlite::types::FromSqlError::Other(e.into()))
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(self.as_str().into())
            }
        }
    };
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Admin,
    Staff,
}

text_enum!(Role {
    Student => "student",
    Admin => "admin",
    Staff => "staff",
});

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Safety,
    Emergency,
    Policy,
    Procedure,
    Resource,
    #[default]
    Other,
}

text_enum!(Category {
    Safety => "safety",
    Emergency => "emergency",
    Policy => "policy",
    Procedure => "procedure",
    Resource => "resource",
    Other => "other",
});

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Model,
}

text_enum!(MessageRole {
    User => "user",
    Model => "model",
});

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    #[default]
    Security,
    Maintenance,
}

text_enum!(ReportKind {
    Security => "security",
    Maintenance => "maintenance",
});

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

text_enum!(Priority {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    #[default]
    Open,
    InReview,
    Resolved,
}

text_enum!(ReportStatus {
    Open => "open",
    InReview => "in_review",
    Resolved => "resolved",
});

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: Category,
    pub tags: Vec<String>,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
    pub uploaded_by: String,
    pub uploader_name: Option<String>,
    pub is_public: bool,
    pub view_count: i64,
    pub chunk_count: i64,
    pub embedded_chunks: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Document row without its content, for listings.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub id: String,
    pub title: String,
    pub category: Category,
    pub tags: Vec<String>,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
    pub uploaded_by: String,
    pub uploader_name: Option<String>,
    pub view_count: i64,
    pub chunk_count: i64,
    pub embedded_chunks: i64,
    pub created_at: String,
}

/// Fields for a new document. Chunks are stored alongside it.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub content: String,
    pub category: Category,
    pub tags: Vec<String>,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
    pub uploaded_by: String,
}

#[derive(Debug, Default, Clone)]
pub struct DocumentFilter {
    pub category: Option<Category>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub content: String,
    pub chunk_index: i32,
    pub created_at: String,
}

/// A public chunk joined with its parent document, as used by retrieval.
#[derive(Debug, Clone)]
pub struct SearchableChunk {
    pub id: String,
    pub document_id: String,
    pub title: String,
    pub category: Category,
    pub tags: Vec<String>,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub last_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub user_id: String,
    pub role: MessageRole,
    pub text: String,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub reference: String,
    pub user_id: String,
    pub kind: ReportKind,
    pub category: String,
    pub location: String,
    pub description: String,
    pub priority: Priority,
    pub status: ReportStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportDraft {
    pub kind: ReportKind,
    pub category: String,
    pub location: String,
    pub description: String,
    pub priority: Priority,
}

#[derive(Debug, Default, Clone)]
pub struct ReportFilter {
    pub user_id: Option<String>,
    pub status: Option<ReportStatus>,
    pub kind: Option<ReportKind>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportStats {
    pub total: i64,
    pub open: i64,
    pub in_review: i64,
    pub resolved: i64,
    /// Unresolved reports with high or critical priority.
    pub urgent: i64,
}
