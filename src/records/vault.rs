use chrono::{ NaiveDate, Utc };
use log::info;
use serde::{ Deserialize, Serialize };
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocStatus {
    Draft,
    Final,
    Review,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalDoc {
    pub id: String,
    pub title: String,
    pub doc_type: String,
    pub date: NaiveDate,
    pub status: DocStatus,
}

/// In-memory document vault. Nothing here outlives the process.
#[derive(Clone, Debug)]
pub struct DocumentVault {
    documents: Vec<LegalDoc>,
}

impl DocumentVault {
    pub fn empty() -> Self {
        Self { documents: Vec::new() }
    }

    /// A vault holding the sample case files.
    pub fn with_samples() -> Self {
        let sample = |id: &str, title: &str, doc_type: &str, (y, m, d): (i32, u32, u32), status| {
            LegalDoc {
                id: id.to_string(),
                title: title.to_string(),
                doc_type: doc_type.to_string(),
                date: NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default(),
                status,
            }
        };
        Self {
            documents: vec![
                sample("1", "Okeke vs State Case File", "PDF", (2023, 10, 12), DocStatus::Final),
                sample("2", "Land Sale Agreement - Lekki Plot", "DOCX", (2023, 11, 5), DocStatus::Review),
                sample("3", "Wills & Probate Draft", "PDF", (2023, 12, 1), DocStatus::Draft)
            ],
        }
    }

    /// Adds a new draft ahead of the existing documents. A blank title gets a
    /// numbered placeholder.
    pub fn upload(&mut self, title: Option<&str>, doc_type: &str) -> &LegalDoc {
        let title = match title.map(str::trim).filter(|t| !t.is_empty()) {
            Some(title) => title.to_string(),
            None => format!("New Uploaded Document {}", self.documents.len() + 1),
        };
        let doc = LegalDoc {
            id: Uuid::new_v4().to_string(),
            title,
            doc_type: doc_type.to_string(),
            date: Utc::now().date_naive(),
            status: DocStatus::Draft,
        };
        info!("Vault: added '{}' ({})", doc.title, doc.id);
        self.documents.insert(0, doc);
        &self.documents[0]
    }

    pub fn list(&self) -> &[LegalDoc] {
        &self.documents
    }

    pub fn get(&self, id: &str) -> Option<&LegalDoc> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn delete(&mut self, id: &str) -> Option<LegalDoc> {
        let index = self.documents.iter().position(|d| d.id == id)?;
        Some(self.documents.remove(index))
    }
}

impl Default for DocumentVault {
    fn default() -> Self {
        Self::with_samples()
    }
}
