//! In-process demo catalog of documents, reports and public profiles guarded by
//! the resource endpoints. Contents live for the lifetime of the process.
//!
//! Profiles are fixed demo entries and never reflect registered accounts.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use utoipa::ToSchema;

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct Document {
    pub id: u64,
    pub title: String,
    pub content: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub is_public: bool,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct Report {
    pub id: u64,
    pub name: String,
    pub report_type: String,
    #[schema(value_type = Object)]
    pub data: Value,
    pub generated_at: DateTime<Utc>,
    pub generated_by: String,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct PublicProfile {
    pub id: u64,
    pub full_name: String,
    pub email: String,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    documents: Vec<Document>,
    reports: Vec<Report>,
    profiles: Vec<PublicProfile>,
    next_document_id: u64,
    next_report_id: u64,
}

#[derive(Debug, Default)]
pub struct Catalog {
    state: RwLock<State>,
}

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

impl Catalog {
    /// Catalog pre-filled with a few demo entries.
    #[must_use]
    pub fn seeded() -> Self {
        let documents = vec![
            Document {
                id: 1,
                title: "API technical documentation".to_string(),
                content: "Endpoint reference for the authentication service".to_string(),
                author: "admin@example.com".to_string(),
                created_at: at(2025, 9, 15, 10, 0),
                is_public: false,
            },
            Document {
                id: 2,
                title: "User guide".to_string(),
                content: "How to use the system as a regular user".to_string(),
                author: "moderator@example.com".to_string(),
                created_at: at(2025, 9, 16, 14, 30),
                is_public: true,
            },
            Document {
                id: 3,
                title: "Confidential report".to_string(),
                content: "Restricted to administrators".to_string(),
                author: "admin@example.com".to_string(),
                created_at: at(2025, 9, 16, 9, 15),
                is_public: false,
            },
        ];
        let reports = vec![
            Report {
                id: 1,
                name: "User statistics".to_string(),
                report_type: "user_stats".to_string(),
                data: json!({"active_users": 4, "inactive_users": 1, "total_logins": 42}),
                generated_at: at(2025, 9, 16, 8, 0),
                generated_by: "admin@example.com".to_string(),
            },
            Report {
                id: 2,
                name: "Security report".to_string(),
                report_type: "security".to_string(),
                data: json!({"failed_logins": 3, "suspicious_activity": 0, "blocked_ips": []}),
                generated_at: at(2025, 9, 16, 12, 0),
                generated_by: "moderator@example.com".to_string(),
            },
        ];
        let profile = |id: u64, full_name: &str, email: &str, joined_at| PublicProfile {
            id,
            full_name: full_name.to_string(),
            email: email.to_string(),
            is_active: true,
            joined_at,
        };
        let profiles = vec![
            profile(1, "Grace Brewster Hopper", "admin@example.com", at(2025, 9, 15, 10, 0)),
            profile(2, "Alan Mathison Turing", "user@example.com", at(2025, 9, 15, 11, 30)),
            profile(3, "Barbara Jane Liskov", "moderator@example.com", at(2025, 9, 15, 12, 15)),
        ];
        Self {
            state: RwLock::new(State {
                next_document_id: documents.len() as u64 + 1,
                next_report_id: reports.len() as u64 + 1,
                documents,
                reports,
                profiles,
            }),
        }
    }

    pub async fn documents(&self) -> Vec<Document> {
        self.state.read().await.documents.clone()
    }

    pub async fn add_document(
        &self,
        title: String,
        content: String,
        is_public: bool,
        author: &str,
    ) -> Document {
        let mut state = self.state.write().await;
        let document = Document {
            id: state.next_document_id.max(1),
            title,
            content,
            author: author.to_string(),
            created_at: Utc::now(),
            is_public,
        };
        state.next_document_id = document.id + 1;
        state.documents.push(document.clone());
        document
    }

    /// Remove a document, returning it if it existed.
    pub async fn remove_document(&self, id: u64) -> Option<Document> {
        let mut state = self.state.write().await;
        let index = state.documents.iter().position(|d| d.id == id)?;
        Some(state.documents.remove(index))
    }

    pub async fn profiles(&self) -> Vec<PublicProfile> {
        self.state.read().await.profiles.clone()
    }

    pub async fn reports(&self) -> Vec<Report> {
        self.state.read().await.reports.clone()
    }

    pub async fn add_report(
        &self,
        name: String,
        report_type: String,
        data: Value,
        author: &str,
    ) -> Report {
        let mut state = self.state.write().await;
        let report = Report {
            id: state.next_report_id.max(1),
            name,
            report_type,
            data,
            generated_at: Utc::now(),
            generated_by: author.to_string(),
        };
        state.next_report_id = report.id + 1;
        state.reports.push(report.clone());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ids_are_never_reused() {
        let catalog = Catalog::seeded();
        let removed = catalog.remove_document(3).await;
        assert!(removed.is_some());
        let added = catalog
            .add_document("t".to_string(), "c".to_string(), true, "a@x.com")
            .await;
        assert_eq!(added.id, 4);
        assert_eq!(catalog.documents().await.len(), 3);
        assert!(catalog.remove_document(3).await.is_none());
    }

    #[tokio::test]
    async fn profiles_are_demo_entries() {
        let profiles = Catalog::seeded().profiles().await;
        assert_eq!(profiles.len(), 3);
        assert!(profiles.iter().all(|p| p.email.ends_with("@example.com")));
        assert!(Catalog::default().profiles().await.is_empty());
    }

    #[tokio::test]
    async fn empty_catalog_starts_at_one() {
        let catalog = Catalog::default();
        let report = catalog
            .add_report("r".to_string(), "t".to_string(), json!({}), "a@x.com")
            .await;
        assert_eq!(report.id, 1);
        assert_eq!(catalog.reports().await.len(), 1);
    }
}
