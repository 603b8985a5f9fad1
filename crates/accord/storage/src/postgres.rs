//! PostgreSQL storage implementation
//!
//! The transactional source of truth. Document records live in one table
//! per kind; progress rows, artifacts and approver links are shared.

use crate::traits::*;
use crate::{StorageError, StorageResult};
use accord_types::{
    ApproverContact, ApproverId, ApproverLink, ApproverLinkId, Artifact, ArtifactId, Company,
    CompanyId, DocumentId, DocumentRecord, Kind, NewProgress, Progress, ProgressId, StatusId,
    StepId, STATUSES, STEPS,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::time::Duration;

/// PostgreSQL-backed storage
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

fn query_err(e: sqlx::Error) -> StorageError {
    StorageError::Query(e.to_string())
}

fn document_table(kind: Kind) -> &'static str {
    match kind {
        Kind::Mom => "mom_documents",
        Kind::Nda => "nda_documents",
        Kind::Jik => "jik_documents",
        Kind::Msa => "msa_documents",
        Kind::Mou => "mou_documents",
    }
}

impl PostgresStorage {
    /// Connect to PostgreSQL and initialize schema
    pub async fn new(
        url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(connect_timeout_secs))
            .connect(url)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let storage = Self { pool };
        storage.initialize_schema().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn initialize_schema(&self) -> Result<(), StorageError> {
        let mut statements = vec![
            r#"
            CREATE TABLE IF NOT EXISTS steps (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL
            );
            "#
            .to_string(),
            r#"
            CREATE TABLE IF NOT EXISTS statuses (
                id INTEGER PRIMARY KEY,
                label TEXT NOT NULL
            );
            "#
            .to_string(),
            r#"
            CREATE TABLE IF NOT EXISTS companies (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                deleted_at TIMESTAMPTZ
            );
            "#
            .to_string(),
            r#"
            CREATE TABLE IF NOT EXISTS progress (
                id BIGSERIAL PRIMARY KEY,
                company_id BIGINT NOT NULL REFERENCES companies(id),
                step_id INTEGER NOT NULL REFERENCES steps(id),
                status_id INTEGER REFERENCES statuses(id),
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );
            "#
            .to_string(),
            r#"CREATE INDEX IF NOT EXISTS progress_company_step ON progress(company_id, step_id, id);"#
                .to_string(),
            r#"
            CREATE TABLE IF NOT EXISTS document_progress (
                kind TEXT NOT NULL,
                document_id BIGINT NOT NULL,
                progress_id BIGINT NOT NULL REFERENCES progress(id),
                PRIMARY KEY (kind, document_id, progress_id)
            );
            "#
            .to_string(),
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id BIGSERIAL PRIMARY KEY,
                progress_id BIGINT NOT NULL REFERENCES progress(id),
                document_url TEXT NOT NULL,
                deleted_at TIMESTAMPTZ
            );
            "#
            .to_string(),
            r#"CREATE INDEX IF NOT EXISTS documents_progress_id ON documents(progress_id);"#
                .to_string(),
            r#"
            CREATE TABLE IF NOT EXISTS approvers (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT,
                deleted_at TIMESTAMPTZ
            );
            "#
            .to_string(),
            r#"
            CREATE TABLE IF NOT EXISTS approver_links (
                id BIGSERIAL PRIMARY KEY,
                kind TEXT NOT NULL,
                document_id BIGINT NOT NULL,
                approver_id BIGINT NOT NULL REFERENCES approvers(id),
                approver_type TEXT NOT NULL,
                verify_token TEXT UNIQUE,
                expires_at TIMESTAMPTZ,
                is_approved BOOLEAN NOT NULL DEFAULT FALSE
            );
            "#
            .to_string(),
            r#"CREATE INDEX IF NOT EXISTS approver_links_document ON approver_links(kind, document_id);"#
                .to_string(),
        ];

        for kind in Kind::ALL {
            statements.push(format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id BIGSERIAL PRIMARY KEY,
                    company_id BIGINT NOT NULL REFERENCES companies(id),
                    title TEXT NOT NULL,
                    progress_id BIGINT REFERENCES progress(id),
                    deleted_at TIMESTAMPTZ,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
                );
                "#,
                table = document_table(kind)
            ));
        }

        for stmt in &statements {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(query_err)?;
        }

        for step in STEPS {
            sqlx::query("INSERT INTO steps (id, name) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING")
                .bind(step.id.0)
                .bind(step.name)
                .execute(&self.pool)
                .await
                .map_err(query_err)?;
        }
        for status in STATUSES {
            sqlx::query(
                "INSERT INTO statuses (id, label) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING",
            )
            .bind(status.id.0)
            .bind(status.label)
            .execute(&self.pool)
            .await
            .map_err(query_err)?;
        }

        tracing::debug!(
            steps = STEPS.len(),
            statuses = STATUSES.len(),
            "Progress schema initialized"
        );
        Ok(())
    }
}

fn progress_from_row(row: &PgRow) -> StorageResult<Progress> {
    Ok(Progress {
        id: ProgressId(row.try_get("id").map_err(query_err)?),
        company_id: CompanyId(row.try_get("company_id").map_err(query_err)?),
        step_id: StepId(row.try_get("step_id").map_err(query_err)?),
        status_id: row
            .try_get::<Option<i32>, _>("status_id")
            .map_err(query_err)?
            .map(StatusId),
        created_at: row.try_get("created_at").map_err(query_err)?,
    })
}

fn artifact_from_row(row: &PgRow) -> StorageResult<Artifact> {
    Ok(Artifact {
        id: ArtifactId(row.try_get("id").map_err(query_err)?),
        progress_id: ProgressId(row.try_get("progress_id").map_err(query_err)?),
        document_url: row.try_get("document_url").map_err(query_err)?,
        deleted_at: row.try_get("deleted_at").map_err(query_err)?,
    })
}

fn link_from_row(row: &PgRow) -> StorageResult<ApproverLink> {
    let kind: String = row.try_get("kind").map_err(query_err)?;
    Ok(ApproverLink {
        id: ApproverLinkId(row.try_get("id").map_err(query_err)?),
        kind: kind
            .parse()
            .map_err(|e| StorageError::InvalidData(format!("approver link kind: {}", e)))?,
        document_id: DocumentId(row.try_get("document_id").map_err(query_err)?),
        approver_id: ApproverId(row.try_get("approver_id").map_err(query_err)?),
        approver_type: row.try_get("approver_type").map_err(query_err)?,
        verify_token: row.try_get("verify_token").map_err(query_err)?,
        expires_at: row.try_get("expires_at").map_err(query_err)?,
        is_approved: row.try_get("is_approved").map_err(query_err)?,
    })
}

const ARTIFACT_COLUMNS: &str = "id, progress_id, document_url, deleted_at";
const PROGRESS_COLUMNS: &str = "id, company_id, step_id, status_id, created_at";

#[async_trait]
impl LedgerStore for PostgresStorage {
    async fn get_company(&self, id: CompanyId) -> StorageResult<Option<Company>> {
        let row = sqlx::query("SELECT id, name, deleted_at FROM companies WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;

        row.map(|r| -> StorageResult<Company> {
            Ok(Company {
                id: CompanyId(r.try_get("id").map_err(query_err)?),
                name: r.try_get("name").map_err(query_err)?,
                deleted_at: r.try_get("deleted_at").map_err(query_err)?,
            })
        })
        .transpose()
    }

    async fn get_document(
        &self,
        kind: Kind,
        id: DocumentId,
    ) -> StorageResult<Option<DocumentRecord>> {
        let sql = format!(
            "SELECT id, company_id, title, progress_id, deleted_at FROM {} WHERE id = $1",
            document_table(kind)
        );
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;

        row.map(|r| -> StorageResult<DocumentRecord> {
            Ok(DocumentRecord {
                id: DocumentId(r.try_get("id").map_err(query_err)?),
                kind,
                company_id: CompanyId(r.try_get("company_id").map_err(query_err)?),
                title: r.try_get("title").map_err(query_err)?,
                progress_id: r
                    .try_get::<Option<i64>, _>("progress_id")
                    .map_err(query_err)?
                    .map(ProgressId),
                deleted_at: r.try_get("deleted_at").map_err(query_err)?,
            })
        })
        .transpose()
    }

    async fn get_progress(&self, id: ProgressId) -> StorageResult<Option<Progress>> {
        let sql = format!("SELECT {} FROM progress WHERE id = $1", PROGRESS_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;
        row.as_ref().map(progress_from_row).transpose()
    }

    async fn document_history(
        &self,
        kind: Kind,
        document_id: DocumentId,
    ) -> StorageResult<Vec<Progress>> {
        let sql = format!(
            r#"
            SELECT {columns} FROM progress
             WHERE id IN (
                   SELECT progress_id FROM document_progress
                    WHERE kind = $1 AND document_id = $2
                   UNION
                   SELECT progress_id FROM {table}
                    WHERE id = $2 AND progress_id IS NOT NULL
             )
             ORDER BY id
            "#,
            columns = PROGRESS_COLUMNS,
            table = document_table(kind)
        );
        let rows = sqlx::query(&sql)
            .bind(kind.as_str())
            .bind(document_id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(query_err)?;
        rows.iter().map(progress_from_row).collect()
    }

    async fn artifact_for_progress(
        &self,
        progress_id: ProgressId,
    ) -> StorageResult<Option<Artifact>> {
        let sql = format!(
            "SELECT {} FROM documents WHERE progress_id = $1 AND deleted_at IS NULL ORDER BY id DESC LIMIT 1",
            ARTIFACT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(progress_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;
        row.as_ref().map(artifact_from_row).transpose()
    }

    async fn begin(&self) -> StorageResult<Box<dyn LedgerTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Box::new(PgLedgerTransaction { tx }))
    }
}

/// Transaction over a pooled PostgreSQL connection
pub struct PgLedgerTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTransaction for PgLedgerTransaction {
    async fn insert_progress(&mut self, row: NewProgress) -> StorageResult<Progress> {
        let sql = format!(
            "INSERT INTO progress (company_id, step_id, status_id, created_at) VALUES ($1, $2, $3, $4) RETURNING {}",
            PROGRESS_COLUMNS
        );
        let inserted = sqlx::query(&sql)
            .bind(row.company_id.0)
            .bind(row.step_id.0)
            .bind(row.status_id.map(|s| s.0))
            .bind(Utc::now())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(query_err)?;
        progress_from_row(&inserted)
    }

    async fn point_document(
        &mut self,
        kind: Kind,
        document_id: DocumentId,
        progress_id: ProgressId,
    ) -> StorageResult<()> {
        let table = document_table(kind);

        // Keep the row being replaced; records created outside the engine
        // start with a pointer that was never linked.
        let sql = format!(
            r#"
            INSERT INTO document_progress (kind, document_id, progress_id)
            SELECT $1, id, progress_id FROM {} WHERE id = $2 AND progress_id IS NOT NULL
            ON CONFLICT DO NOTHING
            "#,
            table
        );
        sqlx::query(&sql)
            .bind(kind.as_str())
            .bind(document_id.0)
            .execute(&mut *self.tx)
            .await
            .map_err(query_err)?;

        let sql = format!("UPDATE {} SET progress_id = $1 WHERE id = $2", table);
        let result = sqlx::query(&sql)
            .bind(progress_id.0)
            .bind(document_id.0)
            .execute(&mut *self.tx)
            .await
            .map_err(query_err)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("{} {}", kind, document_id)));
        }

        sqlx::query(
            "INSERT INTO document_progress (kind, document_id, progress_id) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(kind.as_str())
        .bind(document_id.0)
        .bind(progress_id.0)
        .execute(&mut *self.tx)
        .await
        .map_err(query_err)?;
        Ok(())
    }

    async fn artifact_for_progress(
        &mut self,
        progress_id: ProgressId,
    ) -> StorageResult<Option<Artifact>> {
        let sql = format!(
            "SELECT {} FROM documents WHERE progress_id = $1 AND deleted_at IS NULL ORDER BY id DESC LIMIT 1 FOR UPDATE",
            ARTIFACT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(progress_id.0)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(query_err)?;
        row.as_ref().map(artifact_from_row).transpose()
    }

    async fn repoint_artifact(
        &mut self,
        artifact_id: ArtifactId,
        progress_id: ProgressId,
        document_url: Option<&str>,
    ) -> StorageResult<Artifact> {
        let sql = format!(
            "UPDATE documents SET progress_id = $1, document_url = COALESCE($2, document_url) WHERE id = $3 RETURNING {}",
            ARTIFACT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(progress_id.0)
            .bind(document_url)
            .bind(artifact_id.0)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(query_err)?
            .ok_or_else(|| StorageError::NotFound(artifact_id.to_string()))?;
        artifact_from_row(&row)
    }

    async fn insert_artifact(
        &mut self,
        progress_id: ProgressId,
        document_url: &str,
    ) -> StorageResult<Artifact> {
        let sql = format!(
            "INSERT INTO documents (progress_id, document_url) VALUES ($1, $2) RETURNING {}",
            ARTIFACT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(progress_id.0)
            .bind(document_url)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(query_err)?;
        artifact_from_row(&row)
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        self.tx.commit().await.map_err(query_err)
    }

    async fn rollback(self: Box<Self>) -> StorageResult<()> {
        self.tx.rollback().await.map_err(query_err)
    }
}

#[async_trait]
impl ApproverStore for PostgresStorage {
    async fn list_approver_contacts(
        &self,
        kind: Kind,
        document_id: DocumentId,
    ) -> StorageResult<Vec<ApproverContact>> {
        let rows = sqlx::query(
            r#"
            SELECT l.id AS link_id, a.id AS approver_id, a.name, a.email
              FROM approver_links l
              JOIN approvers a ON a.id = l.approver_id
             WHERE l.kind = $1 AND l.document_id = $2 AND a.deleted_at IS NULL
             ORDER BY l.id
            "#,
        )
        .bind(kind.as_str())
        .bind(document_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;

        rows.iter()
            .map(|row| -> StorageResult<ApproverContact> {
                Ok(ApproverContact {
                    link_id: ApproverLinkId(row.try_get("link_id").map_err(query_err)?),
                    approver_id: ApproverId(row.try_get("approver_id").map_err(query_err)?),
                    name: row.try_get("name").map_err(query_err)?,
                    email: row.try_get("email").map_err(query_err)?,
                })
            })
            .collect()
    }

    async fn get_approver_link(&self, id: ApproverLinkId) -> StorageResult<Option<ApproverLink>> {
        let row = sqlx::query(
            r#"
            SELECT id, kind, document_id, approver_id, approver_type, verify_token, expires_at, is_approved
              FROM approver_links
             WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;
        row.as_ref().map(link_from_row).transpose()
    }

    async fn store_verify_token(
        &self,
        link_id: ApproverLinkId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let result = sqlx::query(
            "UPDATE approver_links SET verify_token = $1, expires_at = $2 WHERE id = $3",
        )
        .bind(token)
        .bind(expires_at)
        .bind(link_id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
                StorageError::Conflict("verification token collision".to_string())
            } else {
                query_err(e)
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(link_id.to_string()));
        }
        Ok(())
    }

    async fn consume_verify_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<TokenConsumption> {
        let approved = sqlx::query(
            r#"
            UPDATE approver_links
               SET is_approved = TRUE, verify_token = NULL, expires_at = NULL
             WHERE verify_token = $1
               AND (expires_at IS NULL OR expires_at >= $2)
            RETURNING id
            "#,
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;

        if let Some(row) = approved {
            let id: i64 = row.try_get("id").map_err(query_err)?;
            return Ok(TokenConsumption::Approved(ApproverLinkId(id)));
        }

        let stale = sqlx::query("SELECT id FROM approver_links WHERE verify_token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;

        match stale {
            Some(row) => {
                let id: i64 = row.try_get("id").map_err(query_err)?;
                Ok(TokenConsumption::Expired(ApproverLinkId(id)))
            }
            None => Ok(TokenConsumption::Unknown),
        }
    }
}

impl Storage for PostgresStorage {
    fn backend_label(&self) -> &'static str {
        "postgres"
    }
}
