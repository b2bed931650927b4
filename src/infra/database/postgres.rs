//! PostgreSQL database client implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

use crate::domain::{
    AppError, AuditLogEntry, ComplianceScreeningRecord, DatabaseClient, DatabaseError,
    PaginatedResponse, ServiceRegistration, TransferRequest, ValidationError,
};

/// PostgreSQL connection pool configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

/// PostgreSQL database client with connection pooling
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client with custom configuration
    pub async fn new(database_url: &str, config: PostgresConfig) -> Result<Self, AppError> {
        info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client with default configuration
    pub async fn with_defaults(database_url: &str) -> Result<Self, AppError> {
        Self::new(database_url, PostgresConfig::default()).await
    }

    /// Run database migrations using sqlx migrate
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Migration(e.to_string())))?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying connection pool (for testing)
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Parse a database row into a ServiceRegistration
    fn row_to_registration(row: &sqlx::postgres::PgRow) -> Result<ServiceRegistration, AppError> {
        let service_type: String = row.get("service_type");
        Ok(ServiceRegistration {
            id: row.get("id"),
            tenant_id: row.get("tenant_id"),
            service_type: service_type.parse().map_err(DatabaseError::Query)?,
            provider: row.get("provider"),
            configuration: row.get("configuration"),
            is_active: row.get("is_active"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    /// Parse a database row into a TransferRequest
    fn row_to_transfer(row: &sqlx::postgres::PgRow) -> Result<TransferRequest, AppError> {
        let transfer_type: String = row.get("transfer_type");
        let status: String = row.get("status");
        let approvals: serde_json::Value = row.get("approvals");
        Ok(TransferRequest {
            id: row.get("id"),
            tenant_id: row.get("tenant_id"),
            initiated_by: row.get("initiated_by"),
            amount: row.get("amount"),
            recipient_account_ref: row.get("recipient_account_ref"),
            transfer_type: transfer_type.parse().map_err(DatabaseError::Query)?,
            description: row.get("description"),
            banking_provider: row.get("banking_provider"),
            status: status.parse().map_err(DatabaseError::Query)?,
            required_approval_level: row.get("required_approval_level"),
            approvals: serde_json::from_value(approvals)?,
            provider_transaction_ref: row.get("provider_transaction_ref"),
            version: row.get("version"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            terminal_at: row.get("terminal_at"),
        })
    }

    /// Parse a database row into a ComplianceScreeningRecord
    fn row_to_screening(row: &sqlx::postgres::PgRow) -> Result<ComplianceScreeningRecord, AppError> {
        let decision: String = row.get("decision");
        let provider_results: serde_json::Value = row.get("provider_results");
        Ok(ComplianceScreeningRecord {
            id: row.get("id"),
            tenant_id: row.get("tenant_id"),
            entity_type: row.get("entity_type"),
            entity_id: row.get("entity_id"),
            provider_results: serde_json::from_value(provider_results)?,
            aggregate_risk_score: row.get("aggregate_risk_score"),
            decision: decision.parse().map_err(DatabaseError::Query)?,
            created_at: row.get("created_at"),
        })
    }

    /// Parse a database row into an AuditLogEntry
    fn row_to_audit_entry(row: &sqlx::postgres::PgRow) -> AuditLogEntry {
        AuditLogEntry {
            id: row.get("id"),
            tenant_id: row.get("tenant_id"),
            actor_id: row.get("actor_id"),
            action: row.get("action"),
            entity_type: row.get("entity_type"),
            entity_id: row.get("entity_id"),
            metadata: row.get("metadata"),
            source_ip: row.get("source_ip"),
            recorded_at: row.get("recorded_at"),
        }
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        Ok(())
    }

    #[instrument(
        skip(self, registration),
        fields(tenant_id = %registration.tenant_id, provider = %registration.provider)
    )]
    async fn upsert_registration(
        &self,
        registration: &ServiceRegistration,
    ) -> Result<ServiceRegistration, AppError> {
        let row = sqlx::query(
            r#"
            INSERT INTO service_registrations (
                id, tenant_id, service_type, provider, configuration, is_active,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (tenant_id, service_type, provider) DO UPDATE
            SET configuration = EXCLUDED.configuration,
                is_active = EXCLUDED.is_active,
                updated_at = EXCLUDED.updated_at
            RETURNING id, tenant_id, service_type, provider, configuration, is_active,
                      created_at, updated_at
            "#,
        )
        .bind(&registration.id)
        .bind(&registration.tenant_id)
        .bind(registration.service_type.as_str())
        .bind(&registration.provider)
        .bind(&registration.configuration)
        .bind(registration.is_active)
        .bind(registration.created_at)
        .bind(registration.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_registration(&row)
    }

    #[instrument(skip(self))]
    async fn list_registrations(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<ServiceRegistration>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, service_type, provider, configuration, is_active,
                   created_at, updated_at
            FROM service_registrations
            WHERE tenant_id = $1
            ORDER BY service_type, provider
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_registration).collect()
    }

    #[instrument(skip(self))]
    async fn load_all_registrations(&self) -> Result<Vec<ServiceRegistration>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, service_type, provider, configuration, is_active,
                   created_at, updated_at
            FROM service_registrations
            ORDER BY tenant_id, service_type, provider
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_registration).collect()
    }

    #[instrument(
        skip(self, transfer),
        fields(id = %transfer.id, tenant_id = %transfer.tenant_id, amount = %transfer.amount)
    )]
    async fn insert_transfer(&self, transfer: &TransferRequest) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO transfer_requests (
                id, tenant_id, initiated_by, amount, recipient_account_ref,
                transfer_type, description, banking_provider, status,
                required_approval_level, approvals, provider_transaction_ref,
                version, created_at, updated_at, terminal_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(&transfer.id)
        .bind(&transfer.tenant_id)
        .bind(&transfer.initiated_by)
        .bind(transfer.amount)
        .bind(&transfer.recipient_account_ref)
        .bind(transfer.transfer_type.as_str())
        .bind(&transfer.description)
        .bind(&transfer.banking_provider)
        .bind(transfer.status.as_str())
        .bind(transfer.required_approval_level)
        .bind(serde_json::to_value(&transfer.approvals)?)
        .bind(&transfer.provider_transaction_ref)
        .bind(transfer.version)
        .bind(transfer.created_at)
        .bind(transfer.updated_at)
        .bind(transfer.terminal_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_transfer(&self, id: &str) -> Result<Option<TransferRequest>, AppError> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, initiated_by, amount, recipient_account_ref,
                   transfer_type, description, banking_provider, status,
                   required_approval_level, approvals, provider_transaction_ref,
                   version, created_at, updated_at, terminal_at
            FROM transfer_requests
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_transfer(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(
        skip(self, transfer),
        fields(id = %transfer.id, status = %transfer.status)
    )]
    async fn update_transfer(
        &self,
        transfer: &TransferRequest,
        expected_version: i64,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE transfer_requests
            SET status = $1,
                approvals = $2,
                provider_transaction_ref = $3,
                version = version + 1,
                updated_at = $4,
                terminal_at = $5
            WHERE id = $6 AND version = $7
            "#,
        )
        .bind(transfer.status.as_str())
        .bind(serde_json::to_value(&transfer.approvals)?)
        .bind(&transfer.provider_transaction_ref)
        .bind(Utc::now())
        .bind(transfer.terminal_at)
        .bind(&transfer.id)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish a lost version race from a row that never existed
            let exists = sqlx::query("SELECT 1 FROM transfer_requests WHERE id = $1")
                .bind(&transfer.id)
                .fetch_optional(&self.pool)
                .await?
                .is_some();
            if exists {
                return Err(AppError::InvalidState(format!(
                    "Transfer {} was modified concurrently",
                    transfer.id
                )));
            }
            return Err(AppError::Database(DatabaseError::NotFound(
                transfer.id.clone(),
            )));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_transfers(
        &self,
        tenant_id: &str,
        limit: i64,
        cursor: Option<&str>,
    ) -> Result<PaginatedResponse<TransferRequest>, AppError> {
        // Clamp limit to valid range
        let limit = limit.clamp(1, 100);
        // Fetch one extra to determine if there are more items
        let fetch_limit = limit + 1;

        let rows = match cursor {
            Some(cursor_id) => {
                // Get the created_at of the cursor item for keyset pagination
                let cursor_row = sqlx::query(
                    "SELECT created_at FROM transfer_requests WHERE id = $1 AND tenant_id = $2",
                )
                .bind(cursor_id)
                .bind(tenant_id)
                .fetch_optional(&self.pool)
                .await?;

                let cursor_created_at: DateTime<Utc> = match cursor_row {
                    Some(row) => row.get("created_at"),
                    None => {
                        return Err(AppError::Validation(ValidationError::InvalidField {
                            field: "cursor".to_string(),
                            message: "Invalid cursor".to_string(),
                        }));
                    }
                };

                sqlx::query(
                    r#"
                    SELECT id, tenant_id, initiated_by, amount, recipient_account_ref,
                           transfer_type, description, banking_provider, status,
                           required_approval_level, approvals, provider_transaction_ref,
                           version, created_at, updated_at, terminal_at
                    FROM transfer_requests
                    WHERE tenant_id = $1 AND (created_at, id) < ($2, $3)
                    ORDER BY created_at DESC, id DESC
                    LIMIT $4
                    "#,
                )
                .bind(tenant_id)
                .bind(cursor_created_at)
                .bind(cursor_id)
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, tenant_id, initiated_by, amount, recipient_account_ref,
                           transfer_type, description, banking_provider, status,
                           required_approval_level, approvals, provider_transaction_ref,
                           version, created_at, updated_at, terminal_at
                    FROM transfer_requests
                    WHERE tenant_id = $1
                    ORDER BY created_at DESC, id DESC
                    LIMIT $2
                    "#,
                )
                .bind(tenant_id)
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let has_more = rows.len() > limit as usize;
        let transfers: Vec<TransferRequest> = rows
            .iter()
            .take(limit as usize)
            .map(Self::row_to_transfer)
            .collect::<Result<Vec<_>, _>>()?;

        let next_cursor = if has_more {
            transfers.last().map(|t| t.id.clone())
        } else {
            None
        };

        Ok(PaginatedResponse::new(transfers, next_cursor, has_more))
    }

    #[instrument(
        skip(self, record),
        fields(id = %record.id, tenant_id = %record.tenant_id, decision = %record.decision)
    )]
    async fn insert_screening(&self, record: &ComplianceScreeningRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO compliance_screenings (
                id, tenant_id, entity_type, entity_id, provider_results,
                aggregate_risk_score, decision, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&record.id)
        .bind(&record.tenant_id)
        .bind(&record.entity_type)
        .bind(&record.entity_id)
        .bind(serde_json::to_value(&record.provider_results)?)
        .bind(record.aggregate_risk_score)
        .bind(record.decision.as_str())
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_screening(
        &self,
        id: &str,
    ) -> Result<Option<ComplianceScreeningRecord>, AppError> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, entity_type, entity_id, provider_results,
                   aggregate_risk_score, decision, created_at
            FROM compliance_screenings
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_screening(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(
        skip(self, entry),
        fields(tenant_id = %entry.tenant_id, action = %entry.action)
    )]
    async fn append_audit_entry(&self, entry: &AuditLogEntry) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (
                id, tenant_id, actor_id, action, entity_type, entity_id,
                metadata, source_ip, recorded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.tenant_id)
        .bind(&entry.actor_id)
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(&entry.metadata)
        .bind(&entry.source_ip)
        .bind(entry.recorded_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_audit_entries(
        &self,
        tenant_id: &str,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<AuditLogEntry>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, actor_id, action, entity_type, entity_id,
                   metadata, source_ip, recorded_at
            FROM audit_log
            WHERE tenant_id = $1 AND entity_type = $2 AND entity_id = $3
            ORDER BY recorded_at ASC, id ASC
            "#,
        )
        .bind(tenant_id)
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_audit_entry).collect())
    }
}
