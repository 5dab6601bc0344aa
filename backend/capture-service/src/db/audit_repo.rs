/// Audit sink - one `system_logs` row per persisted image
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tracing::warn;

/// Operation log entry
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub level: &'static str,
    pub module: &'static str,
    pub action: &'static str,
    pub user_id: i64,
    pub ip_address: Option<String>,
    pub payload: Value,
}

/// Receives operation events; recording never fails the caller
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent);
}

#[derive(Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(&self, event: AuditEvent) {
        let result = sqlx::query(
            r#"
            INSERT INTO system_logs (
                log_level, module, action, user_id, ip_address,
                operation_result, message, additional_data
            ) VALUES ($1, $2, $3, $4, $5, 'success', $6, $7)
            "#,
        )
        .bind(event.level)
        .bind(event.module)
        .bind(event.action)
        .bind(event.user_id)
        .bind(&event.ip_address)
        .bind(event.action)
        .bind(&event.payload)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(
                module = event.module,
                action = event.action,
                user_id = event.user_id,
                error = %e,
                "Failed to write audit event"
            );
        }
    }
}
