//! Database service for the posting engine.

use crate::models::{
    AccountingRule, CreateRule, GstBreakdownRow, JournalHeader, JournalLine, NewJournal,
    NewSubledgerEntry, PostingRun, RuleLine, RuleStatus, SubledgerEntry, Trigger,
};
use crate::ports::{
    BreakdownStore, JournalStore, RuleStore, RunClaim, RunStore, SubledgerStore,
};
use crate::services::metrics::{DB_QUERY_DURATION, SUBLEDGER_ENTRIES_TOTAL};
use async_trait::async_trait;
use engine_core::config::DatabaseConfig;
use engine_core::error::AppError;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "posting-engine"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Build the pool from engine configuration.
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self, AppError> {
        Self::new(
            config.url.expose_secret(),
            config.max_connections,
            config.min_connections,
        )
        .await
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Rule Configuration Operations
    // -------------------------------------------------------------------------

    /// Create a rule with its lines. Administration happens outside the
    /// engine; this is the storage surface it ships with.
    #[instrument(skip(self, input), fields(tenant_id = %input.tenant_id, name = %input.name))]
    pub async fn create_rule(&self, input: &CreateRule) -> Result<AccountingRule, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_rule"])
            .start_timer();

        if input.lines.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Rule must have at least one line"
            )));
        }
        for line in &input.lines {
            if line.debit_account.is_none() && line.credit_account.is_none() {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Rule line must set a debit or credit account"
                )));
            }
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let rule_id = Uuid::new_v4();
        let mut rule = sqlx::query_as::<_, AccountingRule>(
            r#"
            INSERT INTO accounting_rules (rule_id, tenant_id, name, category, reference_label, transaction_type, trigger_action, division_id, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'active')
            RETURNING rule_id, tenant_id, name, category, reference_label, transaction_type, trigger_action, division_id, status, created_utc
            "#,
        )
        .bind(rule_id)
        .bind(input.tenant_id)
        .bind(&input.name)
        .bind(input.category.as_str())
        .bind(&input.reference_label)
        .bind(&input.transaction_type)
        .bind(input.trigger.as_str())
        .bind(input.division_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Rule named '{}' already exists for tenant",
                    input.name
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create rule: {}", e)),
        })?;

        for (i, line) in input.lines.iter().enumerate() {
            let inserted = sqlx::query_as::<_, RuleLine>(
                r#"
                INSERT INTO accounting_rule_lines (rule_line_id, rule_id, line_no, debit_account, credit_account, amount_source, track_subledger)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING rule_line_id, rule_id, line_no, debit_account, credit_account, amount_source, track_subledger
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(rule_id)
            .bind((i + 1) as i32)
            .bind(&line.debit_account)
            .bind(&line.credit_account)
            .bind(line.amount_source.as_str())
            .bind(line.track_subledger)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to create rule line: {}", e))
            })?;
            rule.lines.push(inserted);
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(rule_id = %rule.rule_id, line_count = rule.lines.len(), "Rule created");

        Ok(rule)
    }

    /// List all rules for a tenant, lines included.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn list_rules(&self, tenant_id: Uuid) -> Result<Vec<AccountingRule>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_rules"])
            .start_timer();

        let rules = self.fetch_rules(tenant_id, None).await?;

        timer.observe_duration();

        Ok(rules)
    }

    /// Activate or deactivate a rule.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, rule_id = %rule_id))]
    pub async fn set_rule_status(
        &self,
        tenant_id: Uuid,
        rule_id: Uuid,
        status: RuleStatus,
    ) -> Result<Option<AccountingRule>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_rule_status"])
            .start_timer();

        let rule = sqlx::query_as::<_, AccountingRule>(
            r#"
            UPDATE accounting_rules
            SET status = $3
            WHERE tenant_id = $1 AND rule_id = $2
            RETURNING rule_id, tenant_id, name, category, reference_label, transaction_type, trigger_action, division_id, status, created_utc
            "#,
        )
        .bind(tenant_id)
        .bind(rule_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update rule: {}", e)))?;

        timer.observe_duration();

        let rule = match rule {
            Some(rule) => Some(self.load_lines(rule).await?),
            None => None,
        };

        Ok(rule)
    }

    async fn fetch_rules(
        &self,
        tenant_id: Uuid,
        status: Option<RuleStatus>,
    ) -> Result<Vec<AccountingRule>, AppError> {
        let rules = sqlx::query_as::<_, AccountingRule>(
            r#"
            SELECT rule_id, tenant_id, name, category, reference_label, transaction_type, trigger_action, division_id, status, created_utc
            FROM accounting_rules
            WHERE tenant_id = $1
              AND ($2::varchar IS NULL OR status = $2)
            ORDER BY created_utc, rule_id
            "#,
        )
        .bind(tenant_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list rules: {}", e)))?;

        let mut loaded = Vec::with_capacity(rules.len());
        for rule in rules {
            loaded.push(self.load_lines(rule).await?);
        }

        Ok(loaded)
    }

    async fn load_lines(&self, mut rule: AccountingRule) -> Result<AccountingRule, AppError> {
        rule.lines = sqlx::query_as::<_, RuleLine>(
            r#"
            SELECT rule_line_id, rule_id, line_no, debit_account, credit_account, amount_source, track_subledger
            FROM accounting_rule_lines
            WHERE rule_id = $1
            ORDER BY line_no
            "#,
        )
        .bind(rule.rule_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get rule lines: {}", e)))?;

        Ok(rule)
    }
}

// -----------------------------------------------------------------------------
// Port implementations
// -----------------------------------------------------------------------------

#[async_trait]
impl RuleStore for Database {
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn active_rules(&self, tenant_id: Uuid) -> Result<Vec<AccountingRule>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["active_rules"])
            .start_timer();

        let rules = self.fetch_rules(tenant_id, Some(RuleStatus::Active)).await?;

        timer.observe_duration();

        Ok(rules)
    }
}

#[async_trait]
impl JournalStore for Database {
    /// Persist a journal header (Draft) and its lines atomically.
    #[instrument(skip(self, journal), fields(tenant_id = %journal.tenant_id, reference = %journal.reference, line_count = journal.lines.len()))]
    async fn create_journal(&self, journal: &NewJournal) -> Result<JournalHeader, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_journal"])
            .start_timer();

        if journal.lines.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Journal must have at least one line"
            )));
        }
        for line in &journal.lines {
            if line.debit.is_some() == line.credit.is_some() {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Journal line {} must set exactly one of debit/credit",
                    line.line_no
                )));
            }
            if line.amount() <= Decimal::ZERO {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Journal line {} amount must be positive",
                    line.line_no
                )));
            }
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let journal_id = Uuid::new_v4();
        let header = sqlx::query_as::<_, JournalHeader>(
            r#"
            INSERT INTO journals (journal_id, tenant_id, journal_date, transaction_type, reference, status)
            VALUES ($1, $2, $3, $4, $5, 'draft')
            RETURNING journal_id, tenant_id, journal_date, transaction_type, reference, status, created_utc, posted_utc, reversed_utc
            "#,
        )
        .bind(journal_id)
        .bind(journal.tenant_id)
        .bind(journal.journal_date)
        .bind(&journal.transaction_type)
        .bind(&journal.reference)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create journal: {}", e)))?;

        for line in &journal.lines {
            sqlx::query(
                r#"
                INSERT INTO journal_lines (line_id, journal_id, line_no, account_code, debit, credit, narration)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(journal_id)
            .bind(line.line_no)
            .bind(&line.account_code)
            .bind(line.debit)
            .bind(line.credit)
            .bind(&line.narration)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert journal line: {}", e))
            })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            journal_id = %journal_id,
            line_count = journal.lines.len(),
            "Journal created"
        );

        Ok(header)
    }

    /// Draft -> Posted. Rejects journals in any other status.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, journal_id = %journal_id))]
    async fn post_journal(
        &self,
        tenant_id: Uuid,
        journal_id: Uuid,
    ) -> Result<JournalHeader, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["post_journal"])
            .start_timer();

        let header = sqlx::query_as::<_, JournalHeader>(
            r#"
            UPDATE journals
            SET status = 'posted', posted_utc = now()
            WHERE tenant_id = $1 AND journal_id = $2 AND status = 'draft'
            RETURNING journal_id, tenant_id, journal_date, transaction_type, reference, status, created_utc, posted_utc, reversed_utc
            "#,
        )
        .bind(tenant_id)
        .bind(journal_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to post journal: {}", e)))?;

        timer.observe_duration();

        match header {
            Some(header) => {
                info!(journal_id = %journal_id, "Journal posted");
                Ok(header)
            }
            None => match self.get_journal(tenant_id, journal_id).await? {
                Some(existing) => Err(AppError::Conflict(anyhow::anyhow!(
                    "Journal {} is {}, only draft journals can be posted",
                    journal_id,
                    existing.status
                ))),
                None => Err(AppError::NotFound(anyhow::anyhow!(
                    "Journal {} not found",
                    journal_id
                ))),
            },
        }
    }

    /// Posted -> Reversed. Status flag only; offsetting lines are not
    /// generated.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, journal_id = %journal_id))]
    async fn reverse_journal(
        &self,
        tenant_id: Uuid,
        journal_id: Uuid,
    ) -> Result<JournalHeader, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["reverse_journal"])
            .start_timer();

        let header = sqlx::query_as::<_, JournalHeader>(
            r#"
            UPDATE journals
            SET status = 'reversed', reversed_utc = now()
            WHERE tenant_id = $1 AND journal_id = $2 AND status = 'posted'
            RETURNING journal_id, tenant_id, journal_date, transaction_type, reference, status, created_utc, posted_utc, reversed_utc
            "#,
        )
        .bind(tenant_id)
        .bind(journal_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to reverse journal: {}", e))
        })?;

        timer.observe_duration();

        match header {
            Some(header) => {
                info!(journal_id = %journal_id, "Journal reversed");
                Ok(header)
            }
            None => match self.get_journal(tenant_id, journal_id).await? {
                Some(existing) => Err(AppError::Conflict(anyhow::anyhow!(
                    "Journal {} is {}, only posted journals can be reversed",
                    journal_id,
                    existing.status
                ))),
                None => Err(AppError::NotFound(anyhow::anyhow!(
                    "Journal {} not found",
                    journal_id
                ))),
            },
        }
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, journal_id = %journal_id))]
    async fn get_journal(
        &self,
        tenant_id: Uuid,
        journal_id: Uuid,
    ) -> Result<Option<JournalHeader>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_journal"])
            .start_timer();

        let header = sqlx::query_as::<_, JournalHeader>(
            r#"
            SELECT journal_id, tenant_id, journal_date, transaction_type, reference, status, created_utc, posted_utc, reversed_utc
            FROM journals
            WHERE tenant_id = $1 AND journal_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(journal_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get journal: {}", e)))?;

        timer.observe_duration();

        Ok(header)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, journal_id = %journal_id))]
    async fn get_journal_lines(
        &self,
        tenant_id: Uuid,
        journal_id: Uuid,
    ) -> Result<Vec<JournalLine>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_journal_lines"])
            .start_timer();

        let lines = sqlx::query_as::<_, JournalLine>(
            r#"
            SELECT l.line_id, l.journal_id, l.line_no, l.account_code, l.debit, l.credit, l.narration, l.subledger_entry_id
            FROM journal_lines l
            JOIN journals j ON j.journal_id = l.journal_id
            WHERE j.tenant_id = $1 AND l.journal_id = $2
            ORDER BY l.line_no
            "#,
        )
        .bind(tenant_id)
        .bind(journal_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get journal lines: {}", e))
        })?;

        timer.observe_duration();

        Ok(lines)
    }

    #[instrument(skip(self), fields(journal_id = %journal_id, line_no = line_no))]
    async fn attach_subledger_entry(
        &self,
        tenant_id: Uuid,
        journal_id: Uuid,
        line_no: i32,
        entry_id: Uuid,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["attach_subledger_entry"])
            .start_timer();

        sqlx::query(
            r#"
            UPDATE journal_lines l
            SET subledger_entry_id = $4
            FROM journals j
            WHERE j.journal_id = l.journal_id
              AND j.tenant_id = $1 AND l.journal_id = $2 AND l.line_no = $3
            "#,
        )
        .bind(tenant_id)
        .bind(journal_id)
        .bind(line_no)
        .bind(entry_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Failed to attach subledger entry: {}",
                e
            ))
        })?;

        timer.observe_duration();

        Ok(())
    }
}

#[async_trait]
impl SubledgerStore for Database {
    #[instrument(skip(self, entry), fields(tenant_id = %entry.tenant_id, journal_id = %entry.journal_id, party_id = %entry.party_id))]
    async fn create_entry(&self, entry: &NewSubledgerEntry) -> Result<SubledgerEntry, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_subledger_entry"])
            .start_timer();

        if entry.amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Subledger entry amount must be positive"
            )));
        }

        let created = sqlx::query_as::<_, SubledgerEntry>(
            r#"
            INSERT INTO subledger_entries (entry_id, tenant_id, journal_id, party_id, party_contact_id, entry_date, amount, direction, source_reference, category, trigger_action)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING entry_id, tenant_id, journal_id, party_id, party_contact_id, entry_date, amount, direction, source_reference, category, trigger_action, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.tenant_id)
        .bind(entry.journal_id)
        .bind(entry.party_id)
        .bind(entry.party_contact_id)
        .bind(entry.entry_date)
        .bind(entry.amount)
        .bind(entry.direction.as_str())
        .bind(&entry.source_reference)
        .bind(entry.category.as_str())
        .bind(entry.trigger.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create subledger entry: {}", e))
        })?;

        timer.observe_duration();

        SUBLEDGER_ENTRIES_TOTAL
            .with_label_values(&[entry.direction.as_str()])
            .inc();

        info!(
            entry_id = %created.entry_id,
            direction = %entry.direction,
            "Subledger entry created"
        );

        Ok(created)
    }

    /// Signed sum (debit - credit) of the party's entries.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, party_id = %party_id))]
    async fn party_balance(&self, tenant_id: Uuid, party_id: Uuid) -> Result<Decimal, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["party_balance"])
            .start_timer();

        let balance: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT COALESCE(
                SUM(CASE WHEN direction = 'debit' THEN amount ELSE -amount END),
                0
            )
            FROM subledger_entries
            WHERE tenant_id = $1 AND party_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(party_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get party balance: {}", e))
        })?;

        timer.observe_duration();

        Ok(balance.unwrap_or(Decimal::ZERO))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, journal_id = %journal_id))]
    async fn entries_for_journal(
        &self,
        tenant_id: Uuid,
        journal_id: Uuid,
    ) -> Result<Vec<SubledgerEntry>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["entries_for_journal"])
            .start_timer();

        let entries = sqlx::query_as::<_, SubledgerEntry>(
            r#"
            SELECT entry_id, tenant_id, journal_id, party_id, party_contact_id, entry_date, amount, direction, source_reference, category, trigger_action, created_utc
            FROM subledger_entries
            WHERE tenant_id = $1 AND journal_id = $2
            ORDER BY created_utc, entry_id
            "#,
        )
        .bind(tenant_id)
        .bind(journal_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get subledger entries: {}", e))
        })?;

        timer.observe_duration();

        Ok(entries)
    }
}

#[async_trait]
impl BreakdownStore for Database {
    /// Replace the document's breakdown wholesale inside one transaction.
    #[instrument(skip(self, rows), fields(tenant_id = %tenant_id, document_id = %document_id, row_count = rows.len()))]
    async fn replace_breakdown(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        rows: &[GstBreakdownRow],
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["replace_breakdown"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        sqlx::query("DELETE FROM gst_breakdowns WHERE tenant_id = $1 AND document_id = $2")
            .bind(tenant_id)
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to clear breakdown: {}", e))
            })?;

        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO gst_breakdowns (breakdown_id, tenant_id, document_id, tax_rate, taxable_value, cgst_rate, cgst_amount, sgst_rate, sgst_amount, igst_rate, igst_amount)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(tenant_id)
            .bind(document_id)
            .bind(row.tax_rate)
            .bind(row.taxable_value)
            .bind(row.cgst_rate)
            .bind(row.cgst_amount)
            .bind(row.sgst_rate)
            .bind(row.sgst_amount)
            .bind(row.igst_rate)
            .bind(row.igst_amount)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert breakdown row: {}", e))
            })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, document_id = %document_id))]
    async fn get_breakdown(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Vec<GstBreakdownRow>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_breakdown"])
            .start_timer();

        let rows = sqlx::query_as::<_, GstBreakdownRow>(
            r#"
            SELECT tax_rate, taxable_value, cgst_rate, cgst_amount, sgst_rate, sgst_amount, igst_rate, igst_amount
            FROM gst_breakdowns
            WHERE tenant_id = $1 AND document_id = $2
            ORDER BY tax_rate
            "#,
        )
        .bind(tenant_id)
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get breakdown: {}", e)))?;

        timer.observe_duration();

        Ok(rows)
    }
}

#[async_trait]
impl RunStore for Database {
    /// Claim the run row for this event. The insert-or-reclaim happens in
    /// one statement, so of two concurrent triggers exactly one claims it.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, document_id = %document_id, trigger = %trigger))]
    async fn begin_run(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        trigger: Trigger,
    ) -> Result<RunClaim, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["begin_run"])
            .start_timer();

        let claimed: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO posting_runs (run_id, tenant_id, document_id, trigger_action, status)
            VALUES ($1, $2, $3, $4, 'in_progress')
            ON CONFLICT (tenant_id, document_id, trigger_action)
            DO UPDATE SET status = 'in_progress', updated_utc = now()
            WHERE posting_runs.status = 'failed'
            RETURNING run_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(document_id)
        .bind(trigger.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to begin run: {}", e)))?;

        timer.observe_duration();

        Ok(if claimed.is_some() {
            RunClaim::Claimed
        } else {
            RunClaim::AlreadyHandled
        })
    }

    #[instrument(skip(self, detail), fields(tenant_id = %tenant_id, document_id = %document_id, trigger = %trigger))]
    async fn complete_run(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        trigger: Trigger,
        detail: &serde_json::Value,
    ) -> Result<(), AppError> {
        self.finish_run(tenant_id, document_id, trigger, "completed", detail)
            .await
    }

    #[instrument(skip(self, detail), fields(tenant_id = %tenant_id, document_id = %document_id, trigger = %trigger))]
    async fn fail_run(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        trigger: Trigger,
        detail: &serde_json::Value,
    ) -> Result<(), AppError> {
        self.finish_run(tenant_id, document_id, trigger, "failed", detail)
            .await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn failed_runs(&self, tenant_id: Uuid) -> Result<Vec<PostingRun>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["failed_runs"])
            .start_timer();

        let runs = sqlx::query_as::<_, PostingRun>(
            r#"
            SELECT run_id, tenant_id, document_id, trigger_action, status, detail, created_utc, updated_utc
            FROM posting_runs
            WHERE tenant_id = $1 AND status = 'failed'
            ORDER BY updated_utc
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list runs: {}", e)))?;

        timer.observe_duration();

        Ok(runs)
    }
}

impl Database {
    async fn finish_run(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        trigger: Trigger,
        status: &str,
        detail: &serde_json::Value,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["finish_run"])
            .start_timer();

        sqlx::query(
            r#"
            UPDATE posting_runs
            SET status = $4, detail = $5, updated_utc = now()
            WHERE tenant_id = $1 AND document_id = $2 AND trigger_action = $3
            "#,
        )
        .bind(tenant_id)
        .bind(document_id)
        .bind(trigger.as_str())
        .bind(status)
        .bind(detail)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to finish run: {}", e)))?;

        timer.observe_duration();

        Ok(())
    }
}
