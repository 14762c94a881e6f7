use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info};

use async_trait::async_trait;

use crate::domain::{
    Milestone, SuggestionStatus, TradeExecution, TradeSuggestion, TradingMode, TradingProfile,
};
use crate::domain::{OrderSide, TradeSignal};
use crate::error::Result;

use super::TradingStore;

/// PostgreSQL storage adapter
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a PostgreSQL store from an existing connection pool (zero-cost reuse)
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn profile_from_row(row: &PgRow) -> TradingProfile {
        TradingProfile {
            user_id: row.get("user_id"),
            mode: row
                .get::<String, _>("mode")
                .parse()
                .unwrap_or(TradingMode::Observer),
            min_confidence_threshold: row.get("min_confidence_threshold"),
            max_position_size_usd: row.get("max_position_size_usd"),
            daily_loss_limit_usd: row.get("daily_loss_limit_usd"),
            max_open_positions: row.get::<i32, _>("max_open_positions") as u32,
            stop_after_losses: row.get::<i32, _>("stop_after_losses") as u32,
            consecutive_losses: row.get::<i32, _>("consecutive_losses") as u32,
            daily_profit_loss: row.get("daily_profit_loss"),
            kill_switch_active: row.get("kill_switch_active"),
            kill_switch_reason: row.get("kill_switch_reason"),
            full_auto_unlocked: row.get("full_auto_unlocked"),
            active: row.get("active"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    fn suggestion_from_row(row: &PgRow) -> TradeSuggestion {
        TradeSuggestion {
            id: row.get("id"),
            user_id: row.get("user_id"),
            prediction_id: row.get("prediction_id"),
            ticker: row.get("ticker"),
            signal: row
                .get::<String, _>("signal")
                .parse()
                .unwrap_or(TradeSignal::Buy),
            confidence: row.get("confidence"),
            entry_price: row.get("entry_price"),
            suggested_size_usd: row.get("suggested_size_usd"),
            rationale: row.get("rationale"),
            status: row
                .get::<String, _>("status")
                .as_str()
                .try_into()
                .unwrap_or(SuggestionStatus::Pending),
            approved_at: row.get("approved_at"),
            rejected_at: row.get("rejected_at"),
            created_at: row.get("created_at"),
            expires_at: row.get("expires_at"),
        }
    }

    fn execution_from_row(row: &PgRow) -> TradeExecution {
        let side: String = row.get("side");
        TradeExecution {
            id: row.get("id"),
            suggestion_id: row.get("suggestion_id"),
            user_id: row.get("user_id"),
            ticker: row.get("ticker"),
            side: if side.eq_ignore_ascii_case("SELL") {
                OrderSide::Sell
            } else {
                OrderSide::Buy
            },
            size_usd: row.get("size_usd"),
            executed_price: row.get("executed_price"),
            exit_price: row.get("exit_price"),
            realized_pnl_usd: row.get("realized_pnl_usd"),
            executed_at: row.get("executed_at"),
            closed_at: row.get("closed_at"),
        }
    }

    fn milestone_from_row(row: &PgRow) -> Milestone {
        Milestone {
            name: row.get("name"),
            target_value: row.get("target_value"),
            current_value: row.get("current_value"),
            is_completed: row.get("is_completed"),
            completed_at: row.get("completed_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

const PROFILE_COLUMNS: &str = "user_id, mode, min_confidence_threshold, max_position_size_usd, \
     daily_loss_limit_usd, max_open_positions, stop_after_losses, consecutive_losses, \
     daily_profit_loss, kill_switch_active, kill_switch_reason, full_auto_unlocked, active, \
     created_at, updated_at";

const SUGGESTION_COLUMNS: &str = "id, user_id, prediction_id, ticker, signal, confidence, \
     entry_price, suggested_size_usd, rationale, status, approved_at, rejected_at, created_at, \
     expires_at";

const EXECUTION_COLUMNS: &str = "id, suggestion_id, user_id, ticker, side, size_usd, \
     executed_price, exit_price, realized_pnl_usd, executed_at, closed_at";

#[async_trait]
impl TradingStore for PostgresStore {
    // ==================== Profiles ====================

    async fn ensure_profile(&self, user_id: &str) -> Result<TradingProfile> {
        let defaults = TradingProfile::new(user_id);

        sqlx::query(
            r#"
            INSERT INTO trading_profiles (
                user_id, mode, min_confidence_threshold, max_position_size_usd,
                daily_loss_limit_usd, max_open_positions, stop_after_losses
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(&defaults.user_id)
        .bind(defaults.mode.as_str())
        .bind(defaults.min_confidence_threshold)
        .bind(defaults.max_position_size_usd)
        .bind(defaults.daily_loss_limit_usd)
        .bind(defaults.max_open_positions as i32)
        .bind(defaults.stop_after_losses as i32)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM trading_profiles WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Self::profile_from_row(&row))
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<TradingProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM trading_profiles WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Self::profile_from_row(&r)))
    }

    async fn save_profile(&self, profile: &TradingProfile) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE trading_profiles SET
                mode = $2,
                min_confidence_threshold = $3,
                max_position_size_usd = $4,
                daily_loss_limit_usd = $5,
                max_open_positions = $6,
                stop_after_losses = $7,
                updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(&profile.user_id)
        .bind(profile.mode.as_str())
        .bind(profile.min_confidence_threshold)
        .bind(profile.max_position_size_usd)
        .bind(profile.daily_loss_limit_usd)
        .bind(profile.max_open_positions as i32)
        .bind(profile.stop_after_losses as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn automated_profiles(&self) -> Result<Vec<TradingProfile>> {
        let rows = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM trading_profiles \
             WHERE active AND mode != 'observer' ORDER BY user_id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::profile_from_row).collect())
    }

    async fn active_profiles(&self) -> Result<Vec<TradingProfile>> {
        let rows = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM trading_profiles WHERE active ORDER BY user_id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::profile_from_row).collect())
    }

    async fn trip_kill_switch(&self, user_id: &str, reason: &str) -> Result<bool> {
        // Guarded on the previous flag value so two Safety Monitor ticks can
        // never both observe the false→true edge.
        let result = sqlx::query(
            r#"
            UPDATE trading_profiles SET
                kill_switch_active = TRUE,
                kill_switch_reason = $2,
                updated_at = NOW()
            WHERE user_id = $1 AND kill_switch_active = FALSE
            "#,
        )
        .bind(user_id)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn reset_kill_switch(&self, user_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE trading_profiles SET
                kill_switch_active = FALSE,
                kill_switch_reason = NULL,
                consecutive_losses = 0,
                updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_safety_metrics(
        &self,
        user_id: &str,
        daily_profit_loss: Decimal,
        consecutive_losses: u32,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE trading_profiles SET
                daily_profit_loss = $2,
                consecutive_losses = $3,
                updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(daily_profit_loss)
        .bind(consecutive_losses as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_full_auto_unlocked(&self, user_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE trading_profiles SET full_auto_unlocked = TRUE, updated_at = NOW() \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn deactivate_profile(&self, user_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE trading_profiles SET active = FALSE, updated_at = NOW() WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ==================== Suggestions ====================

    async fn insert_suggestion(&self, suggestion: &TradeSuggestion) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trade_suggestions (
                id, user_id, prediction_id, ticker, signal, confidence, entry_price,
                suggested_size_usd, rationale, status, created_at, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(&suggestion.id)
        .bind(&suggestion.user_id)
        .bind(&suggestion.prediction_id)
        .bind(&suggestion.ticker)
        .bind(suggestion.signal.as_str())
        .bind(suggestion.confidence)
        .bind(suggestion.entry_price)
        .bind(suggestion.suggested_size_usd)
        .bind(&suggestion.rationale)
        .bind(suggestion.status.as_str())
        .bind(suggestion.created_at)
        .bind(suggestion.expires_at)
        .execute(&self.pool)
        .await?;

        debug!("Inserted suggestion {} for {}", suggestion.id, suggestion.ticker);
        Ok(())
    }

    async fn get_suggestion(&self, id: &str) -> Result<Option<TradeSuggestion>> {
        let row = sqlx::query(&format!(
            "SELECT {SUGGESTION_COLUMNS} FROM trade_suggestions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Self::suggestion_from_row(&r)))
    }

    async fn suggestions_for_user(
        &self,
        user_id: &str,
        status: Option<SuggestionStatus>,
    ) -> Result<Vec<TradeSuggestion>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {SUGGESTION_COLUMNS} FROM trade_suggestions \
                     WHERE user_id = $1 AND status = $2 ORDER BY created_at DESC"
                ))
                .bind(user_id)
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {SUGGESTION_COLUMNS} FROM trade_suggestions \
                     WHERE user_id = $1 ORDER BY created_at DESC"
                ))
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.iter().map(Self::suggestion_from_row).collect())
    }

    async fn has_open_suggestion(&self, user_id: &str, ticker: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM trade_suggestions
                WHERE user_id = $1 AND ticker = $2 AND status IN ('pending', 'approved')
            )
            "#,
        )
        .bind(user_id)
        .bind(ticker)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn approve_suggestion(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE trade_suggestions SET status = 'approved', approved_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn reject_suggestion(&self, id: &str, reason: Option<&str>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE trade_suggestions SET
                status = 'rejected',
                rejected_at = NOW(),
                rationale = COALESCE($2, rationale)
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(reason.map(|r| format!("Rejected: {r}")))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_executed(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE trade_suggestions SET status = 'executed' \
             WHERE id = $1 AND status = 'approved'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn expire_overdue_suggestions(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE trade_suggestions SET status = 'expired' \
             WHERE status = 'pending' AND expires_at < $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // ==================== Executions ====================

    async fn insert_execution(&self, execution: &TradeExecution) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trade_executions (
                id, suggestion_id, user_id, ticker, side, size_usd, executed_price, executed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&execution.id)
        .bind(&execution.suggestion_id)
        .bind(&execution.user_id)
        .bind(&execution.ticker)
        .bind(execution.side.to_string())
        .bind(execution.size_usd)
        .bind(execution.executed_price)
        .bind(execution.executed_at)
        .execute(&self.pool)
        .await?;

        debug!(
            "Recorded execution {} for suggestion {}",
            execution.id, execution.suggestion_id
        );
        Ok(())
    }

    async fn get_execution(&self, id: &str) -> Result<Option<TradeExecution>> {
        let row = sqlx::query(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM trade_executions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Self::execution_from_row(&r)))
    }

    async fn open_position_count(&self, user_id: &str) -> Result<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM trade_executions WHERE user_id = $1 AND closed_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u32)
    }

    async fn close_execution(
        &self,
        id: &str,
        exit_price: Decimal,
        realized_pnl_usd: Decimal,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE trade_executions SET
                exit_price = $2,
                realized_pnl_usd = $3,
                closed_at = NOW()
            WHERE id = $1 AND closed_at IS NULL
            "#,
        )
        .bind(id)
        .bind(exit_price)
        .bind(realized_pnl_usd)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn closed_executions_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TradeExecution>> {
        let rows = sqlx::query(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM trade_executions \
             WHERE user_id = $1 AND closed_at >= $2 ORDER BY closed_at DESC"
        ))
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::execution_from_row).collect())
    }

    async fn recent_closed_executions(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<TradeExecution>> {
        let rows = sqlx::query(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM trade_executions \
             WHERE user_id = $1 AND closed_at IS NOT NULL \
             ORDER BY closed_at DESC LIMIT $2"
        ))
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::execution_from_row).collect())
    }

    // ==================== Milestones ====================

    async fn ensure_milestone(&self, name: &str, target_value: i64) -> Result<Milestone> {
        sqlx::query(
            r#"
            INSERT INTO trading_milestones (name, target_value)
            VALUES ($1, $2)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(target_value)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            "SELECT name, target_value, current_value, is_completed, completed_at, updated_at \
             FROM trading_milestones WHERE name = $1",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(Self::milestone_from_row(&row))
    }

    async fn get_milestone(&self, name: &str) -> Result<Option<Milestone>> {
        let row = sqlx::query(
            "SELECT name, target_value, current_value, is_completed, completed_at, updated_at \
             FROM trading_milestones WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Self::milestone_from_row(&r)))
    }

    async fn record_milestone_progress(&self, name: &str, current_value: i64) -> Result<()> {
        // GREATEST keeps current_value monotonic even if the source count
        // briefly reads lower than a previous tick.
        sqlx::query(
            r#"
            UPDATE trading_milestones SET
                current_value = GREATEST(current_value, $2),
                updated_at = NOW()
            WHERE name = $1
            "#,
        )
        .bind(name)
        .bind(current_value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn complete_milestone(&self, name: &str, current_value: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE trading_milestones SET
                current_value = GREATEST(current_value, $2),
                is_completed = TRUE,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE name = $1 AND is_completed = FALSE AND $2 >= target_value
            "#,
        )
        .bind(name)
        .bind(current_value)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
