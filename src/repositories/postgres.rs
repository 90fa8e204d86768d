//! PostgreSQL backend built on diesel-async.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use diesel_async::pooled_connection::bb8::PooledConnection;
use diesel_async::AsyncPgConnection;
use jiff::Timestamp;
use jiff_diesel::ToDiesel;
use uuid::Uuid;

use crate::cron::{CronError, CronResult};
use crate::db::AsyncDbPool;
use crate::error::DatabaseErrorConverter;
use crate::models::{
    CronConfig, CronConfigRow, CronJob, CronJobRow, CronManagerControl, CronManagerControlRow,
    NewCronConfig, NewCronConfigRow, NewCronJob, NewCronJobRow, NewCronManagerControlRow,
};
use crate::repositories::{CronConfigFilter, DatabaseOps};
use crate::schema::{cron_configs, cron_jobs, cron_manager_control};

#[derive(Clone)]
pub struct PostgresOperations {
    pool: AsyncDbPool,
}

impl PostgresOperations {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }

    async fn get_conn(&self) -> CronResult<PooledConnection<'_, AsyncPgConnection>> {
        self.pool
            .get()
            .await
            .map_err(|e| CronError::ConnectionPool {
                source: anyhow::Error::from(e),
            })
    }

    fn filtered<'a>(filter: &'a CronConfigFilter) -> cron_configs::BoxedQuery<'a, diesel::pg::Pg> {
        let mut query = cron_configs::table.into_boxed();
        if let Some(id) = filter.id {
            query = query.filter(cron_configs::id.eq(id));
        }
        if let Some(name) = filter.name.as_deref() {
            query = query.filter(cron_configs::name.eq(name));
        }
        if !filter.include_deleted {
            query = query.filter(cron_configs::deleted_at.is_null());
        }
        query
    }
}

fn convert(operation: &'static str) -> impl Fn(diesel::result::Error) -> CronError {
    move |e| DatabaseErrorConverter::convert_diesel_error(e, operation)
}

#[async_trait]
impl DatabaseOps for PostgresOperations {
    async fn find_one_cron_config(
        &self,
        filter: &CronConfigFilter,
    ) -> CronResult<Option<CronConfig>> {
        let mut conn = self.get_conn().await?;

        let row = Self::filtered(filter)
            .order(cron_configs::id.asc())
            .select(CronConfigRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(convert("find cron config"))?;

        Ok(row.map(CronConfig::from))
    }

    async fn find_cron_config(
        &self,
        filter: Option<&CronConfigFilter>,
    ) -> CronResult<Vec<CronConfig>> {
        let mut conn = self.get_conn().await?;
        let default_filter = CronConfigFilter::default();
        let filter = filter.unwrap_or(&default_filter);

        let rows = Self::filtered(filter)
            .order(cron_configs::id.asc())
            .select(CronConfigRow::as_select())
            .load(&mut conn)
            .await
            .map_err(convert("list cron configs"))?;

        Ok(rows.into_iter().map(CronConfig::from).collect())
    }

    async fn create_cron_config(&self, data: NewCronConfig) -> CronResult<CronConfig> {
        let mut conn = self.get_conn().await?;

        diesel::insert_into(cron_configs::table)
            .values(NewCronConfigRow::from(data))
            .returning(CronConfigRow::as_returning())
            .get_result(&mut conn)
            .await
            .map(CronConfig::from)
            .map_err(convert("create cron config"))
    }

    async fn save_cron_config(&self, data: &CronConfig) -> CronResult<CronConfig> {
        let mut conn = self.get_conn().await?;
        let row = CronConfigRow::from(data);

        diesel::update(cron_configs::table.find(data.id))
            .set(&row)
            .returning(CronConfigRow::as_returning())
            .get_result(&mut conn)
            .await
            .map(CronConfig::from)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => CronError::NotFound(data.id.to_string()),
                other => DatabaseErrorConverter::convert_diesel_error(other, "save cron config"),
            })
    }

    async fn create_cron_job(&self, data: NewCronJob) -> CronResult<CronJob> {
        let mut conn = self.get_conn().await?;

        diesel::insert_into(cron_jobs::table)
            .values(NewCronJobRow::from(data))
            .returning(CronJobRow::as_returning())
            .get_result(&mut conn)
            .await
            .map(CronJob::from)
            .map_err(convert("create cron job"))
    }

    async fn save_cron_job(&self, data: &CronJob) -> CronResult<CronJob> {
        let mut conn = self.get_conn().await?;
        let row = CronJobRow::from(data);

        diesel::update(cron_jobs::table.find(data.id))
            .set(&row)
            .returning(CronJobRow::as_returning())
            .get_result(&mut conn)
            .await
            .map(CronJob::from)
            .map_err(convert("save cron job"))
    }

    async fn query(&self, sql: &str) -> CronResult<serde_json::Value> {
        let mut conn = self.get_conn().await?;

        let affected = diesel::sql_query(sql)
            .execute(&mut conn)
            .await
            .map_err(convert("run stored query"))?;

        Ok(serde_json::json!({ "rowsAffected": affected }))
    }

    async fn create_control(&self, replica_id: &str) -> CronResult<CronManagerControl> {
        let mut conn = self.get_conn().await?;

        diesel::insert_into(cron_manager_control::table)
            .values(NewCronManagerControlRow::seed(replica_id))
            .returning(CronManagerControlRow::as_returning())
            .get_result(&mut conn)
            .await
            .map(CronManagerControl::from)
            .map_err(convert("create control"))
    }

    async fn get_control(&self) -> CronResult<Option<CronManagerControl>> {
        let mut conn = self.get_conn().await?;

        let row = cron_manager_control::table
            .order(cron_manager_control::id.desc())
            .select(CronManagerControlRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(convert("load control"))?;

        Ok(row.map(CronManagerControl::from))
    }

    async fn update_control(
        &self,
        data: &CronManagerControl,
    ) -> CronResult<Option<CronManagerControl>> {
        let mut conn = self.get_conn().await?;

        let row = diesel::update(
            cron_manager_control::table
                .filter(cron_manager_control::id.eq(data.id))
                .filter(cron_manager_control::cmcv.eq(data.cmcv)),
        )
        .set((
            cron_manager_control::enabled.eq(data.enabled),
            cron_manager_control::replica_ids.eq(data.replica_ids.clone()),
            cron_manager_control::stale_replicas.eq(data.stale_replicas.clone()),
            cron_manager_control::cmcv.eq(Uuid::new_v4()),
            cron_manager_control::updated_at.eq(Timestamp::now().to_diesel()),
        ))
        .returning(CronManagerControlRow::as_returning())
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(convert("update control"))?;

        Ok(row.map(CronManagerControl::from))
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
