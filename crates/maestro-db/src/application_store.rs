//! Postgres-backed [`ApplicationStore`].

use async_trait::async_trait;
use maestro_core::application::Application;
use maestro_core::store::ApplicationStore;
use maestro_core::Result as CoreResult;

use crate::error::DbError;
use crate::PgStore;

#[derive(sqlx::FromRow)]
struct ApplicationRow {
    name: String,
    environments: Vec<String>,
    contact: Option<String>,
}

impl From<ApplicationRow> for Application {
    fn from(row: ApplicationRow) -> Self {
        Application { name: row.name, environments: row.environments, contact: row.contact }
    }
}

#[async_trait]
impl ApplicationStore for PgStore {
    async fn upsert(&self, application: &Application) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO applications (name, environments, contact)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE SET
                environments = EXCLUDED.environments,
                contact = EXCLUDED.contact
            "#,
        )
        .bind(&application.name)
        .bind(&application.environments)
        .bind(&application.contact)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    async fn get(&self, name: &str) -> CoreResult<Option<Application>> {
        let row: Option<ApplicationRow> = sqlx::query_as("SELECT * FROM applications WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(row.map(Application::from))
    }

    async fn list(&self) -> CoreResult<Vec<Application>> {
        let rows: Vec<ApplicationRow> = sqlx::query_as("SELECT * FROM applications ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(rows.into_iter().map(Application::from).collect())
    }

    async fn list_environments(&self) -> CoreResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT DISTINCT unnest(environments) FROM applications ORDER BY 1")
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(rows.into_iter().map(|(env,)| env).collect())
    }
}
