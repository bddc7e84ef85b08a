//! # Site Repository
//!
//! Sites group zones. The engine only reads them to check that an entry's
//! site matches its zone and is open.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use parking_core::{Site, SiteState};

pub async fn fetch(conn: &mut SqliteConnection, site_id: &str) -> DbResult<Option<Site>> {
    let site: Option<Site> = sqlx::query_as(
        "SELECT id, name, city, state, created_at FROM sites WHERE id = ?1",
    )
    .bind(site_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(site)
}

/// Repository for site database operations.
#[derive(Debug, Clone)]
pub struct SiteRepository {
    pool: SqlitePool,
}

impl SiteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SiteRepository { pool }
    }

    /// Gets a site by ID.
    pub async fn get(&self, site_id: &str) -> DbResult<Site> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, site_id)
            .await?
            .ok_or_else(|| DbError::not_found("Site", site_id))
    }

    /// Lists all sites, by name.
    pub async fn list(&self) -> DbResult<Vec<Site>> {
        let sites: Vec<Site> =
            sqlx::query_as("SELECT id, name, city, state, created_at FROM sites ORDER BY name")
                .fetch_all(&self.pool)
                .await?;

        Ok(sites)
    }

    pub async fn insert(&self, site: &Site) -> DbResult<()> {
        debug!(id = %site.id, name = %site.name, "Inserting site");

        sqlx::query(
            "INSERT INTO sites (id, name, city, state, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&site.id)
        .bind(&site.name)
        .bind(&site.city)
        .bind(site.state)
        .bind(site.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Opens or closes a whole site.
    pub async fn set_state(&self, site_id: &str, state: SiteState) -> DbResult<()> {
        let result = sqlx::query("UPDATE sites SET state = ?2 WHERE id = ?1")
            .bind(site_id)
            .bind(state)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Site", site_id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;

    #[tokio::test]
    async fn test_insert_list_and_close_site() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let site = Site::new("South Campus", "Cali", Utc::now()).unwrap();
        db.sites().insert(&site).await.unwrap();

        let sites = db.sites().list().await.unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].state, SiteState::Active);

        db.sites()
            .set_state(&site.id, SiteState::Maintenance)
            .await
            .unwrap();
        assert_eq!(
            db.sites().get(&site.id).await.unwrap().state,
            SiteState::Maintenance
        );

        assert!(matches!(
            db.sites().set_state("missing", SiteState::Active).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
