use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Named reference entity; `name` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Location {
    pub id: Uuid,
    pub name: String,
    pub created_at: OffsetDateTime,
}

pub async fn list(db: &PgPool) -> anyhow::Result<Vec<Location>> {
    let rows = sqlx::query_as::<_, Location>(
        r#"
        SELECT id, name, created_at
          FROM locations
         ORDER BY name ASC
        "#,
    )
    .fetch_all(db)
    .await
    .context("list locations")?;
    Ok(rows)
}

pub async fn find_by_name(db: &PgPool, name: &str) -> anyhow::Result<Option<Location>> {
    let row = sqlx::query_as::<_, Location>(
        r#"
        SELECT id, name, created_at
          FROM locations
         WHERE name = $1
        "#,
    )
    .bind(name)
    .fetch_optional(db)
    .await
    .context("find location by name")?;
    Ok(row)
}

/// Insert `name` unless it exists, returning the stored row either way.
pub async fn get_or_create(db: &PgPool, name: &str) -> anyhow::Result<(Location, bool)> {
    let inserted = sqlx::query_as::<_, Location>(
        r#"
        INSERT INTO locations (name)
        VALUES ($1)
        ON CONFLICT (name) DO NOTHING
        RETURNING id, name, created_at
        "#,
    )
    .bind(name)
    .fetch_optional(db)
    .await
    .context("insert location")?;

    if let Some(loc) = inserted {
        return Ok((loc, true));
    }

    let existing = find_by_name(db, name)
        .await?
        .ok_or_else(|| anyhow::anyhow!("location {} vanished after conflict", name))?;
    Ok((existing, false))
}
