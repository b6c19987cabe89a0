//! Copies repository for database operations

use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

use super::map_constraint_error;
use crate::{
    error::{AppError, AppResult},
    models::{
        copy::{CopyFilter, ItemCopy, NewCopy},
        InventoryCode,
    },
};

#[derive(Clone)]
pub struct CopiesRepository {
    pool: Pool<Postgres>,
}

impl CopiesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get copy by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Option<ItemCopy>> {
        let copy = sqlx::query_as::<_, ItemCopy>("SELECT * FROM copies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(copy)
    }

    /// Get copy by normalised inventory code
    pub async fn get_by_code(&self, code: &InventoryCode) -> AppResult<Option<ItemCopy>> {
        let copy = sqlx::query_as::<_, ItemCopy>("SELECT * FROM copies WHERE inventory_code = $1")
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(copy)
    }

    /// List copies matching every filter that is set
    pub async fn list(&self, filter: &CopyFilter) -> AppResult<Vec<ItemCopy>> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM copies WHERE TRUE");

        if let Some(id) = filter.catalog_item_id {
            builder.push(" AND catalog_item_id = ").push_bind(id);
        }
        if let Some(location) = filter.location {
            builder.push(" AND location = ").push_bind(location);
        }
        if let Some(state) = filter.state {
            builder.push(" AND state = ").push_bind(state);
        }
        if let Some(id) = filter.library_id {
            builder.push(" AND library_id = ").push_bind(id);
        }
        if let Some(id) = filter.lab_id {
            builder.push(" AND lab_id = ").push_bind(id);
        }
        builder.push(" ORDER BY id");

        let copies = builder
            .build_query_as::<ItemCopy>()
            .fetch_all(&self.pool)
            .await?;
        Ok(copies)
    }

    /// Load a copy and hold its row lock for the rest of the transaction
    pub(crate) async fn lock(conn: &mut PgConnection, id: i32) -> AppResult<Option<ItemCopy>> {
        let copy = sqlx::query_as::<_, ItemCopy>("SELECT * FROM copies WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(copy)
    }

    pub(crate) async fn find_by_code_in(
        conn: &mut PgConnection,
        code: &InventoryCode,
    ) -> AppResult<Option<ItemCopy>> {
        let copy = sqlx::query_as::<_, ItemCopy>("SELECT * FROM copies WHERE inventory_code = $1")
            .bind(code.as_str())
            .fetch_optional(conn)
            .await?;
        Ok(copy)
    }

    pub(crate) async fn insert(conn: &mut PgConnection, copy: &NewCopy) -> AppResult<ItemCopy> {
        sqlx::query_as::<_, ItemCopy>(
            r#"
            INSERT INTO copies (
                catalog_item_id, inventory_code, location, library_id, lab_id, state,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *
            "#,
        )
        .bind(copy.catalog_item_id)
        .bind(copy.inventory_code.as_str())
        .bind(copy.placement.location())
        .bind(copy.placement.library_id())
        .bind(copy.placement.lab_id())
        .bind(copy.state)
        .bind(copy.created_at)
        .fetch_one(conn)
        .await
        .map_err(|e| {
            map_constraint_error(e, || {
                format!("Inventory code {} already exists", copy.inventory_code)
            })
        })
    }

    pub(crate) async fn save(conn: &mut PgConnection, copy: &ItemCopy) -> AppResult<ItemCopy> {
        sqlx::query_as::<_, ItemCopy>(
            r#"
            UPDATE copies SET
                catalog_item_id = $1,
                inventory_code = $2,
                location = $3,
                library_id = $4,
                lab_id = $5,
                state = $6,
                updated_at = $7
            WHERE id = $8
            RETURNING *
            "#,
        )
        .bind(copy.catalog_item_id)
        .bind(&copy.inventory_code)
        .bind(copy.location)
        .bind(copy.library_id)
        .bind(copy.lab_id)
        .bind(copy.state)
        .bind(copy.updated_at)
        .bind(copy.id)
        .fetch_optional(conn)
        .await
        .map_err(|e| {
            map_constraint_error(e, || {
                format!("Inventory code {} already exists", copy.inventory_code)
            })
        })?
        .ok_or_else(|| AppError::NotFound(format!("Copy with id {} not found", copy.id)))
    }

    pub(crate) async fn delete(conn: &mut PgConnection, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM copies WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await
            .map_err(|e| {
                map_constraint_error(e, || format!("Copy {} is referenced by loan records", id))
            })?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Copy with id {} not found", id)));
        }
        Ok(())
    }
}
