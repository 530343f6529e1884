// ABOUTME: Postgres store backend over sqlx with runtime queries
// ABOUTME: Runs migrations from the configured directory on connect
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

use std::path::Path;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use super::{GrantType, NewUser, OAuthClient, StoreError, StoreProvider, User};

/// Postgres-backed store
#[derive(Clone)]
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Connect to Postgres and apply pending migrations
    ///
    /// # Errors
    /// Returns an error if the connection or a migration fails
    pub async fn connect(database_url: &str, migrations_path: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        let migrator = sqlx::migrate::Migrator::new(Path::new(migrations_path))
            .await
            .map_err(|e| StoreError::Database(format!("failed to load migrations: {e}")))?;
        migrator
            .run(&pool)
            .await
            .map_err(|e| StoreError::Database(format!("failed to run migrations: {e}")))?;

        tracing::info!("connected to postgres and applied migrations");

        Ok(Self { pool })
    }

    fn user_from_row(row: &sqlx::postgres::PgRow) -> User {
        User {
            id: row.get("id"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl StoreProvider for PostgresStore {
    async fn create_user(&self, new_user: &NewUser) -> Result<User, StoreError> {
        let row = sqlx::query(
            r"
            INSERT INTO users (id, email, password_hash, first_name, last_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, password_hash, first_name, last_name, created_at
            ",
        )
        .bind(Uuid::new_v4())
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(Self::user_from_row(&row))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT id, email, password_hash, first_name, last_name, created_at
            FROM users
            WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Self::user_from_row(&row)))
    }

    async fn get_user_with_scopes(
        &self,
        id: Uuid,
    ) -> Result<Option<(User, Vec<String>)>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT u.id, u.email, u.password_hash, u.first_name, u.last_name, u.created_at,
                   COALESCE(array_agg(DISTINCT s.name) FILTER (WHERE s.name IS NOT NULL), '{}') AS scopes
            FROM users u
            LEFT JOIN user_roles ur ON ur.user_id = u.id
            LEFT JOIN role_scopes rs ON rs.role_id = ur.role_id
            LEFT JOIN scopes s ON s.name = rs.scope_name
            WHERE u.id = $1
            GROUP BY u.id
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let scopes: Vec<String> = row.get("scopes");
            (Self::user_from_row(&row), scopes)
        }))
    }

    async fn get_oauth_client(&self, client_id: &str) -> Result<Option<OAuthClient>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT client_id, client_secret_hash, is_public, name, redirect_uris, scopes,
                   grant_types, access_token_valid_duration, refresh_token_valid_duration,
                   authorization_code_valid_duration
            FROM oauth_clients
            WHERE client_id = $1
            ",
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let grant_types: Vec<String> = row.get("grant_types");
            OAuthClient {
                client_id: row.get("client_id"),
                client_secret_hash: row.get("client_secret_hash"),
                is_public: row.get("is_public"),
                name: row.get("name"),
                redirect_uris: row.get("redirect_uris"),
                scopes: row.get("scopes"),
                grant_types: grant_types
                    .iter()
                    .filter_map(|g| GrantType::parse(g))
                    .collect(),
                access_token_valid_duration: i64::from(
                    row.get::<i32, _>("access_token_valid_duration"),
                ),
                refresh_token_valid_duration: i64::from(
                    row.get::<i32, _>("refresh_token_valid_duration"),
                ),
                authorization_code_valid_duration: i64::from(
                    row.get::<i32, _>("authorization_code_valid_duration"),
                ),
            }
        }))
    }

    async fn list_scopes(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT name FROM scopes ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get("name")).collect())
    }
}
