use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use shared::types::RawPublicKey;
use sqlx::{
    query,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Executor, Row, SqlitePool,
};

use super::{BindOutcome, PairingSession, Storage, User};
use crate::handlers::Error;

#[derive(Clone, Debug)]
pub struct Database {
    conn_pool: SqlitePool,
}

impl Database {
    pub async fn init(db_url: &str) -> Result<Self, Error> {
        let options = SqliteConnectOptions::from_str(db_url)?.create_if_missing(true);

        let conn_pool = SqlitePoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        tracing::info!(db_url, "connected to database");

        let db = Self { conn_pool };
        db.create_schema().await?;
        Ok(db)
    }

    /// A private database living in a single connection.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, Error> {
        let conn_pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { conn_pool };
        db.create_schema().await?;
        Ok(db)
    }

    async fn create_schema(&self) -> Result<(), Error> {
        let result = query("select value from metadata where key = 'schema_version'")
            .fetch_optional(&self.conn_pool)
            .await;

        // errors are matched, because the metadata table might not exist yet
        match result {
            Ok(Some(_)) => Ok(()),
            Err(_) | Ok(None) => {
                tracing::info!("creating database schema");

                let schema = include_str!("../schema/schema.sql");
                (&self.conn_pool).execute(schema).await?;

                query("insert into metadata (key, value) values ('schema_version', '1')")
                    .execute(&self.conn_pool)
                    .await?;

                Ok(())
            }
        }
    }

    fn user_from_row(row: &SqliteRow) -> Result<User, Error> {
        Ok(User {
            user_id: row.try_get("user_id")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
        })
    }

    fn pairing_from_row(row: &SqliteRow) -> Result<PairingSession, Error> {
        let pub_key: String = row.try_get("pub_key")?;
        let client_public_key: RawPublicKey = hex::decode(pub_key)
            .map_err(|_| Error::DatabaseTypeMismatch)?
            .try_into()
            .map_err(|_| Error::DatabaseTypeMismatch)?;

        Ok(PairingSession {
            session_id: row.try_get("cli_session_id")?,
            client_public_key,
            token_id: row.try_get("token_id")?,
            user_id: row.try_get("user_id")?,
            created: row.try_get("created")?,
        })
    }
}

#[async_trait]
impl Storage for Database {
    async fn create_user(&self, user: User) -> Result<(), Error> {
        let inserted = query(
            "insert into users (user_id, email, password_hash, created)
               values ($1, $2, $3, strftime('%s', 'now'))
               on conflict (email) do nothing",
        )
        .bind(&user.user_id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .execute(&self.conn_pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Err(Error::EmailTaken);
        }

        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        query("select user_id, email, password_hash from users where email = $1")
            .bind(email)
            .fetch_optional(&self.conn_pool)
            .await?
            .map(|row| Self::user_from_row(&row))
            .transpose()
    }

    async fn create_web_session(&self, web_session_id: &str, user_id: &str, created: i64) -> Result<(), Error> {
        query("insert into web_sessions (web_session_id, user_id, created) values ($1, $2, $3)")
            .bind(web_session_id)
            .bind(user_id)
            .bind(created)
            .execute(&self.conn_pool)
            .await?;

        Ok(())
    }

    async fn web_session_user(&self, web_session_id: &str) -> Result<Option<User>, Error> {
        query(
            "select users.user_id, users.email, users.password_hash from users
               join web_sessions on web_sessions.user_id = users.user_id
               where web_sessions.web_session_id = $1",
        )
        .bind(web_session_id)
        .fetch_optional(&self.conn_pool)
        .await?
        .map(|row| Self::user_from_row(&row))
        .transpose()
    }

    async fn bind_pairing(&self, pairing: PairingSession) -> Result<BindOutcome, Error> {
        // the first statement is a write, so concurrent binds queue up on the database lock
        // instead of both reading "not bound yet"
        let mut transaction = self.conn_pool.begin().await?;

        query("insert into access_tokens (token_id, user_id, created) values ($1, $2, $3)")
            .bind(&pairing.token_id)
            .bind(&pairing.user_id)
            .bind(pairing.created)
            .execute(&mut transaction)
            .await?;

        let inserted = query(
            "insert into cli_sessions (cli_session_id, token_id, user_id, pub_key, created)
               values ($1, $2, $3, $4, $5)
               on conflict (cli_session_id) do nothing",
        )
        .bind(&pairing.session_id)
        .bind(&pairing.token_id)
        .bind(&pairing.user_id)
        .bind(hex::encode(pairing.client_public_key))
        .bind(pairing.created)
        .execute(&mut transaction)
        .await?
        .rows_affected();

        if inserted == 0 {
            // already bound: drop the token we just wrote and report the stored session
            transaction.rollback().await?;

            let existing = self
                .find_pairing(&pairing.session_id)
                .await?
                .ok_or(Error::DatabaseTypeMismatch)?;

            return Ok(BindOutcome::Existing(existing));
        }

        transaction.commit().await?;
        Ok(BindOutcome::Created(pairing))
    }

    async fn find_pairing(&self, session_id: &str) -> Result<Option<PairingSession>, Error> {
        query(
            "select cli_session_id, token_id, user_id, pub_key, created from cli_sessions
               where cli_session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.conn_pool)
        .await?
        .map(|row| Self::pairing_from_row(&row))
        .transpose()
    }

    async fn access_tokens_for_user(&self, user_id: &str) -> Result<Vec<String>, Error> {
        let rows = query("select token_id from access_tokens where user_id = $1 order by created")
            .bind(user_id)
            .fetch_all(&self.conn_pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("token_id").map_err(Error::from))
            .collect()
    }

    async fn close(&self) {
        self.conn_pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn db_with_user() -> Database {
        let db = Database::in_memory().await.unwrap();
        db.create_user(User {
            user_id: "user-1".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
        })
        .await
        .unwrap();
        db
    }

    fn pairing(session_id: &str, token_id: &str) -> PairingSession {
        PairingSession {
            session_id: session_id.to_string(),
            client_public_key: [0x04; 65],
            token_id: token_id.to_string(),
            user_id: "user-1".to_string(),
            created: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn schema_creation_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        db.create_schema().await.unwrap();
        db.create_schema().await.unwrap();
    }

    #[tokio::test]
    async fn users_are_unique_by_email() {
        let db = db_with_user().await;

        let duplicate = db
            .create_user(User {
                user_id: "user-2".to_string(),
                email: "ada@example.com".to_string(),
                password_hash: "x".to_string(),
            })
            .await;
        assert!(matches!(duplicate, Err(Error::EmailTaken)));

        let user = db.find_user_by_email("ada@example.com").await.unwrap().unwrap();
        assert_eq!(user.user_id, "user-1");
        assert!(db.find_user_by_email("bob@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn web_sessions_resolve_to_users() {
        let db = db_with_user().await;
        db.create_web_session("web-1", "user-1", 1).await.unwrap();

        let user = db.web_session_user("web-1").await.unwrap().unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert!(db.web_session_user("web-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bind_then_find() {
        let db = db_with_user().await;

        let outcome = db.bind_pairing(pairing("abc123", "tok-001")).await.unwrap();
        assert_eq!(outcome, BindOutcome::Created(pairing("abc123", "tok-001")));

        let found = db.find_pairing("abc123").await.unwrap().unwrap();
        assert_eq!(found, pairing("abc123", "tok-001"));
        assert!(db.find_pairing("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_bind_observes_first() {
        let db = db_with_user().await;

        db.bind_pairing(pairing("abc123", "tok-001")).await.unwrap();
        let second = db.bind_pairing(pairing("abc123", "tok-002")).await.unwrap();

        assert_eq!(second, BindOutcome::Existing(pairing("abc123", "tok-001")));
        assert_eq!(db.access_tokens_for_user("user-1").await.unwrap(), vec!["tok-001"]);
    }

    #[tokio::test]
    async fn concurrent_binds_issue_one_token() {
        let db = db_with_user().await;

        let (a, b) = tokio::join!(
            db.bind_pairing(pairing("abc123", "tok-a")),
            db.bind_pairing(pairing("abc123", "tok-b")),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        let created = [&a, &b]
            .iter()
            .filter(|outcome| matches!(outcome, BindOutcome::Created(_)))
            .count();
        assert_eq!(created, 1);
        assert_eq!(a.session().token_id, b.session().token_id);
        assert_eq!(db.access_tokens_for_user("user-1").await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_binds_on_pooled_file_database_issue_one_token() {
        let path = std::env::temp_dir().join(format!("acme-bind-{}.db", crate::pairing::random_id().unwrap()));
        let db = Database::init(&format!("sqlite://{}", path.display())).await.unwrap();
        db.create_user(User {
            user_id: "user-1".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "x".to_string(),
        })
        .await
        .unwrap();

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let db = db.clone();
                tokio::spawn(async move { db.bind_pairing(pairing("abc123", &format!("tok-{i:02}"))).await })
            })
            .collect();

        let mut outcomes = Vec::new();
        for task in tasks {
            outcomes.push(task.await.unwrap().unwrap());
        }

        let created = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, BindOutcome::Created(_)))
            .count();
        let issued = db.access_tokens_for_user("user-1").await.unwrap();

        assert_eq!(created, 1);
        assert_eq!(issued.len(), 1);
        assert!(outcomes.iter().all(|outcome| outcome.session().token_id == issued[0]));

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }
}
