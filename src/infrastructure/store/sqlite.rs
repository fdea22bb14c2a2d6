//! SQLite 存储实现
//!
//! 每条轮次一行，追加后立即删除超出上限的旧行

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};

use crate::core::store::HistoryStore;
use crate::domain::{ConversationId, ConversationTurn, Role};
use crate::errors::{RelayError, Result};

/// SQLite 历史存储
pub struct SqliteHistoryStore {
    conn: Arc<Mutex<Connection>>,
    limit: usize,
}

impl SqliteHistoryStore {
    /// 打开或创建数据库文件
    ///
    /// 文件不是合法的 SQLite 数据库时返回 `HistoryLoad`
    pub fn new<P: AsRef<Path>>(db_path: P, limit: usize) -> Result<Self> {
        let conn = Connection::open(db_path)
            .map_err(|e| RelayError::HistoryLoad(format!("cannot open database: {}", e)))?;
        Self::with_connection(conn, limit)
    }

    /// 创建内存数据库（用于测试）
    pub fn new_in_memory(limit: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, limit)
    }

    fn with_connection(conn: Connection, limit: usize) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            limit,
        };
        store
            .init_schema()
            .map_err(|e| RelayError::HistoryLoad(format!("cannot initialise schema: {}", e)))?;
        store
            .check_rows()
            .map_err(|e| RelayError::HistoryLoad(format!("unreadable history rows: {}", e)))?;
        Ok(store)
    }

    /// 初始化数据库表结构
    fn init_schema(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RelayError::Storage(format!("Failed to acquire database lock: {}", e)))?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id INTEGER NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_turns_conversation ON turns(conversation_id, id);
            ",
        )?;

        Ok(())
    }

    /// 启动时检查已有数据中是否存在未知角色
    fn check_rows(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RelayError::Storage(format!("Failed to acquire database lock: {}", e)))?;

        let bad_role: Option<String> = conn
            .query_row(
                "SELECT role FROM turns WHERE role NOT IN ('system', 'user', 'assistant') LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match bad_role {
            Some(role) => Err(RelayError::HistoryLoad(format!("unknown role: {}", role))),
            None => Ok(()),
        }
    }

    /// 在阻塞线程池中执行数据库操作
    async fn execute<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                RelayError::Storage(format!("Failed to acquire database lock: {}", e))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| RelayError::Storage(format!("Task failed: {}", e)))?
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn append(&self, conversation: ConversationId, turn: ConversationTurn) -> Result<()> {
        let limit = self.limit as i64;
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO turns (conversation_id, role, content) VALUES (?1, ?2, ?3)",
                rusqlite::params![conversation, turn.role.as_str(), &turn.content],
            )?;
            tx.execute(
                "DELETE FROM turns
                 WHERE conversation_id = ?1
                   AND id NOT IN (
                       SELECT id FROM turns
                       WHERE conversation_id = ?1
                       ORDER BY id DESC
                       LIMIT ?2
                   )",
                rusqlite::params![conversation, limit],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get(&self, conversation: ConversationId) -> Result<Vec<ConversationTurn>> {
        let limit = self.limit as i64;
        self.execute(move |conn| {
            // 上限变小后，库里可能残留多于上限的旧行，这里只取最新的 limit 条
            let mut stmt = conn.prepare(
                "SELECT role, content FROM (
                     SELECT id, role, content FROM turns
                     WHERE conversation_id = ?1
                     ORDER BY id DESC
                     LIMIT ?2
                 ) ORDER BY id ASC",
            )?;

            let rows = stmt.query_map(rusqlite::params![conversation, limit], |row| {
                let role: String = row.get(0)?;
                let content: String = row.get(1)?;
                Ok((role, content))
            })?;

            let mut turns = Vec::new();
            for row in rows {
                let (role, content) = row?;
                let role: Role = role.parse().map_err(RelayError::Storage)?;
                turns.push(ConversationTurn::new(role, content));
            }
            Ok(turns)
        })
        .await
    }

    fn limit(&self) -> usize {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_append_and_get() {
        let store = SqliteHistoryStore::new_in_memory(15).unwrap();
        store.append(1, ConversationTurn::user("hi")).await.unwrap();
        store
            .append(1, ConversationTurn::assistant("hello"))
            .await
            .unwrap();

        let turns = store.get(1).await.unwrap();
        assert_eq!(
            turns,
            vec![ConversationTurn::user("hi"), ConversationTurn::assistant("hello")]
        );
    }

    #[tokio::test]
    async fn test_sqlite_evicts_oldest() {
        let store = SqliteHistoryStore::new_in_memory(3).unwrap();
        for i in 1..=5 {
            store
                .append(9, ConversationTurn::user(format!("t{}", i)))
                .await
                .unwrap();
        }

        let contents: Vec<_> = store
            .get(9)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.content)
            .collect();
        assert_eq!(contents, vec!["t3", "t4", "t5"]);
    }

    #[tokio::test]
    async fn test_sqlite_unknown_conversation() {
        let store = SqliteHistoryStore::new_in_memory(15).unwrap();
        assert!(store.get(42).await.unwrap().is_empty());
    }
}
