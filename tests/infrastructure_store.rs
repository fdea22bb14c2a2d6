//! 持久化存储测试（JSON 文件与 SQLite）

use chatrelay::{
    ConversationTurn, HistoryStore, JsonHistoryStore, JsonPromptStore, PromptStore, PromptUpdate,
    RelayError, SqliteHistoryStore,
};
use tempfile::tempdir;

fn write(path: &std::path::Path, contents: &str) {
    std::fs::write(path, contents).unwrap();
}

#[tokio::test]
async fn test_prompt_store_load_and_effective_prompt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("prompts.json");
    write(&path, r#"{"default": "Be helpful."}"#);

    let store = JsonPromptStore::load(&path).await.unwrap();
    assert_eq!(store.effective_prompt().await, "Be helpful.");

    write(&path, r#"{"default": "Be helpful.", "admin_prompt": "Be rude."}"#);
    let store = JsonPromptStore::load(&path).await.unwrap();
    assert_eq!(store.effective_prompt().await, "Be rude.");
}

#[tokio::test]
async fn test_prompt_store_persists_admin_prompt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("prompts.json");
    write(&path, r#"{"default": "Be helpful.", "admin_prompt": null}"#);

    let store = JsonPromptStore::load(&path).await.unwrap();
    let outcome = store.set_admin_prompt("  Reply in French. ").await.unwrap();
    assert_eq!(outcome, PromptUpdate::Applied("Reply in French.".to_string()));

    // 重新加载后仍然生效
    let reloaded = JsonPromptStore::load(&path).await.unwrap();
    let config = reloaded.config().await;
    assert_eq!(config.default_prompt, "Be helpful.");
    assert_eq!(config.admin_prompt.as_deref(), Some("Reply in French."));

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(
        raw,
        serde_json::json!({"default": "Be helpful.", "admin_prompt": "Reply in French."})
    );
}

#[tokio::test]
async fn test_prompt_store_empty_update_does_not_touch_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("prompts.json");
    let original = r#"{"default": "Be helpful."}"#;
    write(&path, original);

    let store = JsonPromptStore::load(&path).await.unwrap();
    let outcome = store.set_admin_prompt("   ").await.unwrap();

    assert_eq!(outcome, PromptUpdate::RejectedEmpty);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
}

#[tokio::test]
async fn test_prompt_store_malformed_file_is_fatal() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("prompts.json");

    write(&path, "{ not json");
    let result = JsonPromptStore::load(&path).await;
    assert!(matches!(result, Err(RelayError::ConfigLoad(_))));

    write(&path, r#"{"admin_prompt": "only"}"#);
    let result = JsonPromptStore::load(&path).await;
    assert!(matches!(result, Err(RelayError::ConfigLoad(_))));
}

#[tokio::test]
async fn test_prompt_store_write_failure_propagates() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("prompts.json");
    write(&path, r#"{"default": "Be helpful."}"#);

    let store = JsonPromptStore::load(&path).await.unwrap();
    // 目录被删除后写入失败
    drop(dir);

    let result = store.set_admin_prompt("new").await;
    assert!(matches!(result, Err(RelayError::Storage(_))));
    assert!(store.config().await.admin_prompt.is_none());
}

#[tokio::test]
async fn test_json_history_persists_every_append() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("history.json");

    let store = JsonHistoryStore::load(&path, 15).await.unwrap();
    store.append(42, ConversationTurn::user("hi")).await.unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(
        raw,
        serde_json::json!({"42": [{"role": "user", "content": "hi"}]})
    );

    store
        .append(42, ConversationTurn::assistant("hello"))
        .await
        .unwrap();

    let reloaded = JsonHistoryStore::load(&path, 15).await.unwrap();
    assert_eq!(
        reloaded.get(42).await.unwrap(),
        vec![ConversationTurn::user("hi"), ConversationTurn::assistant("hello")]
    );
}

#[tokio::test]
async fn test_json_history_sixteenth_turn_evicts_first() {
    let dir = tempdir().unwrap();
    let store = JsonHistoryStore::load(dir.path().join("history.json"), 15)
        .await
        .unwrap();

    for i in 1..=15 {
        store
            .append(1, ConversationTurn::user(format!("t{}", i)))
            .await
            .unwrap();
    }
    store.append(1, ConversationTurn::user("t16")).await.unwrap();

    let contents: Vec<String> = store
        .get(1)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.content)
        .collect();
    let expected: Vec<String> = (2..=16).map(|i| format!("t{}", i)).collect();
    assert_eq!(contents, expected);
}

#[tokio::test]
async fn test_json_history_unknown_conversation() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("history.json");
    write(&path, r#"{"7": [{"role": "user", "content": "x"}]}"#);

    let store = JsonHistoryStore::load(&path, 15).await.unwrap();
    assert!(store.get(42).await.unwrap().is_empty());
    assert_eq!(store.get(7).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_json_history_malformed_file_is_fatal() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("history.json");

    write(&path, "[1, 2, 3]");
    let result = JsonHistoryStore::load(&path, 15).await;
    assert!(matches!(result, Err(RelayError::HistoryLoad(_))));

    write(&path, r#"{"1": [{"role": "wizard", "content": "x"}]}"#);
    let result = JsonHistoryStore::load(&path, 15).await;
    assert!(matches!(result, Err(RelayError::HistoryLoad(_))));
}

#[tokio::test]
async fn test_sqlite_history_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("history.db");

    {
        let store = SqliteHistoryStore::new(&path, 15).unwrap();
        store.append(-5, ConversationTurn::user("hi")).await.unwrap();
        store
            .append(-5, ConversationTurn::assistant("hey"))
            .await
            .unwrap();
    }

    let store = SqliteHistoryStore::new(&path, 15).unwrap();
    assert_eq!(
        store.get(-5).await.unwrap(),
        vec![ConversationTurn::user("hi"), ConversationTurn::assistant("hey")]
    );
}

#[tokio::test]
async fn test_sqlite_history_invalid_file_is_fatal() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("history.db");
    write(&path, &"this is not a sqlite database\n".repeat(100));

    let result = SqliteHistoryStore::new(&path, 15);
    assert!(matches!(result, Err(RelayError::HistoryLoad(_))));
}
