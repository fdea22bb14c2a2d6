//! 管理员授权

use std::collections::HashSet;

use tracing::warn;

/// 用户标识（Telegram user id）
pub type UserId = i64;

/// 允许修改提示词的管理员集合，启动时加载，进程内不可变
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminSet {
    ids: HashSet<UserId>,
}

impl AdminSet {
    pub fn new(ids: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    /// 解析逗号分隔的 ID 列表，无法解析的条目会被跳过
    pub fn parse(raw: &str) -> Self {
        let ids = raw
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .filter_map(|entry| match entry.parse::<UserId>() {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!(entry, "ignoring unparsable admin id");
                    None
                }
            });
        Self::new(ids)
    }

    /// 精确匹配
    pub fn is_authorized(&self, identity: UserId) -> bool {
        self.ids.contains(&identity)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
