//! 核心层：配置和通用能力抽象
//!
//! 包含进程配置、存储接口、消息平台接口和文本生成后端接口

pub mod backend;
pub mod config;
pub mod messaging;
pub mod store;
