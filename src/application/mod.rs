//! 应用层：业务编排
//!
//! 消息路由与运行循环

pub mod bot;
pub mod router;
