//! 数据中继模块
//!
//! Input: 共享密钥、目标 URL、白名单配置
//! Output: 上游响应（状态码、content-type、原始字节）
//! Pos: 金融数据源（CSV/RSS/JSON/HTML）转发层
//!
//! # 功能
//! - 共享密钥校验
//! - 目标主机白名单（精确匹配 + 后缀匹配）
//! - 带截止时间的单次出站请求
//! - 诊断信息端点

mod handlers;
mod middleware;
pub mod policy;
mod router;


pub use middleware::{RelayState, cors_layer, request_span};
pub use router::create_relay_router;
