//! 生成中继模块
//!
//! 图片生成和文本生成共用同一条密钥校验链，
//! 上游响应被归一化为 `{ ok, ... }` 信封。

mod handlers;
mod router;
mod service;
pub mod types;


pub use router::{GenerationState, create_generation_router};
