//! 脚本化 LLM 客户端（用于测试，无需 API）
//!
//! 按顺序返回预设回复；每次调用按字符估算累加 token，便于测试成本计算。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, Message, TokenEstimator};

/// 预设回复队列；队列耗尽后返回 Err，模拟服务不可用
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<Result<String, String>>>,
    calls: AtomicUsize,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    /// 最近一次调用收到的消息
    last_messages: Mutex<Vec<Message>>,
}

impl ScriptedLlmClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            ..Self::default()
        }
    }

    /// 追加一次失败回复
    pub fn then_fail(self, err: impl Into<String>) -> Self {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(Err(err.into()));
        }
        self
    }

    /// 追加一次成功回复
    pub fn then_reply(self, reply: impl Into<String>) -> Self {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(Ok(reply.into()));
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Vec<Message> {
        self.last_messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_messages.lock() {
            *last = messages.to_vec();
        }
        let next = self
            .replies
            .lock()
            .map_err(|_| "mock poisoned".to_string())?
            .pop_front()
            .unwrap_or_else(|| Err("no scripted reply left".to_string()));

        let prompt: usize = messages
            .iter()
            .map(|m| TokenEstimator::estimate(&m.content))
            .sum();
        self.prompt_tokens.fetch_add(prompt as u64, Ordering::SeqCst);
        if let Ok(reply) = &next {
            self.completion_tokens
                .fetch_add(TokenEstimator::estimate(reply) as u64, Ordering::SeqCst);
        }
        next
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        let p = self.prompt_tokens.load(Ordering::SeqCst);
        let c = self.completion_tokens.load(Ordering::SeqCst);
        (p, c, p + c)
    }
}
