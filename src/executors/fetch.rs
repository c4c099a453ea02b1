//! 单 URL 抓取执行器
//!
//! GET 请求带超时与 User-Agent；HTML 响应用 html2text 提取可读文本（失败时退回简易去标签），
//! 并从 <title> 取页面标题；正文超过 max_result_chars 时截断并追加 ...[truncated]。
//! 4xx（408 / 429 除外）视为永久失败，其余网络与服务端错误可重试。

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use html2text::from_read;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{Client, StatusCode};

use crate::executors::{ExecutorError, ExecutorOutput, FetchedDocument, UrlFetcher};
use crate::text::truncate_chars;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

pub struct HttpFetcher {
    client: Client,
    max_result_chars: usize,
}

/// 简易去除 HTML 标签（html2text 失败时的回退）
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 判断内容是否像 HTML（需提取可读文本）
fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with("<!")
        || s.starts_with("<html")
        || s.starts_with("<HTML")
        || (s.len() > 20
            && s.contains('<')
            && (s.contains("</") || s.contains("<meta") || s.contains("<head") || s.contains("<title")))
}

fn extract_title(html: &str) -> Option<String> {
    static TITLE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = TITLE
        .get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").ok())
        .as_ref()?;
    let title = re.captures(html)?.get(1)?.as_str();
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

/// HTTP 状态码是否值得重试
fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64, max_result_chars: usize) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .unwrap_or_default();
        Self {
            client,
            max_result_chars,
        }
    }

    /// 将 HTML 转为可读文本
    fn html_to_text(html: &str) -> String {
        match from_read(html.as_bytes(), 120) {
            Ok(text) if !text.trim().is_empty() => text,
            _ => strip_html_tags(html),
        }
    }

    fn to_document(&self, body: String) -> FetchedDocument {
        let body = body.strip_prefix('\u{FEFF}').map(str::to_string).unwrap_or(body);
        let (title, text) = if looks_like_html(&body) {
            (extract_title(&body), Self::html_to_text(&body))
        } else {
            (None, body)
        };
        FetchedDocument {
            title,
            text: truncate_chars(&text, self.max_result_chars, "\n...[truncated]"),
        }
    }
}

#[async_trait]
impl UrlFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<ExecutorOutput<FetchedDocument>, ExecutorError> {
        tracing::info!(url = %url, "fetching url");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ExecutorError::transient(format!("Request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            let msg = format!("HTTP {status}");
            return Err(if is_retryable_status(status) {
                ExecutorError::transient(msg)
            } else {
                ExecutorError::permanent(msg)
            });
        }
        let body = resp
            .text()
            .await
            .map_err(|e| ExecutorError::transient(format!("Read body: {e}")))?;
        Ok(ExecutorOutput::free(self.to_document(body)))
    }
}
