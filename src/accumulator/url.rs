//! URL 规范化与来源分级
//!
//! 规范化结果作为 URL 缓存的键：同一页面的不同写法（大小写、www、片段、跟踪参数、尾部斜杠）映射到同一个键。

use thiserror::Error;
use url::Url;

use crate::model::TrustTier;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UrlError {
    #[error("Empty URL")]
    Empty,

    #[error("Invalid URL {url}: {reason}")]
    Invalid { url: String, reason: String },

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
}

/// 跟踪类查询参数，规范化时丢弃
fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || key == "fbclid" || key == "gclid"
}

/// 规范化 URL：补 https、小写 host、去 www.、去片段、去跟踪参数、排序查询参数、去尾部斜杠
pub fn normalize_url(raw: &str) -> Result<String, UrlError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let invalid = |reason: String| UrlError::Invalid {
        url: trimmed.to_string(),
        reason,
    };

    let mut url = Url::parse(&with_scheme).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlError::UnsupportedScheme(other.to_string())),
    }
    url.set_fragment(None);

    let host = url
        .host_str()
        .ok_or_else(|| invalid("missing host".to_string()))?
        .to_lowercase();
    if let Some(bare) = host.strip_prefix("www.") {
        let bare = bare.to_string();
        url.set_host(Some(&bare)).map_err(|e| invalid(e.to_string()))?;
    }

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();
    url.set_query(None);
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs.iter());
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    Ok(url.to_string())
}

/// 从（已规范化的）URL 取 host
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

/// 按域名列表给来源分级；子域名继承父域名的等级
#[derive(Debug, Clone, Default)]
pub struct TrustPolicy {
    official: Vec<String>,
    community: Vec<String>,
}

impl TrustPolicy {
    pub fn new(official: Vec<String>, community: Vec<String>) -> Self {
        let lower = |v: Vec<String>| v.into_iter().map(|d| d.trim().to_lowercase()).collect();
        Self {
            official: lower(official),
            community: lower(community),
        }
    }

    pub fn classify(&self, url: &str) -> TrustTier {
        let Some(host) = host_of(url) else {
            return TrustTier::Unverified;
        };
        let matches = |domains: &[String]| {
            domains
                .iter()
                .any(|d| host == *d || host.ends_with(&format!(".{d}")))
        };
        if matches(&self.official) {
            TrustTier::Official
        } else if matches(&self.community) {
            TrustTier::Community
        } else {
            TrustTier::Unverified
        }
    }
}
