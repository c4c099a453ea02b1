//! 文本辅助：按字符截断、JSON 块提取

/// 按字符数截断；超出时追加 suffix
pub fn truncate_chars(s: &str, max_chars: usize, suffix: &str) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push_str(suffix);
    out
}

/// 从 LLM 输出中提取 JSON 块（```json ... ``` 或首个 { / [ 到对应的最后一个 } / ]）
pub fn extract_json_block(output: &str) -> Option<&str> {
    let trimmed = output.trim();

    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        let body = rest.find("```").map(|end| &rest[..end]).unwrap_or(rest);
        return Some(body.trim());
    }

    let obj = trimmed.find('{');
    let arr = trimmed.find('[');
    let (start, close) = match (obj, arr) {
        (Some(o), Some(a)) if a < o => (a, ']'),
        (Some(o), _) => (o, '}'),
        (None, Some(a)) => (a, ']'),
        (None, None) => return None,
    };
    let end = trimmed.rfind(close)?;
    if end < start {
        return None;
    }
    Some(&trimmed[start..=end])
}
