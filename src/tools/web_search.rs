//! web_search 工具：网页检索，返回少量排序后的链接
//!
//! 请求 DuckDuckGo 的 HTML 端点（无需 API Key），用正则抽取结果链接，
//! 解开跳转链接中的 uddg 参数得到真实 URL，标题经 html2text 去标签。
//! 同一查询在进程内缓存（有上限，先进先出淘汰；空结果不缓存），避免重复请求。

use std::collections::{HashMap, VecDeque};
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, Url};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::config::SearchSection;
use crate::tools::schema::args_schema;
use crate::tools::{Tool, ToolContext};

pub const WEB_SEARCH_TOOL_NAME: &str = "web_search";

/// 缓存的查询条数上限
const CACHE_CAPACITY: usize = 128;

static ANCHOR_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a([^>]*class="[^"]*result__a[^"]*"[^>]*)>(.*?)</a>"#).ok()
});
static HREF_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r#"href="([^"]+)""#).ok());
static TAG_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<[^>]*>").ok());

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// 单条检索结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchArgs {
    /// 检索关键词，例如 "bakery landing page design inspiration"
    pub query: String,
}

/// 把跳转链接还原为目标 URL：`//duckduckgo.com/l/?uddg=<encoded>` -> `<decoded>`
fn resolve_href(href: &str) -> Option<String> {
    let href = href.replace("&amp;", "&");
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href
    };
    let url = Url::parse(&absolute).ok()?;
    let target = url
        .query_pairs()
        .find(|(k, _)| k == "uddg")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| url.to_string());
    (target.starts_with("http://") || target.starts_with("https://")).then_some(target)
}

/// 去掉 <b> 等内联标签后交给 html2text 解码实体
fn clean_title(raw: &str, tag_re: &Regex) -> String {
    let stripped = tag_re.replace_all(raw, "");
    match html2text::from_read(stripped.as_bytes(), 200) {
        Ok(text) => text.split_whitespace().collect::<Vec<_>>().join(" "),
        Err(_) => stripped.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

/// 从结果页 HTML 中抽取至多 max 条结果（去重，保持页面顺序）
pub fn parse_results(html: &str, max: usize) -> Vec<SearchHit> {
    let (Some(anchor), Some(href_re), Some(tag_re)) =
        (ANCHOR_RE.as_ref(), HREF_RE.as_ref(), TAG_RE.as_ref())
    else {
        return Vec::new();
    };
    let mut hits: Vec<SearchHit> = Vec::new();
    for cap in anchor.captures_iter(html) {
        if hits.len() >= max {
            break;
        }
        let Some(href) = href_re.captures(&cap[1]).map(|h| h[1].to_string()) else {
            continue;
        };
        let Some(url) = resolve_href(&href) else {
            continue;
        };
        if hits.iter().any(|h| h.url == url) {
            continue;
        }
        hits.push(SearchHit {
            title: clean_title(&cap[2], tag_re),
            url,
        });
    }
    hits
}

/// 查询 -> 结果的有界缓存，超出容量时淘汰最早写入的查询
#[derive(Debug)]
struct SearchCache {
    entries: HashMap<String, Vec<SearchHit>>,
    order: VecDeque<String>,
    capacity: usize,
}

impl SearchCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn get(&self, query: &str) -> Option<&Vec<SearchHit>> {
        self.entries.get(query)
    }

    /// 空结果（多半是被限流或拦截）不写入，下次重新请求
    fn insert(&mut self, query: &str, hits: &[SearchHit]) {
        if hits.is_empty() {
            return;
        }
        if self.entries.insert(query.to_string(), hits.to_vec()).is_none() {
            self.order.push_back(query.to_string());
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }
}

/// 检索工具：端点、结果条数、超时由 [tools.search] 配置决定
pub struct WebSearchTool {
    client: Client,
    endpoint: String,
    max_results: usize,
    cache: RwLock<SearchCache>,
}

impl WebSearchTool {
    pub fn new(cfg: &SearchSection) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: cfg.endpoint.clone(),
            max_results: cfg.max_results,
            cache: RwLock::new(SearchCache::new(CACHE_CAPACITY)),
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, String> {
        if let Some(hits) = self.cache.read().await.get(query) {
            tracing::debug!(query = %query, "web_search cache hit");
            return Ok(hits.clone());
        }

        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body = resp.text().await.map_err(|e| format!("Read body: {}", e))?;
        let hits = parse_results(&body, self.max_results);

        if hits.is_empty() {
            tracing::warn!(query = %query, "web_search returned no results");
        }
        self.cache.write().await.insert(query, &hits);
        Ok(hits)
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        WEB_SEARCH_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search the web and return the top result links as [{\"title\", \"url\"}]. Args: {\"query\": \"...\"}."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<SearchArgs>()
    }

    async fn execute(&self, args: Value, ctx: &mut ToolContext<'_>) -> Result<Value, String> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim();
        if query.is_empty() {
            return Err("Missing query".to_string());
        }
        tracing::info!(agent = ctx.agent_name, query = %query, "web_search");
        let hits = self.search(query).await?;
        serde_json::to_value(hits).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<div class="result">
  <h2 class="result__title">
    <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fdribbble.com%2Fshots%2Fbakery&amp;rut=abc">Bakery <b>Landing</b> Page</a>
  </h2>
</div>
<div class="result">
  <a rel="nofollow" class="result__a" href="https://colorhunt.co/palettes/warm">Warm &amp; cozy palettes</a>
</div>
<div class="result">
  <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fdribbble.com%2Fshots%2Fbakery&amp;rut=def">Duplicate</a>
</div>
<a class="result__snippet" href="https://ignored.example">snippet</a>
<a rel="nofollow" class="result__a" href="/relative/only">Broken</a>
"#;

    #[test]
    fn test_parse_results_decodes_redirects() {
        let hits = parse_results(PAGE, 5);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://dribbble.com/shots/bakery");
        assert_eq!(hits[0].title, "Bakery Landing Page");
        assert_eq!(hits[1].url, "https://colorhunt.co/palettes/warm");
        assert_eq!(hits[1].title, "Warm & cozy palettes");
    }

    #[test]
    fn test_parse_results_respects_max() {
        let hits = parse_results(PAGE, 1);
        assert_eq!(hits.len(), 1);
    }

    fn hit(url: &str) -> Vec<SearchHit> {
        vec![SearchHit {
            title: "t".into(),
            url: url.into(),
        }]
    }

    #[test]
    fn test_cache_skips_empty_results() {
        let mut cache = SearchCache::new(4);
        cache.insert("bakery", &[]);
        assert!(cache.get("bakery").is_none());
        cache.insert("bakery", &hit("https://a.example"));
        assert_eq!(cache.get("bakery"), Some(&hit("https://a.example")));
    }

    #[test]
    fn test_cache_evicts_oldest_query() {
        let mut cache = SearchCache::new(2);
        cache.insert("a", &hit("https://a.example"));
        cache.insert("b", &hit("https://b.example"));
        // 覆盖已有查询不改变淘汰顺序
        cache.insert("a", &hit("https://a2.example"));
        cache.insert("c", &hit("https://c.example"));
        assert_eq!(cache.entries.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_resolve_href_plain_link() {
        assert_eq!(
            resolve_href("https://example.com/a?b=1").as_deref(),
            Some("https://example.com/a?b=1")
        );
        assert!(resolve_href("not a url").is_none());
    }
}
