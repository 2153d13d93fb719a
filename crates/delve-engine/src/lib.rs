use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use delve_contracts::research::{ResearchResult, SearchResult};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use reqwest::blocking::Client as HttpClient;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value};
use thiserror::Error;
use url::Url;

pub const DEFAULT_API_BASE: &str = "http://localhost:11434";
pub const DEFAULT_RESEARCH_MODEL: &str = "deepseek-r1:8b";
pub const DEFAULT_VISION_MODEL: &str = "gemma3:4b";

/// Fixed prompt the image tool submits alongside the encoded image.
pub const DESCRIBE_PROMPT: &str = "Please describe this image in detail. Focus on the main \
     subjects, colors, composition, and any notable elements.";

const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const SCRAPE_TIMEOUT: Duration = Duration::from_secs(10);
const SCRAPE_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const MAX_EXTRACT_CHARS: usize = 5000;
const MAX_IMAGE_DIMENSION: u32 = 1024;
const JPEG_QUALITY: u8 = 85;

/// Failure of a single generation call. The pipeline never aborts on one of
/// these; the orchestrator records `to_string()` in place of generated text,
/// so every variant renders with the `Error: …` shape degraded output uses.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Error: request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Error: {endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("Error: generation response missing \"response\" field")]
    MissingResponse,
}

/// Single-shot prompt completion against a language or vision-language
/// model. One blocking request per call, no retry.
pub trait Generator: Send + Sync {
    fn generate(&self, prompt: &str, images: &[String]) -> Result<String, GenerateError>;
}

/// Ranked title/url/snippet triples for a query, at most `max_results`.
pub trait SearchProvider: Send + Sync {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>>;
}

/// Bounded plain-text excerpt of the page behind a URL.
pub trait PageExtractor: Send + Sync {
    fn extract(&self, url: &str) -> Result<String>;
}

/// Blocking client for a local Ollama-compatible `/api/generate` endpoint.
///
/// Built without a request timeout: a long completion on a slow model can
/// legitimately take minutes, and the contract is to wait it out.
pub struct OllamaClient {
    endpoint: String,
    model: String,
    http: HttpClient,
}

impl OllamaClient {
    pub fn new(api_base: &str, model: &str) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(None)
            .build()
            .context("failed to build generation HTTP client")?;
        Ok(Self {
            endpoint: format!("{}/api/generate", api_base.trim_end_matches('/')),
            model: model.to_string(),
            http,
        })
    }
}

impl Generator for OllamaClient {
    fn generate(&self, prompt: &str, images: &[String]) -> Result<String, GenerateError> {
        let mut payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        if !images.is_empty() {
            payload["images"] = Value::Array(
                images
                    .iter()
                    .map(|encoded| Value::String(encoded.clone()))
                    .collect(),
            );
        }

        let response = self
            .http
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .map_err(|source| GenerateError::Transport {
                endpoint: self.endpoint.clone(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GenerateError::Status {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
                body: truncate_text(&body, 512),
            });
        }
        let payload: Value = response.json().map_err(|source| GenerateError::Transport {
            endpoint: self.endpoint.clone(),
            source,
        })?;
        payload
            .get("response")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(GenerateError::MissingResponse)
    }
}

/// Web search against the DuckDuckGo HTML endpoint. No API key, no
/// pagination; result links arrive as `uddg` redirect URLs and are decoded
/// back to their targets.
pub struct DuckDuckGo {
    http: HttpClient,
}

impl DuckDuckGo {
    pub fn new() -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(SCRAPE_TIMEOUT)
            .user_agent(SCRAPE_USER_AGENT)
            .build()
            .context("failed to build search HTTP client")?;
        Ok(Self { http })
    }
}

impl SearchProvider for DuckDuckGo {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let response = self
            .http
            .get(SEARCH_ENDPOINT)
            .query(&[("q", query)])
            .send()
            .with_context(|| format!("search request failed ({SEARCH_ENDPOINT})"))?;
        if !response.status().is_success() {
            bail!("search returned HTTP {}", response.status().as_u16());
        }
        let body = response.text().context("failed reading search response")?;
        Ok(parse_search_results(&body, max_results))
    }
}

fn parse_search_results(html: &str, max_results: usize) -> Vec<SearchResult> {
    let document = Html::parse_document(html);
    let result_selector = Selector::parse("div.result").unwrap();
    let title_selector = Selector::parse("a.result__a").unwrap();
    let snippet_selector = Selector::parse(".result__snippet").unwrap();

    let mut results = Vec::new();
    for element in document.select(&result_selector) {
        if results.len() >= max_results {
            break;
        }
        if element.value().classes().any(|class| class == "result--ad") {
            continue;
        }
        let Some(title_link) = element.select(&title_selector).next() else {
            continue;
        };
        let title = collapse_whitespace(&title_link.text().collect::<Vec<_>>().join(" "));
        let Some(url) = title_link
            .value()
            .attr("href")
            .and_then(resolve_result_url)
        else {
            continue;
        };
        if title.is_empty() {
            continue;
        }
        let snippet = element
            .select(&snippet_selector)
            .next()
            .map(|snippet| collapse_whitespace(&snippet.text().collect::<Vec<_>>().join(" ")))
            .unwrap_or_default();
        results.push(SearchResult::new(title, url, snippet));
    }
    results
}

/// DuckDuckGo wraps result links in a `/l/?uddg=<target>` redirect, usually
/// protocol-relative. Unwrap to the target URL; pass direct links through.
fn resolve_result_url(href: &str) -> Option<String> {
    let absolute = if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        href.to_string()
    };
    let parsed = Url::parse(&absolute).ok()?;
    if parsed
        .domain()
        .is_some_and(|domain| domain.ends_with("duckduckgo.com"))
    {
        return parsed
            .query_pairs()
            .find(|(key, _)| key == "uddg")
            .map(|(_, target)| target.into_owned());
    }
    Some(absolute)
}

/// Fetches a page and reduces it to a bounded plain-text excerpt of its
/// headings and paragraphs.
pub struct WebExtractor {
    http: HttpClient,
}

impl WebExtractor {
    pub fn new() -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(SCRAPE_TIMEOUT)
            .user_agent(SCRAPE_USER_AGENT)
            .build()
            .context("failed to build scrape HTTP client")?;
        Ok(Self { http })
    }
}

impl PageExtractor for WebExtractor {
    fn extract(&self, url: &str) -> Result<String> {
        let response = self
            .http
            .get(url)
            .send()
            .with_context(|| format!("request failed ({url})"))?;
        if !response.status().is_success() {
            bail!("{url} returned HTTP {}", response.status().as_u16());
        }
        let body = response
            .text()
            .with_context(|| format!("failed reading body ({url})"))?;
        Ok(extract_readable_text(&body))
    }
}

fn extract_readable_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let content_selector = Selector::parse("p, h1, h2, h3, h4, h5, h6").unwrap();

    let mut pieces = Vec::new();
    for element in document.select(&content_selector) {
        if inside_page_chrome(element) {
            continue;
        }
        let text = element.text().collect::<Vec<_>>().join(" ");
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            pieces.push(trimmed.to_string());
        }
    }
    let collapsed = collapse_whitespace(&pieces.join(" "));
    collapsed.chars().take(MAX_EXTRACT_CHARS).collect()
}

/// Headings and paragraphs under navigation, footer, or header markup are
/// boilerplate, not content.
fn inside_page_chrome(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| {
            matches!(
                ancestor.value().name(),
                "script" | "style" | "nav" | "footer" | "header"
            )
        })
}

fn web_context(web_results: &[SearchResult]) -> String {
    let mut context = String::from("\n\nWeb Search Results:\n");
    for (idx, result) in web_results.iter().enumerate() {
        context.push_str(&format!("\n{}. {}\n", idx + 1, result.title));
        context.push_str(&format!("   URL: {}\n", result.url));
        context.push_str(&format!("   Summary: {}\n", result.snippet));
    }
    context
}

fn research_prompt(question: &str, web_results: &[SearchResult]) -> String {
    format!(
        "You are a research assistant tasked with providing a comprehensive analysis \
of the following question:\n\n{question}\n{context}\n\nPlease provide a detailed response that includes:\n\
1. Key concepts and definitions\n\
2. Historical context (if relevant)\n\
3. Current state of knowledge\n\
4. Different perspectives or viewpoints\n\
5. Supporting evidence and examples\n\
6. Potential implications\n\
7. Areas for further research\n\
8. Citations and sources (include URLs from the web results)\n\n\
Structure your response in a clear, academic format with appropriate sections and subsections.",
        context = web_context(web_results),
    )
}

fn analysis_prompt(question: &str, previous_response: &str, web_results: &[SearchResult]) -> String {
    format!(
        "Based on the following research question, initial response, and web search results, \
provide a deeper analysis:\n\nQuestion: {question}\n\nInitial Response:\n{previous_response}\n\
{context}\n\nPlease provide:\n\
1. Critical analysis of the information presented\n\
2. Identification of any gaps or limitations\n\
3. Connections to related fields or concepts\n\
4. Practical applications or implications\n\
5. Recommendations for further investigation\n\
6. Fact-checking against web sources\n\
7. Additional insights from web sources",
        context = web_context(web_results),
    )
}

fn synthesis_prompt(
    question: &str,
    initial_research: &str,
    analysis: &[String],
    web_results: &[SearchResult],
) -> Result<String> {
    let analysis_json =
        serde_json::to_string_pretty(analysis).context("failed serializing analysis passes")?;
    let web_json =
        serde_json::to_string_pretty(web_results).context("failed serializing web results")?;
    Ok(format!(
        "Based on the following research question, all previous analyses, and web search \
results, provide a final synthesis:\n\nQuestion: {question}\n\nInitial Research:\n{initial_research}\n\n\
Analysis Iterations:\n{analysis_json}\n\nWeb Results:\n{web_json}\n\nPlease provide:\n\
1. A comprehensive synthesis of all findings\n\
2. Key takeaways and conclusions\n\
3. Practical implications\n\
4. Recommendations for further research\n\
5. Citations and sources\n\
6. Fact-checking summary"
    ))
}

#[derive(Debug, Clone)]
pub struct ResearchOptions {
    /// Number of chained analysis passes after the initial research.
    pub depth: usize,
    /// Maximum number of search hits carried into the context.
    pub max_web_results: usize,
    /// Flat courtesy delay between successive scrape requests.
    pub scrape_delay: Duration,
}

impl Default for ResearchOptions {
    fn default() -> Self {
        Self {
            depth: 2,
            max_web_results: 5,
            scrape_delay: Duration::from_secs(1),
        }
    }
}

/// Sequential research pipeline: search, scrape, initial research, `depth`
/// chained analysis passes, final synthesis. Every stage always runs; an
/// external-service failure degrades that stage's artifact (empty results,
/// inline error text) and the pipeline carries on.
pub struct Researcher<'a> {
    generator: &'a dyn Generator,
    search: &'a dyn SearchProvider,
    extractor: &'a dyn PageExtractor,
    options: ResearchOptions,
}

impl<'a> Researcher<'a> {
    pub fn new(
        generator: &'a dyn Generator,
        search: &'a dyn SearchProvider,
        extractor: &'a dyn PageExtractor,
        options: ResearchOptions,
    ) -> Self {
        Self {
            generator,
            search,
            extractor,
            options,
        }
    }

    pub fn research(&self, question: &str) -> Result<ResearchResult> {
        let mut results = ResearchResult::new(question);

        tracing::info!("searching the web");
        results.web_results = match self
            .search
            .search(question, self.options.max_web_results)
        {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!("search failed, continuing without web context: {err:#}");
                Vec::new()
            }
        };

        tracing::info!(results = results.web_results.len(), "scraping web content");
        for result in &mut results.web_results {
            result.content = match self.extractor.extract(&result.url) {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!(url = %result.url, "scrape failed: {err:#}");
                    format!("Error scraping {}: {err:#}", result.url)
                }
            };
            thread::sleep(self.options.scrape_delay);
        }

        tracing::info!("conducting initial research");
        results.initial_research =
            self.submit(&research_prompt(question, &results.web_results));

        // Strictly chained: each pass sees only the previous pass's output,
        // not the accumulated history.
        let mut current_response = results.initial_research.clone();
        for iteration in 0..self.options.depth {
            tracing::info!(iteration = iteration + 1, "analysis pass");
            let response = self.submit(&analysis_prompt(
                question,
                &current_response,
                &results.web_results,
            ));
            results.analysis.push(response.clone());
            current_response = response;
        }

        tracing::info!("generating final synthesis");
        let prompt = synthesis_prompt(
            question,
            &results.initial_research,
            &results.analysis,
            &results.web_results,
        )?;
        results.final_conclusions = self.submit(&prompt);
        Ok(results)
    }

    /// A failed generation call degrades to its error text in place of
    /// generated output; the pipeline never aborts on one.
    fn submit(&self, prompt: &str) -> String {
        match self.generator.generate(prompt, &[]) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!("generation failed: {err}");
                err.to_string()
            }
        }
    }
}

/// Encode an image for transport: normalize to RGB, bound the longest side
/// to 1024 px (aspect preserved, Lanczos resample), serialize as JPEG, and
/// base64 the bytes. File-read and decode errors propagate to the caller.
pub fn encode_image_base64(path: &Path) -> Result<String> {
    let opened =
        image::open(path).with_context(|| format!("failed to open image {}", path.display()))?;
    let rgb = opened.to_rgb8();
    let (width, height) = rgb.dimensions();
    let normalized = if width.max(height) > MAX_IMAGE_DIMENSION {
        DynamicImage::ImageRgb8(rgb)
            .resize(
                MAX_IMAGE_DIMENSION,
                MAX_IMAGE_DIMENSION,
                FilterType::Lanczos3,
            )
            .to_rgb8()
    } else {
        rgb
    };

    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY)
        .encode_image(&normalized)
        .with_context(|| format!("failed to encode {} as JPEG", path.display()))?;
    Ok(BASE64.encode(&buffer))
}

/// Describe an image through a vision-language generator. Encoding errors
/// propagate; a failed generation call degrades to its error text, which
/// the caller prints in the description slot.
pub fn describe_image(generator: &dyn Generator, path: &Path, prompt: &str) -> Result<String> {
    let encoded = encode_image_base64(path)?;
    match generator.generate(prompt, &[encoded]) {
        Ok(text) => Ok(text),
        Err(err) => {
            tracing::warn!("description failed: {err}");
            Ok(err.to_string())
        }
    }
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
