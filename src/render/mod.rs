// Fast renderer (C8): two-phase compile-then-replay. First render of a
// template compiles it into a `CompiledFastTemplate` keyed by the MD5 of its
// content; every subsequent render with that content replays the cached
// segment/placeholder sequence against a fresh `RenderContext`.

pub mod compiled;
pub mod emoji;
pub mod marker;

use dashmap::DashMap;
use md5::{Digest, Md5};
use parking_lot::Mutex;
use std::cell::RefCell;
use std::sync::Arc;

use crate::pool::composite::CompositeGenerator;
use crate::pool::generated::GeneratedPool;
use crate::pool::number_range::NumberRangePool;
use crate::pool::reusable::ReusablePool;
use crate::render::compiled::{CompiledFastTemplate, Placeholder, PlaceholderKind};
use crate::stats::now_epoch_secs;

fn md5_hash(template: &str) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(template.as_bytes());
    hasher.finalize().into()
}

/// Per-request render-data record (spec.md section 4.8). `now` is resolved
/// at most once per render and cached on first reference.
pub struct RenderContext {
    pub site_id: i64,
    pub keyword_group_id: i64,
    pub image_group_id: i64,
    pub content: String,
    pub article_content: String,
    pub analytics_code: String,
    pub baidu_push_js: String,

    pub cls_pool: Arc<GeneratedPool<Arc<str>>>,
    pub url_pool: Arc<GeneratedPool<Arc<str>>>,
    pub keywords: Arc<ReusablePool>,
    pub images: Arc<ReusablePool>,
    pub title_generator: Arc<CompositeGenerator>,
    pub keyword_emoji_generator: Arc<CompositeGenerator>,
    pub number_ranges: Arc<NumberRangePool>,

    now_cache: RefCell<Option<String>>,
}

impl RenderContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        site_id: i64,
        keyword_group_id: i64,
        image_group_id: i64,
        content: String,
        article_content: String,
        analytics_code: String,
        baidu_push_js: String,
        cls_pool: Arc<GeneratedPool<Arc<str>>>,
        url_pool: Arc<GeneratedPool<Arc<str>>>,
        keywords: Arc<ReusablePool>,
        images: Arc<ReusablePool>,
        title_generator: Arc<CompositeGenerator>,
        keyword_emoji_generator: Arc<CompositeGenerator>,
        number_ranges: Arc<NumberRangePool>,
    ) -> Self {
        Self {
            site_id,
            keyword_group_id,
            image_group_id,
            content,
            article_content,
            analytics_code,
            baidu_push_js,
            cls_pool,
            url_pool,
            keywords,
            images,
            title_generator,
            keyword_emoji_generator,
            number_ranges,
            now_cache: RefCell::new(None),
        }
    }

    fn now(&self) -> String {
        if let Some(v) = self.now_cache.borrow().as_ref() {
            return v.clone();
        }
        let v = now_epoch_secs().to_string();
        *self.now_cache.borrow_mut() = Some(v.clone());
        v
    }
}

fn resolve_into(buf: &mut String, ph: &Placeholder, ctx: &RenderContext) {
    match ph.kind {
        PlaceholderKind::Cls => buf.push_str(&ctx.cls_pool.get()),
        PlaceholderKind::Url => buf.push_str(&ctx.url_pool.get()),
        PlaceholderKind::Keyword => {
            if let Some(k) = ctx.keywords.get_random(ctx.keyword_group_id) {
                buf.push_str(&k);
            }
        }
        PlaceholderKind::KeywordEmoji => {
            buf.push_str(&ctx.keyword_emoji_generator.pop(ctx.keyword_group_id));
        }
        PlaceholderKind::Image => {
            if let Some(i) = ctx.images.get_random(ctx.image_group_id) {
                buf.push_str(&i);
            }
        }
        PlaceholderKind::Number => {
            let (lo, hi) = ph.num_range.unwrap_or((0, 100));
            buf.push_str(&ctx.number_ranges.get(lo, hi).to_string());
        }
        PlaceholderKind::Now => buf.push_str(&ctx.now()),
        PlaceholderKind::Content => buf.push_str(&ctx.content),
        PlaceholderKind::Title => buf.push_str(&ctx.title_generator.pop(ctx.keyword_group_id)),
        PlaceholderKind::ArticleContent => buf.push_str(&ctx.article_content),
    }
}

/// Process-wide `reset` + `grow` buffer pool backing render output.
/// `render_compiled` hands its filled buffer to the caller as the owned
/// result and donates a fresh, equally-sized empty buffer back to the free
/// list, so the pool never has to copy the rendered bytes to recycle the
/// capacity. The slow path never touches this pool at all.
struct BufferPool {
    free: Mutex<Vec<String>>,
}

impl BufferPool {
    fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
        }
    }

    fn acquire(&self, estimated_size: usize) -> String {
        let mut buf = self.free.lock().pop().unwrap_or_default();
        buf.clear();
        if buf.capacity() < estimated_size {
            buf.reserve(estimated_size - buf.capacity());
        }
        buf
    }

    fn release(&self, buf: String) {
        self.free.lock().push(buf);
    }
}

fn compile(template: &str) -> crate::Result<CompiledFastTemplate> {
    let (marker_output, placeholders) = marker::compile_to_marker_output(template);
    let segments = marker::split_on_tokens(&marker_output, &placeholders).ok_or_else(|| {
        crate::PoolError::Internal(format!(
            "compile invariant violated: placeholders={}, template_hash={:x?}",
            placeholders.len(),
            md5_hash(template)
        ))
    })?;
    let estimated_size =
        segments.iter().map(|s| s.len()).sum::<usize>() + placeholders.len() * 24;
    Ok(CompiledFastTemplate {
        segments,
        placeholders,
        estimated_size,
    })
}

pub struct FastRenderer {
    compiled: DashMap<[u8; 16], Arc<CompiledFastTemplate>>,
    buffers: BufferPool,
}

impl Default for FastRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl FastRenderer {
    pub fn new() -> Self {
        Self {
            compiled: DashMap::new(),
            buffers: BufferPool::new(),
        }
    }

    /// Renders `template` against `ctx`, compiling and caching on first use.
    /// Two concurrent first renders of the same template may both compile;
    /// the later `insert` wins and both renders are still correct.
    pub fn render(&self, template: &str, ctx: &RenderContext) -> String {
        let hash = md5_hash(template);
        let compiled = if let Some(existing) = self.compiled.get(&hash) {
            existing.clone()
        } else {
            match compile(template) {
                Ok(c) => {
                    let c = Arc::new(c);
                    self.compiled.insert(hash, c.clone());
                    c
                }
                Err(e) => {
                    tracing::warn!(error = %e, "template compile failed, using slow path");
                    return self.render_slow_path(template, ctx);
                }
            }
        };
        self.render_compiled(&compiled, ctx)
    }

    fn render_compiled(&self, compiled: &CompiledFastTemplate, ctx: &RenderContext) -> String {
        let mut buf = self.buffers.acquire(compiled.estimated_size);
        for (i, ph) in compiled.placeholders.iter().enumerate() {
            buf.push_str(&compiled.segments[i]);
            resolve_into(&mut buf, ph, ctx);
        }
        buf.push_str(&compiled.segments[compiled.placeholders.len()]);
        // `buf` becomes the caller's owned output; donate a same-capacity
        // replacement to the free list instead of cloning `buf`'s content
        // (tens of KB per spec's latency budget) just to hand the original back.
        self.buffers.release(String::with_capacity(buf.capacity()));
        buf
    }

    /// No caching: recompiles the marker output on every call and replaces
    /// each token with its resolved value directly, one at a time.
    fn render_slow_path(&self, template: &str, ctx: &RenderContext) -> String {
        let (mut marker_output, placeholders) = marker::compile_to_marker_output(template);
        for ph in &placeholders {
            let mut resolved = String::new();
            resolve_into(&mut resolved, ph, ctx);
            marker_output = marker_output.replacen(ph.token.as_str(), &resolved, 1);
        }
        marker_output
    }

    pub fn cached_template_count(&self) -> usize {
        self.compiled.len()
    }

    pub fn clear_cache(&self) {
        self.compiled.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::generated::GeneratedPoolConfig;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn test_context() -> RenderContext {
        let counter = Arc::new(AtomicU64::new(0));
        let cls_counter = counter.clone();
        let cls_pool = GeneratedPool::new(
            "cls",
            GeneratedPoolConfig::default(),
            Arc::new(move || -> Arc<str> {
                Arc::from(format!("cls-{}", cls_counter.fetch_add(1, Ordering::Relaxed)))
            }),
        );
        let url_counter = counter.clone();
        let url_pool = GeneratedPool::new(
            "url",
            GeneratedPoolConfig::default(),
            Arc::new(move || -> Arc<str> {
                Arc::from(format!(
                    "https://example.com/{}",
                    url_counter.fetch_add(1, Ordering::Relaxed)
                ))
            }),
        );
        let keywords = ReusablePool::new("keywords");
        keywords.load_group(1, vec!["alpha".into(), "beta".into(), "gamma".into()]);
        let images = ReusablePool::new("images");
        images.load_group(1, vec!["a.png".into()]);
        let title_generator = CompositeGenerator::new(
            "titles",
            crate::pool::composite::CompositeKind::Title,
            keywords.clone(),
            crate::pool::composite::CompositeConfig {
                worker_count: 0,
                ..Default::default()
            },
        );
        let keyword_emoji_generator = CompositeGenerator::new(
            "kw-emoji",
            crate::pool::composite::CompositeKind::KeywordEmoji,
            keywords.clone(),
            crate::pool::composite::CompositeConfig {
                worker_count: 0,
                ..Default::default()
            },
        );
        let number_ranges = NumberRangePool::new(&[(1, 10)], GeneratedPoolConfig::default());
        RenderContext::new(
            1,
            1,
            1,
            "page content".into(),
            "article body".into(),
            "UA-0000".into(),
            "baidu.push()".into(),
            cls_pool,
            url_pool,
            keywords,
            images,
            title_generator,
            keyword_emoji_generator,
            number_ranges,
        )
    }

    #[test]
    fn static_segments_are_stable_across_renders() {
        let renderer = FastRenderer::new();
        let ctx1 = test_context();
        let ctx2 = test_context();
        let template = "A {keyword} B {url} C";
        let out1 = renderer.render(template, &ctx1);
        let out2 = renderer.render(template, &ctx2);
        assert!(out1.starts_with("A "));
        assert!(out1.contains(" B "));
        assert!(out1.ends_with(" C"));
        assert!(out2.starts_with("A "));
        assert_eq!(renderer.cached_template_count(), 1);
    }

    #[test]
    fn now_is_cached_within_a_single_render() {
        let ctx = test_context();
        let first = ctx.now();
        let second = ctx.now();
        assert_eq!(first, second);
    }

    #[test]
    fn unrecognized_function_falls_through_as_literal_text() {
        let renderer = FastRenderer::new();
        let ctx = test_context();
        let out = renderer.render("{bogus_function}", &ctx);
        assert_eq!(out, "{bogus_function}");
    }
}
