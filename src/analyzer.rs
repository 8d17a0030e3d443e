// Template analyzer (C7): regex-driven loop expansion followed by
// per-function call counting, feeding the pool-sizing formula that derives
// C2/C3/C4/C6 capacities from observed template shapes.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::stats::now_epoch_secs;

/// Safety cap on a single `range(N)` expansion (spec.md section 4.7).
pub const MAX_LOOP_COUNT: u64 = 1000;
/// Safety cap on total expansion passes, standing in for nesting depth.
pub const MAX_LOOP_DEPTH: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FunctionKind {
    ClassGenerator,
    UrlGenerator,
    Keyword,
    KeywordWithEmoji,
    Image,
    Title,
    Content,
    ContentWithPhonetic,
    Number,
    Timestamp,
}

impl FunctionKind {
    pub fn all() -> &'static [FunctionKind] {
        &[
            FunctionKind::ClassGenerator,
            FunctionKind::UrlGenerator,
            FunctionKind::Keyword,
            FunctionKind::KeywordWithEmoji,
            FunctionKind::Image,
            FunctionKind::Title,
            FunctionKind::Content,
            FunctionKind::ContentWithPhonetic,
            FunctionKind::Number,
            FunctionKind::Timestamp,
        ]
    }
}

fn function_pattern(name: &str) -> Regex {
    Regex::new(&format!(r"\{{{name}\}}|\b{name}\s*\(")).unwrap()
}

static FUNCTION_PATTERNS: Lazy<Vec<(FunctionKind, Regex)>> = Lazy::new(|| {
    vec![
        (FunctionKind::ClassGenerator, function_pattern("cls")),
        (FunctionKind::UrlGenerator, function_pattern("random_url")),
        (FunctionKind::Keyword, function_pattern("keyword")),
        (FunctionKind::KeywordWithEmoji, function_pattern("keyword_emoji")),
        (FunctionKind::Image, function_pattern("image")),
        (FunctionKind::Title, function_pattern("title")),
        (FunctionKind::Content, function_pattern("content")),
        (
            FunctionKind::ContentWithPhonetic,
            function_pattern("content_with_phonetic"),
        ),
        (FunctionKind::Number, function_pattern("number")),
        (FunctionKind::Timestamp, function_pattern("now")),
    ]
});

static LOOP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{for\s+\w+\s+in\s+range\((\d+)\)\}(.*?)\{endfor\}").unwrap());

fn hash_content(content: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

/// Repeatedly expands the innermost `for ... range(N) ... endfor` construct.
/// The lazy body capture naturally targets the innermost pair first on
/// nested loops, since it stops at the nearest following `{endfor}`.
fn expand_loops(content: &str) -> (String, u64, u32) {
    let mut text = content.to_string();
    let mut total_loops = 0u64;
    let mut passes = 0u32;
    while let Some(caps) = LOOP_RE.captures(&text) {
        let whole = caps.get(0).unwrap();
        let n: u64 = caps[1].parse().unwrap_or(0);
        let n = n.min(MAX_LOOP_COUNT);
        let body = &caps[2];
        let expanded = body.repeat(n as usize);
        text = format!("{}{}{}", &text[..whole.start()], expanded, &text[whole.end()..]);
        total_loops += 1;
        passes += 1;
        if passes >= MAX_LOOP_DEPTH {
            break;
        }
    }
    (text, total_loops, passes)
}

fn count_functions(text: &str) -> HashMap<FunctionKind, u64> {
    FUNCTION_PATTERNS
        .iter()
        .map(|(kind, re)| (*kind, re.find_iter(text).count() as u64))
        .collect()
}

#[derive(Debug, Clone)]
pub struct Analysis {
    pub content_hash: u64,
    pub counts: HashMap<FunctionKind, u64>,
    pub loop_count: u64,
    pub max_nesting_depth: u32,
    pub analyzed_at: u64,
}

struct AnalysisEntry {
    hash: Mutex<u64>,
    analysis: Mutex<Analysis>,
}

pub type ConfigChangeCallback = Arc<dyn Fn(&HashMap<FunctionKind, u64>) + Send + Sync>;

pub struct TemplateAnalyzer {
    analyses: DashMap<(String, i64), Arc<AnalysisEntry>>,
    max_stats: Mutex<HashMap<FunctionKind, u64>>,
    target_qps: Mutex<f64>,
    safety_factor: Mutex<f64>,
    on_change: Mutex<Option<ConfigChangeCallback>>,
}

impl TemplateAnalyzer {
    pub fn new(target_qps: f64, safety_factor: f64) -> Arc<Self> {
        Arc::new(Self {
            analyses: DashMap::new(),
            max_stats: Mutex::new(HashMap::new()),
            target_qps: Mutex::new(target_qps),
            safety_factor: Mutex::new(safety_factor),
            on_change: Mutex::new(None),
        })
    }

    pub fn set_on_change(&self, cb: ConfigChangeCallback) {
        *self.on_change.lock() = Some(cb);
    }

    /// Idempotent per content hash: double-checked locking around the actual
    /// analysis work, so two identical submissions never redo the regex pass.
    pub fn analyze(&self, template_name: &str, group_id: i64, content: &str) -> Analysis {
        let key = (template_name.to_string(), group_id);
        let hash = hash_content(content);

        if let Some(entry) = self.analyses.get(&key) {
            if *entry.hash.lock() == hash {
                return entry.analysis.lock().clone();
            }
        }

        let (expanded, loop_count, max_depth) = expand_loops(content);
        let counts = count_functions(&expanded);
        let analysis = Analysis {
            content_hash: hash,
            counts: counts.clone(),
            loop_count,
            max_nesting_depth: max_depth,
            analyzed_at: now_epoch_secs(),
        };

        let entry = self
            .analyses
            .entry(key)
            .or_insert_with(|| {
                Arc::new(AnalysisEntry {
                    hash: Mutex::new(0),
                    analysis: Mutex::new(analysis.clone()),
                })
            })
            .clone();

        let mut published = false;
        {
            let mut h = entry.hash.lock();
            if *h != hash {
                *h = hash;
                *entry.analysis.lock() = analysis.clone();
                published = true;
            }
        }
        if published {
            self.update_max_stats(&counts);
        }
        entry.analysis.lock().clone()
    }

    fn update_max_stats(&self, counts: &HashMap<FunctionKind, u64>) {
        let mut changed = false;
        {
            let mut max_stats = self.max_stats.lock();
            for (k, v) in counts {
                let slot = max_stats.entry(*k).or_insert(0);
                if *v > *slot {
                    *slot = *v;
                    changed = true;
                }
            }
        }
        if changed {
            if let Some(cb) = self.on_change.lock().as_ref() {
                cb(&self.max_stats.lock());
            }
        }
    }

    /// `PoolSize(kind) = maxStats.callsPerRequest(kind) * targetQps * safetyFactor`.
    pub fn pool_size(&self, kind: FunctionKind) -> i64 {
        let calls = *self.max_stats.lock().get(&kind).unwrap_or(&0) as f64;
        let qps = *self.target_qps.lock();
        let safety = *self.safety_factor.lock();
        (calls * qps * safety).ceil() as i64
    }

    pub fn set_target_qps(&self, qps: f64) {
        *self.target_qps.lock() = qps;
    }

    pub fn set_safety_factor(&self, factor: f64) {
        *self.safety_factor.lock() = factor;
    }

    pub fn max_stats_snapshot(&self) -> HashMap<FunctionKind, u64> {
        self.max_stats.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_loop_multiplies_body_counts() {
        let analyzer = TemplateAnalyzer::new(500.0, 1.5);
        let template = "{for i in range(10)}{keyword}{endfor}";
        let analysis = analyzer.analyze("t", 1, template);
        assert_eq!(analysis.counts[&FunctionKind::Keyword], 10);
        assert_eq!(analysis.loop_count, 1);
    }

    #[test]
    fn nested_loops_multiply_counts_by_product() {
        let analyzer = TemplateAnalyzer::new(500.0, 1.5);
        let template = "{for i in range(4)}{for j in range(3)}{keyword}{endfor}{endfor}";
        let analysis = analyzer.analyze("t", 1, template);
        assert_eq!(analysis.counts[&FunctionKind::Keyword], 12);
        assert_eq!(analysis.loop_count, 2);
    }

    #[test]
    fn loop_count_is_clamped_at_safety_cap() {
        let analyzer = TemplateAnalyzer::new(500.0, 1.5);
        let template = "{for i in range(5000)}{keyword}{endfor}";
        let analysis = analyzer.analyze("t", 1, template);
        assert_eq!(analysis.counts[&FunctionKind::Keyword], MAX_LOOP_COUNT);
    }

    #[test]
    fn identical_content_hash_skips_rework() {
        let analyzer = TemplateAnalyzer::new(500.0, 1.5);
        let template = "{keyword}{keyword}";
        let first = analyzer.analyze("t", 1, template);
        let second = analyzer.analyze("t", 1, template);
        assert_eq!(first.analyzed_at, second.analyzed_at);
    }

    #[test]
    fn derived_pool_size_matches_scenario() {
        let analyzer = TemplateAnalyzer::new(100.0, 2.0);
        let template = "{for i in range(10)}{cls('x')}{random_url()}{endfor}";
        analyzer.analyze("t", 1, template);
        assert_eq!(analyzer.pool_size(FunctionKind::ClassGenerator), 2000);
        assert_eq!(analyzer.pool_size(FunctionKind::UrlGenerator), 2000);
    }
}
