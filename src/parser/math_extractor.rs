use std::collections::HashSet;

use regex::Regex;
use tracing::info;

use super::{page_at_position, EquationType, Heading, MathContent, Page};

/// 数学内容提取器：四类公式模式按优先级匹配，
/// 先命中的区间抑制后续模式的重叠命中（display包住inline时只留display）。
pub struct MathExtractor {
    math_patterns: Vec<(EquationType, Regex)>,
    capitalized_word_pattern: Regex,
    sum_log_pattern: Regex,
    kl_call_pattern: Regex,
    arg_min_max_pattern: Regex,
    softmax_fraction_pattern: Regex,
    derivative_pattern: Regex,
}

/// 上下文窗口：公式位置前后各取这么多字节（对齐到字符边界）
const NEARBY_WINDOW: usize = 240;

impl MathExtractor {
    pub fn new() -> Self {
        let math_patterns = vec![
            (
                EquationType::DisplayMath,
                Regex::new(r"(?s)\$\$([^$]+)\$\$").unwrap(),
            ),
            (
                EquationType::NumberedEquation,
                Regex::new(r"(?s)\\begin\{equation\}(.*?)\\end\{equation\}").unwrap(),
            ),
            (
                EquationType::InlineMath,
                Regex::new(r"(?s)\$([^$]+)\$").unwrap(),
            ),
            // 只匹配独立成行的简单等式，后续在首个大写词处截断
            (
                EquationType::SimpleEquation,
                Regex::new(r"(?m)^[ \t]*([a-zA-Z]\s*[=<>≤≥≠≈]\s*[^,\n]+)").unwrap(),
            ),
        ];

        Self {
            math_patterns,
            capitalized_word_pattern: Regex::new(r"[A-Z][a-z]").unwrap(),
            sum_log_pattern: Regex::new(r"\\sum.*y\s*log\s*p").unwrap(),
            kl_call_pattern: Regex::new(r"kl\s*\(").unwrap(),
            arg_min_max_pattern: Regex::new(r"arg\s*(min|max)").unwrap(),
            softmax_fraction_pattern: Regex::new(r"e\^[^/]+/\s*\\sum").unwrap(),
            derivative_pattern: Regex::new(r"d[^\s]/d[^\s]").unwrap(),
        }
    }

    /// 提取全文中的公式，按出现位置升序
    pub fn extract(&self, text: &str, pages: &[Page]) -> Vec<MathContent> {
        let mut math_content: Vec<MathContent> = Vec::new();
        let mut seen_ranges: Vec<(usize, usize)> = Vec::new();
        let mut seen_keys: HashSet<(String, EquationType, usize)> = HashSet::new();

        for (equation_type, pattern) in &self.math_patterns {
            for caps in pattern.captures_iter(text) {
                let whole = caps.get(0).unwrap();
                let captured = caps.get(1).unwrap().as_str();

                let equation = if *equation_type == EquationType::SimpleEquation {
                    self.truncate_at_prose(captured)
                } else {
                    captured.trim().to_string()
                };

                if equation.len() < 3 {
                    continue;
                }

                let position = whole.start();
                let end_pos = whole.end();

                // 与已接受区间重叠的命中丢弃
                if seen_ranges
                    .iter()
                    .any(|&(s, e)| !(end_pos <= s || position >= e))
                {
                    continue;
                }

                let page_number = page_at_position(pages, position);
                let key = (equation.clone(), *equation_type, page_number);
                if !seen_keys.insert(key) {
                    continue;
                }

                math_content.push(MathContent {
                    equation,
                    equation_type: *equation_type,
                    position,
                    page_number,
                    context: None,
                    summary: None,
                    impact: None,
                });
                seen_ranges.push((position, end_pos));
            }
        }

        math_content.sort_by_key(|m| m.position);
        info!("公式提取完成，共 {} 个", math_content.len());
        math_content
    }

    /// 用章节标题与邻近文本补全每个公式的 context/summary/impact
    pub fn enrich(
        &self,
        items: &mut [MathContent],
        full_text: &str,
        pages: &[Page],
        headings: &[Heading],
    ) {
        for item in items.iter_mut() {
            let page = page_at_position(pages, item.position);
            item.context = infer_topic_from_headings(page, headings);

            let nearby = nearby_text(full_text, item.position, NEARBY_WINDOW);
            let (summary, impact) = self.summarize_equation(&item.equation, nearby);
            item.summary = Some(summary);
            item.impact = Some(impact);
        }
    }

    /// 行内等式常把后续散文句子一并捕获，在首个"大写+小写"词处截断
    fn truncate_at_prose(&self, captured: &str) -> String {
        let cut = self
            .capitalized_word_pattern
            .find(captured)
            .map(|m| m.start())
            .unwrap_or(captured.len());
        captured[..cut].trim().to_string()
    }

    /// 启发式判断公式含义与影响：从高度特异的模式到结构性兜底依次尝试
    pub(crate) fn summarize_equation(&self, equation: &str, nearby_text: &str) -> (String, String) {
        let eq = equation.trim();
        let eq_lower = eq.to_lowercase();
        let text_lower = nearby_text.to_lowercase();

        let contains = |terms: &[&str]| -> bool {
            terms
                .iter()
                .any(|t| eq_lower.contains(t) || text_lower.contains(t))
        };
        let pair = |summary: &str, impact: &str| (summary.to_string(), impact.to_string());

        if contains(&["cross-entropy", "cross entropy"])
            || self.sum_log_pattern.is_match(&eq_lower)
            || contains(&["log-likelihood", "log likelihood"])
        {
            return pair(
                "Cross-entropy/log-likelihood objective for fitting predicted distributions.",
                "Improves classification performance and calibration by maximizing probability of true labels.",
            );
        }
        if contains(&["kl", "d_kl", "dkl"]) || self.kl_call_pattern.is_match(&eq_lower) {
            return pair(
                "KL-divergence regularizer aligning two distributions.",
                "Stabilizes training and steers solutions toward desired priors; improves generalization.",
            );
        }
        if self.arg_min_max_pattern.is_match(&eq_lower) {
            return pair(
                "Optimization objective defining the best parameters under the stated criterion.",
                "Determines the learned solution; directly impacts accuracy and robustness.",
            );
        }
        if (eq.contains('∑') || eq_lower.contains("\\sum"))
            && (eq.contains("||")
                || eq_lower.contains("l2")
                || eq_lower.contains('λ')
                || eq_lower.contains("lambda"))
        {
            return pair(
                "Empirical risk with regularization (trade-off between fit and complexity).",
                "Reduces overfitting, improving test performance at potential cost of bias.",
            );
        }
        if contains(&["softmax"]) || self.softmax_fraction_pattern.is_match(&eq_lower) {
            return pair(
                "Softmax-based scoring/attention to weight alternatives.",
                "Focuses the model on salient features; often boosts performance on structured tasks.",
            );
        }
        if contains(&["qk", "q·k", "qk^t", "v", "attention"]) {
            return pair(
                "Attention mechanism computing relevance between query and key to weight values.",
                "Improves representation of long-range dependencies; enhances accuracy and interpretability.",
            );
        }
        if contains(&["∇", "nabla", "gradient", "∂", "partial"])
            || self.derivative_pattern.is_match(&eq_lower)
        {
            return pair(
                "Gradient/derivative relation governing parameter updates or sensitivities.",
                "Affects convergence speed and stability; critical for achieving reported results.",
            );
        }
        if ["≤", "≥", ">=", "<=", "<", ">"].iter().any(|s| eq.contains(s))
            || contains(&["constraint", "subject to", "s.t."])
        {
            return pair(
                "Constraint or bound restricting feasible solutions or establishing guarantees.",
                "Improves robustness and safety; clarifies validity regime of the method.",
            );
        }
        if contains(&["f1", "precision", "recall", "auc", "iou", "bleu", "rouge"]) {
            return pair(
                "Evaluation metric defining how performance is measured.",
                "Shapes optimization focus and reported improvements.",
            );
        }
        if contains(&["p(", "p(y|x)", "posterior", "prior", "bayes"]) {
            return pair(
                "Probabilistic relation modeling uncertainty or conditional dependence.",
                "Improves calibration and decision-making under uncertainty.",
            );
        }
        if contains(&["||", "norm", "l1", "l2", "λ", "lambda"]) {
            return pair(
                "Regularization term controlling parameter magnitude/complexity.",
                "Reduces overfitting and improves generalization stability.",
            );
        }
        if contains(&["conv", "convolution", "kernel"]) {
            return pair(
                "Convolution/kernel operation extracting structured features.",
                "Enables learning of spatial/temporal patterns; boosts representation quality.",
            );
        }

        // 结构性兜底
        if eq.contains('=') && (eq.contains('∑') || eq_lower.contains("\\sum")) {
            return pair(
                "Summation-based definition or objective over data or components.",
                "Aggregates evidence across samples/parts; influences final scores and training.",
            );
        }
        if eq.contains('=')
            && (eq_lower.contains("arg") || eq_lower.contains("min") || eq_lower.contains("max"))
        {
            return pair(
                "Optimization statement defining the learned solution.",
                "Determines the final model parameters and results.",
            );
        }
        if ["≤", "≥", ">=", "<=", "<", ">"].iter().any(|s| eq.contains(s)) {
            return pair(
                "Inequality expressing constraint or theoretical bound.",
                "Guides feasible solutions or provides guarantees impacting robustness.",
            );
        }

        pair(
            "Defines a key relationship used by the method.",
            "Guides the model's behavior and influences reported results.",
        )
    }
}

/// 公式所在页之前（含当页）最后一个标题
fn infer_topic_from_headings(page: usize, headings: &[Heading]) -> Option<String> {
    headings
        .iter()
        .filter(|h| h.page <= page)
        .max_by_key(|h| h.page)
        .map(|h| h.text.clone())
}

/// 位置前后各 window 字节的窗口，对齐到字符边界
fn nearby_text(text: &str, position: usize, window: usize) -> &str {
    let start = floor_boundary(text, position.saturating_sub(window));
    let end = ceil_boundary(text, (position + window).min(text.len()));
    &text[start..end]
}

fn floor_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_boundary(text: &str, mut idx: usize) -> usize {
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
