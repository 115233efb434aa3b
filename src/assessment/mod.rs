pub mod scoring;

pub use scoring::{completeness_score, ScoreBreakdown};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::oracle::OracleClient;
use crate::parser::{ContentType, FigureTable, ParsedPaper};
use crate::utils::{truncate_chars, PaperResult};

/// 论文中缺失的内容条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingContent {
    #[serde(default = "unknown")]
    pub category: String,
    #[serde(default = "unknown")]
    pub topic: String,
    #[serde(default = "default_importance")]
    pub importance: String,
    #[serde(default = "no_description")]
    pub description: String,
    #[serde(default = "no_suggestion")]
    pub suggestion: String,
    #[serde(default = "general_sections")]
    pub related_sections: Vec<String>,
}

fn unknown() -> String {
    "Unknown".to_string()
}
fn default_importance() -> String {
    "Important".to_string()
}
fn no_description() -> String {
    "No description provided".to_string()
}
fn no_suggestion() -> String {
    "No suggestion provided".to_string()
}
fn general_sections() -> Vec<String> {
    vec!["General".to_string()]
}
fn neutral_score() -> f64 {
    50.0
}

#[derive(Debug, Clone, Default, Deserialize)]
struct MissingContentResponse {
    #[serde(default)]
    missing_content: Vec<MissingContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodologyAnalysis {
    #[serde(default = "neutral_score")]
    pub score: f64,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiteratureReviewAnalysis {
    #[serde(default = "neutral_score")]
    pub score: f64,
    #[serde(default)]
    pub coverage_adequacy: String,
    #[serde(default)]
    pub critical_analysis: String,
    #[serde(default)]
    pub research_gap_identification: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsAnalysis {
    #[serde(default = "neutral_score")]
    pub score: f64,
    #[serde(default)]
    pub presentation_clarity: String,
    #[serde(default)]
    pub statistical_analysis: String,
    #[serde(default)]
    pub visual_elements: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscussionAnalysis {
    #[serde(default = "neutral_score")]
    pub score: f64,
    #[serde(default)]
    pub result_interpretation: String,
    #[serde(default)]
    pub literature_comparison: String,
    #[serde(default)]
    pub limitations: String,
    #[serde(default)]
    pub future_work: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// 完整的论文评估结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchAssessment {
    pub paper_title: String,
    pub research_field: String,
    pub overall_completeness_score: f64,
    pub missing_content: Vec<MissingContent>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
    pub methodology_analysis: MethodologyAnalysis,
    pub literature_review_analysis: LiteratureReviewAnalysis,
    pub results_analysis: ResultsAnalysis,
    pub discussion_analysis: DiscussionAnalysis,
}

/// 评估结果与评分明细一并返回，便于缓存与展示
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentReport {
    pub assessment: ResearchAssessment,
    pub score_breakdown: ScoreBreakdown,
}

const REVIEWER_SYSTEM_PROMPT: &str = "You are an expert research paper reviewer and academic editor with extensive experience in various research fields. When asked to provide JSON responses, you MUST respond with ONLY valid JSON. Do not include any explanatory text, markdown formatting, or code blocks. The JSON must be properly formatted and parseable.";

const EXPLAINER_SYSTEM_PROMPT: &str = "You are an expert research paper analyst who provides clear, detailed explanations of figures and tables in academic papers.";

/// 关键词回退的领域表，按声明顺序打分取最高
const FIELD_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Computer Science",
        &[
            "algorithm", "programming", "software", "computer", "computing", "data structure",
            "machine learning", "artificial intelligence", "neural network", "deep learning",
            "natural language processing", "computer vision", "database", "system",
            "network", "security", "cybersecurity", "blockchain", "cryptography",
        ],
    ),
    (
        "Artificial Intelligence",
        &[
            "artificial intelligence", "ai", "machine learning", "neural network", "deep learning",
            "reinforcement learning", "supervised learning", "unsupervised learning",
            "computer vision", "natural language processing", "nlp", "automation",
            "intelligent system", "cognitive", "reasoning", "knowledge representation",
        ],
    ),
    (
        "Machine Learning",
        &[
            "machine learning", "ml", "neural network", "deep learning", "model", "training",
            "classification", "regression", "clustering", "feature extraction", "optimization",
            "gradient descent", "backpropagation", "tensorflow", "pytorch", "scikit-learn",
        ],
    ),
    (
        "Mathematics",
        &[
            "mathematical", "equation", "theorem", "proof", "algebra", "calculus",
            "statistics", "probability", "optimization", "linear algebra", "geometry",
            "analysis", "topology", "number theory", "discrete mathematics",
        ],
    ),
    (
        "Physics",
        &[
            "physics", "quantum", "mechanics", "thermodynamics", "electromagnetic",
            "particle", "energy", "force", "motion", "wave", "relativity", "quantum mechanics",
        ],
    ),
    (
        "Biology",
        &[
            "biology", "biological", "cell", "dna", "protein", "genetics", "evolution",
            "organism", "molecular biology", "biochemistry", "ecology", "microbiology",
        ],
    ),
    (
        "Medicine",
        &[
            "medical", "medicine", "clinical", "patient", "treatment", "diagnosis",
            "therapy", "healthcare", "disease", "symptom", "pharmaceutical", "drug",
        ],
    ),
    (
        "Engineering",
        &[
            "engineering", "mechanical", "electrical", "civil", "chemical", "design",
            "manufacturing", "construction", "materials", "structure", "system design",
        ],
    ),
];

/// 论文评估器。缺失内容分析在Oracle调用层面失败时向上传播，
/// 其余环节都降级为确定性回退。
pub struct Assessor {
    oracle: OracleClient,
}

impl Assessor {
    pub fn new(oracle: OracleClient) -> Self {
        Self { oracle }
    }

    /// 评估一篇已解析的论文
    pub async fn assess(&self, paper: &ParsedPaper) -> PaperResult<AssessmentReport> {
        let title = paper.metadata.title.clone();
        let sections = &paper.sections;

        let full_text = format!(
            "{}\n\n{}\n\n{}\n\n{}\n\n{}\n\n{}",
            sections.abstract_text,
            sections.introduction,
            sections.methodology,
            sections.results,
            sections.discussion,
            sections.conclusion
        );

        let research_field = self.identify_research_field(&full_text, &title).await;
        info!("识别研究领域: {}", research_field);

        let missing_content = self.analyze_missing_content(&full_text, &research_field).await?;
        let strengths = self.identify_strengths(&full_text).await;
        let weaknesses = self.identify_weaknesses(&full_text).await;
        let recommendations = generate_recommendations(&missing_content, &weaknesses);

        let methodology_analysis = self.analyze_methodology(&sections.methodology).await;
        let literature_review_analysis = self
            .analyze_literature_review(&sections.introduction, paper.citations.len())
            .await;
        let results_analysis = self.analyze_results(&sections.results).await;
        let discussion_analysis = self
            .analyze_discussion(&sections.discussion, &sections.results)
            .await;

        let quality_scores = [
            methodology_analysis.score,
            literature_review_analysis.score,
            results_analysis.score,
            discussion_analysis.score,
        ];
        let score_breakdown = completeness_score(
            sections,
            paper.citations.len(),
            &missing_content,
            &quality_scores,
        );
        info!("完备性评分: {:.1}", score_breakdown.final_score);

        Ok(AssessmentReport {
            assessment: ResearchAssessment {
                paper_title: title,
                research_field,
                overall_completeness_score: score_breakdown.final_score,
                missing_content,
                strengths,
                weaknesses,
                recommendations,
                methodology_analysis,
                literature_review_analysis,
                results_analysis,
                discussion_analysis,
            },
            score_breakdown,
        })
    }

    async fn call_reviewer(&self, prompt: &str, max_tokens: u32) -> PaperResult<String> {
        self.oracle
            .complete(REVIEWER_SYSTEM_PROMPT, prompt, 0.0, max_tokens)
            .await
    }

    async fn identify_research_field(&self, text: &str, title: &str) -> String {
        let prompt = format!(
            "Analyze the following research paper title and content to identify the primary research field.\n\n\
             CRITICAL: Return ONLY the field name as plain text, NOT in JSON format.\n\
             Examples: \"Computer Science\", \"Medicine\", \"Psychology\", \"Physics\", \"Engineering\", \"Biology\"\n\n\
             Title: {}\n\
             Content: {}...\n\n\
             Return only the field name:",
            title,
            truncate_chars(text, 2000)
        );

        match self.call_reviewer(&prompt, 50).await {
            Ok(response) => {
                let cleaned = clean_research_field_response(response.trim());
                if cleaned.is_empty() || cleaned == "Unknown" || cleaned.len() < 3 {
                    identify_field_by_keywords(text, title)
                } else {
                    cleaned
                }
            }
            Err(e) => {
                warn!("研究领域识别失败，使用关键词回退: {}", e);
                identify_field_by_keywords(text, title)
            }
        }
    }

    /// 缺失内容分析：Oracle调用失败会传播，JSON解析失败走文本回退链
    async fn analyze_missing_content(
        &self,
        text: &str,
        research_field: &str,
    ) -> PaperResult<Vec<MissingContent>> {
        let prompt = format!(
            "As an expert research paper reviewer in {}, analyze the following research paper content and identify missing elements that should typically be included in a comprehensive research paper in this field.\n\n\
             Paper content: {}...\n\n\
             CRITICAL INSTRUCTIONS:\n\
             1. You MUST respond with ONLY valid JSON\n\
             2. Do NOT include any explanatory text before or after the JSON\n\
             3. Do NOT use markdown code blocks (```json)\n\
             4. The JSON must be properly formatted with correct quotes and brackets\n\
             5. If no missing content is found, return an empty array: {{\"missing_content\": []}}\n\n\
             For each missing element, identify:\n\
             - Category: One of \"Methodology\", \"Literature Review\", \"Results\", \"Discussion\", \"Ethics\", \"Limitations\", \"Future Work\", \"Conclusion\"\n\
             - Topic: Specific element that's missing\n\
             - Importance: \"Critical\", \"Important\", or \"Beneficial\"\n\
             - Description: What should be included\n\
             - Suggestion: How to address the gap\n\
             - Related sections: Which paper sections this affects\n\n\
             RESPOND WITH ONLY THIS JSON FORMAT (NO OTHER TEXT):\n\
             {{\"missing_content\": [{{\"category\": \"Methodology\", \"topic\": \"Statistical Analysis\", \"importance\": \"Critical\", \"description\": \"Missing detailed statistical analysis methods\", \"suggestion\": \"Add section on statistical tests used\", \"related_sections\": [\"Methodology\", \"Results\"]}}]}}",
            research_field,
            truncate_chars(text, 4000)
        );

        let response = self.call_reviewer(&prompt, 2000).await?;
        let cleaned = strip_code_fences(&response);

        match serde_json::from_str::<MissingContentResponse>(cleaned) {
            Ok(parsed) => Ok(parsed.missing_content),
            Err(e) => {
                warn!("缺失内容JSON解析失败，尝试文本回退: {}", e);
                Ok(parse_text_response(cleaned))
            }
        }
    }

    async fn identify_strengths(&self, text: &str) -> Vec<String> {
        let prompt = format!(
            "Analyze the following research paper content and identify its main strengths.\n\
             List 3-5 key strengths as bullet points starting with \"-\".\n\n\
             Paper content: {}...\n\n\
             Format your response as:\n- Strength 1\n- Strength 2\n- Strength 3",
            truncate_chars(text, 3000)
        );

        match self.call_reviewer(&prompt, 300).await {
            Ok(response) => {
                parse_bullet_list(&response, "Analysis completed - strengths identified")
            }
            Err(e) => {
                warn!("优势识别失败: {}", e);
                vec!["Unable to identify strengths due to analysis error".to_string()]
            }
        }
    }

    async fn identify_weaknesses(&self, text: &str) -> Vec<String> {
        let prompt = format!(
            "Analyze the following research paper content and identify its main weaknesses.\n\
             Focus on methodological issues, gaps in analysis, or presentation problems.\n\
             List 3-5 key weaknesses as bullet points starting with \"-\".\n\n\
             Paper content: {}...\n\n\
             Format your response as:\n- Weakness 1\n- Weakness 2\n- Weakness 3",
            truncate_chars(text, 3000)
        );

        match self.call_reviewer(&prompt, 300).await {
            Ok(response) => {
                parse_bullet_list(&response, "Analysis completed - weaknesses identified")
            }
            Err(e) => {
                warn!("劣势识别失败: {}", e);
                vec!["Unable to identify weaknesses due to analysis error".to_string()]
            }
        }
    }

    async fn analyze_methodology(&self, methodology_text: &str) -> MethodologyAnalysis {
        if methodology_text.trim().is_empty() {
            return MethodologyAnalysis {
                score: 0.0,
                issues: vec!["Methodology section is missing".to_string()],
                suggestions: vec!["Add comprehensive methodology section".to_string()],
            };
        }

        let prompt = format!(
            "Analyze the methodology section of this research paper.\n\n\
             Methodology: {}...\n\n\
             CRITICAL: Respond with ONLY valid JSON. No explanatory text.\n\n\
             Return in this exact JSON format:\n\
             {{\"score\": 75, \"issues\": [\"Issue 1\", \"Issue 2\"], \"suggestions\": [\"Suggestion 1\", \"Suggestion 2\"]}}",
            truncate_chars(methodology_text, 2000)
        );

        match self.parse_section_analysis::<MethodologyAnalysis>(&prompt).await {
            Some(analysis) => analysis,
            None => MethodologyAnalysis {
                score: 50.0,
                issues: vec!["Unable to analyze methodology".to_string()],
                suggestions: vec!["Review methodology section manually".to_string()],
            },
        }
    }

    async fn analyze_literature_review(
        &self,
        introduction_text: &str,
        reference_count: usize,
    ) -> LiteratureReviewAnalysis {
        let prompt = format!(
            "Analyze the literature review in this research paper's introduction.\n\
             Number of references found: {}\n\n\
             Introduction: {}...\n\n\
             CRITICAL: Respond with ONLY valid JSON. No explanatory text.\n\n\
             Return in this exact JSON format:\n\
             {{\"score\": 80, \"coverage_adequacy\": \"Good coverage of relevant literature\", \"critical_analysis\": \"Provides critical analysis of existing work\", \"research_gap_identification\": \"Clearly identifies research gaps\", \"suggestions\": [\"Suggestion 1\", \"Suggestion 2\"]}}",
            reference_count,
            truncate_chars(introduction_text, 2000)
        );

        match self
            .parse_section_analysis::<LiteratureReviewAnalysis>(&prompt)
            .await
        {
            Some(analysis) => analysis,
            None => LiteratureReviewAnalysis {
                score: 50.0,
                coverage_adequacy: "Unknown".to_string(),
                critical_analysis: "Unknown".to_string(),
                research_gap_identification: "Unknown".to_string(),
                suggestions: vec!["Review literature review manually".to_string()],
            },
        }
    }

    async fn analyze_results(&self, results_text: &str) -> ResultsAnalysis {
        if results_text.trim().is_empty() {
            return ResultsAnalysis {
                score: 0.0,
                presentation_clarity: String::new(),
                statistical_analysis: String::new(),
                visual_elements: String::new(),
                issues: vec!["Results section is missing".to_string()],
                suggestions: vec!["Add comprehensive results section".to_string()],
            };
        }

        let prompt = format!(
            "Analyze the results section of this research paper.\n\n\
             Results: {}...\n\n\
             CRITICAL: Respond with ONLY valid JSON. No explanatory text.\n\n\
             Return in this exact JSON format:\n\
             {{\"score\": 85, \"presentation_clarity\": \"Results are clearly presented\", \"statistical_analysis\": \"Adequate statistical analysis\", \"visual_elements\": \"Good use of figures and tables\", \"suggestions\": [\"Suggestion 1\", \"Suggestion 2\"]}}",
            truncate_chars(results_text, 2000)
        );

        match self.parse_section_analysis::<ResultsAnalysis>(&prompt).await {
            Some(analysis) => analysis,
            None => ResultsAnalysis {
                score: 50.0,
                presentation_clarity: "Unknown".to_string(),
                statistical_analysis: "Unknown".to_string(),
                visual_elements: "Unknown".to_string(),
                issues: Vec::new(),
                suggestions: vec!["Review results section manually".to_string()],
            },
        }
    }

    async fn analyze_discussion(
        &self,
        discussion_text: &str,
        results_text: &str,
    ) -> DiscussionAnalysis {
        if discussion_text.trim().is_empty() {
            return DiscussionAnalysis {
                score: 0.0,
                result_interpretation: String::new(),
                literature_comparison: String::new(),
                limitations: String::new(),
                future_work: String::new(),
                issues: vec!["Discussion section is missing".to_string()],
                suggestions: vec!["Add comprehensive discussion section".to_string()],
            };
        }

        let prompt = format!(
            "Analyze the discussion section of this research paper.\n\n\
             Discussion: {}...\n\
             Results context: {}...\n\n\
             CRITICAL: Respond with ONLY valid JSON. No explanatory text.\n\n\
             Return in this exact JSON format:\n\
             {{\"score\": 70, \"result_interpretation\": \"Good interpretation of results\", \"literature_comparison\": \"Compares well with existing literature\", \"limitations\": \"Acknowledges study limitations\", \"future_work\": \"Suggests future research directions\", \"suggestions\": [\"Suggestion 1\", \"Suggestion 2\"]}}",
            truncate_chars(discussion_text, 2000),
            truncate_chars(results_text, 1000)
        );

        match self
            .parse_section_analysis::<DiscussionAnalysis>(&prompt)
            .await
        {
            Some(analysis) => analysis,
            None => DiscussionAnalysis {
                score: 50.0,
                result_interpretation: "Unknown".to_string(),
                literature_comparison: "Unknown".to_string(),
                limitations: "Unknown".to_string(),
                future_work: "Unknown".to_string(),
                issues: Vec::new(),
                suggestions: vec!["Review discussion section manually".to_string()],
            },
        }
    }

    async fn parse_section_analysis<T: serde::de::DeserializeOwned>(
        &self,
        prompt: &str,
    ) -> Option<T> {
        match self.call_reviewer(prompt, 500).await {
            Ok(response) => match serde_json::from_str::<T>(strip_code_fences(&response)) {
                Ok(analysis) => Some(analysis),
                Err(e) => {
                    warn!("章节分析JSON解析失败: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("章节分析调用失败: {}", e);
                None
            }
        }
    }

    /// 为每个图表生成解释，失败时回退为标题复述
    pub async fn explain_figures_tables(&self, items: &mut [FigureTable]) {
        for item in items.iter_mut() {
            let kind = match item.content_type {
                ContentType::Figure => "figure",
                ContentType::Table => "table",
            };
            let prompt = format!(
                "You are an expert research paper analyst. Analyze the following {kind} from a research paper and provide a detailed explanation of what is happening in it.\n\n\
                 Label: {}\n\
                 Caption: {}\n\n\
                 Based on the caption and context, explain:\n\
                 1. What this {kind} is showing/representing\n\
                 2. What key information, data, or visual elements it contains\n\
                 3. What insights or conclusions can be drawn from it\n\
                 4. How it likely relates to the research paper's methodology or findings\n\n\
                 Be specific and detailed. Write 2-4 sentences explaining the content and significance.\n\n\
                 Explanation:",
                item.label, item.caption
            );

            let explanation = match self
                .oracle
                .complete(EXPLAINER_SYSTEM_PROMPT, &prompt, 0.3, 300)
                .await
            {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    warn!("{} 解释生成失败: {}", item.label, e);
                    format!("Unable to generate explanation. {}", item.caption)
                }
            };
            item.ai_explanation = Some(explanation);
        }
    }
}

/// 剥掉Markdown代码围栏，模型经常无视"仅返回JSON"的指令
fn strip_code_fences(response: &str) -> &str {
    let mut cleaned = response.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    cleaned.trim()
}

/// 清理领域识别回复：JSON包裹、引号、"field:"前缀、常见缩写
fn clean_research_field_response(response: &str) -> String {
    let mut response = response.trim().to_string();

    if response.starts_with('{') && response.ends_with('}') {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&response) {
            for key in ["field", "research_field"] {
                if let Some(field) = value.get(key).and_then(|v| v.as_str()) {
                    return field.to_string();
                }
            }
        }
    }

    if response.starts_with('"') && response.ends_with('"') && response.len() >= 2 {
        response = response[1..response.len() - 1].to_string();
    }

    if let Some((_, after)) = response.split_once(':') {
        response = after.trim().to_string();
    }

    let field_mapping: &[(&str, &str)] = &[
        ("cs", "Computer Science"),
        ("computer science", "Computer Science"),
        ("ai", "Artificial Intelligence"),
        ("artificial intelligence", "Artificial Intelligence"),
        ("ml", "Machine Learning"),
        ("machine learning", "Machine Learning"),
        ("nlp", "Natural Language Processing"),
        ("natural language processing", "Natural Language Processing"),
    ];
    let lower = response.to_lowercase();
    let lower = lower.trim();
    for (abbrev, full) in field_mapping {
        if lower == *abbrev {
            return full.to_string();
        }
    }

    let has_upper = response.chars().any(|c| c.is_uppercase());
    let has_lower = response.chars().any(|c| c.is_lowercase());
    if has_lower && !has_upper {
        return title_case(&response);
    }

    response
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// 关键词计数回退：得分最高的领域，全零时默认 Computer Science
fn identify_field_by_keywords(text: &str, title: &str) -> String {
    let combined = format!("{} {}", title, text).to_lowercase();

    let mut best_field = "Computer Science";
    let mut best_score = 0usize;
    for (field, keywords) in FIELD_KEYWORDS {
        let score = keywords.iter().filter(|k| combined.contains(*k)).count();
        if score > best_score {
            best_score = score;
            best_field = field;
        }
    }

    best_field.to_string()
}

/// JSON解析失败后的文本行扫描回退
fn parse_text_response(response: &str) -> Vec<MissingContent> {
    #[derive(Default)]
    struct Builder {
        category: Option<String>,
        importance: Option<String>,
        description: Option<String>,
        suggestion: Option<String>,
        has_any: bool,
    }

    impl Builder {
        fn build(self) -> MissingContent {
            MissingContent {
                category: self.category.unwrap_or_else(|| "General".to_string()),
                topic: "Analysis Point".to_string(),
                importance: self.importance.unwrap_or_else(|| "Important".to_string()),
                description: self
                    .description
                    .unwrap_or_else(|| "No description available".to_string()),
                suggestion: self
                    .suggestion
                    .unwrap_or_else(|| "Please review this section".to_string()),
                related_sections: vec!["General".to_string()],
            }
        }
    }

    let mut items: Vec<MissingContent> = Vec::new();
    let mut current = Builder::default();

    for raw_line in response.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let lower = line.to_lowercase();

        if lower.contains("category") || lower.contains("section") {
            if current.has_any {
                items.push(std::mem::take(&mut current).build());
            }
            current.category = Some(extract_category_from_line(&lower));
            current.has_any = true;
        } else if lower.contains("importance")
            || lower.contains("critical")
            || lower.contains("important")
        {
            current.importance = Some(extract_importance_from_line(&lower));
            current.has_any = true;
        } else if lower.contains("description") || lower.contains("missing") {
            current.description = Some(line.to_string());
            current.has_any = true;
        } else if lower.contains("suggestion") || lower.contains("recommend") {
            current.suggestion = Some(line.to_string());
            current.has_any = true;
        }
    }
    if current.has_any {
        items.push(current.build());
    }

    if items.is_empty() {
        items.push(MissingContent {
            category: "General Analysis".to_string(),
            topic: "Paper Review".to_string(),
            importance: "Important".to_string(),
            description: "AI analysis completed but response format was unexpected".to_string(),
            suggestion: "Please review the paper for standard research paper components"
                .to_string(),
            related_sections: vec!["All sections".to_string()],
        });
    }

    items
}

fn extract_category_from_line(lower: &str) -> String {
    let category = if lower.contains("methodology") {
        "Methodology"
    } else if lower.contains("literature") {
        "Literature Review"
    } else if lower.contains("result") {
        "Results"
    } else if lower.contains("discussion") {
        "Discussion"
    } else if lower.contains("limitation") {
        "Limitations"
    } else if lower.contains("ethical") {
        "Ethics"
    } else {
        "General"
    };
    category.to_string()
}

fn extract_importance_from_line(lower: &str) -> String {
    let importance = if lower.contains("critical") {
        "Critical"
    } else if lower.contains("important") {
        "Important"
    } else {
        "Beneficial"
    };
    importance.to_string()
}

/// 项目符号列表解析，退化为长行截取，最多5条
fn parse_bullet_list(response: &str, fallback: &str) -> Vec<String> {
    let mut entries: Vec<String> = response
        .lines()
        .filter(|line| line.trim().starts_with('-'))
        .map(|line| line.trim().trim_matches(|c| c == '-' || c == ' ').to_string())
        .filter(|line| !line.is_empty())
        .collect();

    if entries.is_empty() {
        entries = response
            .lines()
            .map(str::trim)
            .filter(|line| line.len() > 10)
            .map(str::to_string)
            .take(5)
            .collect();
    }

    entries.truncate(5);
    if entries.is_empty() {
        vec![fallback.to_string()]
    } else {
        entries
    }
}

/// 缺失内容的 Critical/Important 建议在前，前三条劣势跟进，上限8条
pub fn generate_recommendations(
    missing_content: &[MissingContent],
    weaknesses: &[String],
) -> Vec<String> {
    let mut recommendations: Vec<String> = Vec::new();

    for content in missing_content {
        match content.importance.as_str() {
            "Critical" => recommendations.push(format!("CRITICAL: {}", content.suggestion)),
            "Important" => recommendations.push(format!("IMPORTANT: {}", content.suggestion)),
            _ => {}
        }
    }

    for weakness in weaknesses.iter().take(3) {
        recommendations.push(format!("Address weakness: {}", weakness));
    }

    recommendations.truncate(8);
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_fences_are_stripped() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn field_response_cleaning_handles_wrappers() {
        assert_eq!(
            clean_research_field_response("{\"field\": \"Physics\"}"),
            "Physics"
        );
        assert_eq!(clean_research_field_response("\"Biology\""), "Biology");
        assert_eq!(clean_research_field_response("Field: ml"), "Machine Learning");
        assert_eq!(
            clean_research_field_response("computer science"),
            "Computer Science"
        );
        assert_eq!(
            clean_research_field_response("quantum chemistry"),
            "Quantum Chemistry"
        );
        assert_eq!(clean_research_field_response("Medicine"), "Medicine");
    }

    #[test]
    fn keyword_fallback_picks_best_scoring_field() {
        assert_eq!(
            identify_field_by_keywords(
                "neural network training with gradient descent and backpropagation",
                ""
            ),
            "Machine Learning"
        );
        assert_eq!(
            identify_field_by_keywords("cooking recipes with tomatoes", ""),
            "Computer Science"
        );
    }

    #[test]
    fn missing_content_json_applies_field_defaults() {
        let parsed: MissingContentResponse = serde_json::from_str(
            "{\"missing_content\": [{\"category\": \"Methodology\"}]}",
        )
        .unwrap();
        let item = &parsed.missing_content[0];
        assert_eq!(item.category, "Methodology");
        assert_eq!(item.importance, "Important");
        assert_eq!(item.description, "No description provided");
        assert_eq!(item.related_sections, vec!["General"]);
    }

    #[test]
    fn text_fallback_builds_items_from_lines() {
        let response = "Category: Methodology details\n\
                        Importance: Critical\n\
                        Missing statistical tests description\n\
                        Suggestion: add statistical analysis\n\
                        Category: Literature coverage\n\
                        This is important for the field";
        let items = parse_text_response(response);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].category, "Methodology");
        assert_eq!(items[0].importance, "Critical");
        assert_eq!(items[1].category, "Literature Review");
        assert_eq!(items[1].importance, "Important");
    }

    #[test]
    fn text_fallback_yields_generic_item_when_nothing_matches() {
        let items = parse_text_response("ok");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].category, "General Analysis");
    }

    #[test]
    fn bullet_lists_are_parsed_and_capped() {
        let entries = parse_bullet_list("- one\n- two\n- three\n- four\n- five\n- six", "fb");
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0], "one");

        let entries = parse_bullet_list("a sentence that is long enough\nno", "fb");
        assert_eq!(entries, vec!["a sentence that is long enough"]);

        let entries = parse_bullet_list("no", "fallback text");
        assert_eq!(entries, vec!["fallback text"]);
    }

    #[test]
    fn recommendations_order_and_cap() {
        let missing = vec![
            MissingContent {
                category: "Methodology".into(),
                topic: "t".into(),
                importance: "Critical".into(),
                description: "d".into(),
                suggestion: "fix methods".into(),
                related_sections: vec![],
            },
            MissingContent {
                category: "Results".into(),
                topic: "t".into(),
                importance: "Beneficial".into(),
                description: "d".into(),
                suggestion: "ignored".into(),
                related_sections: vec![],
            },
            MissingContent {
                category: "Discussion".into(),
                topic: "t".into(),
                importance: "Important".into(),
                description: "d".into(),
                suggestion: "expand discussion".into(),
                related_sections: vec![],
            },
        ];
        let weaknesses: Vec<String> =
            ["w1", "w2", "w3", "w4"].iter().map(|s| s.to_string()).collect();

        let recs = generate_recommendations(&missing, &weaknesses);
        assert_eq!(recs[0], "CRITICAL: fix methods");
        assert_eq!(recs[1], "IMPORTANT: expand discussion");
        assert_eq!(recs[2], "Address weakness: w1");
        assert_eq!(recs.len(), 5);
        assert!(recs.iter().all(|r| !r.contains("ignored")));
    }

    #[test]
    fn section_analyses_parse_from_json() {
        let analysis: MethodologyAnalysis = serde_json::from_str(
            "{\"score\": 75, \"issues\": [\"vague\"], \"suggestions\": [\"clarify\"]}",
        )
        .unwrap();
        assert_eq!(analysis.score, 75.0);
        assert_eq!(analysis.issues, vec!["vague"]);

        // score 缺省时取中性分
        let analysis: DiscussionAnalysis = serde_json::from_str("{}").unwrap();
        assert_eq!(analysis.score, 50.0);
    }
}
