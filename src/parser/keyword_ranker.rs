use std::collections::{HashMap, HashSet};

use regex::Regex;
use tracing::debug;

use super::Sections;

/// RAKE风格的关键词抽取：按停用词切分候选短语，
/// 以词频/度数打分并叠加文本池权重，作者声明的关键词优先输出。
pub struct KeywordRanker {
    token_pattern: Regex,
    acronym_pattern: Regex,
    declared_patterns: Vec<Regex>,
    stop_words: HashSet<&'static str>,
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "if", "then", "else", "when", "while", "where",
    "with", "without", "within", "between", "among", "into", "onto", "through", "across",
    "from", "over", "under", "above", "below", "around", "about", "before", "after",
    "first", "second", "third", "fourth", "fifth", "last", "former", "latter", "new", "old",
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "per",
    "each", "every", "many", "several", "various", "other", "another", "any", "all", "both",
    "few", "more", "most", "some", "such", "same", "different", "similar", "varied",
    "we", "you", "they", "he", "she", "it", "our", "your", "their", "its", "his", "her",
    "who", "whom", "whose", "which", "that", "this", "these", "those", "there", "here",
    "been", "being", "was", "were", "are", "is", "am", "be", "have", "has", "had", "having",
    "do", "does", "did", "doing", "also", "however", "therefore", "furthermore", "moreover",
    "because", "since", "although", "though", "whereas", "yet", "besides", "overall",
    "research", "paper", "study", "article", "work", "result", "results", "finding",
    "findings", "approach", "approaches", "method", "methods", "analysis", "data", "dataset",
    "datasets", "model", "models", "system", "systems", "figure", "figures", "table", "tables",
    "section", "sections", "introduction", "related", "conclusion", "discussion",
    "abstract", "summary", "contributions", "overview", "proposed", "presented", "including",
    "via", "based", "using", "use", "used", "according", "towards", "toward",
    "amongst", "throughout", "whereby", "whichever", "whenever",
];

/// 候选短语的累计状态
struct PhraseEntry {
    weight: f64,
    length: usize,
    display: String,
    count: usize,
}

/// 词级与短语级的累计统计
#[derive(Default)]
struct RakeState {
    word_freq: HashMap<String, f64>,
    word_degree: HashMap<String, f64>,
    phrase_order: Vec<String>,
    phrase_candidates: HashMap<String, PhraseEntry>,
    acronym_counts: Vec<(String, f64)>,
}

impl RakeState {
    fn register_phrase(&mut self, token_pairs: &[(String, String)], weight: f64) {
        if token_pairs.is_empty() {
            return;
        }

        let segment_len = token_pairs.len();
        if segment_len == 1 && token_pairs[0].0.len() < 4 {
            return;
        }

        let phrase_lower = token_pairs
            .iter()
            .map(|(lower, _)| lower.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let letters_only: String = phrase_lower.chars().filter(|c| c.is_alphabetic()).collect();
        if letters_only.len() < 4 {
            return;
        }

        let display_phrase = token_pairs
            .iter()
            .map(|(_, original)| original.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let entry = self
            .phrase_candidates
            .entry(phrase_lower.clone())
            .or_insert_with(|| {
                self.phrase_order.push(phrase_lower.clone());
                PhraseEntry {
                    weight: 0.0,
                    length: segment_len,
                    // 保留首次出现的大小写
                    display: display_phrase,
                    count: 0,
                }
            });
        entry.weight += weight;
        entry.count += 1;

        for (token_lower, _) in token_pairs {
            *self.word_freq.entry(token_lower.clone()).or_insert(0.0) += weight;
            *self.word_degree.entry(token_lower.clone()).or_insert(0.0) +=
                weight * (segment_len - 1) as f64;
        }
    }

    fn add_acronym(&mut self, token: &str, weight: f64) {
        match self.acronym_counts.iter_mut().find(|(t, _)| t == token) {
            Some((_, count)) => *count += weight,
            None => self.acronym_counts.push((token.to_string(), weight)),
        }
    }
}

impl KeywordRanker {
    pub fn new() -> Self {
        Self {
            token_pattern: Regex::new(r"[A-Za-z][A-Za-z0-9\-]+").unwrap(),
            acronym_pattern: Regex::new(r"\b[A-Z]{2,}(?:[A-Z\d]+)?\b").unwrap(),
            declared_patterns: vec![
                Regex::new(r"(?i)\bkeywords?\s*[:\-]\s*(.+)").unwrap(),
                Regex::new(r"(?i)\bindex\s+terms?\s*[:\-]\s*(.+)").unwrap(),
                Regex::new(r"(?i)\bkey\s+phrases?\s*[:\-]\s*(.+)").unwrap(),
            ],
            stop_words: STOP_WORDS.iter().copied().collect(),
        }
    }

    /// 抽取至多 max_keywords 个关键词：声明关键词 -> 高分短语 -> 高频缩写
    pub fn extract(
        &self,
        text: &str,
        title: &str,
        sections: &Sections,
        max_keywords: usize,
    ) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        let declared_keywords = self.extract_declared_keywords(text);

        let mut state = RakeState::default();

        // 标题与各章节按重要性加权，全篇正文兜底
        self.process_text(&mut state, title, 3.0);
        self.process_text(&mut state, &sections.abstract_text, 2.5);
        self.process_text(&mut state, &sections.introduction, 1.5);
        self.process_text(&mut state, &sections.conclusion, 1.3);
        self.process_text(&mut state, text, 1.0);

        self.track_acronyms(&mut state, title, 2.0);
        self.track_acronyms(&mut state, &sections.abstract_text, 2.0);
        self.track_acronyms(&mut state, text, 1.0);

        if state.word_freq.is_empty() || state.phrase_candidates.is_empty() {
            return declared_keywords
                .iter()
                .take(max_keywords)
                .map(|k| title_case_keyword(k))
                .collect();
        }

        let word_scores: HashMap<&str, f64> = state
            .word_freq
            .iter()
            .map(|(token, freq)| {
                (
                    token.as_str(),
                    (state.word_degree.get(token).copied().unwrap_or(0.0) + freq) / freq,
                )
            })
            .collect();

        let mut phrase_scores: Vec<(&str, f64)> = state
            .phrase_order
            .iter()
            .map(|phrase_lower| {
                let data = &state.phrase_candidates[phrase_lower];
                let token_sum: f64 = phrase_lower
                    .split(' ')
                    .map(|token| word_scores.get(token).copied().unwrap_or(0.0))
                    .sum();
                let mut score = token_sum * data.weight * (1.0 + 0.15 * (data.length - 1) as f64);
                // 多次出现的短语获得轻微加成
                score *= ((data.count + 2) as f64).ln();
                (phrase_lower.as_str(), score)
            })
            .collect();
        phrase_scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut keywords: Vec<String> = Vec::new();
        let mut seen_keys: HashSet<String> = HashSet::new();

        for original in &declared_keywords {
            if keywords.len() >= max_keywords {
                break;
            }
            add_keyword(original, &mut keywords, &mut seen_keys);
        }

        for (phrase_lower, _score) in &phrase_scores {
            if keywords.len() >= max_keywords {
                break;
            }
            let data = &state.phrase_candidates[*phrase_lower];
            let normalized_key = phrase_lower.replace('-', " ");
            if seen_keys.contains(&normalized_key) {
                continue;
            }
            add_keyword(&data.display, &mut keywords, &mut seen_keys);
        }

        if keywords.len() < max_keywords {
            let mut sorted_acronyms = state.acronym_counts.clone();
            sorted_acronyms
                .sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            for (acronym, _) in &sorted_acronyms {
                if keywords.len() >= max_keywords {
                    break;
                }
                add_keyword(acronym, &mut keywords, &mut seen_keys);
            }
        }

        debug!("关键词抽取: 声明 {} 个, 输出 {} 个", declared_keywords.len(), keywords.len());
        keywords
    }

    /// 按停用词与短词切分短语并累计权重
    fn process_text(&self, state: &mut RakeState, source_text: &str, weight: f64) {
        if source_text.is_empty() {
            return;
        }

        let mut current_phrase: Vec<(String, String)> = Vec::new();
        for m in self.token_pattern.find_iter(source_text) {
            let original = m.as_str();
            let lower = original.to_lowercase();
            if self.stop_words.contains(lower.as_str()) || lower.len() < 3 {
                if !current_phrase.is_empty() {
                    state.register_phrase(&current_phrase, weight);
                    current_phrase.clear();
                }
            } else {
                current_phrase.push((lower, original.to_string()));
            }
        }
        if !current_phrase.is_empty() {
            state.register_phrase(&current_phrase, weight);
        }
    }

    fn track_acronyms(&self, state: &mut RakeState, source_text: &str, weight: f64) {
        if source_text.is_empty() {
            return;
        }
        for m in self.acronym_pattern.find_iter(source_text) {
            let token = m.as_str();
            if token.len() <= 2 {
                continue;
            }
            state.add_acronym(token, weight);
        }
    }

    /// 作者在 Keywords/Index Terms/Key Phrases 行中声明的关键词，保序去重
    fn extract_declared_keywords(&self, text: &str) -> Vec<String> {
        let mut keyword_sections: Vec<&str> = Vec::new();

        for line in text.lines() {
            let stripped = line.trim();
            if stripped.is_empty() {
                continue;
            }
            for pattern in &self.declared_patterns {
                if let Some(caps) = pattern.captures(stripped) {
                    keyword_sections.push(caps.get(1).unwrap().as_str());
                    break;
                }
            }
        }

        let mut declared: Vec<String> = Vec::new();
        for section in keyword_sections {
            for token in section.split([';', ',']) {
                let candidate = token.trim().trim_end_matches(['.', ';', ':']);
                if candidate.len() < 3 || candidate.split_whitespace().count() > 3 {
                    continue;
                }
                declared.push(candidate.to_string());
            }
        }

        let mut seen: HashSet<String> = HashSet::new();
        declared.retain(|keyword| {
            let normalized = keyword
                .to_lowercase()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            !normalized.is_empty() && seen.insert(normalized)
        });
        declared
    }
}

/// 输出端的去重与长度门槛：至多3个词，按归一化形式去重
fn add_keyword(keyword: &str, keywords: &mut Vec<String>, seen: &mut HashSet<String>) -> bool {
    let token_count = keyword.split_whitespace().count();
    if token_count == 0 || token_count > 3 {
        return false;
    }
    let normalized = normalize_keyword(keyword);
    if normalized.is_empty() || !seen.insert(normalized) {
        return false;
    }
    keywords.push(title_case_keyword(keyword));
    true
}

/// 小写化后把非字母数字折叠为单个空格
fn normalize_keyword(keyword: &str) -> String {
    keyword
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// 首字母大写，全大写的缩写保持原样
fn title_case_keyword(keyword: &str) -> String {
    keyword
        .split_whitespace()
        .map(|word| {
            let has_lower = word.chars().any(|c| c.is_lowercase());
            let has_upper = word.chars().any(|c| c.is_uppercase());
            if !has_lower && has_upper && word.chars().count() > 1 {
                word.to_string()
            } else {
                capitalize(word)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sections_with_abstract(abstract_text: &str) -> Sections {
        Sections {
            abstract_text: abstract_text.to_string(),
            ..Sections::default()
        }
    }

    #[test]
    fn declared_keywords_come_first() {
        let text = "Keywords: deep learning; graph networks; transformers\n\
                    The deep learning pipeline trains graph networks repeatedly.";
        let ranker = KeywordRanker::new();
        let keywords = ranker.extract(text, "", &Sections::default(), 10);

        assert_eq!(keywords[0], "Deep Learning");
        assert_eq!(keywords[1], "Graph Networks");
        assert_eq!(keywords[2], "Transformers");
    }

    #[test]
    fn max_keywords_is_a_hard_cap() {
        let text = "Keywords: alpha beta; gamma delta; epsilon zeta; eta theta\n\
                    alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let ranker = KeywordRanker::new();
        let keywords = ranker.extract(text, "", &Sections::default(), 3);
        assert_eq!(keywords.len(), 3);
    }

    #[test]
    fn declared_keywords_filling_the_cap_block_ranked_phrases() {
        let text = "Keywords: aa bb; cc dd\nquantum computing is wonderful";
        let ranker = KeywordRanker::new();
        let keywords = ranker.extract(text, "", &Sections::default(), 2);
        assert_eq!(keywords, vec!["Aa Bb", "Cc Dd"]);
    }

    #[test]
    fn ranked_phrases_do_not_duplicate_declared_ones() {
        let text = "Keywords: quantum computing\n\
                    Quantum computing promises quantum computing advances in quantum computing.";
        let ranker = KeywordRanker::new();
        let keywords = ranker.extract(text, "", &Sections::default(), 10);

        let normalized: Vec<String> = keywords.iter().map(|k| normalize_keyword(k)).collect();
        let mut deduped = normalized.clone();
        deduped.dedup();
        assert_eq!(normalized, deduped);
        assert_eq!(
            normalized.iter().filter(|k| *k == "quantum computing").count(),
            1
        );
    }

    #[test]
    fn acronyms_keep_their_casing() {
        let text = "BERT embeddings improve retrieval. BERT fine-tuning helps. BERT wins.";
        let ranker = KeywordRanker::new();
        let keywords = ranker.extract(
            text,
            "BERT Retrieval Advances",
            &sections_with_abstract("BERT remains strong."),
            10,
        );
        assert!(keywords.iter().any(|k| k == "BERT" || k.starts_with("BERT ")));
    }

    #[test]
    fn only_boundary_tokens_yield_declared_fallback() {
        let ranker = KeywordRanker::new();
        let keywords = ranker.extract("an ox up to it", "", &Sections::default(), 5);
        assert!(keywords.is_empty());
    }

    #[test]
    fn empty_text_yields_nothing() {
        let ranker = KeywordRanker::new();
        assert!(ranker.extract("", "Some Title", &Sections::default(), 5).is_empty());
    }

    #[test]
    fn title_case_preserves_acronyms() {
        assert_eq!(title_case_keyword("NLP models"), "NLP Models");
        assert_eq!(title_case_keyword("deep learning"), "Deep Learning");
        assert_eq!(title_case_keyword("BERT"), "BERT");
    }

    #[test]
    fn normalization_collapses_punctuation() {
        assert_eq!(normalize_keyword("Graph-based  Models!"), "graph based models");
    }
}
