//! 提示词上下文
//!
//! 模型后端只认识这一个结构，不关心题目从哪里来

/// 系统指令
pub const SYSTEM_INSTRUCTION: &str =
    "You are a data analysis expert. Analyze quiz questions and provide precise answers.";

/// 输出格式要求
pub const FORMAT_GUIDANCE: &str = r#"Respond with a JSON object in this EXACT format:
{
    "submit_url": "the submission endpoint URL extracted from quiz content",
    "answer": "your answer (can be boolean, number, string, object, etc)",
    "reasoning": "brief explanation of your solution",
    "data_sources": ["list of URLs or files needed"],
    "processing_steps": ["step 1", "step 2", ...]
}

IMPORTANT:
- Extract the EXACT submission URL from the quiz content
- Make sure your answer matches the expected type (number, string, boolean, etc.)
- A number must be written as a bare JSON number, not inside quotes
- For file downloads, include the download URL in data_sources
- Show all calculation steps in reasoning

Output ONLY the JSON object, nothing else."#;

/// 一次模型调用所需的全部上下文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    pub system_instruction: String,
    pub page_url: String,
    pub page_content: String,
    pub format_guidance: String,
}

impl PromptContext {
    /// 为一道题构建上下文
    pub fn for_quiz(page_url: impl Into<String>, page_content: impl Into<String>) -> Self {
        Self {
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            page_url: page_url.into(),
            page_content: page_content.into(),
            format_guidance: FORMAT_GUIDANCE.to_string(),
        }
    }

    /// 用户消息正文
    pub fn user_message(&self) -> String {
        format!(
            r#"You are an expert data analyst and quiz solver. You have been given a quiz question that may involve:
- Data sourcing (downloading files, scraping websites, calling APIs)
- Data preparation (cleaning, parsing PDFs, text processing)
- Data analysis (filtering, aggregation, statistics, machine learning)
- Data visualization (creating charts, graphs, narratives)

QUIZ CONTENT:
{}

QUIZ URL: {}

Your task:
1. Carefully read and understand the quiz question
2. Identify what data sources need to be accessed (URLs, APIs, files)
3. Determine what processing/analysis is required
4. Calculate or determine the correct answer
5. Extract the submission URL from the quiz content
6. Format your response as JSON

CRITICAL INSTRUCTIONS:
- The quiz content contains a submission URL (often https://...submit). You MUST extract this URL.
- The answer type may be: boolean, number, string, base64 URI, or a JSON object
- Be precise with numbers and calculations

{}"#,
            self.page_content, self.page_url, self.format_guidance
        )
    }
}
