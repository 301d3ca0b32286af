//! Instruction templates for the research workflow stages.
//!
//! Each stage formats one of these with the current date, the research topic
//! and any accumulated summaries before invoking a provider.

use chrono::Utc;

/// Today's date in the long form the instruction templates embed.
pub fn current_date() -> String {
    Utc::now().format("%B %-d, %Y").to_string()
}

/// Prompt for turning a research topic into N diverse search queries with a
/// structured JSON reply.
pub fn query_writer_instructions(
    current_date: &str,
    research_topic: &str,
    number_queries: usize,
) -> String {
    format!(
        r#"Your goal is to generate sophisticated and diverse web search queries for researching the user's question.

Instructions:
- Always prefer a single search query; only add more if the question asks about multiple distinct aspects.
- Each query should focus on one specific aspect of the question.
- Don't produce more than {number_queries} queries.
- Queries should be diverse - if the topic is broad, generate more than one.
- Don't generate multiple similar queries; one is enough.
- Queries should ensure the most current information is gathered. The current date is {current_date}.

Format your response as a JSON object with exactly these two keys:
- "query": a list of search query strings
- "rationale": brief explanation of why these queries are relevant

Example:

Topic: What revenue grew more last year, apple stock or the number of people buying an iphone
```json
{{
    "query": ["Apple total revenue growth fiscal year 2024", "iPhone unit sales growth fiscal year 2024"],
    "rationale": "To answer this comparative question accurately, we need specific data points on both metrics."
}}
```

Context: {research_topic}"#
    )
}

/// Prompt for one web-research call over a single query.
pub fn web_searcher_instructions(current_date: &str, research_topic: &str) -> String {
    format!(
        r#"Conduct targeted web searches to gather the most recent, credible information on "{research_topic}" and synthesize it into a verifiable text artifact.

Instructions:
- Query should ensure that the most current information is gathered. The current date is {current_date}.
- Conduct multiple, diverse searches to gather comprehensive information.
- Consolidate key findings while meticulously tracking the source(s) for each specific piece of information.
- The output should be a well-written summary or report based on your search findings.
- Only include information found in the search results; don't make up any information.

Research Topic:
{research_topic}"#
    )
}

/// LLM-only research prompt used when no search-capable backend is in play.
pub fn simulated_research_prompt(search_query: &str) -> String {
    format!(
        r#"Based on the search query: "{search_query}"

Please provide a comprehensive research summary that covers:
1. Key facts and information about this topic
2. Recent developments or news
3. Important context and background
4. Relevant statistics or data points

Format your response as a well-structured research summary with clear sections."#
    )
}

/// Disclaimer appended to simulated-research output.
pub const SIMULATED_RESEARCH_NOTE: &str = "\n\n*Note: This is simulated research without real-time web search. For current information, enable hybrid architecture.*";

/// Note appended in hybrid mode when the analysis provider differs from the
/// search provider.
pub const HYBRID_NOTE: &str = "\n\n*Research Strategy: Web search performed using Gemini (Google Search), analysis will use DeepSeek as requested.*";

/// Explanatory text returned when no research strategy is usable.
pub fn research_fallback_text(search_query: &str) -> String {
    format!(
        r#"Research Summary for: {search_query}

This is a basic research placeholder. To get comprehensive web search results, please ensure:
1. Gemini API is configured for Google Search integration, OR
2. Simulated research is enabled for DeepSeek

Current search query: {search_query}"#
    )
}

/// Explanatory text returned when a research strategy raised an error.
pub fn research_error_text(search_query: &str, error: &str) -> String {
    format!(
        r#"Research Error: Unable to perform web search.

Error: {error}

To resolve this issue:
1. Ensure GEMINI_API_KEY is set for Google Search functionality
2. Enable hybrid architecture in configuration
3. Check network connectivity

Search Query: {search_query}"#
    )
}

/// Prompt asking for a sufficiency verdict over accumulated research.
pub fn reflection_instructions(
    current_date: &str,
    research_topic: &str,
    summaries: &str,
) -> String {
    format!(
        r#"You are an expert research assistant analyzing summaries about "{research_topic}".

Instructions:
- Identify knowledge gaps or areas that need deeper exploration and generate a follow-up query.
- If the provided summaries are sufficient to answer the user's question, don't generate a follow-up query.
- If there is a knowledge gap, generate a follow-up query that would help expand your understanding.
- Focus on technical details, implementation specifics, or emerging trends that weren't fully covered.
- The current date is {current_date}.

Reflect carefully on the summaries to identify knowledge gaps and produce a follow-up query.

Summaries:
{summaries}

Please respond with a JSON object in this exact format:
{{
  "is_sufficient": true/false,
  "knowledge_gap": "description of what information is missing",
  "follow_up_queries": ["query1", "query2", ...]
}}"#
    )
}

/// Prompt for synthesizing the final cited answer.
pub fn answer_instructions(current_date: &str, research_topic: &str, summaries: &str) -> String {
    format!(
        r#"Generate a high-quality answer to the user's question based on the provided summaries.

Instructions:
- The current date is {current_date}.
- You are the final step of a multi-step research process; don't mention that you are the final step.
- You have access to all the information gathered from the previous steps.
- Generate a high-quality answer to the user's question based on the provided summaries and the user's question.
- Include the sources you used from the summaries in the answer correctly, using markdown format (e.g. [apnews](https://vertexaisearch.cloud.google.com/id/0-0)). THIS IS A MUST.

User Context:
- {research_topic}

Summaries:
{summaries}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_writer_embeds_topic_and_count() {
        let prompt = query_writer_instructions("June 1, 2025", "rust async runtimes", 3);
        assert!(prompt.contains("rust async runtimes"));
        assert!(prompt.contains("more than 3 queries"));
        assert!(prompt.contains("June 1, 2025"));
    }

    #[test]
    fn test_reflection_requests_json_verdict() {
        let prompt = reflection_instructions("June 1, 2025", "topic", "summary one");
        assert!(prompt.contains("\"is_sufficient\""));
        assert!(prompt.contains("summary one"));
    }
}
