//! Predefined-prompt analyses over user activity and data, with typed JSON
//! replies and heuristic fallbacks when a reply can't be parsed.

use crate::structured;
use providers::{InvokeRequest, LlmInvoker};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::settings::ResearchSettings;
use tracing::warn;

/// Low temperatures: these are extraction tasks, not creative ones.
const ANALYSIS_TEMPERATURE: f32 = 0.1;
const BEHAVIOR_TEMPERATURE: f32 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBehaviorAnalysis {
    pub behavior_pattern: String,
    pub search_history: Vec<String>,
    pub prompt_suggestions: Vec<String>,
    pub optimization_tips: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataAnalysis {
    pub data_insights: String,
    pub patterns: Vec<String>,
    pub key_findings: Vec<String>,
    pub data_quality: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub column: String,
    pub operator: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQueryAnalysis {
    pub interpretation: String,
    pub filters: Vec<QueryFilter>,
}

fn user_context(profile: Option<&Value>) -> String {
    let Some(profile) = profile else {
        return String::new();
    };
    let field = |key: &str, default: &str| -> String {
        profile
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    };
    let mut narrative = format!(
        "**User Profile**: {} with {} experience. Prefers {} communication. ",
        field("role", "Analyst"),
        field("experience_level", "intermediate"),
        field("preferred_communication_style", "detailed"),
    );
    if let Some(goals) = profile.get("goals").and_then(Value::as_str) {
        narrative.push_str(&format!("Goal: {goals}."));
    }
    format!("\n--- Context ---\n{narrative}\nTailor your analysis to this user's needs.\n")
}

fn pretty(value: Option<&Value>) -> String {
    value
        .and_then(|v| serde_json::to_string_pretty(v).ok())
        .unwrap_or_else(|| "[]".to_string())
}

fn behavior_prompt(behavior_summary: &Value, profile: Option<&Value>) -> String {
    let joined = |key: &str| -> String {
        behavior_summary
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default()
    };
    format!(
        r#"# MISSION
You are a Senior UX Analyst and AI Prompt Engineering expert. Analyze a user's behavior within a data analysis tool and provide personalized, actionable feedback.
{context}
# USER BEHAVIOR CONTEXT
- Total Actions: {total}
- Unique Action Types Used: {action_types}
- Recent Search Queries: {queries}
- Detailed Recent Action Log:
```json
{actions}
```

# TASK
1. Characterize the user: Explorer, Focused Analyst, Novice, or Power User? Justify it.
2. Analyze search intent: themes, goals, or confusion in the search history.
3. Generate specific, actionable prompt suggestions.
4. Suggest 2-3 concrete workflow tips.

# OUTPUT FORMAT
Provide ONLY a valid JSON object with no additional text:
{{
  "behaviorPattern": "Detailed analysis of user interaction patterns and workflow efficiency",
  "searchHistory": ["Key insight about search behavior 1", "Search pattern observation 2"],
  "promptSuggestions": ["Specific prompt improvement 1", "Tailored suggestion 2"],
  "optimizationTips": ["Workflow improvement 1", "Feature recommendation 2"]
}}"#,
        context = user_context(profile),
        total = behavior_summary
            .get("totalActions")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        action_types = joined("actionTypes"),
        queries = joined("searchQueries"),
        actions = pretty(behavior_summary.get("recentActions")),
    )
}

fn chart_prompt(data_summary: &Value, chart_config: &Value, profile: Option<&Value>) -> String {
    let config = |key: &str| -> String {
        chart_config
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or("N/A")
            .to_string()
    };
    let range = |bound: &str| -> String {
        data_summary
            .get("dataRange")
            .and_then(|r| r.get(bound))
            .map(|v| v.to_string())
            .unwrap_or_else(|| "N/A".to_string())
    };
    format!(
        r#"# MISSION
You are a senior data analyst with expertise in statistical analysis and data visualization insights. Analyze chart data and provide clear, actionable insights in a structured JSON format.
{context}
# CHART DATA CONTEXT
- Chart Type: {chart_type}
- X-Axis (Dimension): {x_axis}
- Y-Axis (Metric): {y_axis}
- Total Records: {records}
- Value Range: {min} to {max}
- Sample Data:
```json
{sample}
```

# TASK
Reason about insights, patterns, findings, and data quality, then populate the JSON structure below. Base your analysis only on the provided data; if unsure, say "I'm not sure."

# OUTPUT FORMAT
Provide ONLY a valid JSON object with no additional text:
{{
  "dataInsights": "Comprehensive summary of what the data reveals",
  "patterns": ["Specific pattern 1", "Specific pattern 2"],
  "keyFindings": ["Actionable insight 1", "Critical finding 2"],
  "dataQuality": "Assessment of data completeness, accuracy, and reliability"
}}"#,
        context = user_context(profile),
        chart_type = config("type"),
        x_axis = config("xAxis"),
        y_axis = config("yAxis"),
        records = data_summary
            .get("totalRecords")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        min = range("min"),
        max = range("max"),
        sample = pretty(data_summary.get("sampleData")),
    )
}

fn search_query_prompt(
    query: &str,
    available_columns: &[String],
    sample_data: &Value,
    profile: Option<&Value>,
) -> String {
    format!(
        r#"# MISSION
You are an intelligent search query interpreter. Convert a user's natural language query about a dataset into a structured list of filters.
{context}
# CONTEXT
- Available Columns in the data: {columns}
- Sample Data Rows:
```json
{sample}
```

# OPERATOR MAPPING
- "equals", "is", "=" mapped to "equals"
- "contains", "includes", "has" mapped to "contains"
- "greater than", "more than", ">" mapped to "greater"
- "less than", "below", "<" mapped to "less"
- "at least", ">=" mapped to "greaterEqual"
- "at most", "<=" mapped to "lessEqual"

# TASK
Map the query below to the available columns, choosing the correct operator and value. Only use columns from the available list.

- User Query: "{query}"

# OUTPUT FORMAT
Respond ONLY with a valid JSON object. The `filters` array can be empty if the query cannot be translated.
{{
  "interpretation": "How you understood the query and what filters will be applied",
  "filters": [
    {{
      "column": "exact_column_name_from_available_list",
      "operator": "equals|contains|greater|less|greaterEqual|lessEqual",
      "value": "properly_typed_value"
    }}
  ]
}}"#,
        context = user_context(profile),
        columns = available_columns.join(", "),
        sample = serde_json::to_string_pretty(sample_data).unwrap_or_else(|_| "[]".to_string()),
    )
}

/// Invoke, parse typed JSON, and degrade to the fallback on any failure.
async fn run_analysis<T: for<'de> Deserialize<'de>>(
    invoker: &dyn LlmInvoker,
    prompt: String,
    temperature: f32,
    settings: &ResearchSettings,
    fallback: T,
) -> T {
    let mut req = InvokeRequest::new(prompt, settings.provider, temperature);
    req.session_id = settings.session_id.clone();
    let text = match invoker.invoke(req).await {
        Ok(invocation) => invocation.text,
        Err(e) => {
            warn!(error = %e, "analysis call failed, using fallback");
            return fallback;
        }
    };
    match structured::parse_json_reply::<T>(&text) {
        Some(parsed) => parsed,
        None => {
            warn!("analysis reply was not valid JSON, using fallback");
            fallback
        }
    }
}

pub async fn analyze_user_behavior(
    invoker: &dyn LlmInvoker,
    behavior_summary: &Value,
    user_profile: Option<&Value>,
    settings: &ResearchSettings,
) -> UserBehaviorAnalysis {
    let fallback = UserBehaviorAnalysis {
        behavior_pattern: "Could not analyze user behavior.".to_string(),
        search_history: Vec::new(),
        prompt_suggestions: Vec::new(),
        optimization_tips: Vec::new(),
    };
    run_analysis(
        invoker,
        behavior_prompt(behavior_summary, user_profile),
        BEHAVIOR_TEMPERATURE,
        settings,
        fallback,
    )
    .await
}

pub async fn analyze_chart_data(
    invoker: &dyn LlmInvoker,
    data_summary: &Value,
    chart_config: &Value,
    user_profile: Option<&Value>,
    settings: &ResearchSettings,
) -> ChartDataAnalysis {
    let axis = |key: &str| -> String {
        chart_config
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or("N/A")
            .to_string()
    };
    let fallback = ChartDataAnalysis {
        data_insights: format!("Analysis for {} vs {}", axis("xAxis"), axis("yAxis")),
        patterns: Vec::new(),
        key_findings: Vec::new(),
        data_quality: "Not assessed due to error.".to_string(),
    };
    run_analysis(
        invoker,
        chart_prompt(data_summary, chart_config, user_profile),
        ANALYSIS_TEMPERATURE,
        settings,
        fallback,
    )
    .await
}

pub async fn analyze_search_query(
    invoker: &dyn LlmInvoker,
    query: &str,
    available_columns: &[String],
    sample_data: &Value,
    settings: &ResearchSettings,
) -> SearchQueryAnalysis {
    let fallback = SearchQueryAnalysis {
        interpretation: format!("Could not interpret query: '{query}'"),
        filters: Vec::new(),
    };
    run_analysis(
        invoker,
        search_query_prompt(query, available_columns, sample_data, None),
        ANALYSIS_TEMPERATURE,
        settings,
        fallback,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockInvoker;
    use serde_json::json;

    #[tokio::test]
    async fn test_behavior_analysis_parses_camel_case_reply() {
        let invoker = MockInvoker::returning(
            r#"```json
{"behaviorPattern": "Focused Analyst", "searchHistory": ["narrow queries"], "promptSuggestions": ["add timeframes"], "optimizationTips": ["save filters"]}
```"#,
        );
        let summary = json!({"totalActions": 12, "actionTypes": ["search"], "searchQueries": ["q"]});
        let analysis = analyze_user_behavior(
            &invoker,
            &summary,
            None,
            &ResearchSettings::default(),
        )
        .await;

        assert_eq!(analysis.behavior_pattern, "Focused Analyst");
        assert_eq!(analysis.optimization_tips, vec!["save filters"]);
    }

    #[tokio::test]
    async fn test_behavior_analysis_uses_raised_temperature() {
        let invoker = MockInvoker::returning(
            r#"{"behaviorPattern": "p", "searchHistory": [], "promptSuggestions": [], "optimizationTips": []}"#,
        );
        analyze_user_behavior(&invoker, &json!({}), None, &ResearchSettings::default()).await;
        assert!((invoker.requests()[0].temperature - 0.3).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_chart_analysis_fallback_names_axes() {
        let invoker = MockInvoker::failing();
        let config = json!({"type": "bar", "xAxis": "month", "yAxis": "revenue"});
        let analysis = analyze_chart_data(
            &invoker,
            &json!({}),
            &config,
            None,
            &ResearchSettings::default(),
        )
        .await;

        assert_eq!(analysis.data_insights, "Analysis for month vs revenue");
        assert_eq!(analysis.data_quality, "Not assessed due to error.");
    }

    #[tokio::test]
    async fn test_unparseable_reply_falls_back() {
        let invoker = MockInvoker::returning("The user seems curious and engaged.");
        let analysis = analyze_user_behavior(
            &invoker,
            &json!({}),
            None,
            &ResearchSettings::default(),
        )
        .await;
        assert_eq!(analysis.behavior_pattern, "Could not analyze user behavior.");
    }

    #[tokio::test]
    async fn test_search_query_filters_round_trip() {
        let invoker = MockInvoker::returning(
            r#"{"interpretation": "filter price over 100", "filters": [{"column": "Price", "operator": "greater", "value": 100}]}"#,
        );
        let columns = vec!["Price".to_string(), "Region".to_string()];
        let analysis = analyze_search_query(
            &invoker,
            "products with prices over 100",
            &columns,
            &json!([]),
            &ResearchSettings::default(),
        )
        .await;

        assert_eq!(analysis.filters.len(), 1);
        assert_eq!(analysis.filters[0].column, "Price");
        assert_eq!(analysis.filters[0].value, json!(100));
    }

    #[tokio::test]
    async fn test_profile_context_embedded_in_prompt() {
        let invoker = MockInvoker::returning(
            r#"{"behaviorPattern": "p", "searchHistory": [], "promptSuggestions": [], "optimizationTips": []}"#,
        );
        let profile = json!({"role": "Engineer", "goals": "ship faster"});
        analyze_user_behavior(
            &invoker,
            &json!({}),
            Some(&profile),
            &ResearchSettings::default(),
        )
        .await;

        let prompt = &invoker.requests()[0].prompt;
        assert!(prompt.contains("**User Profile**: Engineer"));
        assert!(prompt.contains("Goal: ship faster."));
    }
}
