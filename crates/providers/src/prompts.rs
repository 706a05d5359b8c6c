//! Prompt text for the research and synthesis phases.

use crate::provider::Options;

pub const RESEARCH_SYSTEM_PROMPT: &str = "You are a professional market research analyst. \
Provide detailed, well-structured analysis with up-to-date information.";

pub const SYNTHESIS_SYSTEM_PROMPT: &str = "You are an expert industry analyst. \
Analyze the provided research data and generate structured insights.";

/// Used when the options carry no `focus_areas`.
const DEFAULT_FOCUS: &str = "general overview";

/// Top-level keys the synthesis phase asks the model to produce.
pub const SYNTHESIS_SECTIONS: [&str; 7] = [
    "market_overview",
    "key_insights",
    "competitive_analysis",
    "trends",
    "opportunities",
    "risks",
    "recommendations",
];

/// Comma-separated `focus_areas` option, or the default focus.
pub fn focus_line(options: &Options) -> String {
    let areas: Vec<&str> = options
        .get("focus_areas")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();
    if areas.is_empty() {
        DEFAULT_FOCUS.to_string()
    } else {
        areas.join(", ")
    }
}

/// User prompt for the research phase.
pub fn research_prompt(topic: &str, options: &Options) -> String {
    format!(
        "Conduct a comprehensive research analysis on {topic}.
Focus on: {focus}

Please provide detailed information including:
1. Market Overview
   - Current state
   - Key statistics
   - Major trends

2. Key Players and Competition
   - Market leaders
   - Emerging players
   - Competitive dynamics

3. Technology Landscape
   - Current technologies
   - Emerging technologies
   - Technical challenges

4. Market Opportunities
   - Growth areas
   - Unmet needs
   - Potential innovations

5. Challenges and Risks
   - Market barriers
   - Regulatory concerns
   - Technical limitations

6. Future Outlook
   - Growth projections
   - Expected developments
   - Potential disruptions

Use real-time data and recent sources. Include specific examples and data points where available.",
        focus = focus_line(options),
    )
}

/// User prompt for the synthesis phase.
pub fn synthesis_prompt(research: &str) -> String {
    format!(
        r#"Analyze the following research data and provide strategic insights:

{research}

Based on this research, provide a structured analysis as a single JSON object with these sections:
{{
    "market_overview": {{
        "summary": "Brief overview of current market state",
        "key_metrics": ["Important market metrics"],
        "growth_rate": "Current or projected growth rate"
    }},
    "key_insights": ["Major insights derived from the research"],
    "competitive_analysis": {{
        "market_leaders": ["Leading companies"],
        "emerging_players": ["Promising startups and new entrants"],
        "competitive_dynamics": "Analysis of the competitive landscape"
    }},
    "trends": [{{"name": "Trend name", "description": "Details", "impact": "Impact on the industry"}}],
    "opportunities": [{{"area": "Opportunity area", "description": "Details", "potential_impact": "Estimated impact"}}],
    "risks": [{{"type": "Risk type", "description": "Details", "mitigation": "Mitigation strategies"}}],
    "recommendations": [{{"action": "Recommended action", "rationale": "Why", "priority": "High/Medium/Low"}}]
}}

Ensure all responses are detailed, actionable, and backed by the research data."#
    )
}
