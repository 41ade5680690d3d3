//! Prompt templates and the prompt composer.
//!
//! Templates are static text with three placeholders: `{notes}` (founder
//! notes), `{pitch}` (cleaned pitch-deck text) and `{highlights}` (emphasized
//! terms, one per line; only the highlights template uses it). The JSON
//! skeletons inside the templates contain literal braces, so substitution
//! only touches those exact placeholder tokens, and it does so in one pass:
//! a placeholder that appears inside the user's own notes is left as typed.

use crate::config::PromptTemplate;
use crate::output::ExtractedContent;

/// Exhaustive analyst brief.
pub const DEEP_RESEARCH_PROMPT: &str = r#"
You are a business analyst conducting deep research on innovative companies. Analyze the product information below and return comprehensive insights as JSON.

**CONTENT TO ANALYZE:**
Founder Notes: {notes}
Pitch Content: {pitch}

**REQUIRED JSON OUTPUT:**
{
  "title": "Product name with key differentiator",
  "description": "Detailed 3-4 sentence explanation of what the product does, target market, and quantifiable impact",
  "audience": "A concise, comma-separated list of specific user types (roles, industries, customer segments) drawn only from the input. No paragraphs.",
  "problemStatements": [
    "A significant problem unique to the domain, with its nuances and impacts.",
    "A distinct problem on a different dimension, with real-world implications.",
    "A third problem on another aspect, with its contextual challenges."
  ],
  "tags": ["Technical and business keywords drawn from the content"],
  "followUpQuestions": [
    "A question about an intriguing, unique aspect of the company and why it matters.",
    "A differently structured question about another distinctive characteristic.",
    "A question only this company could authentically answer."
  ],
  "burningProblems": [
    "A current business challenge grounded in their market position or stage.",
    "A pressing operational, growth or strategic issue.",
    "A realistic challenge with immediate practical implications."
  ]
}

**PROBLEM STATEMENTS (2-3 sentences each):**
Derive them from the actual content. Say who is affected, why it matters, and quantify where the content allows.

**FOLLOW-UP QUESTIONS:**
Find 3 genuinely unique aspects of the content and ask about their implementation, rationale or impact. Each question must be structurally distinct and relevant only to this company.

**BURNING PROBLEMS:**
Assess their market position, stage and sector, then state 3 immediate challenges. Be specific; do not fall back on general templates.

**QUALITY STANDARDS:**
- Reflect the specific input; adopt its terminology.
- Do not add information that is not present in the input.
- Arrays contain exactly 3 fully developed string items.

Respond with valid JSON only.
"#;

/// Content-driven procedure (default).
pub const DYNAMIC_PROMPT: &str = r#"
Analyze this product information and return insights as JSON.

**INPUT:**
Founder Notes: {notes}
Pitch Content: {pitch}

**OUTPUT (JSON only):**
{
  "title": "Product name with the differentiator that captures its core innovation or positioning",
  "description": "2-3 sentences on what the product does, the specific market it serves, and the measurable impact it delivers, including the core technology and unique value proposition.",
  "audience": "The primary user/buyer segment: roles, industry context, current pain points, and what they value in a solution.",
  "problemStatements": [
    "The first major pain point this product addresses, based entirely on the input, with quantified impact where available.",
    "A second, distinct challenge the product solves and how it shows up for the target users.",
    "A third problem area on a different dimension, and why it matters to this audience."
  ],
  "tags": ["Domain keywords taken directly from the content: technologies, verticals, business model, advantages"],
  "followUpQuestions": [
    "First question about a specific detail in the content",
    "Second question about a different specific detail",
    "Third question about yet another specific detail"
  ],
  "burningProblems": [
    "First realistic business challenge statement",
    "Second realistic business challenge statement",
    "Third realistic business challenge statement"
  ]
}

**FOLLOW-UP QUESTIONS:**
1. Scan the content for specific technologies, methods, numbers, processes, customer segments or unusual approaches.
2. Pick the 3 most specific details.
3. Ask one natural, conversational question about each, with a different structure every time.
A good question could not be asked about any other company.

**BURNING PROBLEMS:**
1. Consider their stage, market position, customers and operations.
2. Identify the immediate, practical challenges they are most likely managing now.
3. Write each as a plain factual statement, not a question, each about a different part of the business.

**RULES:**
- Extract information directly from the content. Do not add facts that are not in the input.
- Avoid generic business language unless the content uses it.
- 'problemStatements', 'followUpQuestions' and 'burningProblems' are always lists of exactly three separate strings.
"#;

/// Conversational, curiosity-first.
pub const FOUNDER_LENS_PROMPT: &str = r#"
Analyze this startup as if you were meeting the founder for coffee and genuinely curious about what they are building.

**FOUNDER NOTES:**
{notes}

**PITCH DECK CONTENT:**
{pitch}

Your goal: understand their world well enough to ask questions that make them think "this person really gets what I'm trying to do."

Think about:
- What is truly unique about their approach?
- Which assumptions might be wrong?
- What important details did they skip?
- What would worry you in their shoes?

Follow-up questions should make the founder pause and think rather than recite a rehearsed answer. Burning problems should be what keeps THIS founder awake, based on what they are actually building, not what worries every founder.

Output ONLY valid JSON:

{
  "title": "Product name and positioning",
  "description": "Clear explanation showing you understand what they are building and why it matters",
  "audience": "Who will actually pay for this product",
  "problemStatements": ["Three specific problems this product addresses"],
  "tags": ["5-8 relevant tags about the product, technology or domain"],
  "followUpQuestions": ["Three questions that show deep understanding of their situation"],
  "burningProblems": ["Three specific challenges THIS founder likely faces"]
}

Use only facts present in the notes and pitch content.
"#;

/// Adds emphasized terms and weights headlines.
pub const HIGHLIGHTS_PROMPT: &str = r#"
You are an expert business analyst helping validate early-stage startup ideas.

CONTENT PROVIDED:
- Founder Notes: {notes}
- Full Pitch Text: {pitch}
- Key Highlights / Headers from Pitch:
{highlights}

TASK: Analyze the above and return structured business insights in JSON.

RULES:
- Give high weight to bold or large-font text (headlines), especially metrics, claims and positioning statements.
- Extract and elevate quantitative or strategic information from headers and key sentences.
- Cover finance, marketing, business model, legal/compliance, growth, operations and product, not only technology.
- Avoid assumptions; stick to the content.

OUTPUT FORMAT (valid JSON only):

{
  "title": "Product name with key differentiator",
  "description": "3-4 sentences on what the product does, for whom, and why it matters, using real metrics from the content where available",
  "audience": "Comma-separated list of specific roles, users or customer types from the content, no full sentences",
  "problemStatements": ["...", "...", "..."],
  "tags": ["...", "...", "..."],
  "followUpQuestions": ["...", "...", "..."],
  "burningProblems": ["...", "...", "..."]
}

SECTION REQUIREMENTS:
- problemStatements: 2-3 sentences each; domain-specific pain points, who is affected and the consequences.
- followUpQuestions: 3 original questions about this startup; at least one on finance, go-to-market, operations, legal or marketing.
- burningProblems: 3 urgent challenges grounded in the content (funding, team, compliance, market entry, scale, partnerships).

Use only what is found in the pitch or the founder notes. Each array has exactly 3 fully developed entries, with no placeholders.
"#;

/// The template text for a variant.
pub fn template_text(template: PromptTemplate) -> &'static str {
    match template {
        PromptTemplate::DeepResearch => DEEP_RESEARCH_PROMPT,
        PromptTemplate::Dynamic => DYNAMIC_PROMPT,
        PromptTemplate::FounderLens => FOUNDER_LENS_PROMPT,
        PromptTemplate::Highlights => HIGHLIGHTS_PROMPT,
    }
}

/// Prepare pitch text for interpolation: trim, turn every newline into a
/// single space, then cut to `max_chars` characters (not bytes). The cut
/// may split a word. Only `\n` is replaced, so a `\r` before it survives
/// and the length never changes below the cap.
pub fn clean_text(text: &str, max_chars: usize) -> String {
    text.trim()
        .replace('\n', " ")
        .chars()
        .take(max_chars)
        .collect()
}

/// Build the prompt for one analysis. Pure and deterministic.
pub fn compose_prompt(
    template: PromptTemplate,
    notes: &str,
    content: &ExtractedContent,
    max_pitch_chars: usize,
) -> String {
    let pitch = clean_text(&content.body_text, max_pitch_chars);
    let highlights = content.highlights_block();
    fill_placeholders(
        template_text(template),
        &[
            ("notes", notes),
            ("pitch", &pitch),
            ("highlights", &highlights),
        ],
    )
}

/// Replace `{key}` tokens in one left-to-right pass. Substituted values are
/// never rescanned.
fn fill_placeholders(template: &str, vars: &[(&str, &str)]) -> String {
    let extra: usize = vars.iter().map(|(_, v)| v.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after_brace = &rest[open + 1..];

        let hit = vars.iter().find_map(|(key, value)| {
            after_brace
                .strip_prefix(key)
                .and_then(|t| t.strip_prefix('}'))
                .map(|tail| (*value, tail))
        });

        match hit {
            Some((value, tail)) => {
                out.push_str(value);
                rest = tail;
            }
            None => {
                out.push('{');
                rest = after_brace;
            }
        }
    }
    out.push_str(rest);
    out
}
