// LLM prompt constants for direct question generation.

/// System prompt for question generation; enforces JSON-only output.
pub const GENERATION_SYSTEM: &str =
    "You are an expert interview question writer crafting real-world interview \
    questions across technical domains. \
    You MUST respond with valid JSON only: a JSON array of question objects. \
    Do NOT include any text outside the JSON array. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Generation prompt template.
/// Replace: {topic}, {count}, {type_instruction}
pub const GENERATION_PROMPT_TEMPLATE: &str = r#"Generate {count} interview questions on the topic "{topic}".

{type_instruction}

Return a JSON ARRAY with this EXACT schema per element:
[
  {
    "question": "The full question text",
    "answer": "The canonical correct answer",
    "question_type": "mcq",
    "options": ["Option A text", "Option B text", "Option C text", "Option D text"]
  }
]

HARD RULES:
1. `question_type` must be exactly "mcq" or "descriptive"
2. MCQ questions MUST include exactly 4 options, and `answer` must match one of them verbatim
3. Descriptive questions MUST set `options` to null and give a model answer of 2-4 sentences
4. Questions must be practical and scenario-driven, not trivia
5. No duplicate or near-duplicate questions in the array"#;

/// Per-type instruction fragments spliced into {type_instruction}.
pub const TYPE_MCQ: &str = "Every question must be multiple-choice.";
pub const TYPE_DESCRIPTIVE: &str = "Every question must be descriptive (open-ended).";
pub const TYPE_MIXED: &str =
    "Mix the types: roughly 60% multiple-choice and 40% descriptive questions.";
