//! Prompt templates for the answer and relevance chains. Placeholders are
//! `{name}` tokens substituted with `str::replace`; JSON braces in the
//! templates stay literal.

pub const ANSWER_SEED_TEMPLATE: &str = r#"Write a concise answer to the question (delimited with XML tags) from the provided text (delimited with XML tags).
If text has no answer to the question - say "No answer".
Please provide result in JSON format:
{
    "answer": "answer here"
}

<question>
{question}
</question>

<text>
{text}
</text>
"#;

pub const ANSWER_REFINE_TEMPLATE: &str = r#"Your job is to produce a final answer. We have provided an existing answer up to a certain point (delimited with XML tags).
We have the opportunity to refine the existing answer (only if needed) with some more context (delimited with XML tags).
Given the new context, refine the original answer (only if new context is useful) otherwise say that it's not useful.
Please provide result in JSON format:
{
    "not_useful": "True if new context was not useful, False if new content was used",
    "refined_answer": "refined answer here if new context was useful"
}

<question>
{question}
</question>

<existing_answer>
{existing_answer}
</existing_answer>

<more_context>
{more_context}
</more_context>
"#;

pub const RELEVANCE_TEMPLATE: &str = r#"You are the best linguist who can compare texts.
You should understand if provided content (separated by XML tags) is relevant to the query (separated by XML tags).
Relevance score is a number from 0 till 1. 0 means "not relevant", 1 means "relevant".
Content is only relevant when you have FULL DIRECT answer to the query, not a reference to other place.
###
Provide result in JSON:
{
    "score" : score how provided content is relevant to the query,
    "explanation" : "explanation why provided content is relevant to the query or why not"
}
###
<query>
{query}
</query>
###
<content>
{content}
</content>
"#;
