pub const GROUNDED_SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions \
based on the provided context. If the context does not contain the information needed to answer \
the question, say that you do not have enough information. Cite the source of your information \
when possible and use as much of the context as you can. You may use knowledge outside of the \
context to supplement your answer. The context is a collection of documents related to the \
question.";

pub const FALLBACK_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

pub fn grounded_user_prompt(context: &str, query: &str) -> String {
    format!(
        "Context information:\n{}\n\nQuestion: {}\n\nPlease provide a helpful response based on the context.",
        context, query
    )
}
