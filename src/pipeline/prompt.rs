// Prompt assembly for grounded answers

/// Constrains the model to the retrieved context
pub const SYSTEM_INSTRUCTION: &str = "You are a helpful assistant that answers questions based on the provided context. Use only the information from the context to answer questions. If you cannot find the answer in the context, say so.";

const CONTEXT_SEPARATOR: &str = "\n\n";

/// Join chunk texts, nearest first, with a blank line between them
#[inline]
pub fn build_context<'a, I>(chunks: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    chunks.into_iter().collect::<Vec<_>>().join(CONTEXT_SEPARATOR)
}

#[inline]
pub fn build_user_message(context: &str, question: &str) -> String {
    format!("Context:\n{context}\n\nQuestion: {question}\n\nAnswer:")
}
