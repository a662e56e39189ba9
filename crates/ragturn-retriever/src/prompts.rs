use regex::Regex;

/// Collapse runs of whitespace to a single space and trim the ends, so
/// prompt templates built from conditionally-included fragments don't leak
/// double blank lines or indentation into the model's input.
pub fn clean_text(text: &str) -> String {
    let re = Regex::new(r" +").expect("static regex is valid");
    re.replace_all(text.trim(), " ").to_string()
}

/// Ephemeral system prompt instructing the model to answer using retrieved
/// context. When `best_guess` is set the model is told it may speculate
/// past the literal context rather than refuse.
pub fn build_context_prompt(context_text: &str, best_guess: bool) -> String {
    let guidance = if best_guess {
        "If the information below doesn't fully answer the question, make \
         your best educated guess rather than refusing to answer."
    } else {
        "If the information below doesn't answer the question, say that \
         your database doesn't have that information rather than guessing."
    };

    let prompt = format!(
        "[INSTRUCTIONS]
         You are answering a user's question using search results from a \
         document index. The results below are the top matches returned by \
         the search engine and may be irrelevant or incomplete — read them \
         critically rather than assuming they are authoritative. {guidance}
         If an image asset is relevant and useful, embed it using the \
         literal markdown syntax ![Asset](<image_id>), substituting the \
         asset's raw id for <image_id>.

         [INFORMATION]
         {context_text}"
    );

    clean_text(&prompt)
}

/// Ephemeral system prompt for the no-context branch where the model is
/// asked to guess. `canned_message` is the message already shown to the
/// user (when `no_context_use_message` is set) — the model is told to
/// continue from it rather than repeat it.
pub fn build_no_context_guess_prompt(canned_message: Option<&str>) -> String {
    let prompt = match canned_message {
        Some(message) => format!(
            "[INSTRUCTIONS]
             No relevant information was found for the user's question. The \
             user has already been shown this message: \"{}\". Continue \
             from there with your best guess, starting your reply with a \
             contrasting conjunction such as \"However\" or \"But\", and \
             make clear the answer is a guess rather than a verified fact.",
            message.replace('\n', " ")
        ),
        None => "[INSTRUCTIONS]
             No relevant information was found for the user's question. \
             Give your best educated guess, and make clear the answer is a \
             guess rather than a verified fact."
            .to_string(),
    };

    clean_text(&prompt)
}

/// Ephemeral system prompt for the no-context branch where the model must
/// admit it doesn't know.
pub fn build_no_context_llm_prompt() -> String {
    clean_text(
        "[INSTRUCTIONS]
         No relevant information was found for the user's question. State \
         plainly that you don't know the answer rather than guessing.",
    )
}
