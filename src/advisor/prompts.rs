//! Prompt assembly for the career advisor: a system prompt shaped by the
//! user's profile, plus recent conversation context.

use crate::db::{DbAdvisorTurn, DbUser};

use super::provider::{GenerationRequest, TurnContext};

/// How many prior turns travel with each request.
const CONTEXT_TURNS: usize = 5;

/// Build the advisor system prompt from the user's profile.
///
/// The profile fields are user-authored free text; they are quoted into
/// the prompt as-is and the model is told what each one is.
pub fn build_system_prompt(user: &DbUser) -> String {
    let age = user
        .age
        .map(|a| a.to_string())
        .unwrap_or_else(|| "an unknown number of".to_string());
    let interests = user.interests.as_deref().unwrap_or("not specified");
    let goals = user.goals.as_deref().unwrap_or("not specified");

    let mut prompt = String::new();
    prompt.push_str("You are a friendly and engaging career guidance AI assistant.\n");
    prompt.push_str(&format!(
        "Adapt your responses to be appropriate for someone who is {} years old.\n",
        age
    ));
    prompt.push_str(&format!("The user's interests include: {}\n", interests));
    prompt.push_str(&format!("Their career goals are: {}\n", goals));
    prompt.push_str(&format!(
        "Current level: {} (Beginner: 1-2, Intermediate: 3-4, Advanced: 5+)\n\n",
        user.level
    ));
    prompt.push_str(
        "Keep responses engaging and interactive. Include occasional:\n\
         - Career-related jokes or trivia\n\
         - Mini-challenges or thought exercises\n\
         - Relevant industry insights\n\
         - Encouragement and positive reinforcement\n\n",
    );
    prompt.push_str(
        "If the conversation gets long, suggest interactive activities like:\n\
         - Career quizzes\n\
         - Role-playing scenarios\n\
         - Industry exploration games\n\n",
    );
    prompt.push_str("Remember previous interactions and build upon them.");
    prompt
}

/// Assemble a generation request: system prompt, the five most recent prior
/// turns oldest first, and the new message.
///
/// `recent_turns` arrives newest first, as the turn queries return it.
pub fn build_request(
    user: &DbUser,
    recent_turns: &[DbAdvisorTurn],
    message: &str,
) -> GenerationRequest {
    let history: Vec<TurnContext> = recent_turns
        .iter()
        .take(CONTEXT_TURNS)
        .rev()
        .map(|turn| TurnContext {
            message: turn.message.clone(),
            response: turn.response.clone(),
        })
        .collect();

    GenerationRequest {
        system_prompt: build_system_prompt(user),
        history,
        message: message.to_string(),
    }
}
