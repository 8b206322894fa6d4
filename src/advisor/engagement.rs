//! Per-turn engagement scoring, topic extraction, and the interactive
//! content catalogs.
//!
//! Everything here is a pure function over the turn text; persistence and
//! experience awards happen in the advisor service.

use rand::seq::IndexedRandom;

/// Keywords that earn engagement credit, once each per turn.
const CAREER_KEYWORDS: [&str; 6] = ["career", "job", "work", "industry", "company", "skill"];

/// Topic phrases checked by substring, in priority order.
pub const COMMON_TOPICS: [&str; 9] = [
    "career planning",
    "job search",
    "skill development",
    "interview prep",
    "networking",
    "industry insights",
    "company culture",
    "work-life balance",
    "professional growth",
];

/// Interactive activity prompts, one of which is appended every fifth turn.
pub const ACTIVITIES: [&str; 4] = [
    "Let's take a quick career values quiz! Ready to discover what matters most to you professionally?",
    "How about we practice an interview scenario? I can play the interviewer role!",
    "Here's a fun challenge: Can you describe your dream job in exactly 6 words?",
    "Want to play 'Two Truths and a Lie' about different careers in your field of interest?",
];

const JOKES: [&str; 4] = [
    "Why did the developer quit his job? He didn't get arrays!",
    "What do you call a bear with no job? Un-bear-ployed!",
    "Why did the career counselor bring a ladder to work? To help people climb the corporate ladder!",
    "What did the AI say to the job seeker? 'Let me process your career options... byte by byte!'",
];

const TRIVIA: [&str; 4] = [
    "Did you know? The average person changes careers (not just jobs) 5-7 times in their lifetime!",
    "Fun fact: The term 'salary' comes from the Latin word 'salarium,' meaning 'salt money' - Roman soldiers were paid in salt!",
    "Interesting: The first resume is believed to have been written by Leonardo da Vinci in 1482!",
    "Fact: Remote work has increased by 159% since 2009!",
];

/// Score one user message in `[0, 1]`: base 0.5, up to 0.2 for length,
/// 0.1 for asking a question, and 0.05 per career keyword present.
pub fn turn_engagement_score(message: &str) -> f64 {
    let mut score: f64 = 0.5;

    let word_count = message.split_whitespace().count();
    if word_count > 20 {
        score += 0.2;
    } else if word_count > 10 {
        score += 0.1;
    }

    if message.contains('?') {
        score += 0.1;
    }

    let lowered = message.to_lowercase();
    for keyword in CAREER_KEYWORDS {
        if lowered.contains(keyword) {
            score += 0.05;
        }
    }

    score.min(1.0)
}

/// Up to three topic tags found in the turn text, list order preserved.
pub fn extract_topics(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    COMMON_TOPICS
        .iter()
        .filter(|topic| lowered.contains(*topic))
        .take(3)
        .map(|topic| topic.to_string())
        .collect()
}

/// A uniformly random interactive activity prompt.
pub fn suggest_activity() -> &'static str {
    ACTIVITIES
        .choose(&mut rand::rng())
        .copied()
        .expect("activity catalog is non-empty")
}

/// A uniformly random career joke.
pub fn career_joke() -> &'static str {
    JOKES
        .choose(&mut rand::rng())
        .copied()
        .expect("joke catalog is non-empty")
}

/// A uniformly random piece of career trivia.
pub fn career_trivia() -> &'static str {
    TRIVIA
        .choose(&mut rand::rng())
        .copied()
        .expect("trivia catalog is non-empty")
}
