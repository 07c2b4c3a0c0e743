use rand::seq::SliceRandom;
use rand::Rng;

const ANSWERS: &[&str] = &[
    "It is certain.",
    "Without a doubt.",
    "Yes, definitely.",
    "Most likely.",
    "Signs point to yes.",
    "Ask again later.",
    "Better not tell you now.",
    "Don't count on it.",
    "My sources say no.",
    "Very doubtful.",
];

/// `/magic [question…]` — a uniformly random canned phrase, echoing the
/// question when one was supplied. Pure and stateless.
pub fn magic_answer(question: Option<&str>) -> String {
    magic_answer_with(&mut rand::thread_rng(), question)
}

fn magic_answer_with<R: Rng + ?Sized>(rng: &mut R, question: Option<&str>) -> String {
    let answer = ANSWERS.choose(rng).copied().unwrap_or(ANSWERS[0]);
    match question {
        Some(q) if !q.trim().is_empty() => format!("🎱 \"{}\" — {}", q.trim(), answer),
        _ => format!("🎱 {}", answer),
    }
}
