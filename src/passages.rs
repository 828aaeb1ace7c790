use rand::seq::SliceRandom;
use rand::Rng;

/// Built-in passages for the random text source.
pub const PASSAGES: &[&str] = &[
    "The quick brown fox jumps over the lazy dog. Pack my box with five dozen liquor jugs. Programming is the art of telling another human what one wants the computer to do.",
    "Success is not final, failure is not fatal: it is the courage to continue that counts. Believe you can and you're halfway there. The only way to do great work is to love what you do.",
    "A journey of a thousand miles begins with a single step. Practice makes perfect. The expert in anything was once a beginner. Every accomplishment starts with the decision to try.",
];

/// Pick a passage uniformly at random
pub fn random_passage<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    PASSAGES.choose(rng).copied().unwrap_or(PASSAGES[0])
}
