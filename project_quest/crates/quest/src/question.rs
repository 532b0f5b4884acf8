//! Arithmetic and algebra questions with a canonical solution.
//!
//! Generation is pure with respect to the supplied random source, so a seeded
//! RNG always yields the same question.

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
    /// Draw from every template.
    All,
}

impl Difficulty {
    /// Below level 3 is easy, above level 7 is hard.
    pub fn for_level(level: u32) -> Self {
        if level < 3 {
            Difficulty::Easy
        } else if level > 7 {
            Difficulty::Hard
        } else {
            Difficulty::Normal
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub prompt: String,
    pub solution: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    FractionAdd,
    FractionSub,
    LinearEquation,
    Percentage,
    Power,
    SquareRoot,
    Lcm,
    Proportion,
}

impl Template {
    pub const ALL: [Template; 8] = [
        Template::FractionAdd,
        Template::FractionSub,
        Template::LinearEquation,
        Template::Percentage,
        Template::Power,
        Template::SquareRoot,
        Template::Lcm,
        Template::Proportion,
    ];

    pub fn difficulty(self) -> Difficulty {
        match self {
            Template::FractionAdd | Template::FractionSub => Difficulty::Easy,
            Template::LinearEquation
            | Template::Percentage
            | Template::Power
            | Template::SquareRoot => Difficulty::Normal,
            Template::Lcm | Template::Proportion => Difficulty::Hard,
        }
    }

    pub fn instantiate<R: Rng + ?Sized>(self, rng: &mut R) -> Question {
        match self {
            Template::FractionAdd => {
                let (a, b, c, d) = four_operands(rng);
                let value = a as f64 / b as f64 + c as f64 / d as f64;
                Question {
                    prompt: format!("Add {a}/{b} + {c}/{d}"),
                    solution: format!("{value:.2}"),
                    explanation: format!(
                        "Use a common denominator: {a}/{b} + {c}/{d} = {}/{} = {value:.2}",
                        a * d + c * b,
                        b * d
                    ),
                }
            }
            Template::FractionSub => {
                let (a, b, c, d) = four_operands(rng);
                let value = a as f64 / b as f64 - c as f64 / d as f64;
                Question {
                    prompt: format!("Subtract {a}/{b} - {c}/{d}"),
                    solution: format!("{value:.2}"),
                    explanation: format!(
                        "Use a common denominator: {a}/{b} - {c}/{d} = {}/{} = {value:.2}",
                        a * d - c * b,
                        b * d
                    ),
                }
            }
            Template::LinearEquation => {
                let a: i32 = rng.random_range(1..=5);
                let b: i32 = rng.random_range(1..=10);
                let mut c: i32 = rng.random_range(1..=5);
                while c == a {
                    c = rng.random_range(1..=5);
                }
                let d: i32 = rng.random_range(1..=10);
                let x = (d - b) as f64 / (a - c) as f64;
                Question {
                    prompt: format!("Solve for x: {a}x + {b} = {c}x + {d}"),
                    solution: format!("{x:.2}"),
                    explanation: format!(
                        "Subtract {c}x from both sides: {}x + {b} = {d}. Subtract {b}: {}x = {}. Divide by {}: x = {x:.2}",
                        a - c,
                        a - c,
                        d - b,
                        a - c
                    ),
                }
            }
            Template::Percentage => {
                let percent: i32 = rng.random_range(10..=59);
                let number: i32 = rng.random_range(50..=149);
                let value = (number * percent) as f64 / 100.0;
                Question {
                    prompt: format!("What is {percent}% of {number}?"),
                    solution: format!("{value:.2}"),
                    explanation: format!(
                        "Multiply the number by the percentage and divide by 100: {number} x {percent} / 100 = {value:.2}"
                    ),
                }
            }
            Template::Power => {
                let base: i64 = rng.random_range(2..=6);
                let exponent: u32 = rng.random_range(2..=4);
                let value = base.pow(exponent);
                Question {
                    prompt: format!("Compute {base}^{exponent}"),
                    solution: value.to_string(),
                    explanation: format!(
                        "{base} to the power {exponent} means multiplying {base} by itself {exponent} times: {value}"
                    ),
                }
            }
            Template::SquareRoot => {
                let root: i64 = rng.random_range(1..=10);
                let square = root * root;
                Question {
                    prompt: format!("What is the square root of {square}?"),
                    solution: root.to_string(),
                    explanation: format!(
                        "The square root of {square} is {root} because {root} x {root} = {square}"
                    ),
                }
            }
            Template::Lcm => {
                let a: i64 = rng.random_range(2..=11);
                let b: i64 = rng.random_range(2..=11);
                let value = lcm(a, b);
                Question {
                    prompt: format!("What is the least common multiple of {a} and {b}?"),
                    solution: value.to_string(),
                    explanation: format!("The least common multiple of {a} and {b} is {value}"),
                }
            }
            Template::Proportion => {
                let a: i32 = rng.random_range(1..=5);
                let b: i32 = rng.random_range(1..=5);
                let c: i32 = rng.random_range(1..=5);
                let x = (b * c) as f64 / a as f64;
                Question {
                    prompt: format!("Solve the proportion: {a}/{b} = {c}/x"),
                    solution: format!("{x:.2}"),
                    explanation: format!(
                        "Cross-multiply: {a} x x = {b} x {c}, so x = {} / {a} = {x:.2}",
                        b * c
                    ),
                }
            }
        }
    }
}

fn four_operands<R: Rng + ?Sized>(rng: &mut R) -> (i32, i32, i32, i32) {
    (
        rng.random_range(1..=5),
        rng.random_range(1..=5),
        rng.random_range(1..=5),
        rng.random_range(1..=5),
    )
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.abs()
}

fn lcm(a: i64, b: i64) -> i64 {
    a / gcd(a, b) * b
}

/// Draw a question uniformly among the templates of `difficulty`.
pub fn generate<R: Rng + ?Sized>(difficulty: Difficulty, rng: &mut R) -> Question {
    let pool: Vec<Template> = Template::ALL
        .into_iter()
        .filter(|t| difficulty == Difficulty::All || t.difficulty() == difficulty)
        .collect();
    let template = pool[rng.random_range(0..pool.len())];
    template.instantiate(rng)
}

/// Numeric answers match within 0.01 when both sides parse as numbers;
/// anything else falls back to a case-insensitive string comparison.
pub fn validate(question: &Question, raw: &str) -> bool {
    match (
        parse_leading_float(&question.solution),
        parse_leading_float(raw),
    ) {
        (Some(expected), Some(provided)) => (expected - provided).abs() < 0.01,
        _ => question.solution.to_lowercase() == raw.to_lowercase(),
    }
}

/// Parse the longest numeric prefix of `s` after leading whitespace, the way
/// a lenient float parser does: `"3.5 apples"` is 3.5, `"abc"` is None.
pub fn parse_leading_float(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    if s[end..].starts_with("Infinity") {
        return s[..end + "Infinity".len()].replace("Infinity", "inf").parse().ok();
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }

    // Exponent only counts when at least one digit follows it.
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse().ok()
}
