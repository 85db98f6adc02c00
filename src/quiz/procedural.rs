//! Offline question generator
//!
//! Each tier maps to one problem family. The correct answer is computed
//! first; distractors model a specific mistake (wrong operation, dropped
//! carry, missing chain-rule factor, ...) rather than a random offset.

use rand::Rng;
use rand::seq::SliceRandom;

use super::Question;
use crate::settings::Tier;

/// Problem family for a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Arithmetic,
    Algebra,
    Geometry,
    Calculus,
}

impl Family {
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Easy => Family::Arithmetic,
            Tier::Medium => Family::Algebra,
            Tier::Hard => Family::Geometry,
            Tier::Spartan => Family::Calculus,
        }
    }

    /// Question difficulty level (point multiplier)
    pub fn level(&self) -> u32 {
        match self {
            Family::Arithmetic => 1,
            Family::Algebra => 2,
            Family::Geometry => 3,
            Family::Calculus => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithmeticOp {
    pub fn symbol(&self) -> char {
        match self {
            ArithmeticOp::Add => '+',
            ArithmeticOp::Sub => '-',
            ArithmeticOp::Mul => '×',
            ArithmeticOp::Div => '÷',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '+' => Some(ArithmeticOp::Add),
            '-' => Some(ArithmeticOp::Sub),
            '*' | '×' | 'x' => Some(ArithmeticOp::Mul),
            '/' | '÷' => Some(ArithmeticOp::Div),
            _ => None,
        }
    }
}

/// Generate a question for `tier` with `option_count` options
pub fn generate<R: Rng>(tier: Tier, option_count: usize, rng: &mut R) -> Question {
    match Family::for_tier(tier) {
        Family::Arithmetic => {
            let op = match rng.random_range(0..4) {
                0 => ArithmeticOp::Add,
                1 => ArithmeticOp::Sub,
                2 => ArithmeticOp::Mul,
                _ => ArithmeticOp::Div,
            };
            let (a, b) = match op {
                // Quotient and divisor, dividend kept to two digits
                ArithmeticOp::Div => {
                    let quotient = rng.random_range(2..=9);
                    (quotient, rng.random_range(10..=99 / quotient))
                }
                _ => (rng.random_range(10..=99), rng.random_range(10..=99)),
            };
            arithmetic(a, b, op, option_count, rng)
        }
        Family::Algebra => algebra(option_count, rng),
        Family::Geometry => geometry(option_count, rng),
        Family::Calculus => calculus(option_count, rng),
    }
}

/// Arithmetic over two operands. Subtraction is ordered so the result is
/// non-negative; for division `a` is the quotient and `b` the divisor, so the
/// prompt shows `a*b ÷ b`.
pub fn arithmetic<R: Rng>(a: i64, b: i64, op: ArithmeticOp, option_count: usize, rng: &mut R) -> Question {
    let (expr, answer, distractors) = match op {
        ArithmeticOp::Add => {
            let sum = a + b;
            (
                format!("{a} {} {b}", op.symbol()),
                sum,
                vec![sum + 10, sum - 10, (a - b).abs()],
            )
        }
        ArithmeticOp::Sub => {
            let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
            let diff = hi - lo;
            // Subtracting the smaller digit from the larger in each column
            let digitwise = ((hi / 10) % 10 - (lo / 10) % 10).abs() * 10 + (hi % 10 - lo % 10).abs();
            (
                format!("{hi} {} {lo}", op.symbol()),
                diff,
                vec![digitwise, hi + lo, diff + 10],
            )
        }
        ArithmeticOp::Mul => {
            let product = a * b;
            (
                format!("{a} {} {b}", op.symbol()),
                product,
                vec![a * (b - b % 10), product + a, a + b],
            )
        }
        ArithmeticOp::Div => {
            let quotient = a.max(1);
            let divisor = b.max(2);
            let dividend = quotient * divisor;
            (
                format!("{dividend} {} {divisor}", op.symbol()),
                quotient,
                vec![dividend - divisor, quotient * 10, divisor],
            )
        }
    };

    assemble(
        format!("What is {expr}?"),
        answer.to_string(),
        distractors.into_iter().map(|d| d.to_string()).collect(),
        answer,
        Family::Arithmetic.level(),
        Some(format!("{expr} = {answer}")),
        option_count,
        rng,
    )
}

fn algebra<R: Rng>(option_count: usize, rng: &mut R) -> Question {
    let level = Family::Algebra.level();
    match rng.random_range(0..5) {
        0 => {
            // x^2 = 4py has its focus at (0, p)
            let p: i64 = rng.random_range(1..=6);
            assemble(
                format!("The parabola x² = {}y has focus (0, k). What is k?", 4 * p),
                p.to_string(),
                vec![(4 * p).to_string(), (2 * p).to_string(), (-p).to_string()],
                p,
                level,
                Some(format!("x² = 4py with 4p = {}, so p = {p}", 4 * p)),
                option_count,
                rng,
            )
        }
        1 => {
            let a: i64 = rng.random_range(1..=5);
            let b: i64 = rng.random_range(-9..=9);
            let c: i64 = nonzero(rng, 9);
            let disc = b * b - 4 * a * c;
            assemble(
                format!("What is the discriminant of {}?", quadratic(a, b, c)),
                disc.to_string(),
                vec![
                    (b * b + 4 * a * c).to_string(),
                    (4 * a * c - b * b).to_string(),
                    (b - 4 * a * c).to_string(),
                ],
                disc,
                level,
                Some(format!("b² - 4ac = {} - {} = {disc}", b * b, 4 * a * c)),
                option_count,
                rng,
            )
        }
        2 => {
            let (a, b, c, d): (i64, i64, i64, i64) = (
                rng.random_range(-9..=9),
                rng.random_range(-9..=9),
                rng.random_range(-9..=9),
                rng.random_range(-9..=9),
            );
            let dot = a * c + b * d;
            assemble(
                format!("What is ({a}, {b}) · ({c}, {d})?"),
                dot.to_string(),
                vec![
                    (a * d + b * c).to_string(),
                    (a * c - b * d).to_string(),
                    (a * b + c * d).to_string(),
                ],
                dot,
                level,
                Some(format!("{a}·{c} + {b}·{d} = {dot}")),
                option_count,
                rng,
            )
        }
        3 => {
            let first: i64 = rng.random_range(1..=9);
            let step: i64 = rng.random_range(1..=6);
            let n: i64 = rng.random_range(5..=12);
            let sum = n * (2 * first + (n - 1) * step) / 2;
            let one_more = (n + 1) * (2 * first + n * step) / 2;
            assemble(
                format!("What is the sum of the first {n} terms of the arithmetic series {first}, {}, {}, ...?", first + step, first + 2 * step),
                sum.to_string(),
                vec![
                    (2 * sum).to_string(),
                    (first + (n - 1) * step).to_string(),
                    one_more.to_string(),
                ],
                sum,
                level,
                Some(format!("S = n(2a + (n-1)d)/2 = {sum}")),
                option_count,
                rng,
            )
        }
        _ => {
            let x1: i64 = rng.random_range(-5..=5);
            let y1: i64 = rng.random_range(-5..=5);
            let dx: i64 = rng.random_range(1..=6);
            let m: i64 = nonzero(rng, 5);
            let (x2, y2) = (x1 + dx, y1 + m * dx);
            assemble(
                format!("What is the slope of the line through ({x1}, {y1}) and ({x2}, {y2})?"),
                m.to_string(),
                vec![(-m).to_string(), fraction(1, m), (m * dx).to_string()],
                m,
                level,
                Some(format!("(y2 - y1)/(x2 - x1) = {}/{dx} = {m}", m * dx)),
                option_count,
                rng,
            )
        }
    }
}

fn geometry<R: Rng>(option_count: usize, rng: &mut R) -> Question {
    let level = Family::Geometry.level();
    match rng.random_range(0..3) {
        0 => {
            let theta: i64 = loop {
                let t = rng.random_range(7..=29) * 5;
                if t != 90 {
                    break t;
                }
            };
            let answer = 180 - theta;
            assemble(
                format!(
                    "Two parallel lines are cut by a transversal. An alternate interior angle measures {theta}°. What is the measure of its supplement?"
                ),
                degrees(answer),
                vec![degrees(theta), degrees((90 - theta).abs()), degrees(360 - theta)],
                answer,
                level,
                Some(format!("Supplementary angles sum to 180°: 180 - {theta} = {answer}")),
                option_count,
                rng,
            )
        }
        1 => assemble(
            "What is the measure of each exterior angle of a regular hexagon?".to_string(),
            degrees(60),
            vec![degrees(120), degrees(720), degrees(360)],
            60,
            level,
            Some("Exterior angles sum to 360°, and 360 / 6 = 60".to_string()),
            option_count,
            rng,
        ),
        _ => {
            let r: i64 = rng.random_range(2..=12);
            let k = r * r;
            assemble(
                format!("A circle has radius {r}. Its area is kπ. What is k?"),
                k.to_string(),
                vec![(2 * r).to_string(), (4 * k).to_string(), r.to_string()],
                k,
                level,
                Some(format!("A = πr² = {k}π")),
                option_count,
                rng,
            )
        }
    }
}

fn calculus<R: Rng>(option_count: usize, rng: &mut R) -> Question {
    let level = Family::Calculus.level();
    if rng.random_bool(0.5) {
        let a: i64 = rng.random_range(1..=5);
        let k: i64 = rng.random_range(2..=6);
        let answer = a * k;
        assemble(
            format!("If f(x) = {a}e^({k}x), what is f'(0)?"),
            answer.to_string(),
            vec![a.to_string(), (a * k * k).to_string(), (a + k).to_string()],
            answer,
            level,
            Some(format!("f'(x) = {}e^({k}x), and e^0 = 1", a * k)),
            option_count,
            rng,
        )
    } else {
        let n: i64 = rng.random_range(1..=6);
        let cube = n * n * n;
        assemble(
            format!("What is the definite integral of x² from 0 to {n}?"),
            fraction(cube, 3),
            vec![cube.to_string(), fraction(cube, 2), (n * n).to_string()],
            cube,
            level,
            Some(format!("[x³/3] from 0 to {n} = {}", fraction(cube, 3))),
            option_count,
            rng,
        )
    }
}

/// Deduplicate, top up with fillers, shuffle, and record the correct index
#[allow(clippy::too_many_arguments)]
fn assemble<R: Rng>(
    prompt: String,
    correct: String,
    distractors: Vec<String>,
    filler_base: i64,
    level: u32,
    explanation: Option<String>,
    option_count: usize,
    rng: &mut R,
) -> Question {
    let option_count = option_count.max(2);
    let mut options = vec![correct.clone()];

    for d in distractors {
        if options.len() >= option_count {
            break;
        }
        if !options.contains(&d) {
            options.push(d);
        }
    }

    // Structural distractors collided; pad with spaced-out values
    let unit = if correct.ends_with('°') { "°" } else { "" };
    let step = (filler_base.abs() / 5).max(2);
    let mut k = 2;
    while options.len() < option_count {
        let sign = if k % 2 == 0 { 1 } else { -1 };
        let candidate = format!("{}{unit}", filler_base + sign * step * (k / 2 + 1));
        if !options.contains(&candidate) {
            options.push(candidate);
        }
        k += 1;
    }

    options.shuffle(rng);
    let correct_index = options.iter().position(|o| *o == correct).unwrap_or(0);

    Question {
        prompt,
        options,
        correct_index,
        difficulty_level: level,
        explanation,
    }
}

fn nonzero<R: Rng>(rng: &mut R, bound: i64) -> i64 {
    let v = rng.random_range(1..=bound);
    if rng.random_bool(0.5) { v } else { -v }
}

fn gcd(a: i64, b: i64) -> i64 {
    if b == 0 { a.abs() } else { gcd(b, a % b) }
}

/// Reduced fraction, or a plain integer when it divides evenly
fn fraction(num: i64, den: i64) -> String {
    let g = gcd(num, den).max(1);
    let (mut num, mut den) = (num / g, den / g);
    if den < 0 {
        num = -num;
        den = -den;
    }
    if den == 1 {
        num.to_string()
    } else {
        format!("{num}/{den}")
    }
}

fn degrees(v: i64) -> String {
    format!("{v}°")
}

fn quadratic(a: i64, b: i64, c: i64) -> String {
    let lead = if a == 1 { "x²".to_string() } else { format!("{a}x²") };
    let mid = match b {
        0 => String::new(),
        1 => " + x".to_string(),
        -1 => " - x".to_string(),
        b if b > 0 => format!(" + {b}x"),
        b => format!(" - {}x", -b),
    };
    let tail = if c >= 0 { format!(" + {c}") } else { format!(" - {}", -c) };
    format!("{lead}{mid}{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;
    use std::collections::HashSet;

    fn assert_well_formed(q: &Question, count: usize) {
        assert_eq!(q.options.len(), count, "{q:?}");
        let unique: HashSet<_> = q.options.iter().collect();
        assert_eq!(unique.len(), count, "duplicate options in {q:?}");
        assert!(q.correct_index < count);
    }

    #[test]
    fn test_addition_37_plus_52() {
        let mut rng = Pcg32::seed_from_u64(1);
        let q = arithmetic(37, 52, ArithmeticOp::from_symbol('+').unwrap(), 4, &mut rng);
        assert_eq!(q.correct_option(), Some("89"));
        assert_well_formed(&q, 4);
        assert!(q.options.contains(&"89".to_string()));
        // Distractors are structural, not neighbours
        assert!(!q.options.contains(&"88".to_string()));
        assert!(!q.options.contains(&"90".to_string()));
    }

    #[test]
    fn test_subtraction_is_non_negative_with_digit_error() {
        let mut rng = Pcg32::seed_from_u64(2);
        let q = arithmetic(37, 52, ArithmeticOp::Sub, 4, &mut rng);
        assert_eq!(q.correct_option(), Some("15"));
        assert!(q.options.contains(&"25".to_string()));
        assert!(q.prompt.contains("52 - 37"));
    }

    #[test]
    fn test_division_is_integral() {
        let mut rng = Pcg32::seed_from_u64(3);
        let q = arithmetic(7, 12, ArithmeticOp::Div, 4, &mut rng);
        assert_eq!(q.correct_option(), Some("7"));
        assert!(q.prompt.contains("84 ÷ 12"));
    }

    #[test]
    fn test_arithmetic_operands_are_two_digit() {
        let mut rng = Pcg32::seed_from_u64(9);
        for _ in 0..300 {
            let q = generate(Tier::Easy, 4, &mut rng);
            let expr = q.prompt.trim_start_matches("What is ").trim_end_matches('?');
            let parts: Vec<&str> = expr.split_whitespace().collect();
            assert_eq!(parts.len(), 3, "{}", q.prompt);
            let op = parts[1].chars().next().and_then(ArithmeticOp::from_symbol).unwrap();
            assert_eq!(parts[1].chars().next(), Some(op.symbol()));
            for operand in [parts[0], parts[2]] {
                let n: i64 = operand.parse().unwrap();
                assert!((10..=99).contains(&n), "{}", q.prompt);
            }
        }
    }

    #[test]
    fn test_hexagon_is_constant() {
        let mut rng = Pcg32::seed_from_u64(4);
        for _ in 0..200 {
            let q = geometry(4, &mut rng);
            if q.prompt.contains("hexagon") {
                assert_eq!(q.correct_option(), Some("60°"));
                return;
            }
        }
        panic!("hexagon variant never generated");
    }

    #[test]
    fn test_integral_formats_fraction() {
        assert_eq!(fraction(8, 3), "8/3");
        assert_eq!(fraction(27, 3), "9");
        assert_eq!(fraction(4, -6), "-2/3");
    }

    #[test]
    fn test_collisions_are_padded() {
        let mut rng = Pcg32::seed_from_u64(5);
        let q = assemble(
            "?".to_string(),
            "4".to_string(),
            vec!["4".to_string(), "4".to_string(), "8".to_string()],
            4,
            1,
            None,
            4,
            &mut rng,
        );
        assert_well_formed(&q, 4);
        assert_eq!(q.correct_option(), Some("4"));
    }

    #[test]
    fn test_levels_follow_family() {
        let mut rng = Pcg32::seed_from_u64(6);
        for tier in Tier::ALL {
            let q = generate(tier, 4, &mut rng);
            assert_eq!(q.difficulty_level, Family::for_tier(tier).level());
        }
    }

    #[test]
    fn test_quadratic_rendering() {
        assert_eq!(quadratic(1, -3, 2), "x² - 3x + 2");
        assert_eq!(quadratic(2, 0, -5), "2x² - 5");
    }

    proptest! {
        #[test]
        fn prop_generated_questions_are_well_formed(seed in any::<u64>(), tier_index in 0u8..4, count in 2usize..7) {
            let mut rng = Pcg32::seed_from_u64(seed);
            let q = generate(Tier::from_index(tier_index), count, &mut rng);
            prop_assert_eq!(q.options.len(), count);
            let unique: HashSet<_> = q.options.iter().collect();
            prop_assert_eq!(unique.len(), count);
            prop_assert!(q.correct_index < count);
            prop_assert!(!q.prompt.is_empty());
        }
    }
}
