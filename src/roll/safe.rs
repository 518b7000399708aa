//! The error-containment boundary: formula evaluation through these entry
//! points never raises and always hands back a usable roll.

use super::{DefaultRoller, EvalOptions, FormulaError, Roll, Roller};
use crate::data::RollData;

/// Options for the safe wrapper.
#[derive(Debug, Clone, Default)]
pub struct SafeRollOptions<'a> {
    /// Caller-supplied label for the warning log line.
    pub context: Option<&'a str>,
    /// Suppresses the warning log entirely.
    pub silent: bool,
    pub eval: EvalOptions,
}

/// Blocking safe evaluation with the thread-local RNG.
pub fn safe_roll(formula: &str, data: &RollData) -> Roll {
    safe_roll_with(
        formula,
        data,
        &mut DefaultRoller::default(),
        &SafeRollOptions::default(),
    )
}

/// Blocking safe evaluation.
///
/// Any construction or evaluation failure is swallowed: the caller gets a
/// zero-valued placeholder roll with the error attached. A soft warning
/// on a successful roll is surfaced the same way so callers warn
/// uniformly.
pub fn safe_roll_with(
    formula: &str,
    data: &RollData,
    roller: &mut dyn Roller,
    opts: &SafeRollOptions<'_>,
) -> Roll {
    let attempt = match Roll::parse(formula, data) {
        Ok(mut roll) => match roll.evaluate_with(roller, &opts.eval) {
            Ok(_) => Ok(roll),
            Err(err) => Err(err),
        },
        Err(err) => Err(err),
    };
    finish(attempt, formula, data, roller, opts)
}

/// Suspending safe evaluation with the thread-local RNG.
pub async fn safe_roll_async(formula: &str, data: &RollData) -> Roll {
    let mut roller = DefaultRoller::default();
    safe_roll_async_with(formula, data, &mut roller, &SafeRollOptions::default()).await
}

/// Suspending safe evaluation. Agrees with the blocking path on what
/// counts as an error.
pub async fn safe_roll_async_with(
    formula: &str,
    data: &RollData,
    roller: &mut dyn Roller,
    opts: &SafeRollOptions<'_>,
) -> Roll {
    let attempt = match Roll::parse(formula, data) {
        Ok(mut roll) => match roll.evaluate_async_with(roller, &opts.eval).await {
            Ok(_) => Ok(roll),
            Err(err) => Err(err),
        },
        Err(err) => Err(err),
    };
    finish(attempt, formula, data, roller, opts)
}

fn finish(
    attempt: Result<Roll, FormulaError>,
    formula: &str,
    data: &RollData,
    roller: &mut dyn Roller,
    opts: &SafeRollOptions<'_>,
) -> Roll {
    match attempt {
        Ok(mut roll) => {
            if let Some(warning) = roll.warnings().first() {
                let err = warning.as_error();
                warn(opts, formula, &err);
                roll.error = Some(err);
            }
            roll
        }
        Err(err) => {
            warn(opts, formula, &err);
            let mut roll = placeholder(data, roller, opts);
            roll.error = Some(err);
            roll
        }
    }
}

/// A zero-valued roll for the literal formula `"0"`, evaluated against the
/// same data context. Falls back to a hand-built zero roll rather than
/// ever failing.
fn placeholder(data: &RollData, roller: &mut dyn Roller, opts: &SafeRollOptions<'_>) -> Roll {
    if let Ok(mut roll) = Roll::parse("0", data) {
        if roll.evaluate_with(roller, &opts.eval).is_ok() {
            return roll;
        }
    }
    Roll::zero()
}

fn warn(opts: &SafeRollOptions<'_>, formula: &str, err: &FormulaError) {
    if opts.silent {
        return;
    }
    let context = opts.context.unwrap_or("dice-formula");
    log::warn!("{}: formula {:?} failed: {}", context, formula, err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Number;
    use crate::roll::StepRoller;

    fn quiet() -> SafeRollOptions<'static> {
        SafeRollOptions {
            silent: true,
            ..SafeRollOptions::default()
        }
    }

    fn safe(formula: &str, data: &RollData) -> Roll {
        let mut roller = StepRoller::new(3, 1);
        safe_roll_with(formula, data, &mut roller, &quiet())
    }

    #[test]
    fn test_success_passes_through() {
        let roll = safe("2d6 + 1", &RollData::new());
        assert!(roll.error.is_none());
        assert_eq!(roll.total().unwrap(), Number::Int(8));
    }

    #[test]
    fn test_failures_produce_zero_roll() {
        let cases = [
            "garbage(",
            "unknownIdent",
            "lookup(1)",
            "1 / 0",
            "1 +* 2",
            "",
        ];
        for formula in cases {
            let roll = safe(formula, &RollData::new());
            assert!(roll.error.is_some(), "no error attached for {:?}", formula);
            assert_eq!(roll.total().unwrap(), Number::ZERO, "for {:?}", formula);
            assert_eq!(roll.formula(), "0", "for {:?}", formula);
        }
    }

    #[test]
    fn test_soft_warning_becomes_error() {
        let roll = safe("1d6 + @missing", &RollData::new());
        // the roll itself succeeded with 0 substituted
        assert_eq!(roll.total().unwrap(), Number::Int(3));
        assert_eq!(
            roll.error,
            Some(FormulaError::NullReference("missing".to_owned()))
        );
    }
}
