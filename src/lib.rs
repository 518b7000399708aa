//! A dice-formula evaluation engine: arithmetic and dice notation plus
//! callable function terms, a term-simplification pass, checked and
//! damage roll wrappers, and a safe-evaluation boundary that never
//! raises.
//!
//! Grammar surface, beyond plain arithmetic and `NdF` dice (with
//! `kh`/`kl`/`ph`/`pl` keep/drop modifiers):
//!
//! ```text
//! if(condition, ifTrue?)
//! ifelse(condition, ifTrue?, ifFalse?)
//! lookup(search, value0, value1, ..., valueN)   // N >= 2
//! sizeReach(count, faces, sizeDelta, initialSize?)
//! sizeRoll(count, faces, sizeDelta, initialSize?)
//! cond ? ifTrue : ifFalse                       // sugar for ifelse
//! <term>[flavor text]
//! @path                                         // data reference
//! ```
//!
//! ```
//! use dice_formula::{EvalOptions, Roll, RollData, StepRoller};
//!
//! let data = RollData::new().with("str", 3);
//! let mut roll = Roll::parse("1d8 + @str", &data).unwrap();
//! let mut roller = StepRoller::new(5, 1);
//! roll.evaluate_with(&mut roller, &EvalOptions::default()).unwrap();
//! assert_eq!(roll.total().unwrap().as_int(), 8);
//! ```

mod common;
mod data;
mod parse;
mod roll;
mod size;
mod term;

pub use common::{BinaryOperator, Float, Int, NonZeroUInt, Number, UInt, UnaryOperator};
pub use data::{DataValue, RollData};
pub use roll::{
    safe_roll, safe_roll_async, safe_roll_async_with, safe_roll_with, CheckOptions, CheckRoll,
    DamageClass, DamageRoll, DamageType, DefaultRoller, EvalContext, EvalOptions, FormulaError,
    RngRoller, Roll, RollOptions, RollWarning, Roller, SafeRollOptions, StepRoller,
};
pub use size::{step_die_expr, Size};
pub use term::{
    dice::{DiceMod, DiceModKind, DieRoll, ModSelector},
    function::{FnDescriptor, FnTerm, IfElseTerm, IfTerm, LookupTerm, SizeReachTerm, SizeRollTerm, FN_REGISTRY},
    DiceTerm, Expr, MathTerm, NumericTerm, OperatorTerm, ParensTerm, StringTerm, Term, TermLike,
};
